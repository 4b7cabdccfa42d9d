use glam::DVec2;

use super::error::{finite, ViewportError};
use super::viewport::{Viewport, ViewportOptions};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FitBoundsOptions {
    /// Pixels kept free on every side.
    pub padding: f64,
    /// Screen offset applied to the fitted bounds.
    pub offset: DVec2,
    pub max_zoom: f64,
}

impl Default for FitBoundsOptions {
    fn default() -> Self {
        Self {
            padding: 0.0,
            offset: DVec2::ZERO,
            max_zoom: 24.0,
        }
    }
}

/// Camera that fits a bounding box.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FitBounds {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
}

/// Fits `[[west, south], [east, north]]` into a `width × height` screen.
pub fn fit_bounds(
    width: f64,
    height: f64,
    bounds: [DVec2; 2],
    opts: FitBoundsOptions,
) -> Result<FitBounds, ViewportError> {
    let [sw, ne] = bounds;
    for v in [sw.x, sw.y, ne.x, ne.y] {
        finite("bounds", v)?;
    }
    let padding = finite("padding", opts.padding)?;
    finite("offset", opts.offset.x)?;
    finite("offset", opts.offset.y)?;

    let probe = Viewport::new(ViewportOptions {
        width,
        height,
        longitude: 0.0,
        latitude: 0.0,
        zoom: 0.0,
        ..ViewportOptions::default()
    })?;

    let nw = probe.project(DVec2::new(sw.x, ne.y));
    let se = probe.project(DVec2::new(ne.x, sw.y));
    let size = (se - nw).abs();
    let center = (se + nw) * 0.5;

    let avail_x = probe.width() - padding * 2.0 - opts.offset.x.abs() * 2.0;
    let avail_y = probe.height() - padding * 2.0 - opts.offset.y.abs() * 2.0;
    if avail_x <= 0.0 || avail_y <= 0.0 {
        return Err(ViewportError::InvalidArgument(format!(
            "padding {padding} and offset {:?} leave no room in a {width}x{height} viewport",
            opts.offset
        )));
    }

    // Degenerate bounds (a point) zoom in as far as allowed.
    let scale = (avail_x / size.x).min(avail_y / size.y);
    let zoom = if scale.is_finite() {
        (probe.zoom() + scale.log2()).min(opts.max_zoom)
    } else {
        opts.max_zoom
    };

    let scale = (zoom - probe.zoom()).exp2();
    let center = probe.unproject(center - opts.offset / scale);

    Ok(FitBounds {
        longitude: center.x,
        latitude: center.y,
        zoom,
    })
}

impl Viewport {
    /// A viewport of the same size and id that fits `bounds`. Pitch and
    /// bearing are reset.
    pub fn fit_bounds(&self, bounds: [DVec2; 2], opts: FitBoundsOptions) -> Result<Viewport, ViewportError> {
        let fit = fit_bounds(self.width(), self.height(), bounds, opts)?;
        Viewport::new(ViewportOptions {
            longitude: fit.longitude,
            latitude: fit.latitude,
            zoom: fit.zoom,
            pitch: 0.0,
            bearing: 0.0,
            ..self.options()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Viewport {
        Viewport::new(ViewportOptions {
            width: 600.0,
            height: 400.0,
            ..ViewportOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn fitted_viewport_contains_bounds() {
        let bounds = [DVec2::new(-73.9876, 40.7661), DVec2::new(-72.9876, 41.7661)];
        let vp = base()
            .fit_bounds(bounds, FitBoundsOptions { padding: 20.0, ..FitBoundsOptions::default() })
            .unwrap();

        let nw = vp.project(DVec2::new(bounds[0].x, bounds[1].y));
        let se = vp.project(DVec2::new(bounds[1].x, bounds[0].y));
        for p in [nw, se] {
            assert!(p.x >= 20.0 - 1e-6 && p.x <= 580.0 + 1e-6, "{p:?}");
            assert!(p.y >= 20.0 - 1e-6 && p.y <= 380.0 + 1e-6, "{p:?}");
        }
        // The limiting axis touches the padding.
        assert!((se.y - nw.y - 360.0).abs() < 1e-6 || (se.x - nw.x - 560.0).abs() < 1e-6);
    }

    #[test]
    fn fitted_center_is_bounds_center_without_offset() {
        let bounds = [DVec2::new(10.0, -5.0), DVec2::new(20.0, 5.0)];
        let fit = fit_bounds(600.0, 400.0, bounds, FitBoundsOptions::default()).unwrap();
        assert!((fit.longitude - 15.0).abs() < 1e-9);
        assert!(fit.latitude.abs() < 1e-9);
    }

    #[test]
    fn offset_shifts_bounds_on_screen() {
        let bounds = [DVec2::new(10.0, -5.0), DVec2::new(20.0, 5.0)];
        let opts = FitBoundsOptions { offset: DVec2::new(50.0, 0.0), ..FitBoundsOptions::default() };
        let vp = base().fit_bounds(bounds, opts).unwrap();
        let c = vp.project(DVec2::new(15.0, 0.0));
        assert!((c.x - 350.0).abs() < 1e-6, "{c:?}");
    }

    #[test]
    fn excessive_padding_is_rejected() {
        let bounds = [DVec2::new(0.0, 0.0), DVec2::new(1.0, 1.0)];
        let err = fit_bounds(100.0, 100.0, bounds, FitBoundsOptions { padding: 60.0, ..FitBoundsOptions::default() });
        assert!(matches!(err, Err(ViewportError::InvalidArgument(_))));
    }

    #[test]
    fn point_bounds_use_max_zoom() {
        let p = DVec2::new(2.0, 48.0);
        let fit = fit_bounds(100.0, 100.0, [p, p], FitBoundsOptions::default()).unwrap();
        assert_eq!(fit.zoom, 24.0);
    }
}
