use std::any::Any;
use std::rc::Rc;

use earcutr::earcut;
use geodeck_engine::device::GlContext;
use geodeck_engine::layer::{
    Attributes, ChangeFlags, DrawOptions, Layer, LayerContext, LayerCore, LayerProps, LayerState, UpdateParams,
};

use crate::common::{to_world, Accessor, Color, Data, Primitive, PropDiff, LINES, TRIANGLES};

/// Outer ring first, then holes. Rings may or may not repeat their first
/// point at the end.
pub type Polygon = Vec<Vec<[f64; 2]>>;

/// Filled polygons with optional outlines.
pub struct PolygonLayer<T> {
    core: LayerCore,
    data: Data<T>,
    get_polygon: Accessor<T, Polygon>,
    get_fill_color: Accessor<T, Color>,
    get_line_color: Accessor<T, Color>,
    get_line_width: Accessor<T, f64>,
    filled: bool,
    stroked: bool,
    line_width_min_pixels: f64,
}

struct PolygonState {
    fill: Primitive,
    outline: Primitive,
}

impl<T: Clone + 'static> PolygonLayer<T> {
    pub fn new(props: LayerProps, data: Data<T>, get_polygon: impl Fn(&T) -> Polygon + 'static) -> Self {
        Self {
            core: LayerCore::new(props),
            data,
            get_polygon: Rc::new(get_polygon),
            get_fill_color: Rc::new(|_| [0, 0, 0, 255]),
            get_line_color: Rc::new(|_| [0, 0, 0, 255]),
            get_line_width: Rc::new(|_| 1.0),
            filled: true,
            stroked: false,
            line_width_min_pixels: 0.0,
        }
    }

    pub fn get_fill_color(mut self, f: impl Fn(&T) -> Color + 'static) -> Self {
        self.get_fill_color = Rc::new(f);
        self
    }

    pub fn get_line_color(mut self, f: impl Fn(&T) -> Color + 'static) -> Self {
        self.get_line_color = Rc::new(f);
        self
    }

    /// Outline width in pixels.
    pub fn get_line_width(mut self, f: impl Fn(&T) -> f64 + 'static) -> Self {
        self.get_line_width = Rc::new(f);
        self
    }

    pub fn filled(mut self, v: bool) -> Self { self.filled = v; self }
    pub fn stroked(mut self, v: bool) -> Self { self.stroked = v; self }
    pub fn line_width_min_pixels(mut self, v: f64) -> Self { self.line_width_min_pixels = v; self }

    fn attributes(&self) -> (Attributes, Attributes) {
        let mut fill = Attributes::default();
        let mut outline = Attributes::default();
        for (i, d) in self.data.iter().enumerate() {
            let rings: Vec<Vec<[f64; 3]>> = (self.get_polygon)(d)
                .into_iter()
                .map(|ring| open_ring(ring).into_iter().map(|p| to_world(p, 0.0)).collect())
                .collect();

            let color = (self.get_fill_color)(d);
            for vertex in triangulate(&rings) {
                fill.push(vertex, color, 1.0, i);
            }

            let (line_color, line_width) = ((self.get_line_color)(d), (self.get_line_width)(d) as f32);
            for ring in &rings {
                for k in 0..ring.len() {
                    outline.push(ring[k], line_color, line_width, i);
                    outline.push(ring[(k + 1) % ring.len()], line_color, line_width, i);
                }
            }
        }
        (fill, outline)
    }
}

/// Drops a closing point equal to the first.
fn open_ring(mut ring: Vec<[f64; 2]>) -> Vec<[f64; 2]> {
    if ring.len() >= 2 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// Triangle vertices, three per triangle. Degenerate input yields nothing.
fn triangulate(rings: &[Vec<[f64; 3]>]) -> Vec<[f64; 3]> {
    let mut coords = Vec::new();
    let mut holes = Vec::new();
    let mut vertices = Vec::new();
    for (r, ring) in rings.iter().enumerate() {
        if ring.len() < 3 {
            continue;
        }
        if r > 0 {
            holes.push(vertices.len());
        }
        for p in ring {
            coords.extend_from_slice(&[p[0], p[1]]);
            vertices.push(*p);
        }
    }
    if vertices.len() < 3 {
        return Vec::new();
    }
    match earcut(&coords, &holes, 2) {
        Ok(indices) => indices.into_iter().filter_map(|i| vertices.get(i).copied()).collect(),
        Err(err) => {
            log::warn!("polygon triangulation failed: {err:?}");
            Vec::new()
        }
    }
}

impl<T: Clone + 'static> Layer for PolygonLayer<T> {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn layer_name(&self) -> &'static str {
        "PolygonLayer"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn initialize_state(&self, ctx: &mut LayerContext<'_>) -> anyhow::Result<LayerState> {
        let mut state = LayerState::empty();
        let fill = Primitive::allocate(ctx, &mut state, &TRIANGLES)?;
        let outline = Primitive::allocate(ctx, &mut state, &LINES)?;
        state.set_kind(PolygonState { fill, outline });
        Ok(state)
    }

    fn update_state(
        &self,
        params: &UpdateParams<'_>,
        state: &mut LayerState,
        ctx: &mut LayerContext<'_>,
    ) -> anyhow::Result<()> {
        let flags = params.change_flags;
        if flags.data_changed.is_none() && flags.update_triggers_changed.is_none() {
            return Ok(());
        }
        let (fill, outline) = self.attributes();
        state.object_count = self.data.len();
        if let Some(kind) = state.kind_mut::<PolygonState>() {
            kind.fill.upload(&mut *ctx.gl, &fill)?;
            kind.outline.upload(&mut *ctx.gl, &outline)?;
            log::trace!(
                "{}: {} fill vertices, {} outline vertices",
                self.id(),
                kind.fill.vertex_count(),
                kind.outline.vertex_count()
            );
        }
        Ok(())
    }

    fn diff_props(&self, old: &dyn Layer) -> ChangeFlags {
        let (mut diff, old) = PropDiff::new(old, |l: &Self| &l.data, &self.data);
        if let Some(old) = old {
            diff.prop("filled", old.filled != self.filled)
                .prop("stroked", old.stroked != self.stroked)
                .prop("line_width_min_pixels", old.line_width_min_pixels != self.line_width_min_pixels);
        }
        diff.finish()
    }

    fn draw(&self, state: &LayerState, opts: &DrawOptions<'_>, gl: &mut dyn GlContext) -> anyhow::Result<()> {
        let Some(kind) = state.kind::<PolygonState>() else {
            return Ok(());
        };
        let mut uniforms = opts.uniforms(self.props());
        if self.filled {
            kind.fill.draw(gl, &uniforms)?;
        }
        if self.stroked {
            uniforms.size_min_pixels = self.line_width_min_pixels * opts.module.device_pixel_ratio;
            kind.outline.draw(gl, &uniforms)?;
        }
        Ok(())
    }

    fn picked_object(&self, _state: &LayerState, index: i64) -> Option<Rc<dyn Any>> {
        let datum = self.data.get(usize::try_from(index).ok()?)?;
        Some(Rc::new(datum.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use geodeck_engine::layer::LayerRef;

    fn square(half: f64) -> Vec<[f64; 2]> {
        vec![[-half, -half], [half, -half], [half, half], [-half, half], [-half, -half]]
    }

    fn layer(data: Data<Polygon>) -> PolygonLayer<Polygon> {
        PolygonLayer::new(LayerProps::new("zones").pickable(true), data, |p: &Polygon| p.clone())
            .get_fill_color(|_| [0, 0, 255, 255])
            .get_line_color(|_| [255, 255, 0, 255])
    }

    #[test]
    fn closing_point_is_dropped() {
        assert_eq!(open_ring(square(1.0)).len(), 4);
        assert_eq!(open_ring(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]).len(), 3);
    }

    #[test]
    fn square_is_two_triangles_and_a_hole_adds_more() {
        let ring = |half| open_ring(square(half)).into_iter().map(|p| to_world(p, 0.0)).collect::<Vec<_>>();
        assert_eq!(triangulate(&[ring(1.0)]).len(), 6);
        assert_eq!(triangulate(&[ring(1.0), ring(0.5)]).len(), 8 * 3);
        assert!(triangulate(&[vec![[0.0; 3]; 2]]).is_empty());
    }

    #[test]
    fn hole_is_not_filled() {
        let mut h = Harness::new([0.0, 0.0], 10.0);
        let data = Rc::new(vec![vec![square(0.015), square(0.005)]]);
        h.set(vec![Rc::new(layer(data)) as LayerRef]);
        h.draw();
        assert_eq!(h.pixel(32, 32)[3], 0);
        assert_eq!(h.pixel(20, 20), [0, 0, 255, 255]);
        assert_eq!(h.pick(20.0, 20.0).map(|info| info.index), Some(0));
        assert!(h.pick(32.0, 32.0).is_none());
    }

    #[test]
    fn outline_only_when_stroked() {
        let data: Data<Polygon> = Rc::new(vec![vec![square(0.01)]]);
        let mut h = Harness::new([0.0, 0.0], 10.0);
        h.set(vec![Rc::new(layer(data.clone()).filled(false).stroked(true).get_line_width(|_| 3.0)) as LayerRef]);
        h.draw();
        // Edge at lng 0.01 ≈ 14.6 px right of the center.
        assert_eq!(h.pixel(46, 32), [255, 255, 0, 255]);
        assert_eq!(h.pixel(32, 32)[3], 0);
    }
}
