use std::f64::consts::FRAC_PI_2;

use glam::{DMat4, DVec2, DVec3, DVec4};

use super::error::{finite, ViewportError};
use super::mercator::{distance_scales, lng_lat_to_world, world_to_lng_lat, DistanceScales};
use crate::coords::Point;

const MIN_ALTITUDE: f64 = 0.75;

/// Camera parameters for [`Viewport::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportOptions {
    pub id: String,
    /// Offset of the viewport inside the canvas, CSS pixels.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
    /// Degrees from nadir.
    pub pitch: f64,
    /// Degrees clockwise from north.
    pub bearing: f64,
    /// Camera height in units of viewport height. Clamped to at least 0.75.
    pub altitude: f64,
    pub near_z_multiplier: f64,
    pub far_z_multiplier: f64,
    pub orthographic: bool,
}

impl Default for ViewportOptions {
    fn default() -> Self {
        Self {
            id: "viewport".to_string(),
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
            latitude: 0.0,
            longitude: 0.0,
            zoom: 11.0,
            pitch: 0.0,
            bearing: 0.0,
            altitude: 1.5,
            near_z_multiplier: 0.1,
            far_z_multiplier: 10.0,
            orthographic: false,
        }
    }
}

/// Immutable web-mercator camera.
///
/// Coordinates passed to [`project`](Self::project) are `[lng, lat]` degrees;
/// screen results are CSS pixels relative to the viewport's top-left corner.
#[derive(Debug, Clone)]
pub struct Viewport {
    id: String,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    latitude: f64,
    longitude: f64,
    zoom: f64,
    pitch: f64,
    bearing: f64,
    altitude: f64,
    near_z_multiplier: f64,
    far_z_multiplier: f64,
    orthographic: bool,

    scale: f64,
    center: DVec3,
    distance_scales: DistanceScales,
    view_matrix: DMat4,
    projection_matrix: DMat4,
    view_projection_matrix: DMat4,
    pixel_projection_matrix: DMat4,
    pixel_unprojection_matrix: DMat4,
}

impl Viewport {
    /// Builds a viewport. Width and height below 1 become 1; altitude below
    /// 0.75 becomes 0.75. Any non-finite parameter is an error.
    pub fn new(opts: ViewportOptions) -> Result<Self, ViewportError> {
        let x = finite("x", opts.x)?;
        let y = finite("y", opts.y)?;
        let width = finite("width", opts.width)?.max(1.0);
        let height = finite("height", opts.height)?.max(1.0);
        let latitude = finite("latitude", opts.latitude)?;
        let longitude = finite("longitude", opts.longitude)?;
        let zoom = finite("zoom", opts.zoom)?;
        let pitch = finite("pitch", opts.pitch)?;
        let bearing = finite("bearing", opts.bearing)?;
        let altitude = finite("altitude", opts.altitude)?.max(MIN_ALTITUDE);
        let near_z_multiplier = finite("near_z_multiplier", opts.near_z_multiplier)?;
        let far_z_multiplier = finite("far_z_multiplier", opts.far_z_multiplier)?;

        let scale = zoom.exp2();
        let center = lng_lat_to_world(DVec2::new(longitude, latitude), scale).extend(0.0);
        let distance_scales = distance_scales(latitude, scale);

        let view_matrix = view_matrix(height, pitch, bearing, altitude) * DMat4::from_translation(-center);
        let projection_matrix = projection_matrix(
            width,
            height,
            pitch,
            altitude,
            near_z_multiplier,
            far_z_multiplier,
            opts.orthographic,
        );
        let view_projection_matrix = projection_matrix * view_matrix;

        // NDC -> CSS pixels, y down.
        let viewport_matrix = DMat4::from_scale(DVec3::new(width / 2.0, -height / 2.0, 1.0))
            * DMat4::from_translation(DVec3::new(1.0, -1.0, 0.0));
        let pixel_projection_matrix = viewport_matrix * view_projection_matrix;

        let det = pixel_projection_matrix.determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(ViewportError::Singular);
        }
        let pixel_unprojection_matrix = pixel_projection_matrix.inverse();

        Ok(Self {
            id: opts.id,
            x,
            y,
            width,
            height,
            latitude,
            longitude,
            zoom,
            pitch,
            bearing,
            altitude,
            near_z_multiplier,
            far_z_multiplier,
            orthographic: opts.orthographic,
            scale,
            center,
            distance_scales,
            view_matrix,
            projection_matrix,
            view_projection_matrix,
            pixel_projection_matrix,
            pixel_unprojection_matrix,
        })
    }

    /// Placeholder the render context starts with before any view is active.
    pub fn default_initial() -> Self {
        Self::new(ViewportOptions {
            id: "DEFAULT-INITIAL-VIEWPORT".to_string(),
            ..ViewportOptions::default()
        })
        .unwrap_or_else(|_| unreachable!("default viewport options are finite"))
    }

    /// Options reproducing this viewport. Useful to derive a modified camera.
    pub fn options(&self) -> ViewportOptions {
        ViewportOptions {
            id: self.id.clone(),
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            latitude: self.latitude,
            longitude: self.longitude,
            zoom: self.zoom,
            pitch: self.pitch,
            bearing: self.bearing,
            altitude: self.altitude,
            near_z_multiplier: self.near_z_multiplier,
            far_z_multiplier: self.far_z_multiplier,
            orthographic: self.orthographic,
        }
    }

    // ── accessors ───────────────────────────────────────────────────────

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }
    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }
    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }
    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }
    #[inline]
    pub fn height(&self) -> f64 {
        self.height
    }
    #[inline]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }
    #[inline]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
    #[inline]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }
    #[inline]
    pub fn pitch(&self) -> f64 {
        self.pitch
    }
    #[inline]
    pub fn bearing(&self) -> f64 {
        self.bearing
    }
    #[inline]
    pub fn altitude(&self) -> f64 {
        self.altitude
    }
    #[inline]
    pub fn is_orthographic(&self) -> bool {
        self.orthographic
    }
    /// `2^zoom`.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }
    #[inline]
    pub fn distance_scales(&self) -> &DistanceScales {
        &self.distance_scales
    }
    #[inline]
    pub fn view_matrix(&self) -> DMat4 {
        self.view_matrix
    }
    #[inline]
    pub fn projection_matrix(&self) -> DMat4 {
        self.projection_matrix
    }
    #[inline]
    pub fn view_projection_matrix(&self) -> DMat4 {
        self.view_projection_matrix
    }
    #[inline]
    pub fn pixel_projection_matrix(&self) -> DMat4 {
        self.pixel_projection_matrix
    }

    /// Matrix taking zoom-independent mercator coordinates (`lng_lat_to_world`
    /// at scale 1, z in meters) to clip space.
    pub fn common_to_clip(&self) -> DMat4 {
        self.view_projection_matrix
            * DMat4::from_scale(DVec3::new(
                self.scale,
                self.scale,
                self.distance_scales.pixels_per_meter.z,
            ))
    }

    /// Whether a canvas-space point falls inside this viewport.
    #[inline]
    pub fn contains_pixel(&self, p: Point) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.x + self.width && p.y < self.y + self.height
    }

    /// Compares every camera parameter. The id is not part of the camera.
    pub fn equals(&self, other: &Viewport) -> bool {
        std::ptr::eq(self, other)
            || (self.x == other.x
                && self.y == other.y
                && self.width == other.width
                && self.height == other.height
                && self.latitude == other.latitude
                && self.longitude == other.longitude
                && self.zoom == other.zoom
                && self.pitch == other.pitch
                && self.bearing == other.bearing
                && self.altitude == other.altitude
                && self.near_z_multiplier == other.near_z_multiplier
                && self.far_z_multiplier == other.far_z_multiplier
                && self.orthographic == other.orthographic)
    }

    // ── projection ──────────────────────────────────────────────────────

    /// `[lng, lat]` → world pixels at this viewport's scale.
    #[inline]
    pub fn project_flat(&self, lng_lat: DVec2) -> DVec2 {
        lng_lat_to_world(lng_lat, self.scale)
    }

    #[inline]
    pub fn unproject_flat(&self, xy: DVec2) -> DVec2 {
        world_to_lng_lat(xy, self.scale)
    }

    /// `[lng, lat]` → screen pixels (top-left origin).
    pub fn project(&self, lng_lat: DVec2) -> DVec2 {
        self.project_position(lng_lat.extend(0.0)).truncate()
    }

    /// `[lng, lat, meters]` → `[x, y, depth]` in screen pixels.
    pub fn project_position(&self, position: DVec3) -> DVec3 {
        let world = self.project_flat(position.truncate());
        let z = position.z * self.distance_scales.pixels_per_meter.z;
        transform(self.pixel_projection_matrix, world.extend(z))
    }

    /// Screen pixels → `[lng, lat]` on the ground plane.
    pub fn unproject(&self, pixel: DVec2) -> DVec2 {
        self.unproject_flat(self.pixels_to_world(pixel, 0.0))
    }

    /// Screen pixels → `[lng, lat]` on the plane `z = target_meters`.
    pub fn unproject_at(&self, pixel: DVec2, target_meters: f64) -> DVec2 {
        let target = target_meters * self.distance_scales.pixels_per_meter.z;
        self.unproject_flat(self.pixels_to_world(pixel, target))
    }

    /// Casts the pixel's ray and intersects it with the plane `z = target_z`
    /// (world pixels).
    fn pixels_to_world(&self, pixel: DVec2, target_z: f64) -> DVec2 {
        let near = transform(self.pixel_unprojection_matrix, DVec3::new(pixel.x, pixel.y, 0.0));
        let far = transform(self.pixel_unprojection_matrix, DVec3::new(pixel.x, pixel.y, 1.0));

        let t = if near.z == far.z { 0.0 } else { (target_z - near.z) / (far.z - near.z) };
        near.truncate().lerp(far.truncate(), t)
    }

    // ── distances ───────────────────────────────────────────────────────

    /// Meters → `[dlng, dlat]` degrees using the scales at the viewport center.
    pub fn meters_to_lng_lat_delta(&self, meters: DVec2) -> Result<DVec2, ViewportError> {
        finite("dx", meters.x)?;
        finite("dy", meters.y)?;
        let s = &self.distance_scales;
        Ok(DVec2::new(
            meters.x * s.pixels_per_meter.x * s.degrees_per_pixel.x,
            meters.y * s.pixels_per_meter.y * s.degrees_per_pixel.y,
        ))
    }

    /// `[dlng, dlat]` degrees → meters using the scales at the viewport center.
    pub fn lng_lat_delta_to_meters(&self, delta: DVec2) -> Result<DVec2, ViewportError> {
        finite("dlng", delta.x)?;
        finite("dlat", delta.y)?;
        let s = &self.distance_scales;
        Ok(DVec2::new(
            delta.x * s.pixels_per_degree.x * s.meters_per_pixel.x,
            delta.y * s.pixels_per_degree.y * s.meters_per_pixel.y,
        ))
    }

    /// Offsets a position by meters using the scales at the position's own
    /// latitude.
    pub fn add_meters_to_lng_lat(&self, lng_lat: DVec2, meters: DVec2) -> Result<DVec2, ViewportError> {
        finite("lng", lng_lat.x)?;
        finite("lat", lng_lat.y)?;
        finite("dx", meters.x)?;
        finite("dy", meters.y)?;

        let s = distance_scales(lng_lat.y, self.scale);
        Ok(DVec2::new(
            lng_lat.x + meters.x * s.pixels_per_meter.x * s.degrees_per_pixel.x,
            lng_lat.y + meters.y * s.pixels_per_meter.y * s.degrees_per_pixel.y,
        ))
    }

    /// Map center that places `lng_lat` under screen pixel `pixel`.
    pub fn map_center_by_lng_lat_position(&self, lng_lat: DVec2, pixel: DVec2) -> DVec2 {
        let from = self.pixels_to_world(pixel, 0.0);
        let to = self.project_flat(lng_lat);
        let center = self.center.truncate() + (to - from);
        self.unproject_flat(center)
    }
}

/// `M · [v, 1]` with perspective divide.
#[inline]
fn transform(m: DMat4, v: DVec3) -> DVec3 {
    let r: DVec4 = m * v.extend(1.0);
    if r.w == 0.0 {
        r.truncate()
    } else {
        r.truncate() / r.w
    }
}

/// Uncentered view matrix. One unit equals the viewport height.
fn view_matrix(height: f64, pitch: f64, bearing: f64, altitude: f64) -> DMat4 {
    DMat4::from_translation(DVec3::new(0.0, 0.0, -altitude))
        * DMat4::from_scale(DVec3::splat(1.0 / height))
        * DMat4::from_rotation_x(-pitch.to_radians())
        * DMat4::from_rotation_z(bearing.to_radians())
        // World y grows south; flip so north is up in view space.
        * DMat4::from_scale(DVec3::new(1.0, -1.0, 1.0))
}

fn projection_matrix(
    width: f64,
    height: f64,
    pitch: f64,
    altitude: f64,
    near_z_multiplier: f64,
    far_z_multiplier: f64,
    orthographic: bool,
) -> DMat4 {
    let pitch = pitch.to_radians();
    let half_fov = (0.5 / altitude).atan();
    let aspect = width / height;

    // Distance to the far edge of the visible ground plane. The denominator
    // approaches zero as the view tilts toward the horizon.
    let horizon = (FRAC_PI_2 - pitch - half_fov).sin().max(0.01);
    let top_half_surface_distance = half_fov.sin() * altitude / horizon;
    let far_z = (FRAC_PI_2 - pitch).cos() * top_half_surface_distance + altitude;

    let near = near_z_multiplier;
    let far = far_z * far_z_multiplier;

    if orthographic {
        let top = altitude * half_fov.tan();
        let right = top * aspect;
        DMat4::orthographic_rh_gl(-right, right, -top, top, near, far)
    } else {
        DMat4::perspective_rh_gl(2.0 * half_fov, aspect, near, far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() <= eps
    }

    fn sf() -> ViewportOptions {
        ViewportOptions {
            width: 800.0,
            height: 600.0,
            longitude: -122.45,
            latitude: 37.78,
            zoom: 12.0,
            ..ViewportOptions::default()
        }
    }

    // ── construction ────────────────────────────────────────────────────

    #[test]
    fn zero_size_becomes_one() {
        let vp = Viewport::new(ViewportOptions {
            width: 0.0,
            height: 0.0,
            ..ViewportOptions::default()
        })
        .unwrap();
        assert_eq!(vp.width(), 1.0);
        assert_eq!(vp.height(), 1.0);
    }

    #[test]
    fn altitude_is_clamped() {
        let vp = Viewport::new(ViewportOptions { altitude: 0.1, ..sf() }).unwrap();
        assert_eq!(vp.altitude(), 0.75);
    }

    #[test]
    fn non_finite_is_hard_failure() {
        let err = Viewport::new(ViewportOptions { zoom: f64::NAN, ..sf() }).unwrap_err();
        assert!(matches!(err, ViewportError::NonFinite { name: "zoom", .. }));

        let err = Viewport::new(ViewportOptions { longitude: f64::INFINITY, ..sf() }).unwrap_err();
        assert!(matches!(err, ViewportError::NonFinite { name: "longitude", .. }));
    }

    // ── projection ──────────────────────────────────────────────────────

    #[test]
    fn center_projects_to_screen_center() {
        let vp = Viewport::new(sf()).unwrap();
        let p = vp.project(DVec2::new(-122.45, 37.78));
        assert!(close(p.x, 400.0, 1e-6), "{p:?}");
        assert!(close(p.y, 300.0, 1e-6), "{p:?}");
    }

    #[test]
    fn north_is_up_and_east_is_right() {
        let vp = Viewport::new(sf()).unwrap();
        let north = vp.project(DVec2::new(-122.45, 37.80));
        let east = vp.project(DVec2::new(-122.43, 37.78));
        assert!(north.y < 300.0);
        assert!(east.x > 400.0);
    }

    #[test]
    fn one_world_pixel_is_one_screen_pixel_without_pitch() {
        let vp = Viewport::new(sf()).unwrap();
        let center = vp.project_flat(DVec2::new(-122.45, 37.78));
        let lng_lat = vp.unproject_flat(center + DVec2::new(100.0, 0.0));
        let p = vp.project(lng_lat);
        assert!(close(p.x, 500.0, 1e-6), "{p:?}");
    }

    #[test]
    fn project_unproject_round_trip() {
        for pitch in [0.0, 30.0, 55.0] {
            for bearing in [0.0, -40.0] {
                let vp = Viewport::new(ViewportOptions { pitch, bearing, ..sf() }).unwrap();
                let lng_lat = DVec2::new(-122.44, 37.775);
                let back = vp.unproject(vp.project(lng_lat));
                assert!(close(back.x, lng_lat.x, 1e-7), "pitch {pitch}: {back:?}");
                assert!(close(back.y, lng_lat.y, 1e-7), "pitch {pitch}: {back:?}");
            }
        }
    }

    #[test]
    fn orthographic_round_trip() {
        let vp = Viewport::new(ViewportOptions { orthographic: true, ..sf() }).unwrap();
        let lng_lat = DVec2::new(-122.46, 37.79);
        let back = vp.unproject(vp.project(lng_lat));
        assert!(close(back.x, lng_lat.x, 1e-7));
        assert!(close(back.y, lng_lat.y, 1e-7));

        let c = vp.project(DVec2::new(-122.45, 37.78));
        assert!(close(c.x, 400.0, 1e-6));
    }

    #[test]
    fn elevated_point_unprojects_at_its_altitude() {
        let vp = Viewport::new(ViewportOptions { pitch: 45.0, ..sf() }).unwrap();
        let p = vp.project_position(DVec3::new(-122.44, 37.78, 500.0));
        let back = vp.unproject_at(p.truncate(), 500.0);
        assert!(close(back.x, -122.44, 1e-7));
        assert!(close(back.y, 37.78, 1e-7));
    }

    #[test]
    fn common_to_clip_matches_pixel_projection() {
        let vp = Viewport::new(ViewportOptions { pitch: 20.0, ..sf() }).unwrap();
        let lng_lat = DVec2::new(-122.43, 37.77);
        let common = lng_lat_to_world(lng_lat, 1.0);
        let clip = vp.common_to_clip() * common.extend(0.0).extend(1.0);
        let ndc = clip.truncate() / clip.w;
        let screen = DVec2::new((ndc.x + 1.0) * 400.0, (1.0 - ndc.y) * 300.0);
        let expected = vp.project(lng_lat);
        assert!(close(screen.x, expected.x, 1e-6));
        assert!(close(screen.y, expected.y, 1e-6));
    }

    // ── distances ───────────────────────────────────────────────────────

    #[test]
    fn meters_delta_round_trip() {
        let vp = Viewport::new(sf()).unwrap();
        let delta = vp.meters_to_lng_lat_delta(DVec2::new(1000.0, -250.0)).unwrap();
        let meters = vp.lng_lat_delta_to_meters(delta).unwrap();
        assert!(close(meters.x, 1000.0, 1e-6));
        assert!(close(meters.y, -250.0, 1e-6));
    }

    #[test]
    fn meters_delta_rejects_non_finite() {
        let vp = Viewport::new(sf()).unwrap();
        assert!(vp.meters_to_lng_lat_delta(DVec2::new(f64::NAN, 0.0)).is_err());
        assert!(vp.lng_lat_delta_to_meters(DVec2::new(0.0, f64::INFINITY)).is_err());
    }

    #[test]
    fn add_meters_moves_north() {
        let vp = Viewport::new(sf()).unwrap();
        let p = vp
            .add_meters_to_lng_lat(DVec2::new(-122.45, 37.78), DVec2::new(0.0, 1000.0))
            .unwrap();
        assert!(p.y > 37.78);
        assert!(close(p.x, -122.45, 1e-12));
    }

    #[test]
    fn map_center_keeps_anchor_under_pixel() {
        let vp = Viewport::new(sf()).unwrap();
        let anchor = DVec2::new(-122.40, 37.80);
        let center = vp.map_center_by_lng_lat_position(anchor, DVec2::new(100.0, 100.0));

        let moved = Viewport::new(ViewportOptions {
            longitude: center.x,
            latitude: center.y,
            ..sf()
        })
        .unwrap();
        let p = moved.project(anchor);
        assert!(close(p.x, 100.0, 1e-5), "{p:?}");
        assert!(close(p.y, 100.0, 1e-5), "{p:?}");
    }

    // ── equality ────────────────────────────────────────────────────────

    #[test]
    fn identical_parameters_are_equal() {
        let a = Viewport::new(sf()).unwrap();
        let b = Viewport::new(ViewportOptions { id: "other".into(), ..sf() }).unwrap();
        assert!(a.equals(&b));
    }

    #[test]
    fn any_parameter_change_is_unequal() {
        let a = Viewport::new(sf()).unwrap();
        let variants = [
            ViewportOptions { zoom: 12.0 + 1e-9, ..sf() },
            ViewportOptions { width: 801.0, ..sf() },
            ViewportOptions { pitch: 1.0, ..sf() },
            ViewportOptions { bearing: 1.0, ..sf() },
            ViewportOptions { latitude: 37.7801, ..sf() },
            ViewportOptions { x: 1.0, ..sf() },
            ViewportOptions { orthographic: true, ..sf() },
        ];
        for opts in variants {
            let b = Viewport::new(opts.clone()).unwrap();
            assert!(!a.equals(&b), "{opts:?}");
        }
    }
}
