use std::f64::consts::{FRAC_PI_4, PI};

use glam::{DVec2, DVec3};

/// World size in pixels at zoom 0.
pub const TILE_SIZE: f64 = 512.0;

/// Meters, as used by the distance scales.
pub const EARTH_CIRCUMFERENCE: f64 = 40.03e6;

/// Latitude beyond which web-mercator diverges.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_6;

/// Projects `[lng, lat]` (degrees) to world pixels at `scale` (= 2^zoom).
#[inline]
pub fn lng_lat_to_world(lng_lat: DVec2, scale: f64) -> DVec2 {
    let world = TILE_SIZE * scale;
    let lambda = lng_lat.x.to_radians();
    let phi = lng_lat.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();

    DVec2::new(
        world * (lambda + PI) / (2.0 * PI),
        world * (PI - (FRAC_PI_4 + phi * 0.5).tan().ln()) / (2.0 * PI),
    )
}

/// Inverse of [`lng_lat_to_world`].
#[inline]
pub fn world_to_lng_lat(xy: DVec2, scale: f64) -> DVec2 {
    let world = TILE_SIZE * scale;
    let lambda = xy.x / world * (2.0 * PI) - PI;
    let phi = 2.0 * ((PI - xy.y / world * (2.0 * PI)).exp().atan() - FRAC_PI_4);

    DVec2::new(lambda.to_degrees(), phi.to_degrees())
}

/// Linear conversion factors valid around one latitude.
///
/// Components are `[x, y, z]`; z is the altitude axis (meters ↔ pixels).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DistanceScales {
    pub pixels_per_meter: DVec3,
    pub meters_per_pixel: DVec3,
    pub pixels_per_degree: DVec3,
    pub degrees_per_pixel: DVec3,
}

/// Distance scales at `latitude` for a world of `TILE_SIZE * scale` pixels.
pub fn distance_scales(latitude: f64, scale: f64) -> DistanceScales {
    let world = TILE_SIZE * scale;
    let lat_cosine = latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians().cos();

    let pixels_per_degree_x = world / 360.0;
    let pixels_per_degree_y = pixels_per_degree_x / lat_cosine;
    let alt_pixels_per_meter = world / EARTH_CIRCUMFERENCE / lat_cosine;

    DistanceScales {
        pixels_per_meter: DVec3::splat(alt_pixels_per_meter),
        meters_per_pixel: DVec3::splat(1.0 / alt_pixels_per_meter),
        pixels_per_degree: DVec3::new(pixels_per_degree_x, pixels_per_degree_y, alt_pixels_per_meter),
        degrees_per_pixel: DVec3::new(
            1.0 / pixels_per_degree_x,
            1.0 / pixels_per_degree_y,
            1.0 / alt_pixels_per_meter,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() <= eps
    }

    // ── world projection ────────────────────────────────────────────────

    #[test]
    fn origin_maps_to_world_center() {
        let p = lng_lat_to_world(DVec2::ZERO, 1.0);
        assert!(close(p.x, 256.0, 1e-9));
        assert!(close(p.y, 256.0, 1e-9));
    }

    #[test]
    fn north_is_smaller_y() {
        let north = lng_lat_to_world(DVec2::new(0.0, 45.0), 1.0);
        let south = lng_lat_to_world(DVec2::new(0.0, -45.0), 1.0);
        assert!(north.y < south.y);
    }

    #[test]
    fn world_round_trip() {
        let p = DVec2::new(-122.42, 37.78);
        let back = world_to_lng_lat(lng_lat_to_world(p, 4096.0), 4096.0);
        assert!(close(back.x, p.x, 1e-9));
        assert!(close(back.y, p.y, 1e-9));
    }

    #[test]
    fn poles_are_clamped() {
        let p = lng_lat_to_world(DVec2::new(0.0, 90.0), 1.0);
        assert!(p.y.is_finite());
        assert!(close(p.y, 0.0, 1e-6));
    }

    // ── distance scales ─────────────────────────────────────────────────

    #[test]
    fn scales_are_reciprocal() {
        let s = distance_scales(52.0, 1024.0);
        assert!(close(s.pixels_per_meter.x * s.meters_per_pixel.x, 1.0, 1e-12));
        assert!(close(s.pixels_per_degree.y * s.degrees_per_pixel.y, 1.0, 1e-12));
    }

    #[test]
    fn pixels_per_meter_grows_with_latitude() {
        let equator = distance_scales(0.0, 1.0);
        let north = distance_scales(60.0, 1.0);
        assert!(close(north.pixels_per_meter.x, equator.pixels_per_meter.x * 2.0, 1e-12));
    }
}
