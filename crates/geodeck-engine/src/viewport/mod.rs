//! Web-mercator viewports.
//!
//! A [`Viewport`] is an immutable camera snapshot plus everything derived from
//! it: view/projection matrices, pixel (un)projection matrices and distance
//! scales. Any camera change produces a new value.
//!
//! World space is web-mercator with 512-pixel tiles at zoom 0 (`TILE_SIZE`),
//! +Y growing south. Screen space is CSS pixels relative to the viewport's own
//! top-left corner.

mod error;
mod fit_bounds;
mod mercator;
mod viewport;

pub use error::ViewportError;
pub use fit_bounds::{fit_bounds, FitBounds, FitBoundsOptions};
pub use mercator::{
    distance_scales, lng_lat_to_world, world_to_lng_lat, DistanceScales, EARTH_CIRCUMFERENCE,
    MAX_LATITUDE, TILE_SIZE,
};
pub use viewport::{Viewport, ViewportOptions};
