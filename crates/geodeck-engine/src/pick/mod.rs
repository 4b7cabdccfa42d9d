//! Pick queries over the picking framebuffer.
//!
//! A pick draws picking colours for the candidate layers into an offscreen
//! framebuffer, reads the pixels under the query back and decodes them into
//! `(layer index, object index)` pairs. Each hit becomes a [`PickInfo`]
//! resolved through the hit layer and its composite ancestors.
//!
//! [`PickInfo`]: crate::layer::PickInfo

mod pixels;
mod query;

pub use pixels::{closest_picked_pixel, PickedPixel};
pub use query::{pick_object, pick_objects, PickMode, PickObjectParams, PickObjectsParams};
