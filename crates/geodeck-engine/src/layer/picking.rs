use std::any::Any;
use std::fmt;
use std::rc::Rc;

use glam::DVec2;

/// Picking colour of object `index`: `index + 1` little-endian in r, g, b.
/// Black is reserved for "nothing".
#[inline]
pub fn encode_picking_color(index: usize) -> [u8; 3] {
    let v = index + 1;
    [(v & 0xff) as u8, ((v >> 8) & 0xff) as u8, ((v >> 16) & 0xff) as u8]
}

/// Inverse of [`encode_picking_color`]; `-1` for black.
#[inline]
pub fn decode_picking_color(color: [u8; 3]) -> i64 {
    color[0] as i64 + ((color[1] as i64) << 8) + ((color[2] as i64) << 16) - 1
}

/// Result of a pick query for one layer.
#[derive(Clone, Default)]
pub struct PickInfo {
    /// Top-most layer the pick resolved to (composite ancestors replace the
    /// drawing sublayer).
    pub layer_id: Option<String>,
    /// Object index, `-1` when nothing was picked.
    pub index: i64,
    pub picked: bool,
    /// Query position, CSS pixels in canvas space.
    pub x: f64,
    pub y: f64,
    /// `[lng, lat]` under the query position.
    pub coordinate: Option<DVec2>,
    pub color: Option<[u8; 4]>,
    pub object: Option<Rc<dyn Any>>,
    pub viewport_id: Option<String>,
}

impl PickInfo {
    /// Info for a position with nothing under it.
    pub fn empty(x: f64, y: f64) -> Self {
        Self {
            index: -1,
            x,
            y,
            ..Self::default()
        }
    }

    pub fn object_as<T: Any>(&self) -> Option<&T> {
        self.object.as_deref().and_then(|o| o.downcast_ref())
    }
}

impl fmt::Debug for PickInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PickInfo")
            .field("layer_id", &self.layer_id)
            .field("index", &self.index)
            .field("picked", &self.picked)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("coordinate", &self.coordinate)
            .field("color", &self.color)
            .field("object", &self.object.as_ref().map(|_| ".."))
            .field("viewport_id", &self.viewport_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picking_color_round_trip() {
        for index in [0usize, 1, 254, 255, 256, 65_535, 1_000_000] {
            let c = encode_picking_color(index);
            assert_ne!(c, [0, 0, 0]);
            assert_eq!(decode_picking_color(c), index as i64);
        }
    }

    #[test]
    fn black_decodes_to_nothing() {
        assert_eq!(decode_picking_color([0, 0, 0]), -1);
    }
}
