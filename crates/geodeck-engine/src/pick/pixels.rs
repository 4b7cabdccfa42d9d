use crate::coords::DeviceRect;
use crate::layer::decode_picking_color;

/// A decoded picking-buffer pixel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PickedPixel {
    pub color: [u8; 4],
    /// Position in the drawn layer list.
    pub layer_index: usize,
    pub object_index: i64,
    /// Device pixel, bottom-left origin.
    pub x: i32,
    pub y: i32,
}

impl PickedPixel {
    /// Decodes one pixel; `None` where nothing was drawn.
    pub fn decode(color: [u8; 4], x: i32, y: i32) -> Option<Self> {
        if color[3] == 0 {
            return None;
        }
        Some(Self {
            color,
            layer_index: color[3] as usize - 1,
            object_index: decode_picking_color([color[0], color[1], color[2]]),
            x,
            y,
        })
    }

    pub fn rgb(&self) -> [u8; 3] {
        [self.color[0], self.color[1], self.color[2]]
    }
}

/// Covered pixel of `pixels` (read from `rect`, rows bottom-up) closest to
/// `(center_x, center_y)` within `radius` device pixels. Later pixels win
/// ties.
pub fn closest_picked_pixel(
    pixels: &[[u8; 4]],
    rect: DeviceRect,
    center_x: i32,
    center_y: i32,
    radius: i32,
) -> Option<PickedPixel> {
    let width = rect.width.max(0) as usize;
    if width == 0 {
        return None;
    }
    let mut best: Option<PickedPixel> = None;
    let mut min_d2 = radius as i64 * radius as i64;

    for (i, color) in pixels.iter().enumerate() {
        let x = rect.x + (i % width) as i32;
        let y = rect.y + (i / width) as i32;
        let Some(pixel) = PickedPixel::decode(*color, x, y) else {
            continue;
        };
        let dx = (x - center_x) as i64;
        let dy = (y - center_y) as i64;
        let d2 = dx * dx + dy * dy;
        if d2 <= min_d2 {
            min_d2 = d2;
            best = Some(pixel);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_has_no_hit() {
        let pixels = vec![[0u8; 4]; 9];
        assert_eq!(closest_picked_pixel(&pixels, DeviceRect::new(0, 0, 3, 3), 1, 1, 1), None);
    }

    #[test]
    fn nearest_covered_pixel_wins() {
        // 3x3 around (11, 21): far corner hits layer 0, the pixel right of
        // center hits layer 1.
        let mut pixels = vec![[0u8; 4]; 9];
        pixels[0] = [1, 0, 0, 1];
        pixels[5] = [3, 0, 0, 2];
        let hit = closest_picked_pixel(&pixels, DeviceRect::new(10, 20, 3, 3), 11, 21, 1).unwrap();
        assert_eq!(hit.layer_index, 1);
        assert_eq!(hit.object_index, 2);
        assert_eq!((hit.x, hit.y), (12, 21));
    }

    #[test]
    fn radius_limits_the_search() {
        let mut pixels = vec![[0u8; 4]; 9];
        pixels[0] = [1, 0, 0, 1];
        // Corner is at distance² 2 > radius² 1.
        assert_eq!(closest_picked_pixel(&pixels, DeviceRect::new(0, 0, 3, 3), 1, 1, 1), None);
        assert!(closest_picked_pixel(&pixels, DeviceRect::new(0, 0, 3, 3), 1, 1, 2).is_some());
    }
}
