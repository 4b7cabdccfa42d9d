/// Rectangle in device space (drawing-buffer pixels, bottom-left origin).
///
/// This is the unit of `viewport`, `scissor` and `read_pixels`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct DeviceRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl DeviceRect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Full rectangle of a drawing buffer.
    #[inline]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    #[inline]
    pub fn area(self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.width as usize * self.height as usize
        }
    }

    #[inline]
    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    #[inline]
    pub fn intersect(self, other: DeviceRect) -> DeviceRect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        DeviceRect::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
    }

    #[inline]
    pub fn to_array(self) -> [i32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_clamps_to_empty() {
        let a = DeviceRect::new(0, 0, 4, 4);
        let b = DeviceRect::new(10, 10, 4, 4);
        let c = a.intersect(b);
        assert!(c.is_empty());
        assert_eq!(c.area(), 0);
    }

    #[test]
    fn intersect_partial() {
        let a = DeviceRect::from_size(100, 50);
        let b = DeviceRect::new(-2, 40, 5, 20);
        assert_eq!(a.intersect(b), DeviceRect::new(0, 40, 3, 10));
    }
}
