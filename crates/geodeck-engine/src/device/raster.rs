//! Scanline-free rasterization helpers for the software device.
//!
//! Every primitive walks the pixels of its bounding box clipped to the active
//! rectangle and tests pixel centers. Good enough for overlays of a few
//! hundred thousand pixels and exact enough for picking tests.

use glam::{DVec2, DVec4};

use crate::coords::DeviceRect;

use super::params::{BlendEquation, BlendFactor, BlendFunc};

/// RGBA8 pixel storage, row 0 at the bottom.
#[derive(Debug, Clone)]
pub(super) struct Surface {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 4]>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0; 4]; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn bounds(&self) -> DeviceRect {
        DeviceRect::from_size(self.width, self.height)
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn fill(&mut self, rect: DeviceRect, color: [u8; 4]) {
        let rect = rect.intersect(self.bounds());
        for y in rect.y..rect.y + rect.height {
            let start = self.index(rect.x, y);
            self.pixels[start..start + rect.width as usize].fill(color);
        }
    }

    pub fn read(&self, rect: DeviceRect) -> Vec<[u8; 4]> {
        let mut out = Vec::with_capacity(rect.area());
        for y in rect.y..rect.y + rect.height {
            let start = self.index(rect.x, y);
            out.extend_from_slice(&self.pixels[start..start + rect.width as usize]);
        }
        out
    }
}

#[derive(Debug, Copy, Clone)]
pub(super) struct Blend {
    pub func: BlendFunc,
    pub equation: BlendEquation,
    pub constant: [f32; 4],
}

/// Pixel writer bound to one surface and one clip rectangle.
pub(super) struct Raster<'a> {
    pub surface: &'a mut Surface,
    /// Viewport ∩ scissor ∩ surface bounds.
    pub clip: DeviceRect,
    pub viewport: DeviceRect,
    pub blend: Option<Blend>,
}

impl Raster<'_> {
    /// Clip-space position → window coordinates. `None` behind the camera.
    pub fn to_window(&self, clip: DVec4) -> Option<DVec2> {
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        let vp = self.viewport;
        Some(DVec2::new(
            vp.x as f64 + (ndc.x + 1.0) * 0.5 * vp.width as f64,
            vp.y as f64 + (ndc.y + 1.0) * 0.5 * vp.height as f64,
        ))
    }

    fn plot(&mut self, x: i32, y: i32, src: [f32; 4]) {
        if !self.clip.contains(x, y) {
            return;
        }
        let i = self.surface.index(x, y);
        let dst = self.surface.pixels[i];
        let out = match self.blend {
            None => src,
            Some(blend) => blend_pixel(&blend, src, unorm(dst)),
        };
        self.surface.pixels[i] = to_u8(out);
    }

    /// Pixel range of a bounding box, clipped.
    fn span(&self, min: DVec2, max: DVec2) -> Option<(i32, i32, i32, i32)> {
        let c = self.clip;
        let x0 = (min.x.floor() as i32).max(c.x);
        let y0 = (min.y.floor() as i32).max(c.y);
        let x1 = (max.x.ceil() as i32).min(c.x + c.width - 1);
        let y1 = (max.y.ceil() as i32).min(c.y + c.height - 1);
        (x0 <= x1 && y0 <= y1).then_some((x0, y0, x1, y1))
    }

    pub fn disc(&mut self, center: DVec2, radius: f64, color: [f32; 4]) {
        if radius < 0.5 {
            // Sub-pixel points still cover the pixel holding their center.
            self.plot(center.x.floor() as i32, center.y.floor() as i32, color);
            return;
        }
        let r = DVec2::splat(radius);
        let Some((x0, y0, x1, y1)) = self.span(center - r, center + r) else {
            return;
        };
        let r2 = radius * radius;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = DVec2::new(x as f64 + 0.5, y as f64 + 0.5);
                if p.distance_squared(center) <= r2 {
                    self.plot(x, y, color);
                }
            }
        }
    }

    pub fn segment(&mut self, a: DVec2, b: DVec2, width: f64, colors: [[f32; 4]; 2]) {
        let half = (width * 0.5).max(0.5);
        let pad = DVec2::splat(half);
        let Some((x0, y0, x1, y1)) = self.span(a.min(b) - pad, a.max(b) + pad) else {
            return;
        };

        let ab = b - a;
        let len2 = ab.length_squared();
        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = DVec2::new(x as f64 + 0.5, y as f64 + 0.5);
                let t = if len2 == 0.0 { 0.0 } else { ((p - a).dot(ab) / len2).clamp(0.0, 1.0) };
                if p.distance(a + ab * t) <= half {
                    self.plot(x, y, lerp4(colors[0], colors[1], t as f32));
                }
            }
        }
    }

    pub fn triangle(&mut self, v: [DVec2; 3], colors: [[f32; 4]; 3]) {
        let area = edge(v[0], v[1], v[2]);
        if area == 0.0 || !area.is_finite() {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.span(v[0].min(v[1]).min(v[2]), v[0].max(v[1]).max(v[2])) else {
            return;
        };

        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = DVec2::new(x as f64 + 0.5, y as f64 + 0.5);
                let w0 = edge(v[1], v[2], p) / area;
                let w1 = edge(v[2], v[0], p) / area;
                let w2 = edge(v[0], v[1], p) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                let mut c = [0.0f32; 4];
                for (k, ch) in c.iter_mut().enumerate() {
                    *ch = colors[0][k] * w0 as f32 + colors[1][k] * w1 as f32 + colors[2][k] * w2 as f32;
                }
                self.plot(x, y, c);
            }
        }
    }
}

#[inline]
fn edge(a: DVec2, b: DVec2, p: DVec2) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

#[inline]
fn lerp4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}

#[inline]
pub(super) fn unorm(c: [u8; 4]) -> [f32; 4] {
    [
        c[0] as f32 / 255.0,
        c[1] as f32 / 255.0,
        c[2] as f32 / 255.0,
        c[3] as f32 / 255.0,
    ]
}

#[inline]
pub(super) fn to_u8(c: [f32; 4]) -> [u8; 4] {
    c.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn factor(f: BlendFactor, src: [f32; 4], dst: [f32; 4], constant: [f32; 4]) -> f32 {
    match f {
        BlendFactor::Zero => 0.0,
        BlendFactor::One => 1.0,
        BlendFactor::SrcAlpha => src[3],
        BlendFactor::OneMinusSrcAlpha => 1.0 - src[3],
        BlendFactor::DstAlpha => dst[3],
        BlendFactor::OneMinusDstAlpha => 1.0 - dst[3],
        BlendFactor::ConstantAlpha => constant[3],
        BlendFactor::OneMinusConstantAlpha => 1.0 - constant[3],
    }
}

fn equation(eq: BlendEquation, s: f32, d: f32) -> f32 {
    match eq {
        BlendEquation::Add => s + d,
        BlendEquation::Subtract => s - d,
        BlendEquation::ReverseSubtract => d - s,
        BlendEquation::Min => s.min(d),
        BlendEquation::Max => s.max(d),
    }
}

pub(super) fn blend_pixel(blend: &Blend, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
    let f = blend.func;
    let k = blend.constant;
    let s_rgb = factor(f.src_rgb, src, dst, k);
    let d_rgb = factor(f.dst_rgb, src, dst, k);
    let s_a = factor(f.src_alpha, src, dst, k);
    let d_a = factor(f.dst_alpha, src, dst, k);

    // Min/Max ignore factors, as in GL.
    let (s_rgb, d_rgb, s_a, d_a) = match blend.equation {
        BlendEquation::Min | BlendEquation::Max => (1.0, 1.0, 1.0, 1.0),
        _ => (s_rgb, d_rgb, s_a, d_a),
    };

    [
        equation(blend.equation, src[0] * s_rgb, dst[0] * d_rgb),
        equation(blend.equation, src[1] * s_rgb, dst[1] * d_rgb),
        equation(blend.equation, src[2] * s_rgb, dst[2] * d_rgb),
        equation(blend.equation, src[3] * s_a, dst[3] * d_a),
    ]
}
