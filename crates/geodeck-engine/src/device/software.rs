use std::collections::HashMap;

use glam::{DVec2, DVec3};

use crate::coords::DeviceRect;

use super::context::{ClearMask, GlContext};
use super::error::DeviceError;
use super::params::{FramebufferBinding, GlParameters, GlState};
use super::raster::{to_u8, unorm, Blend, Raster, Surface};
use super::resources::{
    BufferId, DrawCall, FramebufferId, ProgramDesc, ProgramId, Topology, Uniforms,
};

/// Operation counters, for diagnostics and tests.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DeviceCounters {
    pub draw_calls: u64,
    pub buffer_writes: u64,
    pub clears: u64,
    pub pixel_reads: u64,
    pub framebuffer_resizes: u64,
}

/// CPU implementation of [`GlContext`].
///
/// Holds the default framebuffer (sized `canvas × pixel_ratio`), offscreen
/// framebuffers, buffers and programs. Depth is not modelled; primitives are
/// composited in submission order.
#[derive(Debug)]
pub struct SoftwareContext {
    canvas: (f64, f64),
    pixel_ratio: f64,
    state: GlState,
    default_fb: Surface,
    framebuffers: HashMap<FramebufferId, Surface>,
    buffers: HashMap<BufferId, Vec<u8>>,
    programs: HashMap<ProgramId, ProgramDesc>,
    next_id: u32,
    counters: DeviceCounters,
}

impl SoftwareContext {
    /// A context for a canvas of `width × height` CSS pixels.
    pub fn new(width: f64, height: f64, pixel_ratio: f64) -> Self {
        let (w, h) = drawing_buffer_size(width, height, pixel_ratio);
        Self {
            canvas: (width, height),
            pixel_ratio,
            state: GlState::new(w, h),
            default_fb: Surface::new(w, h),
            framebuffers: HashMap::new(),
            buffers: HashMap::new(),
            programs: HashMap::new(),
            next_id: 1,
            counters: DeviceCounters::default(),
        }
    }

    /// Resizes the canvas. The default framebuffer is reallocated (cleared)
    /// only when its device size changes.
    pub fn resize(&mut self, width: f64, height: f64, pixel_ratio: f64) {
        self.canvas = (width, height);
        self.pixel_ratio = pixel_ratio;
        let (w, h) = drawing_buffer_size(width, height, pixel_ratio);
        if (w, h) != (self.default_fb.width, self.default_fb.height) {
            self.default_fb = Surface::new(w, h);
        }
    }

    /// Default framebuffer pixels, rows bottom to top.
    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.default_fb.pixels
    }

    /// Default framebuffer pixel at device coordinates.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        (x < self.default_fb.width && y < self.default_fb.height)
            .then(|| self.default_fb.pixels[(y * self.default_fb.width + x) as usize])
    }

    /// Default framebuffer as tightly packed RGBA bytes, rows top to bottom.
    pub fn to_rgba_top_down(&self) -> Vec<u8> {
        let w = self.default_fb.width as usize;
        let mut out = Vec::with_capacity(self.default_fb.pixels.len() * 4);
        for row in self.default_fb.pixels.chunks_exact(w.max(1)).rev() {
            out.extend_from_slice(bytemuck::cast_slice(row));
        }
        out
    }

    pub fn counters(&self) -> DeviceCounters {
        self.counters
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    fn bound_surface(&mut self, binding: FramebufferBinding) -> Result<&mut Surface, DeviceError> {
        match binding {
            FramebufferBinding::Default => Ok(&mut self.default_fb),
            FramebufferBinding::Offscreen(id) => self
                .framebuffers
                .get_mut(&id)
                .ok_or(DeviceError::UnknownFramebuffer(id)),
        }
    }

    fn attribute<T: bytemuck::Pod>(&self, id: BufferId, count: usize) -> Result<Vec<T>, DeviceError> {
        let bytes = self.buffers.get(&id).ok_or(DeviceError::UnknownBuffer(id))?;
        let size = std::mem::size_of::<T>();
        let needed = count * size;
        if bytes.len() < needed {
            return Err(DeviceError::BufferTooSmall {
                buffer: id,
                needed,
                len: bytes.len(),
            });
        }
        Ok(bytes[..needed]
            .chunks_exact(size)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }
}

fn drawing_buffer_size(width: f64, height: f64, pixel_ratio: f64) -> (u32, u32) {
    let w = (width * pixel_ratio).round().max(1.0) as u32;
    let h = (height * pixel_ratio).round().max(1.0) as u32;
    (w, h)
}

/// Fragment colour of one vertex, or `None` when the picking module discards it.
fn shade(color: [u8; 4], pick: [u8; 3], uniforms: &Uniforms) -> Option<[f32; 4]> {
    let picking = &uniforms.picking;
    if picking.active {
        if pick == [0, 0, 0] || picking.excluded.contains(&pick) {
            return None;
        }
        return Some(unorm([pick[0], pick[1], pick[2], 255]));
    }

    let base = match picking.selected_color {
        Some(selected) if selected == pick && pick != [0, 0, 0] => picking.highlight_color,
        _ => color,
    };
    let mut out = unorm(base);
    out[3] *= uniforms.opacity;
    Some(out)
}

impl GlContext for SoftwareContext {
    fn canvas_size(&self) -> (f64, f64) {
        self.canvas
    }

    fn drawing_buffer_size(&self) -> (u32, u32) {
        (self.default_fb.width, self.default_fb.height)
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn set_canvas_size(&mut self, width: f64, height: f64, pixel_ratio: f64) {
        self.resize(width, height, pixel_ratio);
    }

    fn state(&self) -> GlState {
        self.state
    }

    fn set_parameters(&mut self, params: &GlParameters) {
        self.state.apply(params);
    }

    fn clear(&mut self, mask: ClearMask) -> Result<(), DeviceError> {
        self.counters.clears += 1;
        if !mask.color {
            return Ok(());
        }
        let state = self.state;
        let color = to_u8(state.clear_color);
        let surface = self.bound_surface(state.framebuffer)?;
        let rect = if state.scissor_test {
            state.scissor.intersect(surface.bounds())
        } else {
            surface.bounds()
        };
        surface.fill(rect, color);
        Ok(())
    }

    fn create_framebuffer(&mut self, width: u32, height: u32) -> Result<FramebufferId, DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::InvalidSize { width, height });
        }
        let id = FramebufferId(self.next_id());
        self.framebuffers.insert(id, Surface::new(width, height));
        Ok(id)
    }

    fn framebuffer_size(&self, id: FramebufferId) -> Option<(u32, u32)> {
        self.framebuffers.get(&id).map(|s| (s.width, s.height))
    }

    fn resize_framebuffer(&mut self, id: FramebufferId, width: u32, height: u32) -> Result<(), DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::InvalidSize { width, height });
        }
        let surface = self
            .framebuffers
            .get_mut(&id)
            .ok_or(DeviceError::UnknownFramebuffer(id))?;
        *surface = Surface::new(width, height);
        self.counters.framebuffer_resizes += 1;
        Ok(())
    }

    fn delete_framebuffer(&mut self, id: FramebufferId) {
        if self.framebuffers.remove(&id).is_some()
            && self.state.framebuffer == FramebufferBinding::Offscreen(id)
        {
            self.state.framebuffer = FramebufferBinding::Default;
        }
    }

    fn create_buffer(&mut self, data: &[u8]) -> BufferId {
        let id = BufferId(self.next_id());
        self.buffers.insert(id, data.to_vec());
        id
    }

    fn write_buffer(&mut self, id: BufferId, data: &[u8]) -> Result<(), DeviceError> {
        let buffer = self.buffers.get_mut(&id).ok_or(DeviceError::UnknownBuffer(id))?;
        buffer.clear();
        buffer.extend_from_slice(data);
        self.counters.buffer_writes += 1;
        Ok(())
    }

    fn delete_buffer(&mut self, id: BufferId) {
        self.buffers.remove(&id);
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, DeviceError> {
        let id = ProgramId(self.next_id());
        self.programs.insert(id, *desc);
        Ok(id)
    }

    fn delete_program(&mut self, id: ProgramId) {
        self.programs.remove(&id);
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), DeviceError> {
        let topology = self
            .programs
            .get(&call.program)
            .ok_or(DeviceError::UnknownProgram(call.program))?
            .topology;

        let n = call.vertex_count;
        let positions: Vec<[f64; 3]> = self.attribute(call.positions, n)?;
        let colors: Vec<[u8; 4]> = self.attribute(call.colors, n)?;
        let picks: Vec<[u8; 3]> = match call.picking_colors {
            Some(id) => self.attribute(id, n)?,
            None => vec![[0; 3]; n],
        };
        let sizes: Vec<f32> = match call.sizes {
            Some(id) => self.attribute(id, n)?,
            None => vec![1.0; n],
        };

        self.counters.draw_calls += 1;

        let state = self.state;
        let u = call.uniforms;
        let picking = u.picking.active;
        let surface = self.bound_surface(state.framebuffer)?;
        let mut clip = state.viewport.intersect(surface.bounds());
        if state.scissor_test {
            clip = clip.intersect(state.scissor);
        }
        if clip.is_empty() {
            return Ok(());
        }

        let mut raster = Raster {
            surface,
            clip,
            viewport: state.viewport,
            blend: state.blend.then_some(Blend {
                func: state.blend_func,
                equation: state.blend_equation,
                constant: state.blend_color,
            }),
        };

        let window = |raster: &Raster<'_>, i: usize| -> Option<DVec2> {
            raster.to_window(u.project * DVec3::from_array(positions[i]).extend(1.0))
        };
        let size_px = |i: usize| (sizes[i] as f64 * u.size_scale).clamp(u.size_min_pixels, u.size_max_pixels);

        match topology {
            Topology::Points => {
                for i in 0..n {
                    let (Some(p), Some(c)) = (window(&raster, i), shade(colors[i], picks[i], u)) else {
                        continue;
                    };
                    raster.disc(p, size_px(i), c);
                }
            }
            Topology::Lines => {
                for i in (0..n.saturating_sub(1)).step_by(2) {
                    let (Some(a), Some(b)) = (window(&raster, i), window(&raster, i + 1)) else {
                        continue;
                    };
                    let (Some(ca), Some(cb)) = (shade(colors[i], picks[i], u), shade(colors[i + 1], picks[i], u)) else {
                        continue;
                    };
                    // Picking output is flat per primitive.
                    let cb = if picking { ca } else { cb };
                    raster.segment(a, b, size_px(i), [ca, cb]);
                }
            }
            Topology::Triangles => {
                for i in (0..n - n % 3).step_by(3) {
                    let (Some(a), Some(b), Some(c)) = (window(&raster, i), window(&raster, i + 1), window(&raster, i + 2)) else {
                        continue;
                    };
                    let Some(c0) = shade(colors[i], picks[i], u) else {
                        continue;
                    };
                    let colors = if picking {
                        [c0; 3]
                    } else {
                        [
                            c0,
                            shade(colors[i + 1], picks[i], u).unwrap_or(c0),
                            shade(colors[i + 2], picks[i], u).unwrap_or(c0),
                        ]
                    };
                    raster.triangle([a, b, c], colors);
                }
            }
        }

        Ok(())
    }

    fn read_pixels(&mut self, framebuffer: FramebufferBinding, rect: DeviceRect) -> Result<Vec<[u8; 4]>, DeviceError> {
        self.counters.pixel_reads += 1;
        let surface = self.bound_surface(framebuffer)?;
        if rect.is_empty() || rect.intersect(surface.bounds()) != rect {
            return Err(DeviceError::OutOfBounds {
                rect,
                width: surface.width,
                height: surface.height,
            });
        }
        Ok(surface.read(rect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{with_parameters, BlendEquation, BlendFunc, PickingUniforms};

    fn upload<T: bytemuck::Pod>(gl: &mut SoftwareContext, data: &[T]) -> BufferId {
        gl.create_buffer(bytemuck::cast_slice(data))
    }

    /// One point at NDC (x, y) with a 2px radius.
    fn point_call(gl: &mut SoftwareContext, ndc: [f64; 2], color: [u8; 4], pick: [u8; 3]) -> (ProgramId, [BufferId; 4]) {
        let program = gl
            .create_program(&ProgramDesc { name: "points", topology: Topology::Points })
            .unwrap();
        let buffers = [
            upload(gl, &[[ndc[0], ndc[1], 0.0f64]]),
            upload(gl, &[color]),
            upload(gl, &[pick]),
            upload(gl, &[2.0f32]),
        ];
        (program, buffers)
    }

    fn draw(gl: &mut SoftwareContext, program: ProgramId, b: [BufferId; 4], uniforms: &Uniforms) {
        gl.draw(&DrawCall {
            program,
            vertex_count: 1,
            positions: b[0],
            colors: b[1],
            picking_colors: Some(b[2]),
            sizes: Some(b[3]),
            uniforms,
        })
        .unwrap();
    }

    // ── sizing ──────────────────────────────────────────────────────────

    #[test]
    fn drawing_buffer_scales_with_pixel_ratio() {
        let mut gl = SoftwareContext::new(100.0, 50.0, 2.0);
        assert_eq!(gl.drawing_buffer_size(), (200, 100));
        gl.resize(10.0, 10.0, 1.0);
        assert_eq!(gl.drawing_buffer_size(), (10, 10));
        assert_eq!(gl.pixels().len(), 100);
    }

    // ── clear ───────────────────────────────────────────────────────────

    #[test]
    fn clear_honors_scissor() {
        let mut gl = SoftwareContext::new(4.0, 4.0, 1.0);
        let params = GlParameters::default()
            .with_clear_color([1.0, 0.0, 0.0, 1.0])
            .with_scissor(DeviceRect::new(0, 0, 2, 2));
        with_parameters(&mut gl, &params, |gl| gl.clear(ClearMask::COLOR)).unwrap();

        assert_eq!(gl.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(gl.pixel(3, 3), Some([0, 0, 0, 0]));
        // State restored.
        assert!(!gl.state().scissor_test);
    }

    // ── draw ────────────────────────────────────────────────────────────

    #[test]
    fn point_lands_at_viewport_center() {
        let mut gl = SoftwareContext::new(10.0, 10.0, 1.0);
        let (program, b) = point_call(&mut gl, [0.0, 0.0], [0, 255, 0, 255], [1, 0, 0]);
        draw(&mut gl, program, b, &Uniforms::default());

        assert_eq!(gl.pixel(5, 5), Some([0, 255, 0, 255]));
        assert_eq!(gl.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(gl.counters().draw_calls, 1);
    }

    #[test]
    fn picking_writes_picking_color_with_layer_alpha() {
        let mut gl = SoftwareContext::new(10.0, 10.0, 1.0);
        let fb = gl.create_framebuffer(10, 10).unwrap();
        let (program, b) = point_call(&mut gl, [0.0, 0.0], [0, 255, 0, 255], [5, 0, 0]);

        let uniforms = Uniforms {
            picking: PickingUniforms { active: true, ..PickingUniforms::default() },
            ..Uniforms::default()
        };
        let params = GlParameters::default()
            .with_framebuffer(FramebufferBinding::Offscreen(fb))
            .with_blend(BlendFunc::PICKING, BlendEquation::Add)
            .with_blend_color([0.0, 0.0, 0.0, 2.0 / 255.0]);
        with_parameters(&mut gl, &params, |gl| draw(gl, program, b, &uniforms));

        let px = gl
            .read_pixels(FramebufferBinding::Offscreen(fb), DeviceRect::new(5, 5, 1, 1))
            .unwrap();
        assert_eq!(px, vec![[5, 0, 0, 2]]);
        // Default framebuffer untouched.
        assert!(gl.pixels().iter().all(|p| *p == [0, 0, 0, 0]));
    }

    #[test]
    fn excluded_picking_color_is_discarded() {
        let mut gl = SoftwareContext::new(10.0, 10.0, 1.0);
        let (program, b) = point_call(&mut gl, [0.0, 0.0], [0, 255, 0, 255], [5, 0, 0]);
        let uniforms = Uniforms {
            picking: PickingUniforms {
                active: true,
                excluded: vec![[5, 0, 0]],
                ..PickingUniforms::default()
            },
            ..Uniforms::default()
        };
        draw(&mut gl, program, b, &uniforms);
        assert_eq!(gl.pixel(5, 5), Some([0, 0, 0, 0]));
    }

    #[test]
    fn selected_object_uses_highlight_color() {
        let mut gl = SoftwareContext::new(10.0, 10.0, 1.0);
        let (program, b) = point_call(&mut gl, [0.0, 0.0], [0, 255, 0, 255], [5, 0, 0]);
        let uniforms = Uniforms {
            picking: PickingUniforms {
                selected_color: Some([5, 0, 0]),
                highlight_color: [0, 0, 128, 255],
                ..PickingUniforms::default()
            },
            ..Uniforms::default()
        };
        draw(&mut gl, program, b, &uniforms);
        assert_eq!(gl.pixel(5, 5), Some([0, 0, 128, 255]));
    }

    #[test]
    fn short_buffer_is_an_error() {
        let mut gl = SoftwareContext::new(10.0, 10.0, 1.0);
        let (program, b) = point_call(&mut gl, [0.0, 0.0], [0, 255, 0, 255], [5, 0, 0]);
        let err = gl
            .draw(&DrawCall {
                program,
                vertex_count: 2,
                positions: b[0],
                colors: b[1],
                picking_colors: None,
                sizes: None,
                uniforms: &Uniforms::default(),
            })
            .unwrap_err();
        assert!(matches!(err, DeviceError::BufferTooSmall { .. }));
    }

    // ── read_pixels ─────────────────────────────────────────────────────

    #[test]
    fn read_outside_bounds_fails() {
        let mut gl = SoftwareContext::new(4.0, 4.0, 1.0);
        assert!(gl.read_pixels(FramebufferBinding::Default, DeviceRect::new(3, 3, 2, 2)).is_err());
        assert_eq!(
            gl.read_pixels(FramebufferBinding::Default, DeviceRect::new(0, 0, 2, 2)).unwrap().len(),
            4
        );
    }

    #[test]
    fn top_down_export_flips_rows() {
        let mut gl = SoftwareContext::new(1.0, 2.0, 1.0);
        let params = GlParameters::default()
            .with_clear_color([1.0, 1.0, 1.0, 1.0])
            .with_scissor(DeviceRect::new(0, 0, 1, 1));
        with_parameters(&mut gl, &params, |gl| gl.clear(ClearMask::COLOR)).unwrap();

        let bytes = gl.to_rgba_top_down();
        assert_eq!(&bytes[..4], &[0, 0, 0, 0]);
        assert_eq!(&bytes[4..], &[255, 255, 255, 255]);
    }
}
