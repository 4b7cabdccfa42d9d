//! Puts software-rendered frames on screen through a wgpu surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::window::Window;

/// Surface settings chosen before the window exists.
#[derive(Debug, Clone)]
pub struct PresentOptions {
    pub present_mode: wgpu::PresentMode,
    /// Ignored when the surface does not list it.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,
    pub frame_latency: u32,
}

impl Default for PresentOptions {
    fn default() -> Self {
        Self {
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: Some(wgpu::CompositeAlphaMode::Opaque),
            frame_latency: 2,
        }
    }
}

/// What happened to one frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PresentOutcome {
    Shown,
    /// The surface was stale and got reconfigured, or timed out.
    Dropped,
    /// The device is out of memory; the studio cannot continue.
    Lost,
}

/// Surface byte layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum TexelOrder {
    Rgba,
    Bgra,
}

/// A window surface fed by CPU uploads.
///
/// Nothing is rendered on the GPU: each frame is written into the swapchain
/// texture with `Queue::write_texture`, which needs `COPY_DST` surface usage.
pub struct Presenter {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    order: TexelOrder,
}

impl Presenter {
    pub async fn new(window: Arc<Window>, options: PresentOptions) -> Result<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window)
            .context("window refused a wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no adapter can present to this window")?;
        log::info!("adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("geodeck-studio"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("adapter refused a device")?;

        let caps = surface.get_capabilities(&adapter);
        anyhow::ensure!(
            caps.usages.contains(wgpu::TextureUsages::COPY_DST),
            "surface textures cannot be written from the CPU"
        );
        let (format, order) = pick_format(&caps.formats).context("surface offers no 8-bit RGBA/BGRA format")?;
        let alpha_mode = match options.alpha_mode {
            Some(mode) if caps.alpha_modes.contains(&mode) => mode,
            _ => caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: options.present_mode,
            alpha_mode,
            view_formats: Vec::new(),
            desired_maximum_frame_latency: options.frame_latency,
        };
        surface.configure(&device, &config);
        log::info!("surface {format:?} {width}x{height}, {alpha_mode:?}");

        Ok(Self {
            surface,
            device,
            queue,
            config,
            order,
        })
    }

    /// Follows the window size. Minimized windows keep the last configuration.
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        if (size.width, size.height) != (self.config.width, self.config.height) {
            self.config.width = size.width;
            self.config.height = size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Shows a top-down straight-alpha RGBA frame of `width × height`,
    /// composited over `background`. Extra rows or columns are cut off.
    pub fn present(&mut self, rgba: &[u8], width: u32, height: u32, background: [u8; 4]) -> PresentOutcome {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::OutOfMemory) => return PresentOutcome::Lost,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return PresentOutcome::Dropped;
            }
            Err(err) => {
                log::debug!("frame dropped: {err}");
                return PresentOutcome::Dropped;
            }
        };

        let copy = wgpu::Extent3d {
            width: width.min(self.config.width),
            height: height.min(self.config.height),
            depth_or_array_layers: 1,
        };
        if copy.width > 0 && copy.height > 0 {
            self.queue.write_texture(
                frame.texture.as_image_copy(),
                &encode_texels(rgba, background, self.order),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: Some(height),
                },
                copy,
            );
        }
        self.queue.submit([]);
        frame.present();
        PresentOutcome::Shown
    }
}

/// Frames carry sRGB-encoded bytes already, so linear unorm formats are
/// preferred to avoid a second encode.
fn pick_format(formats: &[wgpu::TextureFormat]) -> Option<(wgpu::TextureFormat, TexelOrder)> {
    use wgpu::TextureFormat as F;
    [
        (F::Rgba8Unorm, TexelOrder::Rgba),
        (F::Bgra8Unorm, TexelOrder::Bgra),
        (F::Rgba8UnormSrgb, TexelOrder::Rgba),
        (F::Bgra8UnormSrgb, TexelOrder::Bgra),
    ]
    .into_iter()
    .find(|(format, _)| formats.contains(format))
}

/// Straight-alpha RGBA over an opaque `background`, in surface byte order.
fn encode_texels(rgba: &[u8], background: [u8; 4], order: TexelOrder) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgba.len());
    for px in rgba.chunks_exact(4) {
        let a = px[3] as u32;
        let mix = |c: u8, bg: u8| ((c as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8;
        let (r, g, b) = (mix(px[0], background[0]), mix(px[1], background[1]), mix(px[2], background[2]));
        match order {
            TexelOrder::Rgba => out.extend_from_slice(&[r, g, b, 255]),
            TexelOrder::Bgra => out.extend_from_slice(&[b, g, r, 255]),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transparent_pixels_show_the_background() {
        let frame = [0, 0, 0, 0, 255, 0, 0, 255];
        let out = encode_texels(&frame, [10, 20, 30, 255], TexelOrder::Rgba);
        assert_eq!(out, [10, 20, 30, 255, 255, 0, 0, 255]);
    }

    #[test]
    fn bgra_swaps_red_and_blue() {
        let out = encode_texels(&[200, 100, 50, 255], [0, 0, 0, 255], TexelOrder::Bgra);
        assert_eq!(out, [50, 100, 200, 255]);
    }

    #[test]
    fn half_alpha_blends_evenly() {
        let out = encode_texels(&[255, 255, 255, 128], [0, 0, 0, 255], TexelOrder::Rgba);
        assert_eq!(out[0], 128);
    }

    #[test]
    fn unorm_formats_come_first() {
        use wgpu::TextureFormat as F;
        let picked = pick_format(&[F::Bgra8UnormSrgb, F::Bgra8Unorm]);
        assert_eq!(picked, Some((F::Bgra8Unorm, TexelOrder::Bgra)));
        assert_eq!(pick_format(&[F::Rgba16Float]), None);
    }
}
