use crate::coords::DeviceRect;

use super::resources::FramebufferId;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantAlpha,
    OneMinusConstantAlpha,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlendEquation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Separate rgb/alpha blend factors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlendFunc {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendFunc {
    /// Straight-alpha "over" compositing for rgb, additive alpha.
    pub const ALPHA: BlendFunc = BlendFunc {
        src_rgb: BlendFactor::SrcAlpha,
        dst_rgb: BlendFactor::OneMinusSrcAlpha,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::OneMinusSrcAlpha,
    };

    /// Copies source rgb and takes alpha from the constant blend colour.
    pub const PICKING: BlendFunc = BlendFunc {
        src_rgb: BlendFactor::One,
        dst_rgb: BlendFactor::Zero,
        src_alpha: BlendFactor::ConstantAlpha,
        dst_alpha: BlendFactor::Zero,
    };
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FramebufferBinding {
    #[default]
    Default,
    Offscreen(FramebufferId),
}

/// Partial GL state. `None` leaves the current value untouched.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct GlParameters {
    pub framebuffer: Option<FramebufferBinding>,
    pub viewport: Option<DeviceRect>,
    pub scissor_test: Option<bool>,
    pub scissor: Option<DeviceRect>,
    pub blend: Option<bool>,
    pub blend_func: Option<BlendFunc>,
    pub blend_equation: Option<BlendEquation>,
    pub blend_color: Option<[f32; 4]>,
    pub clear_color: Option<[f32; 4]>,
    pub depth_test: Option<bool>,
}

impl GlParameters {
    /// `self` overridden field-by-field by `over`.
    pub fn merged(&self, over: &GlParameters) -> GlParameters {
        GlParameters {
            framebuffer: over.framebuffer.or(self.framebuffer),
            viewport: over.viewport.or(self.viewport),
            scissor_test: over.scissor_test.or(self.scissor_test),
            scissor: over.scissor.or(self.scissor),
            blend: over.blend.or(self.blend),
            blend_func: over.blend_func.or(self.blend_func),
            blend_equation: over.blend_equation.or(self.blend_equation),
            blend_color: over.blend_color.or(self.blend_color),
            clear_color: over.clear_color.or(self.clear_color),
            depth_test: over.depth_test.or(self.depth_test),
        }
    }

    pub fn with_framebuffer(mut self, fb: FramebufferBinding) -> Self {
        self.framebuffer = Some(fb);
        self
    }

    pub fn with_viewport(mut self, rect: DeviceRect) -> Self {
        self.viewport = Some(rect);
        self
    }

    pub fn with_scissor(mut self, rect: DeviceRect) -> Self {
        self.scissor_test = Some(true);
        self.scissor = Some(rect);
        self
    }

    pub fn with_blend(mut self, func: BlendFunc, equation: BlendEquation) -> Self {
        self.blend = Some(true);
        self.blend_func = Some(func);
        self.blend_equation = Some(equation);
        self
    }

    pub fn with_blend_color(mut self, color: [f32; 4]) -> Self {
        self.blend_color = Some(color);
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = Some(color);
        self
    }
}

/// Complete GL state of a context.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlState {
    pub framebuffer: FramebufferBinding,
    pub viewport: DeviceRect,
    pub scissor_test: bool,
    pub scissor: DeviceRect,
    pub blend: bool,
    pub blend_func: BlendFunc,
    pub blend_equation: BlendEquation,
    pub blend_color: [f32; 4],
    pub clear_color: [f32; 4],
    pub depth_test: bool,
}

impl GlState {
    /// GL defaults for a drawing buffer of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            framebuffer: FramebufferBinding::Default,
            viewport: DeviceRect::from_size(width, height),
            scissor_test: false,
            scissor: DeviceRect::from_size(width, height),
            blend: false,
            blend_func: BlendFunc {
                src_rgb: BlendFactor::One,
                dst_rgb: BlendFactor::Zero,
                src_alpha: BlendFactor::One,
                dst_alpha: BlendFactor::Zero,
            },
            blend_equation: BlendEquation::Add,
            blend_color: [0.0; 4],
            clear_color: [0.0; 4],
            depth_test: false,
        }
    }

    pub fn apply(&mut self, p: &GlParameters) {
        if let Some(v) = p.framebuffer {
            self.framebuffer = v;
        }
        if let Some(v) = p.viewport {
            self.viewport = v;
        }
        if let Some(v) = p.scissor_test {
            self.scissor_test = v;
        }
        if let Some(v) = p.scissor {
            self.scissor = v;
        }
        if let Some(v) = p.blend {
            self.blend = v;
        }
        if let Some(v) = p.blend_func {
            self.blend_func = v;
        }
        if let Some(v) = p.blend_equation {
            self.blend_equation = v;
        }
        if let Some(v) = p.blend_color {
            self.blend_color = v;
        }
        if let Some(v) = p.clear_color {
            self.clear_color = v;
        }
        if let Some(v) = p.depth_test {
            self.depth_test = v;
        }
    }

    /// Every field set; applying the result restores this state exactly.
    pub fn to_parameters(&self) -> GlParameters {
        GlParameters {
            framebuffer: Some(self.framebuffer),
            viewport: Some(self.viewport),
            scissor_test: Some(self.scissor_test),
            scissor: Some(self.scissor),
            blend: Some(self.blend),
            blend_func: Some(self.blend_func),
            blend_equation: Some(self.blend_equation),
            blend_color: Some(self.blend_color),
            clear_color: Some(self.clear_color),
            depth_test: Some(self.depth_test),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_prefers_override() {
        let layer = GlParameters {
            blend_func: Some(BlendFunc::ALPHA),
            depth_test: Some(true),
            ..GlParameters::default()
        };
        let pass = GlParameters::default().with_blend(BlendFunc::PICKING, BlendEquation::Add);

        let merged = layer.merged(&pass);
        assert_eq!(merged.blend_func, Some(BlendFunc::PICKING));
        assert_eq!(merged.depth_test, Some(true));
        assert_eq!(merged.blend, Some(true));
    }

    #[test]
    fn to_parameters_round_trips() {
        let mut state = GlState::new(10, 10);
        state.blend = true;
        state.scissor = DeviceRect::new(1, 2, 3, 4);

        let mut other = GlState::new(99, 99);
        other.apply(&state.to_parameters());
        assert_eq!(other, state);
    }
}
