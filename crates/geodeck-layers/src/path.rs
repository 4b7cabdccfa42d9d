use std::any::Any;
use std::rc::Rc;

use geodeck_engine::device::GlContext;
use geodeck_engine::layer::{
    Attributes, ChangeFlags, DrawOptions, Layer, LayerContext, LayerCore, LayerProps, LayerState, UpdateParams,
};

use crate::common::{to_world, Accessor, Color, Data, Primitive, PropDiff, LINES};

/// Polylines with a width in pixels.
pub struct PathLayer<T> {
    core: LayerCore,
    data: Data<T>,
    get_path: Accessor<T, Vec<[f64; 2]>>,
    get_color: Accessor<T, Color>,
    get_width: Accessor<T, f64>,
    width_scale: f64,
    width_min_pixels: f64,
    width_max_pixels: f64,
}

impl<T: Clone + 'static> PathLayer<T> {
    pub fn new(props: LayerProps, data: Data<T>, get_path: impl Fn(&T) -> Vec<[f64; 2]> + 'static) -> Self {
        Self {
            core: LayerCore::new(props),
            data,
            get_path: Rc::new(get_path),
            get_color: Rc::new(|_| [0, 0, 0, 255]),
            get_width: Rc::new(|_| 1.0),
            width_scale: 1.0,
            width_min_pixels: 0.0,
            width_max_pixels: f64::MAX,
        }
    }

    pub fn get_color(mut self, f: impl Fn(&T) -> Color + 'static) -> Self {
        self.get_color = Rc::new(f);
        self
    }

    pub fn get_width(mut self, f: impl Fn(&T) -> f64 + 'static) -> Self {
        self.get_width = Rc::new(f);
        self
    }

    pub fn width_scale(mut self, v: f64) -> Self { self.width_scale = v; self }
    pub fn width_min_pixels(mut self, v: f64) -> Self { self.width_min_pixels = v; self }
    pub fn width_max_pixels(mut self, v: f64) -> Self { self.width_max_pixels = v; self }

    fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::default();
        for (i, d) in self.data.iter().enumerate() {
            let path = (self.get_path)(d);
            let (color, width) = ((self.get_color)(d), (self.get_width)(d) as f32);
            for pair in path.windows(2) {
                attrs.push(to_world(pair[0], 0.0), color, width, i);
                attrs.push(to_world(pair[1], 0.0), color, width, i);
            }
        }
        attrs
    }
}

impl<T: Clone + 'static> Layer for PathLayer<T> {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn layer_name(&self) -> &'static str {
        "PathLayer"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn initialize_state(&self, ctx: &mut LayerContext<'_>) -> anyhow::Result<LayerState> {
        let mut state = LayerState::empty();
        let lines = Primitive::allocate(ctx, &mut state, &LINES)?;
        state.set_kind(lines);
        Ok(state)
    }

    fn update_state(
        &self,
        params: &UpdateParams<'_>,
        state: &mut LayerState,
        ctx: &mut LayerContext<'_>,
    ) -> anyhow::Result<()> {
        let flags = params.change_flags;
        if flags.data_changed.is_none() && flags.update_triggers_changed.is_none() {
            return Ok(());
        }
        let attrs = self.attributes();
        state.object_count = self.data.len();
        if let Some(lines) = state.kind_mut::<Primitive>() {
            lines.upload(&mut *ctx.gl, &attrs)?;
        }
        Ok(())
    }

    fn diff_props(&self, old: &dyn Layer) -> ChangeFlags {
        let (mut diff, old) = PropDiff::new(old, |l: &Self| &l.data, &self.data);
        if let Some(old) = old {
            diff.prop("width_scale", old.width_scale != self.width_scale)
                .prop("width_min_pixels", old.width_min_pixels != self.width_min_pixels)
                .prop("width_max_pixels", old.width_max_pixels != self.width_max_pixels);
        }
        diff.finish()
    }

    fn draw(&self, state: &LayerState, opts: &DrawOptions<'_>, gl: &mut dyn GlContext) -> anyhow::Result<()> {
        let Some(lines) = state.kind::<Primitive>() else {
            return Ok(());
        };
        let ratio = opts.module.device_pixel_ratio;
        let mut uniforms = opts.uniforms(self.props());
        uniforms.size_scale = ratio * self.width_scale;
        uniforms.size_min_pixels = self.width_min_pixels * ratio;
        uniforms.size_max_pixels = self.width_max_pixels * ratio;
        lines.draw(gl, &uniforms)
    }

    fn picked_object(&self, _state: &LayerState, index: i64) -> Option<Rc<dyn Any>> {
        let datum = self.data.get(usize::try_from(index).ok()?)?;
        Some(Rc::new(datum.clone()))
    }
}
