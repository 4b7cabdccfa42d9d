use std::any::Any;
use std::rc::Rc;

use geodeck_engine::device::GlContext;
use geodeck_engine::glam::DVec3;
use geodeck_engine::layer::{
    Attributes, ChangeFlags, DrawOptions, Layer, LayerContext, LayerCore, LayerProps, LayerState, UpdateParams,
};
use geodeck_engine::viewport::world_to_lng_lat;

use crate::common::{lerp_color, meters_per_world_unit, to_world, Accessor, Color, Data, Primitive, PropDiff, LINES};

/// Raised arcs between a source and a target position.
///
/// Each arc is split into `segments` straight pieces; the apex rises
/// `height × chord / 2` meters above the ground and colours blend from source
/// to target.
pub struct ArcLayer<T> {
    core: LayerCore,
    data: Data<T>,
    get_source_position: Accessor<T, [f64; 2]>,
    get_target_position: Accessor<T, [f64; 2]>,
    get_source_color: Accessor<T, Color>,
    get_target_color: Accessor<T, Color>,
    get_width: Accessor<T, f64>,
    get_height: Accessor<T, f64>,
    width_scale: f64,
    width_min_pixels: f64,
    width_max_pixels: f64,
    segments: usize,
}

impl<T: Clone + 'static> ArcLayer<T> {
    pub fn new(
        props: LayerProps,
        data: Data<T>,
        get_source_position: impl Fn(&T) -> [f64; 2] + 'static,
        get_target_position: impl Fn(&T) -> [f64; 2] + 'static,
    ) -> Self {
        Self {
            core: LayerCore::new(props),
            data,
            get_source_position: Rc::new(get_source_position),
            get_target_position: Rc::new(get_target_position),
            get_source_color: Rc::new(|_| [0, 0, 0, 255]),
            get_target_color: Rc::new(|_| [0, 0, 0, 255]),
            get_width: Rc::new(|_| 1.0),
            get_height: Rc::new(|_| 1.0),
            width_scale: 1.0,
            width_min_pixels: 0.0,
            width_max_pixels: f64::MAX,
            segments: 50,
        }
    }

    pub fn get_source_color(mut self, f: impl Fn(&T) -> Color + 'static) -> Self {
        self.get_source_color = Rc::new(f);
        self
    }

    pub fn get_target_color(mut self, f: impl Fn(&T) -> Color + 'static) -> Self {
        self.get_target_color = Rc::new(f);
        self
    }

    /// Width in pixels.
    pub fn get_width(mut self, f: impl Fn(&T) -> f64 + 'static) -> Self {
        self.get_width = Rc::new(f);
        self
    }

    /// Apex height relative to half the chord; `0` draws flat.
    pub fn get_height(mut self, f: impl Fn(&T) -> f64 + 'static) -> Self {
        self.get_height = Rc::new(f);
        self
    }

    pub fn width_scale(mut self, v: f64) -> Self { self.width_scale = v; self }
    pub fn width_min_pixels(mut self, v: f64) -> Self { self.width_min_pixels = v; self }
    pub fn width_max_pixels(mut self, v: f64) -> Self { self.width_max_pixels = v; self }

    pub fn segments(mut self, segments: usize) -> Self {
        self.segments = segments.max(1);
        self
    }

    fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::with_capacity(self.data.len() * self.segments * 2);
        for (i, d) in self.data.iter().enumerate() {
            let source = DVec3::from_array(to_world((self.get_source_position)(d), 0.0));
            let target = DVec3::from_array(to_world((self.get_target_position)(d), 0.0));
            let (source_color, target_color) = ((self.get_source_color)(d), (self.get_target_color)(d));
            let height = (self.get_height)(d);
            let width = (self.get_width)(d) as f32;

            for k in 0..self.segments {
                for t in [k as f64 / self.segments as f64, (k + 1) as f64 / self.segments as f64] {
                    attrs.push(arc_point(source, target, height, t), lerp_color(source_color, target_color, t), width, i);
                }
            }
        }
        attrs
    }
}

/// Point at `t` along the arc from `source` to `target` (world units, z in
/// meters).
fn arc_point(source: DVec3, target: DVec3, height: f64, t: f64) -> [f64; 3] {
    let ground = source.lerp(target, t);
    let mid = world_to_lng_lat(source.truncate().lerp(target.truncate(), 0.5), 1.0);
    let chord = source.truncate().distance(target.truncate()) * meters_per_world_unit(mid.y);
    let z = (t * (1.0 - t)).max(0.0).sqrt() * chord * height;
    [ground.x, ground.y, z]
}

impl<T: Clone + 'static> Layer for ArcLayer<T> {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn layer_name(&self) -> &'static str {
        "ArcLayer"
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
        let segments_changed = params
            .old
            .and_then(|old| old.as_any().downcast_ref::<Self>())
            .is_some_and(|old| old.segments != self.segments);
        if flags.data_changed.is_none() && flags.update_triggers_changed.is_none() && !segments_changed {
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
                .prop("width_max_pixels", old.width_max_pixels != self.width_max_pixels)
                .prop("segments", old.segments != self.segments);
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
