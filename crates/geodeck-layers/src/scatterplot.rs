use std::any::Any;
use std::rc::Rc;

use geodeck_engine::device::GlContext;
use geodeck_engine::layer::{
    Attributes, ChangeFlags, DrawOptions, Layer, LayerContext, LayerCore, LayerProps, LayerState, UpdateParams,
};

use crate::common::{to_world, Accessor, Color, Data, Primitive, PropDiff, POINTS};

/// Filled circles with a radius in meters.
///
/// # Example
/// ```rust,ignore
/// ScatterplotLayer::new(LayerProps::new("stations"), stations, |s| s.lng_lat)
///     .get_radius(|s| s.capacity as f64)
///     .radius_min_pixels(2.0)
/// ```
pub struct ScatterplotLayer<T> {
    core: LayerCore,
    data: Data<T>,
    get_position: Accessor<T, [f64; 2]>,
    get_radius: Accessor<T, f64>,
    get_fill_color: Accessor<T, Color>,
    radius_scale: f64,
    radius_min_pixels: f64,
    radius_max_pixels: f64,
}

impl<T: Clone + 'static> ScatterplotLayer<T> {
    pub fn new(props: LayerProps, data: Data<T>, get_position: impl Fn(&T) -> [f64; 2] + 'static) -> Self {
        Self {
            core: LayerCore::new(props),
            data,
            get_position: Rc::new(get_position),
            get_radius: Rc::new(|_| 1.0),
            get_fill_color: Rc::new(|_| [0, 0, 0, 255]),
            radius_scale: 1.0,
            radius_min_pixels: 0.0,
            radius_max_pixels: f64::MAX,
        }
    }

    /// Radius in meters.
    pub fn get_radius(mut self, f: impl Fn(&T) -> f64 + 'static) -> Self {
        self.get_radius = Rc::new(f);
        self
    }

    pub fn get_fill_color(mut self, f: impl Fn(&T) -> Color + 'static) -> Self {
        self.get_fill_color = Rc::new(f);
        self
    }

    pub fn radius_scale(mut self, v: f64) -> Self { self.radius_scale = v; self }
    pub fn radius_min_pixels(mut self, v: f64) -> Self { self.radius_min_pixels = v; self }
    pub fn radius_max_pixels(mut self, v: f64) -> Self { self.radius_max_pixels = v; self }

    pub fn data(&self) -> &Data<T> {
        &self.data
    }

    fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::with_capacity(self.data.len());
        for (i, d) in self.data.iter().enumerate() {
            attrs.push(
                to_world((self.get_position)(d), 0.0),
                (self.get_fill_color)(d),
                (self.get_radius)(d) as f32,
                i,
            );
        }
        attrs
    }
}

impl<T: Clone + 'static> Layer for ScatterplotLayer<T> {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn layer_name(&self) -> &'static str {
        "ScatterplotLayer"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn initialize_state(&self, ctx: &mut LayerContext<'_>) -> anyhow::Result<LayerState> {
        let mut state = LayerState::empty();
        let points = Primitive::allocate(ctx, &mut state, &POINTS)?;
        state.set_kind(points);
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
        if let Some(points) = state.kind_mut::<Primitive>() {
            points.upload(&mut *ctx.gl, &attrs)?;
        }
        log::trace!("{}: {} points", self.id(), attrs.len());
        Ok(())
    }

    fn diff_props(&self, old: &dyn Layer) -> ChangeFlags {
        let (mut diff, old) = PropDiff::new(old, |l: &Self| &l.data, &self.data);
        if let Some(old) = old {
            diff.prop("radius_scale", old.radius_scale != self.radius_scale)
                .prop("radius_min_pixels", old.radius_min_pixels != self.radius_min_pixels)
                .prop("radius_max_pixels", old.radius_max_pixels != self.radius_max_pixels);
        }
        diff.finish()
    }

    fn draw(&self, state: &LayerState, opts: &DrawOptions<'_>, gl: &mut dyn GlContext) -> anyhow::Result<()> {
        let Some(points) = state.kind::<Primitive>() else {
            return Ok(());
        };
        let ratio = opts.module.device_pixel_ratio;
        let mut uniforms = opts.uniforms(self.props());
        uniforms.size_scale = ratio * self.radius_scale * opts.viewport.distance_scales().pixels_per_meter.x;
        uniforms.size_min_pixels = self.radius_min_pixels * ratio;
        uniforms.size_max_pixels = self.radius_max_pixels * ratio;
        points.draw(gl, &uniforms)
    }

    fn picked_object(&self, _state: &LayerState, index: i64) -> Option<Rc<dyn Any>> {
        let datum = self.data.get(usize::try_from(index).ok()?)?;
        Some(Rc::new(datum.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use geodeck_engine::layer::LayerRef;

    type Stop = ([f64; 2], f64);

    fn stops() -> Data<Stop> {
        Rc::new(vec![([0.0, 0.0], 4.0), ([0.01, 0.0], 4.0)])
    }

    fn layer(data: Data<Stop>) -> Rc<ScatterplotLayer<Stop>> {
        Rc::new(
            ScatterplotLayer::new(LayerProps::new("stops").pickable(true), data, |d: &Stop| d.0)
                .get_radius(|d| d.1)
                .radius_min_pixels(3.0)
                .get_fill_color(|_| [255, 0, 0, 255]),
        )
    }

    // ── draw ────────────────────────────────────────────────────────────

    #[test]
    fn draws_points_at_their_positions() {
        let mut h = Harness::new([0.0, 0.0], 10.0);
        h.set(vec![layer(stops()) as LayerRef]);
        h.draw();
        assert_eq!(h.pixel(32, 32), [255, 0, 0, 255]);
        assert_eq!(h.pixel(5, 5)[3], 0);
    }

    #[test]
    fn radius_clamps_to_min_pixels() {
        let mut h = Harness::new([0.0, 0.0], 1.0);
        h.set(vec![layer(Rc::new(vec![([0.0, 0.0], 0.001)])) as LayerRef]);
        h.draw();
        // 3 px minimum at any zoom.
        assert_eq!(h.pixel(34, 32)[0], 255);
    }

    // ── update ──────────────────────────────────────────────────────────

    #[test]
    fn same_data_skips_the_upload() {
        let data = stops();
        let mut h = Harness::new([0.0, 0.0], 10.0);
        h.set(vec![layer(data.clone()) as LayerRef]);
        let uploads = h.manager.gl().counters().buffer_writes;

        h.set(vec![layer(data) as LayerRef]);
        assert_eq!(h.manager.gl().counters().buffer_writes, uploads);

        h.set(vec![layer(stops()) as LayerRef]);
        assert!(h.manager.gl().counters().buffer_writes > uploads);
    }

    #[test]
    fn radius_scale_change_is_a_prop_change() {
        let data = stops();
        let a = ScatterplotLayer::new(LayerProps::new("s"), data.clone(), |d: &Stop| d.0);
        let b = ScatterplotLayer::new(LayerProps::new("s"), data, |d: &Stop| d.0).radius_scale(2.0);
        let flags = b.diff_props(&a);
        assert!(flags.data_changed.is_none());
        assert_eq!(flags.props_changed.as_deref(), Some("props.radius_scale changed"));
    }

    // ── picking ─────────────────────────────────────────────────────────

    #[test]
    fn pick_returns_the_datum() {
        let mut h = Harness::new([0.0, 0.0], 10.0);
        h.set(vec![layer(stops()) as LayerRef]);
        let info = h.pick(32.0, 32.0).unwrap();
        assert_eq!(info.index, 0);
        assert_eq!(info.object_as::<Stop>().map(|s| s.0), Some([0.0, 0.0]));
    }
}
