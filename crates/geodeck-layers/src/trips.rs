use std::any::Any;
use std::rc::Rc;

use geodeck_engine::device::GlContext;
use geodeck_engine::layer::{
    Attributes, ChangeFlags, DrawOptions, Layer, LayerContext, LayerCore, LayerProps, LayerState, UpdateParams,
};

use crate::common::{to_world, Accessor, Color, Data, Primitive, PropDiff, LINES};

/// Animated paths: only the part travelled during the last `trail_length`
/// time units before `current_time` is drawn, fading out with age.
///
/// Hosts animate the layer by handing over a new instance with a new
/// `current_time` each frame; only the vertex upload is redone.
pub struct TripsLayer<T> {
    core: LayerCore,
    data: Data<T>,
    get_path: Accessor<T, Vec<[f64; 2]>>,
    get_timestamps: Accessor<T, Vec<f64>>,
    get_color: Accessor<T, Color>,
    get_width: Accessor<T, f64>,
    width_min_pixels: f64,
    current_time: f64,
    trail_length: f64,
}

impl<T: Clone + 'static> TripsLayer<T> {
    pub fn new(
        props: LayerProps,
        data: Data<T>,
        get_path: impl Fn(&T) -> Vec<[f64; 2]> + 'static,
        get_timestamps: impl Fn(&T) -> Vec<f64> + 'static,
    ) -> Self {
        Self {
            core: LayerCore::new(props),
            data,
            get_path: Rc::new(get_path),
            get_timestamps: Rc::new(get_timestamps),
            get_color: Rc::new(|_| [0, 0, 0, 255]),
            get_width: Rc::new(|_| 1.0),
            width_min_pixels: 0.0,
            current_time: 0.0,
            trail_length: 120.0,
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

    pub fn width_min_pixels(mut self, v: f64) -> Self { self.width_min_pixels = v; self }
    pub fn current_time(mut self, v: f64) -> Self { self.current_time = v; self }
    pub fn trail_length(mut self, v: f64) -> Self { self.trail_length = v.max(0.0); self }

    fn attributes(&self) -> Attributes {
        let (head, tail) = (self.current_time, self.current_time - self.trail_length);
        let mut attrs = Attributes::default();
        for (i, d) in self.data.iter().enumerate() {
            let path = (self.get_path)(d);
            let timestamps = (self.get_timestamps)(d);
            if path.len() != timestamps.len() {
                log::warn!("{}: trip {i} has {} points and {} timestamps", self.id(), path.len(), timestamps.len());
            }
            let (color, width) = ((self.get_color)(d), (self.get_width)(d) as f32);

            let n = path.len().min(timestamps.len());
            for k in 1..n {
                let Some((a, b)) = clip_segment(path[k - 1], path[k], timestamps[k - 1], timestamps[k], tail, head) else {
                    continue;
                };
                attrs.push(to_world(a.0, 0.0), self.faded(color, a.1), width, i);
                attrs.push(to_world(b.0, 0.0), self.faded(color, b.1), width, i);
            }
        }
        attrs
    }

    fn faded(&self, mut color: Color, time: f64) -> Color {
        let age = if self.trail_length > 0.0 {
            ((self.current_time - time) / self.trail_length).clamp(0.0, 1.0)
        } else {
            0.0
        };
        color[3] = (color[3] as f64 * (1.0 - age)).round() as u8;
        color
    }
}

type TimedPoint = ([f64; 2], f64);

/// The part of segment `a → b` travelled within `[tail, head]`.
fn clip_segment(a: [f64; 2], b: [f64; 2], ta: f64, tb: f64, tail: f64, head: f64) -> Option<(TimedPoint, TimedPoint)> {
    let (t0, t1) = (ta.max(tail), tb.min(head));
    if t0 >= t1 || tb <= ta {
        return None;
    }
    let at = |t: f64| {
        let f = (t - ta) / (tb - ta);
        ([a[0] + (b[0] - a[0]) * f, a[1] + (b[1] - a[1]) * f], t)
    };
    Some((at(t0), at(t1)))
}

impl<T: Clone + 'static> Layer for TripsLayer<T> {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn layer_name(&self) -> &'static str {
        "TripsLayer"
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
        if !params.change_flags.needs_recompute() {
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
            diff.prop("current_time", old.current_time != self.current_time)
                .prop("trail_length", old.trail_length != self.trail_length)
                .prop("width_min_pixels", old.width_min_pixels != self.width_min_pixels);
        }
        diff.finish()
    }

    fn draw(&self, state: &LayerState, opts: &DrawOptions<'_>, gl: &mut dyn GlContext) -> anyhow::Result<()> {
        let Some(lines) = state.kind::<Primitive>() else {
            return Ok(());
        };
        let ratio = opts.module.device_pixel_ratio;
        let mut uniforms = opts.uniforms(self.props());
        uniforms.size_min_pixels = self.width_min_pixels * ratio;
        lines.draw(gl, &uniforms)
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

    type Trip = Vec<([f64; 2], f64)>;

    fn trips(data: Data<Trip>, current_time: f64) -> TripsLayer<Trip> {
        TripsLayer::new(
            LayerProps::new("trips"),
            data,
            |t: &Trip| t.iter().map(|p| p.0).collect(),
            |t: &Trip| t.iter().map(|p| p.1).collect(),
        )
        .get_color(|_| [255, 255, 255, 200])
        .get_width(|_| 4.0)
        .trail_length(10.0)
        .current_time(current_time)
    }

    fn east_west() -> Data<Trip> {
        Rc::new(vec![vec![([-0.01, 0.0], 0.0), ([0.0, 0.0], 10.0), ([0.01, 0.0], 20.0)]])
    }

    #[test]
    fn clipping_keeps_the_travelled_window() {
        assert_eq!(clip_segment([0.0, 0.0], [10.0, 0.0], 0.0, 10.0, 5.0, 20.0), Some((([5.0, 0.0], 5.0), ([10.0, 0.0], 10.0))));
        assert_eq!(clip_segment([0.0, 0.0], [10.0, 0.0], 0.0, 10.0, 11.0, 20.0), None);
        assert_eq!(clip_segment([0.0, 0.0], [10.0, 0.0], 0.0, 10.0, -5.0, 2.0), Some((([0.0, 0.0], 0.0), ([2.0, 0.0], 2.0))));
    }

    #[test]
    fn alpha_fades_with_age() {
        let layer = trips(east_west(), 10.0);
        let attrs = layer.attributes();
        // Only the first segment is inside [0, 10]: tail fully faded, head opaque.
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.colors[0][3], 0);
        assert_eq!(attrs.colors[1][3], 200);
    }

    #[test]
    fn time_change_reuploads_only_the_window() {
        let data = east_west();
        let mut h = Harness::new([0.0, 0.0], 10.0);
        h.set(vec![Rc::new(trips(data.clone(), 5.0)) as LayerRef]);
        h.draw();
        // Head at lng -0.005, left of the center.
        assert_eq!(h.pixel(40, 32)[3], 0);

        h.set(vec![Rc::new(trips(data, 20.0)) as LayerRef]);
        h.draw();
        assert!(h.pixel(40, 32)[3] > 0);
        assert_eq!(h.pixel(20, 32)[3], 0);
    }
}
