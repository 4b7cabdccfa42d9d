use std::any::Any;
use std::rc::Rc;

use geodeck_engine::device::GlContext;
use geodeck_engine::glam::DVec2;
use geodeck_engine::layer::{
    Attributes, ChangeFlags, DrawOptions, Layer, LayerContext, LayerCore, LayerProps, LayerState, UpdateParams,
};

use super::bins::{HexBin, HexGrid};
use crate::common::{to_world, Data, Primitive, PropDiff, TRIANGLES};

/// Flat hexagons, one per [`HexBin`], coloured by the bin.
///
/// Usually generated by [`HexagonLayer`](super::HexagonLayer), but usable on
/// pre-aggregated bins as well.
pub struct HexagonCellLayer {
    core: LayerCore,
    data: Data<HexBin>,
    /// World units (scale 1).
    radius: f64,
    coverage: f64,
}

impl HexagonCellLayer {
    pub fn new(props: LayerProps, data: Data<HexBin>, radius: f64) -> Self {
        Self {
            core: LayerCore::new(props),
            data,
            radius,
            coverage: 1.0,
        }
    }

    pub fn coverage(mut self, coverage: f64) -> Self {
        self.coverage = coverage.clamp(0.0, 1.0);
        self
    }

    pub fn data(&self) -> &Data<HexBin> {
        &self.data
    }

    fn attributes(&self) -> Attributes {
        let grid = HexGrid { radius: self.radius };
        let mut attrs = Attributes::with_capacity(self.data.len() * 18);
        for (i, bin) in self.data.iter().enumerate() {
            let [x, y, _] = to_world(bin.center, 0.0);
            let center = DVec2::new(x, y);
            let corners = grid.corners(center, self.coverage);
            for k in 0..6 {
                let (a, b) = (corners[k], corners[(k + 1) % 6]);
                for p in [center, a, b] {
                    attrs.push([p.x, p.y, 0.0], bin.color, 1.0, i);
                }
            }
        }
        attrs
    }
}

impl Layer for HexagonCellLayer {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn layer_name(&self) -> &'static str {
        "HexagonCellLayer"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn initialize_state(&self, ctx: &mut LayerContext<'_>) -> anyhow::Result<LayerState> {
        let mut state = LayerState::empty();
        let cells = Primitive::allocate(ctx, &mut state, &TRIANGLES)?;
        state.set_kind(cells);
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
        if let Some(cells) = state.kind_mut::<Primitive>() {
            cells.upload(&mut *ctx.gl, &attrs)?;
        }
        Ok(())
    }

    fn diff_props(&self, old: &dyn Layer) -> ChangeFlags {
        let (mut diff, old) = PropDiff::new(old, |l: &Self| &l.data, &self.data);
        if let Some(old) = old {
            diff.prop("radius", old.radius != self.radius)
                .prop("coverage", old.coverage != self.coverage);
        }
        diff.finish()
    }

    fn draw(&self, state: &LayerState, opts: &DrawOptions<'_>, gl: &mut dyn GlContext) -> anyhow::Result<()> {
        let Some(cells) = state.kind::<Primitive>() else {
            return Ok(());
        };
        cells.draw(gl, &opts.uniforms(self.props()))
    }

    fn picked_object(&self, _state: &LayerState, index: i64) -> Option<Rc<dyn Any>> {
        let bin = self.data.get(usize::try_from(index).ok()?)?;
        Some(Rc::new(bin.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_triangles_per_bin() {
        let bins = Rc::new(vec![
            HexBin { center: [0.0, 0.0], count: 1, points: vec![0], color: [1, 2, 3, 255] },
            HexBin { center: [1.0, 1.0], count: 2, points: vec![1, 2], color: [4, 5, 6, 255] },
        ]);
        let attrs = HexagonCellLayer::new(LayerProps::new("cells"), bins, 0.01).attributes();
        assert_eq!(attrs.len(), 2 * 18);
        assert_eq!(attrs.colors[18], [4, 5, 6, 255]);
        assert_eq!(attrs.positions[0], attrs.positions[3]);
    }
}
