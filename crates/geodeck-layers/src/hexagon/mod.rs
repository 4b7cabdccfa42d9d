//! Hexagonal aggregation.
//!
//! [`HexagonLayer`] bins its data into pointy-top hexagons of a fixed radius
//! in meters, colours every hexagon by a quantile scale over the bin counts
//! and renders the result through one generated [`HexagonCellLayer`]
//! (`<id>-hexagon-cell`). Picks on a cell report the [`HexBin`] under the
//! composite's id.

mod bins;
mod cell;

use std::any::Any;
use std::rc::Rc;

use geodeck_engine::glam::DVec2;
use geodeck_engine::layer::{
    ChangeFlags, Layer, LayerContext, LayerCore, LayerNode, LayerProps, LayerState, UpdateParams,
};
use geodeck_engine::viewport::{lng_lat_to_world, world_to_lng_lat};

pub use bins::HexBin;
pub use cell::HexagonCellLayer;

use bins::{bin_points, ColorScale, HexGrid};

use crate::common::{meters_per_world_unit, Accessor, Color, Data, PropDiff};

/// Six-step yellow-to-red ramp.
pub const DEFAULT_COLOR_RANGE: [Color; 6] = [
    [1, 152, 189, 255],
    [73, 227, 206, 255],
    [216, 254, 181, 255],
    [254, 237, 177, 255],
    [254, 173, 84, 255],
    [209, 55, 78, 255],
];

pub struct HexagonLayer<T> {
    core: LayerCore,
    data: Data<T>,
    get_position: Accessor<T, [f64; 2]>,
    radius: f64,
    coverage: f64,
    color_range: Vec<Color>,
    lower_percentile: f64,
    upper_percentile: f64,
}

struct HexagonState {
    bins: Rc<Vec<HexBin>>,
    /// Hexagon radius in world units at the data's latitude.
    radius: f64,
}

impl<T: 'static> HexagonLayer<T> {
    pub fn new(props: LayerProps, data: Data<T>, get_position: impl Fn(&T) -> [f64; 2] + 'static) -> Self {
        Self {
            core: LayerCore::new(props),
            data,
            get_position: Rc::new(get_position),
            radius: 1000.0,
            coverage: 1.0,
            color_range: DEFAULT_COLOR_RANGE.to_vec(),
            lower_percentile: 0.0,
            upper_percentile: 100.0,
        }
    }

    /// Hexagon radius in meters.
    pub fn radius(mut self, meters: f64) -> Self {
        self.radius = meters;
        self
    }

    /// Drawn fraction of the radius, `0..=1`.
    pub fn coverage(mut self, coverage: f64) -> Self {
        self.coverage = coverage.clamp(0.0, 1.0);
        self
    }

    pub fn color_range(mut self, colors: impl Into<Vec<Color>>) -> Self {
        self.color_range = colors.into();
        self
    }

    /// Bins whose count falls below this percentile are dropped.
    pub fn lower_percentile(mut self, percentile: f64) -> Self {
        self.lower_percentile = percentile.clamp(0.0, 100.0);
        self
    }

    /// Bins whose count falls above this percentile are dropped.
    pub fn upper_percentile(mut self, percentile: f64) -> Self {
        self.upper_percentile = percentile.clamp(0.0, 100.0);
        self
    }

    /// Bins of the last aggregation, `None` before the first update.
    pub fn bins(&self) -> Option<Rc<Vec<HexBin>>> {
        let state = self.core.state()?;
        let bins = state.kind::<HexagonState>().map(|s| Rc::clone(&s.bins));
        bins
    }

    /// Bins around the data centroid, plus the radius in world units.
    fn aggregate(&self) -> (Vec<HexBin>, f64) {
        let positions: Vec<DVec2> = self.data.iter().map(|d| DVec2::from_array((self.get_position)(d))).collect();
        let finite: Vec<DVec2> = positions.iter().copied().filter(|p| p.is_finite()).collect();
        if finite.is_empty() || self.radius <= 0.0 {
            return (Vec::new(), 0.0);
        }
        let centroid = finite.iter().sum::<DVec2>() / finite.len() as f64;
        let origin = lng_lat_to_world(centroid, 1.0);
        let grid = HexGrid {
            radius: self.radius / meters_per_world_unit(centroid.y),
        };

        let cells = bin_points(
            grid,
            positions.iter().enumerate().map(|(i, p)| (i, lng_lat_to_world(*p, 1.0) - origin)),
        );
        let counts: Vec<usize> = cells.iter().map(|(_, points)| points.len()).collect();
        let scale = ColorScale::new(&counts, &self.color_range, self.lower_percentile, self.upper_percentile);

        let bins = cells
            .into_iter()
            .filter_map(|(cell, points)| {
                let color = scale.color(points.len())?;
                let center = world_to_lng_lat(grid.center(cell) + origin, 1.0);
                Some(HexBin {
                    center: center.to_array(),
                    count: points.len(),
                    points,
                    color,
                })
            })
            .collect();
        (bins, grid.radius)
    }
}

impl<T: 'static> Layer for HexagonLayer<T> {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn layer_name(&self) -> &'static str {
        "HexagonLayer"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_composite(&self) -> bool {
        true
    }

    fn initialize_state(&self, _ctx: &mut LayerContext<'_>) -> anyhow::Result<LayerState> {
        Ok(LayerState::new(HexagonState {
            bins: Rc::new(Vec::new()),
            radius: 0.0,
        }))
    }

    fn update_state(
        &self,
        params: &UpdateParams<'_>,
        state: &mut LayerState,
        _ctx: &mut LayerContext<'_>,
    ) -> anyhow::Result<()> {
        if !params.change_flags.needs_recompute() {
            return Ok(());
        }
        let (bins, radius) = self.aggregate();
        state.object_count = bins.len();
        if let Some(kind) = state.kind_mut::<HexagonState>() {
            // Unchanged bins keep their identity so the cell layer skips the upload.
            if *kind.bins != bins || kind.radius != radius {
                log::debug!("{}: {} hexagons from {} points", self.id(), bins.len(), self.data.len());
                kind.bins = Rc::new(bins);
                kind.radius = radius;
            }
        }
        Ok(())
    }

    fn diff_props(&self, old: &dyn Layer) -> ChangeFlags {
        let (mut diff, old) = PropDiff::new(old, |l: &Self| &l.data, &self.data);
        if let Some(old) = old {
            diff.prop("radius", old.radius != self.radius)
                .prop("coverage", old.coverage != self.coverage)
                .prop("color_range", old.color_range != self.color_range)
                .prop("lower_percentile", old.lower_percentile != self.lower_percentile)
                .prop("upper_percentile", old.upper_percentile != self.upper_percentile);
        }
        diff.finish()
    }

    fn render_layers(&self, state: &LayerState, _ctx: &LayerContext<'_>) -> anyhow::Result<Vec<LayerNode>> {
        let Some(kind) = state.kind::<HexagonState>() else {
            return Ok(Vec::new());
        };
        let cells = HexagonCellLayer::new(self.props().sublayer("hexagon-cell"), Rc::clone(&kind.bins), kind.radius)
            .coverage(self.coverage);
        Ok(vec![LayerNode::layer(cells)])
    }
}
