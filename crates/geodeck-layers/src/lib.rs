//! Concrete layer kinds on top of `geodeck-engine`.
//!
//! Every layer takes its data as `Rc<Vec<T>>` plus plain closures reading
//! positions, colours and sizes out of each datum. Replacing the `Rc` marks the
//! data as changed; a new closure only counts as a change when the matching
//! `update_triggers` entry moves.
//!
//! ```rust,ignore
//! use geodeck_layers::prelude::*;
//!
//! let stops = Rc::new(vec![([-122.4, 37.8], 120.0)]);
//! let layer = ScatterplotLayer::new(LayerProps::new("stops").pickable(true), stops, |d| d.0)
//!     .get_radius(|d| d.1)
//!     .get_fill_color(|_| [255, 140, 0, 255]);
//! ```

mod common;

pub mod arc;
pub mod hexagon;
pub mod path;
pub mod polygon;
pub mod scatterplot;
pub mod trips;

#[cfg(test)]
mod testing;

pub use common::{Accessor, Color, Data};

pub mod prelude {
    pub use crate::arc::ArcLayer;
    pub use crate::common::{Accessor, Color, Data};
    pub use crate::hexagon::{HexBin, HexagonCellLayer, HexagonLayer};
    pub use crate::path::PathLayer;
    pub use crate::polygon::PolygonLayer;
    pub use crate::scatterplot::ScatterplotLayer;
    pub use crate::trips::TripsLayer;

    pub use geodeck_engine::layer::{LayerList, LayerNode, LayerProps};
    pub use std::rc::Rc;
}
