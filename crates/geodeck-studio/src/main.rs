//! geodeck studio: demo layers over a simulated slippy map.
//!
//! Left-drag pans, right-drag rotates and pitches, the wheel zooms. Hovered
//! and clicked objects are logged.

mod app;
mod config;
mod demo;
mod gpu;
mod map;

use geodeck_engine::logging::init_logging;

use crate::config::StudioConfig;
use crate::gpu::PresentOptions;

fn main() -> anyhow::Result<()> {
    let config = StudioConfig::default();
    init_logging(config.logging.clone());

    log::info!(
        "{} starting at {:.3}, {:.3} zoom {}",
        config.title,
        config.initial_view_state.longitude,
        config.initial_view_state.latitude,
        config.initial_view_state.zoom
    );
    app::run(config, PresentOptions::default())
}
