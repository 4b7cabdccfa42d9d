use geodeck_engine::host::OverlayOptions;
use geodeck_engine::logging::LoggingConfig;
use geodeck_engine::view::ViewState;
use winit::dpi::LogicalSize;

/// Everything the studio needs before the window opens.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub initial_view_state: ViewState,
    pub overlay: OverlayOptions,
    /// Seed of the synthetic data set.
    pub seed: u64,
    pub stop_count: usize,
    pub trip_count: usize,
    pub sample_count: usize,
    /// Trip time units per wall-clock second.
    pub trip_speed: f64,
    /// Shown wherever no layer draws.
    pub background: [u8; 4],
    pub logging: LoggingConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            title: "geodeck studio".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            initial_view_state: ViewState::new(-122.42, 37.77, 11.5).with_pitch(30.0),
            overlay: OverlayOptions::default(),
            seed: 7,
            stop_count: 60,
            trip_count: 40,
            sample_count: 4000,
            trip_speed: 30.0,
            background: [18, 22, 30, 255],
            logging: LoggingConfig::with_filter("info,wgpu_core=warn,wgpu_hal=warn,naga=warn"),
        }
    }
}
