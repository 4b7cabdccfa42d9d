use std::collections::BTreeMap;

/// Camera record supplied by the host (or tracked internally).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewState {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
    pub altitude: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            longitude: 0.0,
            latitude: 0.0,
            zoom: 11.0,
            pitch: 0.0,
            bearing: 0.0,
            altitude: 1.5,
        }
    }
}

impl ViewState {
    pub fn new(longitude: f64, latitude: f64, zoom: f64) -> Self {
        Self {
            longitude,
            latitude,
            zoom,
            ..Self::default()
        }
    }

    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = bearing;
        self
    }
}

/// A shared view state with optional per-view overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewStates {
    pub shared: ViewState,
    pub by_view: BTreeMap<String, ViewState>,
}

impl ViewStates {
    /// State used by view `view_id`.
    pub fn get(&self, view_id: &str) -> &ViewState {
        self.by_view.get(view_id).unwrap_or(&self.shared)
    }

    /// Overrides the state of one view.
    pub fn set(&mut self, view_id: impl Into<String>, state: ViewState) {
        self.by_view.insert(view_id.into(), state);
    }
}

impl From<ViewState> for ViewStates {
    fn from(shared: ViewState) -> Self {
        Self {
            shared,
            by_view: BTreeMap::new(),
        }
    }
}
