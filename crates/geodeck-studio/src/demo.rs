//! Synthetic transit data and the layers that show it.

use std::f64::consts::TAU;

use geodeck_engine::layer::PickInfo;
use geodeck_layers::hexagon::HexBin;
use geodeck_layers::prelude::*;

/// Trip timestamps run over `[0, TRIP_LOOP)`.
pub const TRIP_LOOP: f64 = 1800.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub name: String,
    pub position: [f64; 2],
    pub riders: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub from: usize,
    pub to: usize,
    pub source: [f64; 2],
    pub target: [f64; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub vehicle: usize,
    pub path: Vec<[f64; 2]>,
    pub timestamps: Vec<f64>,
}

/// Small deterministic generator, good enough for demo data.
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Roughly normal, mean 0, unit spread.
    fn spread(&mut self) -> f64 {
        (self.next_f64() + self.next_f64() + self.next_f64()) * 2.0 - 3.0
    }

    fn index(&mut self, len: usize) -> usize {
        ((self.next_f64() * len as f64) as usize).min(len.saturating_sub(1))
    }
}

/// Data sets are built once; layers are rebuilt every frame around the same
/// `Rc`s so only the animated trips re-upload.
pub struct DemoData {
    stops: Data<Stop>,
    routes: Data<Route>,
    trips: Data<Trip>,
    samples: Data<[f64; 2]>,
}

impl DemoData {
    pub fn generate(center: [f64; 2], seed: u64, stops: usize, trips: usize, samples: usize) -> Self {
        let mut rng = Lcg(seed);
        let scatter = |rng: &mut Lcg, spread: f64| [center[0] + rng.spread() * spread, center[1] + rng.spread() * spread * 0.8];

        let stop_list: Vec<Stop> = (0..stops)
            .map(|i| Stop {
                name: format!("Stop {i}"),
                position: scatter(&mut rng, 0.04),
                riders: 50.0 + rng.next_f64() * 950.0,
            })
            .collect();

        let routes: Vec<Route> = if stop_list.len() < 2 {
            Vec::new()
        } else {
            (0..stop_list.len())
                .map(|from| {
                    let mut to = rng.index(stop_list.len());
                    if to == from {
                        to = (to + 1) % stop_list.len();
                    }
                    Route {
                        from,
                        to,
                        source: stop_list[from].position,
                        target: stop_list[to].position,
                    }
                })
                .collect()
        };

        let trip_list: Vec<Trip> = if stop_list.is_empty() {
            Vec::new()
        } else {
            (0..trips)
                .map(|vehicle| {
                    let legs = 3 + rng.index(5);
                    let start = rng.next_f64() * TRIP_LOOP * 0.5;
                    let mut time = start;
                    let mut path = Vec::with_capacity(legs + 1);
                    let mut timestamps = Vec::with_capacity(legs + 1);
                    for _ in 0..=legs {
                        path.push(stop_list[rng.index(stop_list.len())].position);
                        timestamps.push(time);
                        time += 60.0 + rng.next_f64() * 180.0;
                    }
                    Trip { vehicle, path, timestamps }
                })
                .collect()
        };

        // Samples cluster around a few hot spots.
        let hot_spots: Vec<[f64; 2]> = (0..5).map(|_| scatter(&mut rng, 0.03)).collect();
        let sample_list = (0..samples)
            .map(|_| {
                let spot = hot_spots[rng.index(hot_spots.len())];
                let angle = rng.next_f64() * TAU;
                let r = rng.spread().abs() * 0.008;
                [spot[0] + angle.cos() * r, spot[1] + angle.sin() * r]
            })
            .collect();

        log::info!(
            "demo data: {} stops, {} routes, {} trips, {} samples",
            stop_list.len(),
            routes.len(),
            trip_list.len(),
            samples
        );
        Self {
            stops: Rc::new(stop_list),
            routes: Rc::new(routes),
            trips: Rc::new(trip_list),
            samples: Rc::new(sample_list),
        }
    }

    /// Layers for wall-clock `seconds` since start.
    pub fn layers(&self, seconds: f64, trip_speed: f64) -> LayerList {
        let current_time = (seconds * trip_speed).rem_euclid(TRIP_LOOP);
        LayerList::new(vec![
            LayerNode::layer(
                HexagonLayer::new(LayerProps::new("density").pickable(true).opacity(0.6), Rc::clone(&self.samples), |p: &[f64; 2]| *p)
                    .radius(250.0)
                    .coverage(0.9)
                    .upper_percentile(98.0),
            ),
            LayerNode::layer(
                ArcLayer::new(
                    LayerProps::new("routes").pickable(true),
                    Rc::clone(&self.routes),
                    |r: &Route| r.source,
                    |r: &Route| r.target,
                )
                .get_source_color(|_| [0, 128, 200, 200])
                .get_target_color(|_| [200, 0, 80, 200])
                .get_width(|_| 1.5)
                .get_height(|_| 0.4)
                .segments(24),
            ),
            LayerNode::layer(
                TripsLayer::new(
                    LayerProps::new("trips"),
                    Rc::clone(&self.trips),
                    |t: &Trip| t.path.clone(),
                    |t: &Trip| t.timestamps.clone(),
                )
                .get_color(|_| [253, 128, 93, 255])
                .get_width(|_| 3.0)
                .trail_length(180.0)
                .current_time(current_time),
            ),
            LayerNode::layer(
                ScatterplotLayer::new(
                    LayerProps::new("stops").pickable(true).auto_highlight(true),
                    Rc::clone(&self.stops),
                    |s: &Stop| s.position,
                )
                .get_radius(|s| s.riders)
                .radius_scale(0.2)
                .radius_min_pixels(3.0)
                .radius_max_pixels(14.0)
                .get_fill_color(|_| [255, 200, 0, 230]),
            ),
        ])
    }
}

/// One-line summary of a pick for the log.
pub fn describe(info: &PickInfo) -> String {
    let layer = info.layer_id.as_deref().unwrap_or("?");
    if let Some(stop) = info.object_as::<Stop>() {
        format!("{layer}: {} ({:.0} riders)", stop.name, stop.riders)
    } else if let Some(route) = info.object_as::<Route>() {
        format!("{layer}: route {} -> {}", route.from, route.to)
    } else if let Some(bin) = info.object_as::<HexBin>() {
        format!("{layer}: {} samples around {:.4}, {:.4}", bin.count, bin.center[0], bin.center[1])
    } else if let Some(trip) = info.object_as::<Trip>() {
        format!("{layer}: vehicle {}", trip.vehicle)
    } else {
        format!("{layer}: #{}", info.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> DemoData {
        DemoData::generate([-122.42, 37.77], 7, 20, 10, 500)
    }

    #[test]
    fn generation_is_deterministic() {
        let (a, b) = (data(), data());
        assert_eq!(*a.stops, *b.stops);
        assert_eq!(*a.trips, *b.trips);
        assert_eq!(a.samples.len(), 500);
    }

    #[test]
    fn routes_never_loop_on_one_stop() {
        let d = data();
        assert_eq!(d.routes.len(), 20);
        assert!(d.routes.iter().all(|r| r.from != r.to));
    }

    #[test]
    fn trip_timestamps_increase() {
        let d = data();
        for trip in d.trips.iter() {
            assert_eq!(trip.path.len(), trip.timestamps.len());
            assert!(trip.timestamps.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn empty_stops_yield_no_routes_or_trips() {
        let d = DemoData::generate([0.0, 0.0], 1, 0, 5, 0);
        assert!(d.routes.is_empty());
        assert!(d.trips.is_empty());
    }

    #[test]
    fn layers_share_the_data() {
        let d = data();
        let list = d.layers(1.0, 30.0);
        let ids: Vec<String> = list.flatten().iter().map(|l| l.id().to_string()).collect();
        assert_eq!(ids, ["density", "routes", "trips", "stops"]);
        assert_eq!(Rc::strong_count(&d.stops), 2);
    }

    #[test]
    fn picks_are_described_by_their_object() {
        let d = data();
        let mut info = PickInfo::empty(0.0, 0.0);
        info.layer_id = Some("stops".into());
        info.object = Some(Rc::new(d.stops[3].clone()));
        assert!(describe(&info).starts_with("stops: Stop 3"));

        info.object = None;
        info.index = 4;
        assert_eq!(describe(&info), "stops: #4");
    }
}
