use std::sync::Arc;

use preroute::alerts::AlertService;
use preroute::config::MonitorConfig;
use preroute::models::{AlertThreshold, Location, Schedule, ThresholdKind, Trip, User};
use preroute::notify::NotificationDispatcher;
use preroute::orchestrator::Orchestrator;
use preroute::provider::SyntheticRouteApi;
use preroute::scheduler::MonitorScheduler;
use preroute::simulator::TrafficSimulator;
use preroute::traffic::SimulatedTrafficApi;
use preroute::trips::TripStore;
use preroute::users::UserStore;

/// Bradbourne Vale Road, Sevenoaks
pub fn sevenoaks_home() -> Location {
    Location {
        latitude: 51.2689,
        longitude: 0.1845,
        address: "Bradbourne Vale Road, Sevenoaks".to_string(),
        name: Some("Home".to_string()),
    }
}

/// Sevenoaks railway station, about 1 km away
pub fn sevenoaks_station() -> Location {
    Location {
        latitude: 51.2737,
        longitude: 0.1887,
        address: "Sevenoaks Station, Sevenoaks".to_string(),
        name: Some("Sevenoaks Station".to_string()),
    }
}

/// Dartford railway station, about 20 km from Sevenoaks
pub fn dartford_station() -> Location {
    Location {
        latitude: 51.4467,
        longitude: 0.2142,
        address: "Dartford Station, Dartford".to_string(),
        name: Some("Dartford Station".to_string()),
    }
}

/// A schedule open on every day at every time, so window checks never
/// interfere with the behavior under test.
pub fn always_open_schedule() -> Schedule {
    Schedule {
        days: vec![0, 1, 2, 3, 4, 5, 6],
        window_start: "00:00".to_string(),
        window_end: "23:59".to_string(),
    }
}

pub fn minutes_threshold(value: f64) -> AlertThreshold {
    AlertThreshold {
        kind: ThresholdKind::Minutes,
        value,
    }
}

/// Everything a test needs to drive the engine directly.
pub struct TestEngine {
    pub orchestrator: Orchestrator,
    pub scheduler: MonitorScheduler,
    pub trips: TripStore,
    pub users: UserStore,
    pub alerts: AlertService,
    pub dispatcher: NotificationDispatcher,
    pub simulator: Arc<TrafficSimulator>,
    pub config: MonitorConfig,
}

/// Builds an engine over an empty simulator with zero provider latency,
/// so polls are fast and conditions are exactly what the test injects.
pub fn test_engine() -> TestEngine {
    let config = MonitorConfig {
        provider_latency_ms: 0,
        ..MonitorConfig::default()
    };
    test_engine_with(config)
}

pub fn test_engine_with(config: MonitorConfig) -> TestEngine {
    let simulator = Arc::new(TrafficSimulator::empty());
    let alerts = AlertService::new(config.alert_cooldown_minutes);
    let users = UserStore::new();
    let trips = TripStore::new();
    let dispatcher = NotificationDispatcher::new(config.recent_alerts_capacity);

    let scheduler = MonitorScheduler::new(
        Arc::new(SyntheticRouteApi::new(config.clone())),
        Arc::new(SimulatedTrafficApi::new(simulator.clone(), config.clone())),
        alerts.clone(),
        dispatcher.clone(),
        users.clone(),
        config.clone(),
    );

    let orchestrator = Orchestrator::new(
        scheduler.clone(),
        trips.clone(),
        users.clone(),
        alerts.clone(),
        dispatcher.clone(),
        simulator.clone(),
        config.clone(),
    );

    TestEngine {
        orchestrator,
        scheduler,
        trips,
        users,
        alerts,
        dispatcher,
        simulator,
        config,
    }
}

impl TestEngine {
    /// Creates a user with default settings (no quiet hours).
    pub fn user(&self, email: &str, name: &str) -> User {
        self.users
            .create_user(email, name, None)
            .expect("test user should be valid")
    }

    /// Creates an always-active trip from `origin` to `destination`.
    pub fn trip(
        &self,
        user: &User,
        name: &str,
        origin: Location,
        destination: Location,
        threshold: AlertThreshold,
    ) -> Trip {
        self.trips
            .create_trip(
                &user.id,
                name,
                origin,
                destination,
                always_open_schedule(),
                threshold,
            )
            .expect("test trip should be valid")
    }
}
