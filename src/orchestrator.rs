//! Orchestration layer tying the stores, simulator and scheduler
//! together.
//!
//! Runs two background loops: a scan loop that starts monitoring jobs
//! for active trips entering their schedule window, and a recheck loop
//! that re-polls running jobs between their scheduled polls. Also the
//! home of demo seeding, scenario injection and the aggregate status
//! snapshot used by the dashboard.

use std::sync::Arc;

use tokio::sync::watch;

use crate::alerts::AlertService;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::models::{
    local_now, AlertAction, AlertThreshold, RoadCondition, Schedule, SystemStatus, ThresholdKind,
    TrafficAlert, Trip,
};
use crate::notify::NotificationDispatcher;
use crate::roads::demo_locations;
use crate::scheduler::{evaluate_threshold, MonitorScheduler};
use crate::simulator::TrafficSimulator;
use crate::trips::TripStore;
use crate::users::UserStore;

pub struct Orchestrator {
    scheduler: MonitorScheduler,
    trips: TripStore,
    users: UserStore,
    alerts: AlertService,
    dispatcher: NotificationDispatcher,
    simulator: Arc<TrafficSimulator>,
    config: MonitorConfig,
    shutdown_tx: watch::Sender<bool>,
}

impl Clone for Orchestrator {
    fn clone(&self) -> Self {
        // Clone just shares the Arc references, ensuring all clones
        // operate on the same underlying data
        Self {
            scheduler: self.scheduler.clone(),
            trips: self.trips.clone(),
            users: self.users.clone(),
            alerts: self.alerts.clone(),
            dispatcher: self.dispatcher.clone(),
            simulator: self.simulator.clone(),
            config: self.config.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }
}

impl Orchestrator {
    pub fn new(
        scheduler: MonitorScheduler,
        trips: TripStore,
        users: UserStore,
        alerts: AlertService,
        dispatcher: NotificationDispatcher,
        simulator: Arc<TrafficSimulator>,
        config: MonitorConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            scheduler,
            trips,
            users,
            alerts,
            dispatcher,
            simulator,
            config,
            shutdown_tx,
        }
    }

    pub fn scheduler(&self) -> &MonitorScheduler {
        &self.scheduler
    }

    pub fn trips(&self) -> &TripStore {
        &self.trips
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn simulator(&self) -> &TrafficSimulator {
        &self.simulator
    }

    /// Most recently delivered alerts, newest first.
    pub fn recent_alerts(&self) -> Vec<TrafficAlert> {
        self.dispatcher.recent_alerts()
    }

    /// Starts the background loops. Called once at boot; the loops run
    /// until `shutdown` is invoked.
    pub fn start(&self) {
        self.simulator
            .start_background_tick(std::time::Duration::from_secs(
                self.config.simulator_tick_secs,
            ));
        self.spawn_scan_loop();
        self.spawn_recheck_loop();
        log::info!(
            "Orchestrator started (scan every {}s, recheck every {}s)",
            self.config.scan_interval_secs,
            self.config.recheck_interval_secs
        );
    }

    /// Signals the background loops to exit and completes every running
    /// monitoring job.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        for job in self.scheduler.get_active_jobs() {
            self.scheduler.stop_monitoring(&job.id);
        }
        log::info!("Orchestrator shut down");
    }

    fn spawn_scan_loop(&self) {
        let orchestrator = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = std::time::Duration::from_secs(self.config.scan_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }
                orchestrator.scan_trips().await;
            }
        });
    }

    fn spawn_recheck_loop(&self) {
        let orchestrator = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = std::time::Duration::from_secs(self.config.recheck_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the immediate first tick; fresh jobs have just polled
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }
                orchestrator.recheck_active_trips().await;
            }
        });
    }

    /// One pass over active trips: any trip inside its schedule window
    /// (with the configured lead time) that has no running job gets one
    /// started. A single trip failing does not stop the scan.
    pub async fn scan_trips(&self) {
        self.scheduler.prune_finished_jobs();
        let now = local_now();
        let due = self
            .trips
            .active_trips_at(now, self.config.monitoring_lead_minutes);
        for trip in due {
            if self.scheduler.has_running_job(&trip.id) {
                continue;
            }
            log::info!("Trip {} entered its monitoring window", trip.name);
            if let Err(e) = self.scheduler.start_monitoring(&trip).await {
                log::error!("Could not start monitoring for trip {}: {}", trip.id, e);
            }
        }
    }

    /// Full threshold re-check across active trips inside their window,
    /// independent of the per-job polling cadence. Every trip is checked
    /// directly, guarded by the alert rate limiter alone; a job's
    /// one-shot flag applies only to its own polling loop, so a fresh
    /// incident on a different road still alerts while a job is live.
    pub async fn recheck_active_trips(&self) {
        let now = local_now();
        let due = self
            .trips
            .active_trips_at(now, self.config.monitoring_lead_minutes);
        for trip in due {
            if let Err(e) = self.handle_traffic_alert(&trip).await {
                log::error!("Recheck failed for trip {}: {}", trip.id, e);
            }
        }
    }

    /// Checks a trip's current traffic directly and raises a rate-limited
    /// alert for the worst-delay breaching route, if any.
    pub async fn handle_traffic_alert(
        &self,
        trip: &Trip,
    ) -> Result<Option<TrafficAlert>, MonitorError> {
        let routes = self.scheduler.get_current_traffic_status(trip).await?;

        // Worst delay wins here, unlike the per-poll first-breach rule
        let mut worst: Option<(crate::models::Route, String)> = None;
        for route in &routes {
            if let Some(hit) =
                evaluate_threshold(std::slice::from_ref(route), &trip.alert_threshold)
            {
                if worst.as_ref().map_or(true, |(w, _)| hit.0.delay > w.delay) {
                    worst = Some(hit);
                }
            }
        }
        let Some((route, reason)) = worst else {
            return Ok(None);
        };

        if !self.alerts.should_create_alert(&trip.id, &route.name) {
            log::debug!(
                "Re-check alert suppressed by cooldown for trip {} via {}",
                trip.id,
                route.name
            );
            return Ok(None);
        }

        let alert = self.alerts.create_alert(trip, &route, &routes, &reason)?;
        match self.users.get_user(&trip.user_id) {
            Some(user) => {
                self.dispatcher.send_notification(&user, trip, &alert);
            }
            None => log::warn!(
                "No user {} for trip {}; alert recorded without notification",
                trip.user_id,
                trip.id
            ),
        }
        Ok(Some(alert))
    }

    /// Injects a traffic scenario and immediately rechecks so any
    /// resulting breach alerts without waiting for a scheduled poll.
    pub async fn simulate_traffic_scenario(
        &self,
        route_name: &str,
        severity: f64,
        reason: &str,
    ) -> Result<Vec<RoadCondition>, MonitorError> {
        self.simulator
            .inject_scenario(route_name, severity, reason)?;
        self.recheck_active_trips().await;
        Ok(self.simulator.current_conditions())
    }

    /// Records the user's response to a delivered alert.
    pub fn handle_alert_action(
        &self,
        alert_id: &str,
        action: AlertAction,
    ) -> Result<TrafficAlert, MonitorError> {
        self.alerts
            .update_alert_action(alert_id, action)
            .ok_or_else(|| MonitorError::NotFound(format!("Alert {} not found", alert_id)))
    }

    pub fn system_status(&self) -> SystemStatus {
        let all_trips = self.trips.all_trips();
        SystemStatus {
            total_users: self.users.user_count(),
            total_trips: all_trips.len(),
            active_trips: all_trips.iter().filter(|t| t.is_active).count(),
            active_jobs: self.scheduler.get_active_jobs().len(),
            total_alerts: self.alerts.total_alert_count(),
            traffic_conditions: self.simulator.current_conditions(),
        }
    }

    /// Seeds demo users and one commute per user. Safe to call on every
    /// boot; existing demo data is left alone.
    pub fn initialize_demo(&self) -> Result<Vec<Trip>, MonitorError> {
        let users = self.users.create_demo_users();
        let locations = demo_locations();

        let commutes = [
            // Bradbourne Vale Road to Sevenoaks Station, weekday mornings
            (0usize, 1usize, "Morning commute to Sevenoaks Station", vec![1, 2, 3, 4, 5], "07:30", "09:00", ThresholdKind::Minutes, 10.0),
            // Rusthall to Tunbridge Wells Central, weekday mornings
            (2, 3, "School run to Tunbridge Wells", vec![1, 2, 3, 4, 5], "08:00", "09:00", ThresholdKind::Percentage, 25.0),
            // Sevenoaks Station to Dartford Station, weekday evenings
            (1, 4, "Evening drive to Dartford", vec![1, 2, 3, 4, 5], "17:00", "18:30", ThresholdKind::Minutes, 15.0),
        ];

        let mut trips = Vec::new();
        for (user, (origin, destination, name, days, start, end, kind, value)) in
            users.iter().zip(commutes)
        {
            if !self.trips.trips_for_user(&user.id).is_empty() {
                continue;
            }
            let trip = self.trips.create_trip(
                &user.id,
                name,
                locations[origin].clone(),
                locations[destination].clone(),
                Schedule {
                    days,
                    window_start: start.to_string(),
                    window_end: end.to_string(),
                },
                AlertThreshold { kind, value },
            )?;
            trips.push(trip);
        }

        if !trips.is_empty() {
            log::info!("Seeded {} demo trips", trips.len());
        }
        Ok(trips)
    }
}
