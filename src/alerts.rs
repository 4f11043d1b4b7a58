//! Alert creation and rate limiting.
//!
//! Decides, per (trip, road) pair, whether enough time has passed since
//! the last alert to issue a new one, and owns the append-only per-trip
//! alert history. This is independent of the scheduler's per-job
//! `alert_sent` flag: the flag stops one job instance from alerting
//! twice, the cooldown here stops any caller from re-alerting the same
//! trip+road too soon. Both stay active.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::MonitorError;
use crate::models::{AlertAction, Route, TrafficAlert, Trip};

/// Ephemeral record of an issued alert, used only for the cooldown.
#[derive(Debug, Clone)]
struct RateLimitEntry {
    trip_id: String,
    route_name: String,
    timestamp: OffsetDateTime,
}

/// Alert store and rate limiter shared by the scheduler and orchestrator.
pub struct AlertService {
    /// Append-only alert history per trip id
    history: Arc<RwLock<HashMap<String, Vec<TrafficAlert>>>>,
    /// Recent alert records for cooldown enforcement; pruned continuously
    recent_entries: Arc<RwLock<Vec<RateLimitEntry>>>,
    /// Cooldown window between alerts for the same (trip, road) pair
    cooldown: Duration,
}

impl Clone for AlertService {
    fn clone(&self) -> Self {
        Self {
            history: self.history.clone(),
            recent_entries: self.recent_entries.clone(),
            cooldown: self.cooldown,
        }
    }
}

impl AlertService {
    pub fn new(cooldown_minutes: i64) -> Self {
        Self {
            history: Arc::new(RwLock::new(HashMap::new())),
            recent_entries: Arc::new(RwLock::new(Vec::new())),
            cooldown: Duration::minutes(cooldown_minutes),
        }
    }

    /// Whether a new alert for this (trip, road) pair is admissible now.
    pub fn should_create_alert(&self, trip_id: &str, route_name: &str) -> bool {
        self.should_create_alert_at(trip_id, route_name, OffsetDateTime::now_utc())
    }

    /// Clock-injected variant of `should_create_alert`.
    pub fn should_create_alert_at(
        &self,
        trip_id: &str,
        route_name: &str,
        now: OffsetDateTime,
    ) -> bool {
        let entries = self.recent_entries.read();
        !entries.iter().any(|entry| {
            entry.trip_id == trip_id
                && entry.route_name == route_name
                && now - entry.timestamp < self.cooldown
        })
    }

    /// Builds an alert for a threshold breach, appends it to the trip's
    /// history and records a rate-limit entry.
    ///
    /// # Errors
    /// Returns a validation error when the trip or triggering route is
    /// missing its id or name.
    pub fn create_alert(
        &self,
        trip: &Trip,
        triggering_route: &Route,
        all_routes: &[Route],
        reason: &str,
    ) -> Result<TrafficAlert, MonitorError> {
        if trip.id.trim().is_empty() || trip.name.trim().is_empty() {
            return Err(MonitorError::Validation(
                "Trip must have a non-empty id and name".to_string(),
            ));
        }
        if triggering_route.id.trim().is_empty() || triggering_route.name.trim().is_empty() {
            return Err(MonitorError::Validation(
                "Route must have a non-empty id and name".to_string(),
            ));
        }

        let now = OffsetDateTime::now_utc();
        let alert = TrafficAlert {
            id: Uuid::new_v4().to_string(),
            trip_id: trip.id.clone(),
            timestamp: now,
            triggered_by: triggering_route.name.clone(),
            delay_minutes: ((triggering_route.delay as f64) / 60.0).round() as i64,
            reason: reason.to_string(),
            routes: all_routes.to_vec(),
            user_action: None,
        };

        self.history
            .write()
            .entry(trip.id.clone())
            .or_default()
            .push(alert.clone());

        {
            let mut entries = self.recent_entries.write();
            entries.push(RateLimitEntry {
                trip_id: trip.id.clone(),
                route_name: triggering_route.name.clone(),
                timestamp: now,
            });
            // Entries older than twice the cooldown have no effect on any
            // future admission check; drop them to bound memory
            let horizon = self.cooldown * 2;
            entries.retain(|entry| now - entry.timestamp < horizon);
        }

        log::info!(
            "Alert created for trip {} via {}: {}",
            trip.id,
            triggering_route.name,
            reason
        );
        Ok(alert)
    }

    /// Alert history for a trip, newest first.
    pub fn get_alert_history(&self, trip_id: &str) -> Vec<TrafficAlert> {
        let mut alerts = self
            .history
            .read()
            .get(trip_id)
            .cloned()
            .unwrap_or_default();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts
    }

    /// Records the user's response to an alert. Returns the updated alert
    /// or None when no alert with that id exists.
    pub fn update_alert_action(&self, alert_id: &str, action: AlertAction) -> Option<TrafficAlert> {
        let mut history = self.history.write();
        for alerts in history.values_mut() {
            if let Some(alert) = alerts.iter_mut().find(|a| a.id == alert_id) {
                alert.user_action = Some(action);
                return Some(alert.clone());
            }
        }
        None
    }

    /// Total number of alerts across all trips.
    pub fn total_alert_count(&self) -> usize {
        self.history.read().values().map(Vec::len).sum()
    }

    #[cfg(test)]
    fn backdate_entries(&self, by: Duration) {
        let mut entries = self.recent_entries.write();
        for entry in entries.iter_mut() {
            entry.timestamp -= by;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AlertThreshold, Location, RouteStatus, Schedule, ThresholdKind,
    };

    fn test_trip() -> Trip {
        let now = OffsetDateTime::now_utc();
        Trip {
            id: "trip-1".to_string(),
            user_id: "user-1".to_string(),
            name: "Home to Station".to_string(),
            origin: Location {
                latitude: 51.2689,
                longitude: 0.1845,
                address: "Home".to_string(),
                name: None,
            },
            destination: Location {
                latitude: 51.2737,
                longitude: 0.1887,
                address: "Station".to_string(),
                name: None,
            },
            schedule: Schedule {
                days: vec![1, 2, 3, 4, 5],
                window_start: "07:30".to_string(),
                window_end: "08:30".to_string(),
            },
            alert_threshold: AlertThreshold {
                kind: ThresholdKind::Minutes,
                value: 10.0,
            },
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn test_route(name: &str) -> Route {
        Route {
            id: "route_1".to_string(),
            name: name.to_string(),
            distance: 5_000,
            static_duration: 600,
            current_duration: 1200,
            delay: 600,
            delay_percentage: 100.0,
            status: RouteStatus::Heavy,
            reason: Some("Accident".to_string()),
        }
    }

    #[test]
    fn create_alert_records_history_and_rate_limit() {
        let service = AlertService::new(15);
        let trip = test_trip();
        let route = test_route("A21 (London Road)");

        assert!(service.should_create_alert(&trip.id, &route.name));
        let alert = service
            .create_alert(&trip, &route, std::slice::from_ref(&route), "10 min delay")
            .unwrap();
        assert_eq!(alert.delay_minutes, 10);
        assert_eq!(alert.triggered_by, "A21 (London Road)");

        // Same pair is now rate limited, a different road is not
        assert!(!service.should_create_alert(&trip.id, &route.name));
        assert!(service.should_create_alert(&trip.id, "A25 (High Street)"));

        let history = service.get_alert_history(&trip.id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, alert.id);
    }

    #[test]
    fn cooldown_expires_after_window() {
        let service = AlertService::new(15);
        let trip = test_trip();
        let route = test_route("A21 (London Road)");
        service
            .create_alert(&trip, &route, std::slice::from_ref(&route), "delay")
            .unwrap();

        let now = OffsetDateTime::now_utc();
        assert!(!service.should_create_alert_at(&trip.id, &route.name, now + Duration::minutes(14)));
        assert!(service.should_create_alert_at(&trip.id, &route.name, now + Duration::minutes(16)));
    }

    #[test]
    fn stale_entries_are_pruned_on_creation() {
        let service = AlertService::new(15);
        let trip = test_trip();
        let route = test_route("A21 (London Road)");
        service
            .create_alert(&trip, &route, std::slice::from_ref(&route), "first")
            .unwrap();

        // Age the entry beyond twice the cooldown, then create another
        // alert for a different road to trigger pruning
        service.backdate_entries(Duration::minutes(31));
        let other = test_route("A25 (High Street)");
        service
            .create_alert(&trip, &other, std::slice::from_ref(&other), "second")
            .unwrap();

        assert_eq!(service.recent_entries.read().len(), 1);
        // The aged pair is admissible again
        assert!(service.should_create_alert(&trip.id, "A21 (London Road)"));
    }

    #[test]
    fn create_alert_validates_identity() {
        let service = AlertService::new(15);
        let mut trip = test_trip();
        trip.id = String::new();
        let route = test_route("A21 (London Road)");
        let result = service.create_alert(&trip, &route, &[], "reason");
        assert!(matches!(result, Err(MonitorError::Validation(_))));

        let trip = test_trip();
        let mut route = test_route("A21 (London Road)");
        route.name = String::new();
        let result = service.create_alert(&trip, &route, &[], "reason");
        assert!(matches!(result, Err(MonitorError::Validation(_))));
    }

    #[test]
    fn update_alert_action_mutates_only_that_field() {
        let service = AlertService::new(15);
        let trip = test_trip();
        let route = test_route("A21 (London Road)");
        let alert = service
            .create_alert(&trip, &route, std::slice::from_ref(&route), "delay")
            .unwrap();

        let updated = service
            .update_alert_action(&alert.id, AlertAction::NavigatedAlternative)
            .unwrap();
        assert_eq!(updated.user_action, Some(AlertAction::NavigatedAlternative));
        assert_eq!(updated.reason, alert.reason);

        assert!(service.update_alert_action("missing", AlertAction::Dismissed).is_none());
    }
}
