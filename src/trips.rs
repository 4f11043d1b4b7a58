//! Trip store. Collaborator glue around the engine: in-memory CRUD plus
//! the schedule-window query the orchestrator scans with.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::MonitorError;
use crate::models::{AlertThreshold, Location, Schedule, Trip, UpdateTripRequest};

pub struct TripStore {
    trips: Arc<RwLock<HashMap<String, Trip>>>,
}

impl Clone for TripStore {
    fn clone(&self) -> Self {
        Self {
            trips: self.trips.clone(),
        }
    }
}

impl Default for TripStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TripStore {
    pub fn new() -> Self {
        Self {
            trips: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn create_trip(
        &self,
        user_id: &str,
        name: &str,
        origin: Location,
        destination: Location,
        schedule: Schedule,
        alert_threshold: AlertThreshold,
    ) -> Result<Trip, MonitorError> {
        if name.trim().is_empty() {
            return Err(MonitorError::Validation("Trip name is required".to_string()));
        }
        if user_id.trim().is_empty() {
            return Err(MonitorError::Validation("Trip owner is required".to_string()));
        }
        if alert_threshold.value <= 0.0 {
            return Err(MonitorError::Validation(
                "Alert threshold value must be positive".to_string(),
            ));
        }
        if schedule.days.iter().any(|d| *d > 6) {
            return Err(MonitorError::Validation(
                "Schedule days must be between 0 and 6".to_string(),
            ));
        }

        let now = OffsetDateTime::now_utc();
        let trip = Trip {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.trim().to_string(),
            origin,
            destination,
            schedule,
            alert_threshold,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.trips.write().insert(trip.id.clone(), trip.clone());
        Ok(trip)
    }

    pub fn get_trip(&self, trip_id: &str) -> Option<Trip> {
        self.trips.read().get(trip_id).cloned()
    }

    pub fn trips_for_user(&self, user_id: &str) -> Vec<Trip> {
        let mut trips: Vec<Trip> = self
            .trips
            .read()
            .values()
            .filter(|trip| trip.user_id == user_id)
            .cloned()
            .collect();
        trips.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        trips
    }

    pub fn all_trips(&self) -> Vec<Trip> {
        self.trips.read().values().cloned().collect()
    }

    /// Edits a trip in place. Absent request fields are left unchanged.
    /// A job started before the edit keeps the trip data it captured.
    pub fn update_trip(
        &self,
        trip_id: &str,
        updates: UpdateTripRequest,
    ) -> Result<Trip, MonitorError> {
        if let Some(name) = &updates.name {
            if name.trim().is_empty() {
                return Err(MonitorError::Validation("Trip name is required".to_string()));
            }
        }
        if let Some(threshold) = &updates.alert_threshold {
            if threshold.value <= 0.0 {
                return Err(MonitorError::Validation(
                    "Alert threshold value must be positive".to_string(),
                ));
            }
        }
        if let Some(schedule) = &updates.schedule {
            if schedule.days.iter().any(|d| *d > 6) {
                return Err(MonitorError::Validation(
                    "Schedule days must be between 0 and 6".to_string(),
                ));
            }
        }

        let mut trips = self.trips.write();
        let trip = trips
            .get_mut(trip_id)
            .ok_or_else(|| MonitorError::NotFound(format!("Trip {} not found", trip_id)))?;

        if let Some(name) = updates.name {
            trip.name = name.trim().to_string();
        }
        if let Some(origin) = updates.origin {
            trip.origin = origin;
        }
        if let Some(destination) = updates.destination {
            trip.destination = destination;
        }
        if let Some(schedule) = updates.schedule {
            trip.schedule = schedule;
        }
        if let Some(threshold) = updates.alert_threshold {
            trip.alert_threshold = threshold;
        }
        if let Some(is_active) = updates.is_active {
            trip.is_active = is_active;
        }
        trip.updated_at = OffsetDateTime::now_utc();
        Ok(trip.clone())
    }

    /// Flips a trip's active flag. Returns the updated trip, or None when
    /// the trip does not exist.
    pub fn set_active(&self, trip_id: &str, is_active: bool) -> Option<Trip> {
        let mut trips = self.trips.write();
        let trip = trips.get_mut(trip_id)?;
        trip.is_active = is_active;
        trip.updated_at = OffsetDateTime::now_utc();
        Some(trip.clone())
    }

    /// Active trips whose monitoring window (schedule window plus lead
    /// time) is open at the given instant.
    pub fn active_trips_at(&self, now: OffsetDateTime, lead_minutes: u16) -> Vec<Trip> {
        let weekday = now.weekday().number_days_from_sunday();
        let minute_of_day = now.hour() as u16 * 60 + now.minute() as u16;
        self.trips
            .read()
            .values()
            .filter(|trip| trip.is_active)
            .filter(|trip| trip.schedule.is_open_at(weekday, minute_of_day, lead_minutes))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThresholdKind;
    use time::macros::datetime;

    fn location(address: &str) -> Location {
        Location {
            latitude: 51.27,
            longitude: 0.19,
            address: address.to_string(),
            name: None,
        }
    }

    fn weekday_schedule(start: &str, end: &str) -> Schedule {
        Schedule {
            days: vec![1, 2, 3, 4, 5],
            window_start: start.to_string(),
            window_end: end.to_string(),
        }
    }

    fn threshold() -> AlertThreshold {
        AlertThreshold {
            kind: ThresholdKind::Minutes,
            value: 10.0,
        }
    }

    #[test]
    fn create_and_fetch_trip() {
        let store = TripStore::new();
        let trip = store
            .create_trip(
                "user-1",
                "  Home to Station  ",
                location("Home"),
                location("Station"),
                weekday_schedule("07:30", "08:30"),
                threshold(),
            )
            .unwrap();
        assert_eq!(trip.name, "Home to Station");
        assert!(trip.is_active);
        assert_eq!(store.get_trip(&trip.id).unwrap().id, trip.id);
        assert_eq!(store.trips_for_user("user-1").len(), 1);
    }

    #[test]
    fn create_trip_validates_input() {
        let store = TripStore::new();
        assert!(store
            .create_trip(
                "user-1",
                "",
                location("Home"),
                location("Station"),
                weekday_schedule("07:30", "08:30"),
                threshold(),
            )
            .is_err());

        let mut bad_threshold = threshold();
        bad_threshold.value = 0.0;
        assert!(store
            .create_trip(
                "user-1",
                "Trip",
                location("Home"),
                location("Station"),
                weekday_schedule("07:30", "08:30"),
                bad_threshold,
            )
            .is_err());

        let mut bad_schedule = weekday_schedule("07:30", "08:30");
        bad_schedule.days = vec![7];
        assert!(store
            .create_trip(
                "user-1",
                "Trip",
                location("Home"),
                location("Station"),
                bad_schedule,
                threshold(),
            )
            .is_err());
    }

    #[test]
    fn update_trip_applies_partial_edits() {
        let store = TripStore::new();
        let trip = store
            .create_trip(
                "user-1",
                "Commute",
                location("Home"),
                location("Station"),
                weekday_schedule("07:30", "08:30"),
                threshold(),
            )
            .unwrap();

        let updated = store
            .update_trip(
                &trip.id,
                UpdateTripRequest {
                    name: Some("Morning commute".to_string()),
                    alert_threshold: Some(AlertThreshold {
                        kind: ThresholdKind::Percentage,
                        value: 25.0,
                    }),
                    ..UpdateTripRequest::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Morning commute");
        assert_eq!(updated.alert_threshold.kind, ThresholdKind::Percentage);
        // Untouched fields keep their values
        assert_eq!(updated.origin.address, "Home");
        assert!(updated.is_active);

        // Validation still applies on edit
        assert!(store
            .update_trip(
                &trip.id,
                UpdateTripRequest {
                    name: Some("   ".to_string()),
                    ..UpdateTripRequest::default()
                },
            )
            .is_err());
        assert!(store
            .update_trip("missing", UpdateTripRequest::default())
            .is_err());
    }

    #[test]
    fn window_query_respects_schedule_and_active_flag() {
        let store = TripStore::new();
        let trip = store
            .create_trip(
                "user-1",
                "Commute",
                location("Home"),
                location("Station"),
                weekday_schedule("08:00", "09:00"),
                threshold(),
            )
            .unwrap();

        // Monday 07:45, inside the 30 minute lead
        let monday_morning = datetime!(2024-03-04 07:45 UTC);
        assert_eq!(store.active_trips_at(monday_morning, 30).len(), 1);

        // Sunday same time: not scheduled
        let sunday = datetime!(2024-03-03 07:45 UTC);
        assert!(store.active_trips_at(sunday, 30).is_empty());

        // Toggled off: excluded
        store.set_active(&trip.id, false);
        assert!(store.active_trips_at(monday_morning, 30).is_empty());
    }
}
