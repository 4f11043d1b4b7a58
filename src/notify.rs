//! Notification dispatch.
//!
//! Decides whether a user's quiet-hours window suppresses delivery, then
//! formats and "delivers" the alert (structured log; a real transport
//! would hang off here). Delivered alerts are kept in an explicit
//! bounded ring buffer for display, injected into whoever needs to read
//! it rather than living in ambient global state.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::{local_now, parse_hhmm, QuietHours, TrafficAlert, Trip, User};

/// Formats and delivers alerts, subject to the user's quiet hours.
pub struct NotificationDispatcher {
    /// Most recently delivered alerts, newest first, bounded
    recent: Arc<RwLock<VecDeque<TrafficAlert>>>,
    capacity: usize,
}

impl Clone for NotificationDispatcher {
    fn clone(&self) -> Self {
        Self {
            recent: self.recent.clone(),
            capacity: self.capacity,
        }
    }
}

impl NotificationDispatcher {
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            recent: Arc::new(RwLock::new(VecDeque::with_capacity(recent_capacity))),
            capacity: recent_capacity,
        }
    }

    /// Delivers an alert to a user unless suppressed.
    ///
    /// Returns false without delivering when the user's quiet hours cover
    /// the current time or the user has no usable email address. Both are
    /// expected outcomes, not errors.
    pub fn send_notification(&self, user: &User, trip: &Trip, alert: &TrafficAlert) -> bool {
        let now = local_now();
        let minute_of_day = now.hour() as u16 * 60 + now.minute() as u16;
        self.send_notification_at(user, trip, alert, minute_of_day)
    }

    /// Clock-injected variant of `send_notification`; `minute_of_day` is
    /// minutes since local midnight.
    pub fn send_notification_at(
        &self,
        user: &User,
        trip: &Trip,
        alert: &TrafficAlert,
        minute_of_day: u16,
    ) -> bool {
        if let Some(quiet) = &user.settings.quiet_hours {
            if in_quiet_hours(quiet, minute_of_day) {
                log::info!(
                    "Notification suppressed due to quiet hours for user {}",
                    user.email
                );
                return false;
            }
        }

        if user.email.trim().is_empty() {
            log::warn!("Cannot send notification: user {} has no email", user.id);
            return false;
        }

        self.log_notification(user, trip, alert);
        self.push_recent(alert.clone());
        true
    }

    /// Delivered alerts, newest first.
    pub fn recent_alerts(&self) -> Vec<TrafficAlert> {
        self.recent.read().iter().cloned().collect()
    }

    fn push_recent(&self, alert: TrafficAlert) {
        let mut recent = self.recent.write();
        recent.push_front(alert);
        recent.truncate(self.capacity);
    }

    fn log_notification(&self, user: &User, trip: &Trip, alert: &TrafficAlert) {
        log::info!("TRAFFIC ALERT for {} ({})", user.name, user.email);
        log::info!(
            "  Trip: {} | {} minute delay via {}",
            trip.name,
            alert.delay_minutes,
            alert.triggered_by
        );
        log::info!("  Reason: {}", alert.reason);
        log::info!(
            "  From: {} To: {}",
            trip.origin.address,
            trip.destination.address
        );

        if alert.routes.len() > 1 {
            log::info!("  Alternative routes:");
            for (i, route) in alert.routes.iter().enumerate() {
                let delay_text = if route.delay > 0 {
                    format!("+{}min ({:?})", (route.delay as f64 / 60.0).round() as i64, route.status)
                } else {
                    "Clear".to_string()
                };
                log::info!("    {}. {}: {}", i + 1, route.name, delay_text);
            }
        }

        log::info!(
            "  Recommended action: open {}",
            user.settings.default_nav_app
        );
    }
}

/// Whether `minute_of_day` falls inside a quiet-hours window. A window
/// whose start is later than its end wraps midnight.
pub fn in_quiet_hours(quiet: &QuietHours, minute_of_day: u16) -> bool {
    if !quiet.enabled {
        return false;
    }
    let (start, end) = match (parse_hhmm(&quiet.start), parse_hhmm(&quiet.end)) {
        (Some(s), Some(e)) => (s, e),
        _ => return false,
    };
    if start > end {
        minute_of_day >= start || minute_of_day <= end
    } else {
        minute_of_day >= start && minute_of_day <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AlertThreshold, Location, Route, RouteStatus, Schedule, ThresholdKind, UserSettings,
    };
    use time::OffsetDateTime;

    fn quiet(enabled: bool, start: &str, end: &str) -> QuietHours {
        QuietHours {
            enabled,
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    fn test_user(email: &str, quiet_hours: Option<QuietHours>) -> User {
        User {
            id: "user-1".to_string(),
            email: email.to_string(),
            name: "Alex Kent".to_string(),
            created_at: OffsetDateTime::now_utc(),
            settings: UserSettings {
                default_nav_app: "waze".to_string(),
                quiet_hours,
            },
        }
    }

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
                days: vec![1],
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

    fn test_alert(routes: Vec<Route>) -> TrafficAlert {
        TrafficAlert {
            id: "alert-1".to_string(),
            trip_id: "trip-1".to_string(),
            timestamp: OffsetDateTime::now_utc(),
            triggered_by: "A21 (London Road)".to_string(),
            delay_minutes: 12,
            reason: "12 min delay via A21 (London Road)".to_string(),
            routes,
            user_action: None,
        }
    }

    fn test_route(delay: i64) -> Route {
        Route {
            id: "route_1".to_string(),
            name: "A21 (London Road)".to_string(),
            distance: 5_000,
            static_duration: 600,
            current_duration: 600 + delay,
            delay,
            delay_percentage: delay as f64 / 6.0,
            status: RouteStatus::Clear,
            reason: None,
        }
    }

    #[test]
    fn quiet_hours_wrap_midnight() {
        let q = quiet(true, "22:00", "07:00");
        // 23:30 is inside the wrapped window
        assert!(in_quiet_hours(&q, 23 * 60 + 30));
        // 03:00 as well
        assert!(in_quiet_hours(&q, 3 * 60));
        // Midday is outside
        assert!(!in_quiet_hours(&q, 12 * 60));
        // Boundaries are inclusive
        assert!(in_quiet_hours(&q, 22 * 60));
        assert!(in_quiet_hours(&q, 7 * 60));
    }

    #[test]
    fn quiet_hours_plain_window() {
        let q = quiet(true, "12:00", "14:00");
        assert!(in_quiet_hours(&q, 13 * 60));
        assert!(!in_quiet_hours(&q, 11 * 60));
        assert!(!in_quiet_hours(&q, 15 * 60));
    }

    #[test]
    fn disabled_or_malformed_quiet_hours_never_suppress() {
        assert!(!in_quiet_hours(&quiet(false, "22:00", "07:00"), 23 * 60));
        assert!(!in_quiet_hours(&quiet(true, "late", "07:00"), 23 * 60));
    }

    #[test]
    fn suppresses_during_quiet_hours_and_without_email() {
        let dispatcher = NotificationDispatcher::new(10);
        let trip = test_trip();
        let alert = test_alert(vec![test_route(720)]);

        let quiet_user = test_user("alex@example.co.uk", Some(quiet(true, "22:00", "07:00")));
        assert!(!dispatcher.send_notification_at(&quiet_user, &trip, &alert, 23 * 60 + 30));
        assert!(dispatcher.send_notification_at(&quiet_user, &trip, &alert, 12 * 60));

        let no_email = test_user("  ", None);
        assert!(!dispatcher.send_notification_at(&no_email, &trip, &alert, 12 * 60));

        // Only the one delivery landed in the ring buffer
        assert_eq!(dispatcher.recent_alerts().len(), 1);
    }

    #[test]
    fn recent_buffer_is_bounded_newest_first() {
        let dispatcher = NotificationDispatcher::new(3);
        let user = test_user("alex@example.co.uk", None);
        let trip = test_trip();

        for i in 0..5 {
            let mut alert = test_alert(vec![test_route(600)]);
            alert.id = format!("alert-{}", i);
            assert!(dispatcher.send_notification_at(&user, &trip, &alert, 12 * 60));
        }

        let recent = dispatcher.recent_alerts();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].id, "alert-4");
        assert_eq!(recent[2].id, "alert-2");
    }
}
