//! Data models for the Pre-Route engine.
//! Defines the core entities shared by the scheduler, providers,
//! alerting and notification components, plus the API request shapes.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Geographic location of a trip endpoint. Immutable value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
    /// Free-text address
    pub address: String,
    /// Optional display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Weekly departure window. Defines when a trip is in scope for monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// Days of week, 0 = Sunday through 6 = Saturday
    pub days: Vec<u8>,
    /// Departure window start, "HH:MM"
    pub window_start: String,
    /// Departure window end, "HH:MM"
    pub window_end: String,
}

impl Schedule {
    /// Whether the monitoring window is open at the given weekday and
    /// minute-of-day, starting `lead_minutes` before the departure window.
    pub fn is_open_at(&self, weekday: u8, minute_of_day: u16, lead_minutes: u16) -> bool {
        if !self.days.contains(&weekday) {
            return false;
        }
        let (start, end) = match (parse_hhmm(&self.window_start), parse_hhmm(&self.window_end)) {
            (Some(s), Some(e)) => (s, e),
            _ => return false,
        };
        let start = start.saturating_sub(lead_minutes);
        if start > end {
            // Window wraps midnight
            minute_of_day >= start || minute_of_day <= end
        } else {
            minute_of_day >= start && minute_of_day <= end
        }
    }
}

/// Current wall-clock time in the server's local offset, falling back to
/// UTC when the local offset cannot be determined.
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Parses an "HH:MM" time-of-day string into minutes since midnight.
pub fn parse_hhmm(value: &str) -> Option<u16> {
    let (hours, minutes) = value.split_once(':')?;
    let hours: u16 = hours.parse().ok()?;
    let minutes: u16 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Kind of alert sensitivity configured on a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThresholdKind {
    /// Absolute delay in minutes
    Minutes,
    /// Delay as a percentage of the traffic-free duration
    Percentage,
}

/// Per-trip alert sensitivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThreshold {
    /// MINUTES or PERCENTAGE
    #[serde(rename = "type")]
    pub kind: ThresholdKind,
    /// Positive threshold value
    pub value: f64,
}

/// A recurring journey being watched for traffic degradation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub origin: Location,
    pub destination: Location,
    pub schedule: Schedule,
    pub alert_threshold: AlertThreshold,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Congestion classification derived from a route's delay percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteStatus {
    Clear,
    Moderate,
    Heavy,
}

/// A candidate route between a trip's origin and destination, with the
/// traffic state applied on the most recent poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    /// Road label, e.g. "A21 (London Road)"
    pub name: String,
    /// Distance in meters
    pub distance: i64,
    /// Traffic-free duration in seconds
    pub static_duration: i64,
    /// Current duration in seconds, traffic included
    pub current_duration: i64,
    /// Current minus static duration, seconds
    pub delay: i64,
    /// Delay as a percentage of the static duration
    pub delay_percentage: f64,
    /// Derived from the delay percentage; never set independently
    pub status: RouteStatus,
    /// Incident description, if the road carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Lifecycle state of a monitoring job. Transitions only move forward:
/// PENDING -> RUNNING -> {COMPLETED, FAILED}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and failed jobs accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A monitoring job owned by the scheduler, one per actively watched trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringJob {
    pub id: String,
    pub trip_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_for: OffsetDateTime,
    pub status: JobStatus,
    /// Route set from the most recent poll
    pub routes: Vec<Route>,
    /// One-shot flag; once true it stays true for the job's lifetime
    pub alert_sent: bool,
}

/// Action the user took in response to an alert, recorded out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertAction {
    Dismissed,
    NavigatedAlternative,
    NavigatedOriginal,
}

/// An alert fired for a trip when a route breached its threshold.
/// Append-only per trip; only `user_action` is ever mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficAlert {
    pub id: String,
    pub trip_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Name of the route that breached the threshold
    pub triggered_by: String,
    pub delay_minutes: i64,
    pub reason: String,
    /// Snapshot of all candidate routes at trigger time
    pub routes: Vec<Route>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_action: Option<AlertAction>,
}

/// Quiet-hours window during which notifications are suppressed.
/// The window may wrap midnight (start > end).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuietHours {
    pub enabled: bool,
    /// "HH:MM"
    pub start: String,
    /// "HH:MM"
    pub end: String,
}

/// Per-user notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    /// Preferred navigation app label, e.g. "google_maps"
    pub default_nav_app: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiet_hours: Option<QuietHours>,
}

/// A commuter receiving traffic alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub settings: UserSettings,
}

/// Road condition snapshot exposed by the traffic simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadCondition {
    /// Road name the condition applies to
    pub route: String,
    /// Severity in [0, 1]
    pub severity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Request body for registering a user. Omitted settings get the
/// defaults (google_maps, no quiet hours).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub settings: Option<UserSettings>,
}

/// Request body for creating a trip.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripRequest {
    pub user_id: String,
    pub name: String,
    pub origin: Location,
    pub destination: Location,
    pub schedule: Schedule,
    pub alert_threshold: AlertThreshold,
}

/// Request body for editing a trip. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTripRequest {
    pub name: Option<String>,
    pub origin: Option<Location>,
    pub destination: Option<Location>,
    pub schedule: Option<Schedule>,
    pub alert_threshold: Option<AlertThreshold>,
    pub is_active: Option<bool>,
}

/// Request body for manually injecting a traffic scenario.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectScenarioRequest {
    pub route_name: String,
    /// Severity in [0, 1]
    pub severity: f64,
    pub reason: String,
}

/// Request body for recording a user's response to an alert.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertActionRequest {
    pub action: AlertAction,
}

/// Aggregate system status for the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub total_users: usize,
    pub total_trips: usize,
    pub active_trips: usize,
    pub active_jobs: usize,
    pub total_alerts: usize,
    pub traffic_conditions: Vec<RoadCondition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hhmm_accepts_valid_times() {
        assert_eq!(parse_hhmm("00:00"), Some(0));
        assert_eq!(parse_hhmm("07:30"), Some(450));
        assert_eq!(parse_hhmm("23:59"), Some(1439));
    }

    #[test]
    fn parse_hhmm_rejects_malformed_times() {
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("12:60"), None);
        assert_eq!(parse_hhmm("noon"), None);
        assert_eq!(parse_hhmm(""), None);
    }

    #[test]
    fn schedule_window_includes_lead_time() {
        let schedule = Schedule {
            days: vec![1, 2, 3, 4, 5],
            window_start: "08:00".to_string(),
            window_end: "09:00".to_string(),
        };
        // 07:30 is inside the window with a 30 minute lead
        assert!(schedule.is_open_at(1, 450, 30));
        // 07:29 is not
        assert!(!schedule.is_open_at(1, 449, 30));
        // Inside the departure window itself
        assert!(schedule.is_open_at(5, 520, 30));
        // After the window closes
        assert!(!schedule.is_open_at(5, 541, 30));
        // Wrong day
        assert!(!schedule.is_open_at(0, 480, 30));
    }

    #[test]
    fn job_status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
