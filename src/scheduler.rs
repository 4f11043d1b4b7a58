//! Monitoring job scheduler - the core state machine.
//!
//! Owns one monitoring job per actively watched trip. Each job polls the
//! route provider and traffic applier on a fixed cadence, evaluates the
//! trip's alert threshold against the refreshed routes, and hands any
//! breach to the alert service and notification dispatcher. Jobs stop
//! themselves after a bounded number of polls or on cancellation, and a
//! failing poll is terminal: the job moves to FAILED and is never
//! retried.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use time::OffsetDateTime;
use tokio::sync::watch;
use uuid::Uuid;

use crate::alerts::AlertService;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::models::{
    AlertThreshold, JobStatus, MonitoringJob, Route, ThresholdKind, TrafficAlert, Trip,
};
use crate::notify::NotificationDispatcher;
use crate::provider::RouteSource;
use crate::traffic::TrafficSource;
use crate::users::UserStore;

/// Scans routes in provider order and returns the first route breaching
/// the threshold, along with the human-readable breach reason.
pub fn evaluate_threshold(
    routes: &[Route],
    threshold: &AlertThreshold,
) -> Option<(Route, String)> {
    for route in routes {
        let breached = match threshold.kind {
            ThresholdKind::Minutes => (route.delay as f64) >= threshold.value * 60.0,
            ThresholdKind::Percentage => route.delay_percentage >= threshold.value,
        };
        if !breached {
            continue;
        }

        let mut reason = match threshold.kind {
            ThresholdKind::Minutes => format!(
                "{} min delay via {}",
                ((route.delay as f64) / 60.0).round() as i64,
                route.name
            ),
            ThresholdKind::Percentage => format!(
                "{}% slower via {}",
                route.delay_percentage.round() as i64,
                route.name
            ),
        };
        if let Some(incident) = &route.reason {
            reason.push_str(&format!(" due to {}", incident.to_lowercase()));
        }
        return Some((route.clone(), reason));
    }
    None
}

/// Scheduler for per-trip monitoring jobs.
pub struct MonitorScheduler {
    routes: Arc<dyn RouteSource>,
    traffic: Arc<dyn TrafficSource>,
    alerts: AlertService,
    dispatcher: NotificationDispatcher,
    users: UserStore,
    /// All jobs ever started this process, keyed by job id
    jobs: Arc<RwLock<HashMap<String, MonitoringJob>>>,
    /// Cancellation handles for jobs whose polling loop is live
    cancellations: Arc<RwLock<HashMap<String, watch::Sender<bool>>>>,
    config: MonitorConfig,
}

impl Clone for MonitorScheduler {
    fn clone(&self) -> Self {
        // Clone just shares the Arc references, ensuring all clones
        // operate on the same underlying data
        Self {
            routes: self.routes.clone(),
            traffic: self.traffic.clone(),
            alerts: self.alerts.clone(),
            dispatcher: self.dispatcher.clone(),
            users: self.users.clone(),
            jobs: self.jobs.clone(),
            cancellations: self.cancellations.clone(),
            config: self.config.clone(),
        }
    }
}

impl MonitorScheduler {
    pub fn new(
        routes: Arc<dyn RouteSource>,
        traffic: Arc<dyn TrafficSource>,
        alerts: AlertService,
        dispatcher: NotificationDispatcher,
        users: UserStore,
        config: MonitorConfig,
    ) -> Self {
        Self {
            routes,
            traffic,
            alerts,
            dispatcher,
            users,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            cancellations: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Starts a monitoring job for a trip.
    ///
    /// Fetches the initial route set, runs the first poll immediately
    /// (its error propagates to the caller and fails the job), then
    /// schedules the remaining polls on the configured period. The job
    /// data is held by value; later edits to the trip do not affect a
    /// running job.
    pub async fn start_monitoring(&self, trip: &Trip) -> Result<MonitoringJob, MonitorError> {
        let job_id = Uuid::new_v4().to_string();
        let job = MonitoringJob {
            id: job_id.clone(),
            trip_id: trip.id.clone(),
            scheduled_for: OffsetDateTime::now_utc(),
            status: JobStatus::Pending,
            routes: Vec::new(),
            alert_sent: false,
        };
        self.jobs.write().insert(job_id.clone(), job);

        log::info!("Starting monitoring for trip: {} (job {})", trip.name, job_id);
        let initial_routes = match self.routes.compute_routes(&trip.origin, &trip.destination).await
        {
            Ok(routes) => routes,
            Err(e) => {
                log::error!("Failed to start monitoring for trip {}: {}", trip.id, e);
                self.transition(&job_id, JobStatus::Failed);
                return Err(e);
            }
        };

        {
            let mut jobs = self.jobs.write();
            if let Some(job) = jobs.get_mut(&job_id) {
                job.routes = initial_routes;
                job.status = JobStatus::Running;
            }
        }

        // First poll runs inside the caller; a failure here is surfaced
        // directly and the job is already marked FAILED
        self.poll_once(&job_id, trip).await?;

        self.spawn_polling_loop(&job_id, trip);

        self.get_monitoring_job(&job_id)
            .ok_or_else(|| MonitorError::Internal(format!("Job {} vanished after start", job_id)))
    }

    /// Cancels a job's polling loop and marks it COMPLETED. Returns false
    /// when the job id is unknown. Terminal jobs keep their status.
    pub fn stop_monitoring(&self, job_id: &str) -> bool {
        if let Some(cancel) = self.cancellations.write().remove(job_id) {
            // An in-flight poll is allowed to finish; it sees the updated
            // status before rescheduling
            let _ = cancel.send(true);
        }

        let mut jobs = self.jobs.write();
        match jobs.get_mut(job_id) {
            None => false,
            Some(job) => {
                if !job.status.is_terminal() {
                    job.status = JobStatus::Completed;
                    log::info!("Stopped monitoring job: {}", job_id);
                }
                true
            }
        }
    }

    /// One-shot traffic check for a trip, independent of any job.
    pub async fn get_current_traffic_status(
        &self,
        trip: &Trip,
    ) -> Result<Vec<Route>, MonitorError> {
        let routes = self
            .routes
            .compute_routes(&trip.origin, &trip.destination)
            .await?;
        let applied = join_all(routes.iter().map(|route| self.traffic.apply_traffic(route))).await;
        applied.into_iter().collect()
    }

    pub fn get_monitoring_job(&self, job_id: &str) -> Option<MonitoringJob> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Jobs currently RUNNING.
    pub fn get_active_jobs(&self) -> Vec<MonitoringJob> {
        self.jobs
            .read()
            .values()
            .filter(|job| job.status == JobStatus::Running)
            .cloned()
            .collect()
    }

    /// Whether any RUNNING job exists for this trip. The scheduler does
    /// not enforce uniqueness itself; callers that care check first.
    pub fn has_running_job(&self, trip_id: &str) -> bool {
        self.jobs
            .read()
            .values()
            .any(|job| job.trip_id == trip_id && job.status == JobStatus::Running)
    }

    pub fn get_alert_history(&self, trip_id: &str) -> Vec<TrafficAlert> {
        self.alerts.get_alert_history(trip_id)
    }

    /// Drops COMPLETED and FAILED jobs older than the retention window,
    /// keeping the tracking map bounded. Running jobs are never touched.
    pub fn prune_finished_jobs(&self) {
        self.prune_finished_jobs_at(OffsetDateTime::now_utc());
    }

    pub fn prune_finished_jobs_at(&self, now: OffsetDateTime) {
        let cutoff = now - time::Duration::minutes(self.config.job_retention_minutes);
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, job| !job.status.is_terminal() || job.scheduled_for > cutoff);
        let pruned = before - jobs.len();
        if pruned > 0 {
            log::debug!("Pruned {} finished monitoring jobs", pruned);
        }
    }

    /// Runs an out-of-cadence poll for a RUNNING job, without waiting
    /// for the next scheduled poll. Terminal and unknown jobs are a
    /// no-op.
    pub async fn recheck_job(&self, job_id: &str, trip: &Trip) -> Result<(), MonitorError> {
        if self.job_status(job_id) != Some(JobStatus::Running) {
            return Ok(());
        }
        self.poll_once(job_id, trip).await
    }

    fn job_status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().get(job_id).map(|job| job.status)
    }

    /// Forward-only status transition; terminal states are never left.
    fn transition(&self, job_id: &str, status: JobStatus) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(job_id) {
            if !job.status.is_terminal() {
                job.status = status;
            }
        }
    }

    fn spawn_polling_loop(&self, job_id: &str, trip: &Trip) {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        self.cancellations
            .write()
            .insert(job_id.to_string(), cancel_tx);

        let scheduler = self.clone();
        let trip = trip.clone();
        let job_id = job_id.to_string();
        let period = std::time::Duration::from_secs(scheduler.config.poll_interval_secs);
        let max_polls = scheduler.config.max_polls_per_job;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Consume the immediate first tick; the initial poll already
            // ran inside start_monitoring
            interval.tick().await;
            let mut polls: u32 = 1;

            loop {
                if polls >= max_polls {
                    log::info!(
                        "Job {} reached the poll cap ({}), completing",
                        job_id,
                        max_polls
                    );
                    break;
                }

                tokio::select! {
                    _ = interval.tick() => {}
                    _ = cancel_rx.changed() => {
                        log::debug!("Polling loop for job {} cancelled", job_id);
                        break;
                    }
                }

                // The cancellation token and the job status are both
                // checked before every reschedule
                if scheduler.job_status(&job_id) != Some(JobStatus::Running) {
                    break;
                }

                polls += 1;
                log::info!(
                    "Polling traffic data for trip: {} (poll {}/{})",
                    trip.name,
                    polls,
                    max_polls
                );
                if let Err(e) = scheduler.poll_once(&job_id, &trip).await {
                    // poll_once already marked the job FAILED; nobody is
                    // awaiting a background poll, so just log
                    log::error!("Error during traffic polling for job {}: {}", job_id, e);
                    break;
                }
            }

            scheduler.stop_monitoring(&job_id);
        });
    }

    /// A single poll: refresh the trip's routes, store them on the job,
    /// and fire an alert when a route breaches the threshold. Any error
    /// marks the job FAILED.
    async fn poll_once(&self, job_id: &str, trip: &Trip) -> Result<(), MonitorError> {
        let routes = match self.get_current_traffic_status(trip).await {
            Ok(routes) => routes,
            Err(e) => {
                self.transition(job_id, JobStatus::Failed);
                return Err(e);
            }
        };

        {
            let mut jobs = self.jobs.write();
            if let Some(job) = jobs.get_mut(job_id) {
                job.routes = routes.clone();
            }
        }

        let Some((route, reason)) = evaluate_threshold(&routes, &trip.alert_threshold) else {
            return Ok(());
        };

        let already_sent = self
            .jobs
            .read()
            .get(job_id)
            .map_or(false, |job| job.alert_sent);
        if already_sent {
            log::debug!("Job {} already alerted; breach on {} ignored", job_id, route.name);
            return Ok(());
        }

        if !self.alerts.should_create_alert(&trip.id, &route.name) {
            log::info!(
                "Alert suppressed by cooldown for trip {} via {}",
                trip.name,
                route.name
            );
            return Ok(());
        }

        let alert = match self.alerts.create_alert(trip, &route, &routes, &reason) {
            Ok(alert) => alert,
            Err(e) => {
                self.transition(job_id, JobStatus::Failed);
                return Err(e);
            }
        };

        match self.users.get_user(&trip.user_id) {
            Some(user) => {
                if self.dispatcher.send_notification(&user, trip, &alert) {
                    log::info!("Alert sent for trip: {} - {}", trip.name, reason);
                } else {
                    log::info!(
                        "Alert created for trip {} but delivery suppressed",
                        trip.name
                    );
                }
            }
            None => log::warn!(
                "No user {} for trip {}; alert recorded without notification",
                trip.user_id,
                trip.id
            ),
        }

        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(job_id) {
            job.alert_sent = true;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouteStatus;

    fn route_with_delay(name: &str, delay: i64, delay_percentage: f64) -> Route {
        Route {
            id: "route_1".to_string(),
            name: name.to_string(),
            distance: 10_000,
            static_duration: 1_200,
            current_duration: 1_200 + delay,
            delay,
            delay_percentage,
            status: RouteStatus::Clear,
            reason: None,
        }
    }

    fn minutes(value: f64) -> AlertThreshold {
        AlertThreshold {
            kind: ThresholdKind::Minutes,
            value,
        }
    }

    fn percentage(value: f64) -> AlertThreshold {
        AlertThreshold {
            kind: ThresholdKind::Percentage,
            value,
        }
    }

    #[test]
    fn minutes_threshold_boundary() {
        let threshold = minutes(10.0);
        let under = [route_with_delay("A21 (London Road)", 599, 49.9)];
        assert!(evaluate_threshold(&under, &threshold).is_none());

        let at = [route_with_delay("A21 (London Road)", 600, 50.0)];
        let (route, reason) = evaluate_threshold(&at, &threshold).unwrap();
        assert_eq!(route.name, "A21 (London Road)");
        assert_eq!(reason, "10 min delay via A21 (London Road)");
    }

    #[test]
    fn percentage_threshold_boundary() {
        let threshold = percentage(25.0);
        let under = [route_with_delay("A25 (High Street)", 300, 24.9)];
        assert!(evaluate_threshold(&under, &threshold).is_none());

        let at = [route_with_delay("A25 (High Street)", 300, 25.0)];
        let (_, reason) = evaluate_threshold(&at, &threshold).unwrap();
        assert_eq!(reason, "25% slower via A25 (High Street)");
    }

    #[test]
    fn first_breaching_route_wins_in_provider_order() {
        let threshold = minutes(5.0);
        let routes = [
            route_with_delay("A21 (London Road)", 0, 0.0),
            route_with_delay("A25 (High Street)", 360, 30.0),
            route_with_delay("A224 (Dartford Road)", 900, 75.0),
        ];
        let (route, _) = evaluate_threshold(&routes, &threshold).unwrap();
        assert_eq!(route.name, "A25 (High Street)");
    }

    #[test]
    fn breach_reason_appends_lowercased_incident() {
        let threshold = minutes(5.0);
        let mut route = route_with_delay("A21 (London Road)", 720, 60.0);
        route.reason = Some("Multi-vehicle accident".to_string());
        let (_, reason) = evaluate_threshold(std::slice::from_ref(&route), &threshold).unwrap();
        assert_eq!(
            reason,
            "12 min delay via A21 (London Road) due to multi-vehicle accident"
        );
    }
}
