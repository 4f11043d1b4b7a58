//! API endpoints for the Pre-Route service.
//! Provides HTTP endpoints for managing commute trips, monitoring jobs,
//! alerts and the traffic simulator. All endpoints use JSON for
//! request/response bodies and follow RESTful principles.

use actix_web::{get, post, put, web, HttpResponse, Responder, ResponseError};
use serde_json::json;
use std::sync::Arc;

use crate::error::MonitorError;
use crate::models::{
    AlertActionRequest, CreateTripRequest, CreateUserRequest, InjectScenarioRequest,
    UpdateTripRequest, UserSettings,
};
use crate::orchestrator::Orchestrator;

/// Health check endpoint.
#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Creates a commute trip for a user.
///
/// # Returns
/// - 200 OK with the created trip
/// - 400 Bad Request if the trip data is invalid
#[post("/trips")]
pub async fn create_trip(
    request: web::Json<CreateTripRequest>,
    orchestrator: web::Data<Arc<Orchestrator>>,
) -> impl Responder {
    let request = request.into_inner();
    match orchestrator.trips().create_trip(
        &request.user_id,
        &request.name,
        request.origin,
        request.destination,
        request.schedule,
        request.alert_threshold,
    ) {
        Ok(trip) => HttpResponse::Ok().json(trip),
        Err(e) => e.error_response(),
    }
}

/// Fetches a single trip by id.
#[get("/trips/{trip_id}")]
pub async fn get_trip(
    path: web::Path<String>,
    orchestrator: web::Data<Arc<Orchestrator>>,
) -> impl Responder {
    let trip_id = path.into_inner();
    match orchestrator.trips().get_trip(&trip_id) {
        Some(trip) => HttpResponse::Ok().json(trip),
        None => MonitorError::NotFound(format!("Trip {} not found", trip_id)).error_response(),
    }
}

/// Edits a trip. Fields absent from the body are left unchanged; a job
/// already running for the trip keeps the data it captured at start.
#[put("/trips/{trip_id}")]
pub async fn update_trip(
    path: web::Path<String>,
    request: web::Json<UpdateTripRequest>,
    orchestrator: web::Data<Arc<Orchestrator>>,
) -> impl Responder {
    match orchestrator
        .trips()
        .update_trip(&path.into_inner(), request.into_inner())
    {
        Ok(trip) => HttpResponse::Ok().json(trip),
        Err(e) => e.error_response(),
    }
}

/// Lists a user's trips, most recently updated first.
#[get("/users/{user_id}/trips")]
pub async fn list_user_trips(
    path: web::Path<String>,
    orchestrator: web::Data<Arc<Orchestrator>>,
) -> impl Responder {
    HttpResponse::Ok().json(orchestrator.trips().trips_for_user(&path.into_inner()))
}

/// Enables or disables a trip. Disabled trips are skipped by the scan
/// loop; an already running job finishes its polls.
#[post("/trips/{trip_id}/active/{state}")]
pub async fn set_trip_active(
    path: web::Path<(String, bool)>,
    orchestrator: web::Data<Arc<Orchestrator>>,
) -> impl Responder {
    let (trip_id, state) = path.into_inner();
    match orchestrator.trips().set_active(&trip_id, state) {
        Some(trip) => HttpResponse::Ok().json(trip),
        None => MonitorError::NotFound(format!("Trip {} not found", trip_id)).error_response(),
    }
}

/// One-shot traffic check for a trip, independent of any monitoring job.
///
/// # Returns
/// - 200 OK with the trip's routes and live traffic applied
/// - 404 Not Found if the trip does not exist
/// - 502 Bad Gateway if the route provider fails
#[get("/trips/{trip_id}/traffic")]
pub async fn get_trip_traffic(
    path: web::Path<String>,
    orchestrator: web::Data<Arc<Orchestrator>>,
) -> impl Responder {
    let trip_id = path.into_inner();
    let Some(trip) = orchestrator.trips().get_trip(&trip_id) else {
        return MonitorError::NotFound(format!("Trip {} not found", trip_id)).error_response();
    };
    match orchestrator.scheduler().get_current_traffic_status(&trip).await {
        Ok(routes) => HttpResponse::Ok().json(routes),
        Err(e) => e.error_response(),
    }
}

/// Starts a monitoring job for a trip immediately, outside the scan
/// loop's schedule.
///
/// # Returns
/// - 200 OK with the created job, or the already running job when one
///   exists for this trip
/// - 404 Not Found if the trip does not exist
/// - 502 Bad Gateway if the route provider fails
#[post("/monitoring/start/{trip_id}")]
pub async fn start_monitoring(
    path: web::Path<String>,
    orchestrator: web::Data<Arc<Orchestrator>>,
) -> impl Responder {
    let trip_id = path.into_inner();
    let Some(trip) = orchestrator.trips().get_trip(&trip_id) else {
        return MonitorError::NotFound(format!("Trip {} not found", trip_id)).error_response();
    };
    if let Some(job) = orchestrator
        .scheduler()
        .get_active_jobs()
        .into_iter()
        .find(|job| job.trip_id == trip_id)
    {
        return HttpResponse::Ok().json(job);
    }
    match orchestrator.scheduler().start_monitoring(&trip).await {
        Ok(job) => HttpResponse::Ok().json(job),
        Err(e) => e.error_response(),
    }
}

/// Stops a monitoring job.
#[post("/monitoring/stop/{job_id}")]
pub async fn stop_monitoring(
    path: web::Path<String>,
    orchestrator: web::Data<Arc<Orchestrator>>,
) -> impl Responder {
    let job_id = path.into_inner();
    if orchestrator.scheduler().stop_monitoring(&job_id) {
        HttpResponse::Ok().json(json!({ "stopped": true }))
    } else {
        MonitorError::NotFound(format!("Job {} not found", job_id)).error_response()
    }
}

/// Fetches a monitoring job by id.
#[get("/monitoring/jobs/{job_id}")]
pub async fn get_monitoring_job(
    path: web::Path<String>,
    orchestrator: web::Data<Arc<Orchestrator>>,
) -> impl Responder {
    let job_id = path.into_inner();
    match orchestrator.scheduler().get_monitoring_job(&job_id) {
        Some(job) => HttpResponse::Ok().json(job),
        None => MonitorError::NotFound(format!("Job {} not found", job_id)).error_response(),
    }
}

/// Lists all currently running monitoring jobs.
#[get("/monitoring/jobs")]
pub async fn list_active_jobs(orchestrator: web::Data<Arc<Orchestrator>>) -> impl Responder {
    HttpResponse::Ok().json(orchestrator.scheduler().get_active_jobs())
}

/// Alert history for a trip, newest first.
#[get("/monitoring/alerts/{trip_id}")]
pub async fn get_alert_history(
    path: web::Path<String>,
    orchestrator: web::Data<Arc<Orchestrator>>,
) -> impl Responder {
    HttpResponse::Ok().json(orchestrator.scheduler().get_alert_history(&path.into_inner()))
}

/// Most recently delivered alerts across all trips, newest first.
#[get("/alerts/recent")]
pub async fn recent_alerts(orchestrator: web::Data<Arc<Orchestrator>>) -> impl Responder {
    HttpResponse::Ok().json(orchestrator.recent_alerts())
}

/// Lists all registered users.
#[get("/users")]
pub async fn list_users(orchestrator: web::Data<Arc<Orchestrator>>) -> impl Responder {
    HttpResponse::Ok().json(orchestrator.users().all_users())
}

/// Registers a user.
///
/// # Returns
/// - 200 OK with the created user
/// - 400 Bad Request if the email, name or settings are invalid or the
///   email is already registered
#[post("/users")]
pub async fn create_user(
    request: web::Json<CreateUserRequest>,
    orchestrator: web::Data<Arc<Orchestrator>>,
) -> impl Responder {
    let request = request.into_inner();
    match orchestrator
        .users()
        .create_user(&request.email, &request.name, request.settings)
    {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(e) => e.error_response(),
    }
}

/// Replaces a user's notification settings (nav app, quiet hours).
#[put("/users/{user_id}/settings")]
pub async fn update_user_settings(
    path: web::Path<String>,
    request: web::Json<UserSettings>,
    orchestrator: web::Data<Arc<Orchestrator>>,
) -> impl Responder {
    match orchestrator
        .users()
        .update_settings(&path.into_inner(), request.into_inner())
    {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(e) => e.error_response(),
    }
}

/// Records the user's response to an alert.
#[post("/alerts/{alert_id}/action")]
pub async fn record_alert_action(
    path: web::Path<String>,
    request: web::Json<AlertActionRequest>,
    orchestrator: web::Data<Arc<Orchestrator>>,
) -> impl Responder {
    match orchestrator.handle_alert_action(&path.into_inner(), request.into_inner().action) {
        Ok(alert) => HttpResponse::Ok().json(alert),
        Err(e) => e.error_response(),
    }
}

/// Injects a traffic scenario into the simulator and rechecks running
/// jobs immediately.
///
/// # Returns
/// - 200 OK with the full set of current road conditions
/// - 400 Bad Request if the severity is outside [0, 1]
#[post("/demo/traffic-scenario")]
pub async fn inject_scenario(
    request: web::Json<InjectScenarioRequest>,
    orchestrator: web::Data<Arc<Orchestrator>>,
) -> impl Responder {
    let request = request.into_inner();
    match orchestrator
        .simulate_traffic_scenario(&request.route_name, request.severity, &request.reason)
        .await
    {
        Ok(conditions) => HttpResponse::Ok().json(conditions),
        Err(e) => e.error_response(),
    }
}

/// Current simulated conditions for every road with an active condition.
#[get("/demo/conditions")]
pub async fn get_conditions(orchestrator: web::Data<Arc<Orchestrator>>) -> impl Responder {
    HttpResponse::Ok().json(orchestrator.simulator().current_conditions())
}

/// Aggregate system status for the dashboard.
#[get("/status")]
pub async fn system_status(orchestrator: web::Data<Arc<Orchestrator>>) -> impl Responder {
    HttpResponse::Ok().json(orchestrator.system_status())
}

/// Registers every route on the given service config.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(create_trip)
        .service(get_trip)
        .service(update_trip)
        .service(list_user_trips)
        .service(set_trip_active)
        .service(get_trip_traffic)
        .service(start_monitoring)
        .service(stop_monitoring)
        .service(list_active_jobs)
        .service(get_monitoring_job)
        .service(get_alert_history)
        .service(recent_alerts)
        .service(record_alert_action)
        .service(list_users)
        .service(create_user)
        .service(update_user_settings)
        .service(inject_scenario)
        .service(get_conditions)
        .service(system_status);
}
