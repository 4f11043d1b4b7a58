//! Main entry point for the Pre-Route service.
//! Sets up the HTTP server, configures logging, and initializes the
//! monitoring engine with environment-based configuration.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

use preroute::alerts::AlertService;
use preroute::api;
use preroute::config::MonitorConfig;
use preroute::notify::NotificationDispatcher;
use preroute::orchestrator::Orchestrator;
use preroute::provider::SyntheticRouteApi;
use preroute::scheduler::MonitorScheduler;
use preroute::simulator::TrafficSimulator;
use preroute::traffic::SimulatedTrafficApi;
use preroute::trips::TripStore;
use preroute::users::UserStore;

/// # Server Configuration
/// - Binds to 0.0.0.0 with the port from PORT (default 8080)
/// - All endpoints are under the /api prefix
///
/// # Environment Variables
/// Configuration can be customized via PREROUTE_-prefixed variables,
/// for example:
/// - PREROUTE_POLL_INTERVAL_SECS: Poll period per monitoring job (default: 120)
/// - PREROUTE_MAX_POLLS_PER_JOB: Polls before a job completes (default: 15)
/// - PREROUTE_ALERT_COOLDOWN_MINUTES: Per-road alert cooldown (default: 15)
/// - PREROUTE_SCAN_INTERVAL_SECS: Trip scan loop period (default: 60)
///
/// # Error Handling
/// - Uses env_logger for logging
/// - Returns std::io::Error for server startup issues
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env before reading configuration
    dotenv::dotenv().ok();

    // Log level can be set via RUST_LOG environment variable
    env_logger::init();

    log::info!("Starting Pre-Route service...");

    // Falls back to defaults if env vars not set
    let config = MonitorConfig::from_env_or_default();
    log::info!("Starting Pre-Route service with configuration: {:?}", config);

    let simulator = Arc::new(TrafficSimulator::new());
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

    let orchestrator = Arc::new(Orchestrator::new(
        scheduler, trips, users, alerts, dispatcher, simulator, config,
    ));

    if let Err(e) = orchestrator.initialize_demo() {
        log::warn!("Demo data initialization failed: {}", e);
    }

    // Background loops: simulator ticks, trip scan, job recheck
    orchestrator.start();

    let shared = web::Data::new(orchestrator.clone());

    // Get port from environment variable or use default
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .expect("PORT environment variable must be a valid port number");

    log::info!("Starting server on port {}", port);

    let result = HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive()) // Dashboard runs on a different origin
            .app_data(shared.clone()) // Share engine state across workers
            .service(web::scope("/api").configure(api::configure))
            // Root-level health endpoint for platform health checks
            .route(
                "/health",
                web::get().to(|| async {
                    actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
                }),
            )
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await;

    orchestrator.shutdown();
    result
}
