//! Pre-Route: proactive traffic monitoring and alerting for recurring
//! commutes.
//!
//! The crate wires a simulated traffic world (routes between Kent
//! locations with evolving road conditions) to a per-trip monitoring
//! scheduler. Trips carry a weekly schedule and an alert threshold;
//! when a trip's window approaches, a monitoring job polls live route
//! timings and raises at most one notification per job when a route
//! breaches the threshold, subject to a per-road cooldown and the
//! user's quiet hours.

pub mod alerts;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod provider;
pub mod roads;
pub mod scheduler;
pub mod simulator;
pub mod traffic;
pub mod trips;
pub mod users;
