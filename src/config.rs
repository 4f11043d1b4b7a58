//! Configuration management for the Pre-Route engine.
//!
//! This module provides configuration handling via environment variables with sensible defaults.
//! All configuration parameters can be customized through environment variables with the PREROUTE_ prefix.
//!
//! # Environment Variables
//! - PREROUTE_POLL_INTERVAL_SECS: Per-job traffic poll period (default: 120)
//! - PREROUTE_MAX_POLLS_PER_JOB: Poll cap per monitoring job (default: 15)
//! - PREROUTE_ALERT_COOLDOWN_MINUTES: Per trip+road alert cooldown (default: 15)
//! - PREROUTE_SCAN_INTERVAL_SECS: Orchestrator trip-scan period (default: 60)
//! - PREROUTE_RECHECK_INTERVAL_SECS: Full threshold re-check period (default: 300)
//! - PREROUTE_SIMULATOR_TICK_SECS: Simulator condition update period (default: 30)
//! - PREROUTE_MONITORING_LEAD_MINUTES: Lead before departure window (default: 30)
//! - PREROUTE_RECENT_ALERTS_CAPACITY: Recent-alerts ring buffer size (default: 10)
//! - PREROUTE_JOB_RETENTION_MINUTES: How long finished jobs stay queryable (default: 60)
//! - PREROUTE_PROVIDER_LATENCY_MS: Simulated provider latency (default: 200)

use serde::Deserialize;
use std::env;

/// Prefix for all Pre-Route environment variables.
const ENV_PREFIX: &str = "PREROUTE_";

/// Configuration parameters for the monitoring engine.
///
/// This struct holds all configurable parameters that affect:
/// - Polling and re-check cadences
/// - Alert deduplication behavior
/// - The synthetic route/traffic providers
/// - Resource limits
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Period between traffic polls within a monitoring job.
    /// Must be positive. Specified in seconds.
    pub poll_interval_secs: u64,

    /// Maximum number of polls a single job performs before completing.
    /// Must be positive.
    pub max_polls_per_job: u32,

    /// Cooldown between alerts for the same (trip, road) pair.
    /// Must be positive. Specified in minutes.
    pub alert_cooldown_minutes: i64,

    /// Period of the orchestrator's scan for trips entering their window.
    /// Must be positive. Specified in seconds.
    pub scan_interval_secs: u64,

    /// Period of the orchestrator's full threshold re-check across trips.
    /// Must be positive. Specified in seconds.
    pub recheck_interval_secs: u64,

    /// Period of the traffic simulator's background condition update.
    /// Must be positive. Specified in seconds.
    pub simulator_tick_secs: u64,

    /// How long before a trip's departure window monitoring starts.
    /// Specified in minutes.
    pub monitoring_lead_minutes: u16,

    /// Capacity of the recent-alerts ring buffer kept for display.
    /// Must be positive.
    pub recent_alerts_capacity: usize,

    /// How long COMPLETED and FAILED jobs remain queryable before the
    /// scan loop prunes them. Must be positive. Specified in minutes.
    pub job_retention_minutes: i64,

    /// Artificial latency of the mock route/traffic providers.
    /// Specified in milliseconds.
    pub provider_latency_ms: u64,

    /// Floor for a route's traffic-free duration.
    /// Must be positive. Specified in seconds.
    pub min_duration_secs: i64,

    /// Baseline travel pace used to derive static durations.
    /// Must be positive. Specified in seconds per kilometer.
    pub secs_per_km: f64,

    /// Bounded random variation applied to candidate routes (0.15 = plus or
    /// minus 15%). Must be in [0, 0.5].
    pub route_variation: f64,

    /// Earth's radius used in great-circle distance calculations.
    /// Constant value in meters. Do not modify unless needed for testing.
    pub earth_radius_meters: f64,
}

impl MonitorConfig {
    /// Attempts to load configuration from environment variables.
    ///
    /// All variables must be prefixed with "PREROUTE_". For example:
    /// - PREROUTE_POLL_INTERVAL_SECS=120
    /// - PREROUTE_ALERT_COOLDOWN_MINUTES=15
    ///
    /// # Returns
    /// - Ok(config) if all required variables are present and valid
    /// - Err(message) if any variables are missing or invalid
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists for local development
        dotenv::dotenv().ok();

        // Filter and transform environment variables
        let env_vars: std::collections::HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .map(|(k, v)| (k.trim_start_matches(ENV_PREFIX).to_string(), v))
            .collect();

        // Parse and validate configuration
        match envy::from_iter::<_, Self>(env_vars.into_iter()) {
            Ok(config) => {
                config.validate()?;
                Ok(config)
            }
            Err(e) => Err(format!("Failed to parse environment variables: {}", e)),
        }
    }

    /// Loads configuration from environment variables, falling back to defaults
    /// if environment variables are not set or are invalid.
    pub fn from_env_or_default() -> Self {
        Self::from_env().unwrap_or_default()
    }

    /// Validates all configuration parameters to ensure they are within
    /// acceptable ranges.
    ///
    /// # Returns
    /// - Ok(()) if all validation passes
    /// - Err(message) with description of the first validation failure
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be positive".to_string());
        }
        if self.max_polls_per_job == 0 {
            return Err("max_polls_per_job must be positive".to_string());
        }
        if self.alert_cooldown_minutes <= 0 {
            return Err("alert_cooldown_minutes must be positive".to_string());
        }
        if self.scan_interval_secs == 0 {
            return Err("scan_interval_secs must be positive".to_string());
        }
        if self.recheck_interval_secs == 0 {
            return Err("recheck_interval_secs must be positive".to_string());
        }
        if self.simulator_tick_secs == 0 {
            return Err("simulator_tick_secs must be positive".to_string());
        }
        if self.recent_alerts_capacity == 0 {
            return Err("recent_alerts_capacity must be positive".to_string());
        }
        if self.job_retention_minutes <= 0 {
            return Err("job_retention_minutes must be positive".to_string());
        }
        if self.min_duration_secs <= 0 {
            return Err("min_duration_secs must be positive".to_string());
        }
        if self.secs_per_km <= 0.0 {
            return Err("secs_per_km must be positive".to_string());
        }
        if !(0.0..=0.5).contains(&self.route_variation) {
            return Err("route_variation must be between 0.0 and 0.5".to_string());
        }
        Ok(())
    }
}

/// Default configuration values matching the cadences described in the
/// product requirements: 2 minute polls, 15 polls per job, 15 minute
/// alert cooldown, 30 second simulator ticks.
impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 120,       // 2 minute poll period
            max_polls_per_job: 15,         // ~30 minutes of coverage
            alert_cooldown_minutes: 15,    // Prevent alert spam
            scan_interval_secs: 60,        // Trip scan every minute
            recheck_interval_secs: 300,    // Full re-check every 5 minutes
            simulator_tick_secs: 30,       // Conditions evolve every 30s
            monitoring_lead_minutes: 30,   // Watch from 30 min before departure
            recent_alerts_capacity: 10,    // Last 10 alerts kept for display
            job_retention_minutes: 60,     // Finished jobs queryable for 1h
            provider_latency_ms: 200,      // Mock API latency
            min_duration_secs: 300,        // 5 minute trip minimum
            secs_per_km: 120.0,            // ~2 minutes per km baseline
            route_variation: 0.15,         // Plus or minus 15% per route
            earth_radius_meters: 6_371_000.0, // Standard Earth radius
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_cadences() {
        let mut config = MonitorConfig::default();
        config.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.max_polls_per_job = 0;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.alert_cooldown_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_variation() {
        let mut config = MonitorConfig::default();
        config.route_variation = 0.6;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.route_variation = -0.1;
        assert!(config.validate().is_err());
    }
}
