//! Traffic applier.
//!
//! Combines a route's traffic-free duration with the simulator's current
//! severity for that road to produce the current duration, delay and
//! CLEAR/MODERATE/HEAVY classification. Pure with respect to the
//! simulator snapshot; holds no state of its own.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::models::{Route, RouteStatus};
use crate::simulator::TrafficSimulator;

/// Delay percentage above which a route is classified HEAVY.
const HEAVY_THRESHOLD_PCT: f64 = 50.0;

/// Delay percentage above which a route is classified MODERATE.
const MODERATE_THRESHOLD_PCT: f64 = 20.0;

/// Opaque traffic capability the scheduler depends on.
#[async_trait]
pub trait TrafficSource: Send + Sync + 'static {
    /// Apply the current traffic conditions to a traffic-free route.
    async fn apply_traffic(&self, route: &Route) -> Result<Route, MonitorError>;
}

/// Classifies a route's congestion from its delay percentage. Status is
/// always derived this way, never set independently.
pub fn classify_status(delay_percentage: f64) -> RouteStatus {
    if delay_percentage > HEAVY_THRESHOLD_PCT {
        RouteStatus::Heavy
    } else if delay_percentage > MODERATE_THRESHOLD_PCT {
        RouteStatus::Moderate
    } else {
        RouteStatus::Clear
    }
}

/// Traffic applier backed by the condition simulator.
#[derive(Clone)]
pub struct SimulatedTrafficApi {
    simulator: Arc<TrafficSimulator>,
    config: MonitorConfig,
}

impl SimulatedTrafficApi {
    pub fn new(simulator: Arc<TrafficSimulator>, config: MonitorConfig) -> Self {
        Self { simulator, config }
    }

    /// Synchronous core of `apply_traffic`, separated so the math is
    /// testable without a runtime.
    fn apply(&self, route: &Route) -> Route {
        let condition = self.simulator.condition_for(&route.name);
        let severity = condition.as_ref().map_or(0.0, |c| c.severity);
        let reason = condition.and_then(|c| c.reason);

        let current_duration = ((route.static_duration as f64) * (1.0 + severity)).round() as i64;
        let delay = current_duration - route.static_duration;
        let delay_percentage = if route.static_duration > 0 {
            (delay as f64 / route.static_duration as f64) * 100.0
        } else {
            0.0
        };

        Route {
            current_duration,
            delay,
            delay_percentage,
            status: classify_status(delay_percentage),
            reason,
            ..route.clone()
        }
    }
}

#[async_trait]
impl TrafficSource for SimulatedTrafficApi {
    async fn apply_traffic(&self, route: &Route) -> Result<Route, MonitorError> {
        // Simulate provider latency; the flow lookup is cheaper than
        // route computation
        tokio::time::sleep(std::time::Duration::from_millis(
            self.config.provider_latency_ms / 2,
        ))
        .await;

        Ok(self.apply(route))
    }
}
