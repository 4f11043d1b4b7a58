//! Traffic condition simulator.
//!
//! Owns the map from road name to severity/reason that every route on
//! that road shares. Conditions are seeded from time-of-day patterns and
//! a pool of generic incidents, then evolve on a background tick:
//! incidents decay toward zero, occasionally worsen, and brand-new
//! incidents appear on roads from a curated pool. This component is the
//! only source of nondeterminism in the engine; everything else treats
//! it as an opaque oracle.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;
use time::OffsetDateTime;

use crate::error::MonitorError;
use crate::models::{local_now, RoadCondition};
use crate::roads;

/// Conditions below this severity are considered resolved and dropped.
const DROP_EPSILON: f64 = 0.05;

/// Per-tick chance that an incident improves.
const IMPROVE_CHANCE: f64 = 0.15;

/// Per-tick chance that an incident worsens.
const WORSEN_CHANCE: f64 = 0.08;

/// Per-tick chance that a brand-new incident appears.
const NEW_INCIDENT_CHANCE: f64 = 0.08;

/// Chance that each generic pool scenario is active at startup.
const SEED_SCENARIO_CHANCE: f64 = 0.3;

/// Severity/reason pair for a single road. Fixed schema.
#[derive(Debug, Clone)]
pub struct TrafficCondition {
    /// Severity in [0, 1]; a route's current duration is
    /// `static * (1 + severity)`
    pub severity: f64,
    pub reason: Option<String>,
}

/// Simulated source of road conditions.
///
/// Thread-safe: the condition map lives behind `Arc<RwLock<...>>` so
/// clones share state, matching how the rest of the engine shares maps.
pub struct TrafficSimulator {
    conditions: Arc<RwLock<HashMap<String, TrafficCondition>>>,
}

impl Clone for TrafficSimulator {
    fn clone(&self) -> Self {
        Self {
            conditions: self.conditions.clone(),
        }
    }
}

impl Default for TrafficSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficSimulator {
    /// Creates a simulator seeded from the current local time.
    pub fn new() -> Self {
        let sim = Self::empty();
        sim.seed_conditions(local_now());
        sim
    }

    /// Creates a simulator with no initial conditions. Useful for tests
    /// that want full control over the condition map.
    pub fn empty() -> Self {
        Self {
            conditions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Spawns the background tick that evolves conditions over time.
    pub fn start_background_tick(&self, period: std::time::Duration) {
        let sim = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately; skip it so conditions
            // hold their seeded values for one full period.
            interval.tick().await;
            loop {
                interval.tick().await;
                sim.tick();
            }
        });
    }

    /// Force-sets the condition for a road. Last write wins, so repeated
    /// injection for the same road is idempotent.
    pub fn inject_scenario(
        &self,
        route_name: &str,
        severity: f64,
        reason: &str,
    ) -> Result<(), MonitorError> {
        if !(0.0..=1.0).contains(&severity) {
            return Err(MonitorError::Validation(format!(
                "severity must be between 0.0 and 1.0, got {}",
                severity
            )));
        }
        if route_name.trim().is_empty() {
            return Err(MonitorError::Validation(
                "route name must not be empty".to_string(),
            ));
        }
        log::info!(
            "Injecting traffic scenario: {} on {} (severity: {:.0}%)",
            reason,
            route_name,
            severity * 100.0
        );
        self.conditions.write().insert(
            route_name.to_string(),
            TrafficCondition {
                severity,
                reason: Some(reason.to_string()),
            },
        );
        Ok(())
    }

    /// Snapshot of all current conditions.
    pub fn current_conditions(&self) -> Vec<RoadCondition> {
        self.conditions
            .read()
            .iter()
            .map(|(route, condition)| RoadCondition {
                route: route.clone(),
                severity: condition.severity,
                reason: condition.reason.clone(),
            })
            .collect()
    }

    /// Condition for a single road, if one exists.
    pub fn condition_for(&self, route_name: &str) -> Option<TrafficCondition> {
        self.conditions.read().get(route_name).cloned()
    }

    /// Seeds conditions from deterministic time-of-day rules plus the
    /// generic incident pool.
    fn seed_conditions(&self, now: OffsetDateTime) {
        let mut conditions = self.conditions.write();

        for scenario in Self::time_based_scenarios(now) {
            conditions.insert(
                scenario.route.to_string(),
                TrafficCondition {
                    severity: scenario.severity,
                    reason: Some(scenario.reason.to_string()),
                },
            );
        }

        let mut rng = rand::thread_rng();
        for scenario in roads::incident_pool() {
            if rng.gen_bool(SEED_SCENARIO_CHANCE) {
                conditions.insert(
                    scenario.route.to_string(),
                    TrafficCondition {
                        severity: scenario.severity,
                        reason: Some(scenario.reason.to_string()),
                    },
                );
            }
        }
    }

    /// Deterministic congestion rules: weekday rush hours, school run
    /// times and weekend leisure traffic.
    fn time_based_scenarios(now: OffsetDateTime) -> Vec<roads::IncidentScenario> {
        let hour = now.hour();
        let weekday = now.weekday().number_days_from_sunday();
        let mut scenarios = Vec::new();

        let is_weekday = (1..=5).contains(&weekday);

        if is_weekday && ((7..=9).contains(&hour) || (17..=19).contains(&hour)) {
            scenarios.push(roads::IncidentScenario {
                route: "A21 (London Road)",
                severity: 0.4,
                reason: "Rush hour congestion",
            });
            scenarios.push(roads::IncidentScenario {
                route: "M25 Junction 5",
                severity: 0.6,
                reason: "Heavy commuter traffic",
            });
            scenarios.push(roads::IncidentScenario {
                route: "A224 (Dartford Road)",
                severity: 0.3,
                reason: "Morning/evening rush",
            });
            scenarios.push(roads::IncidentScenario {
                route: "Via Tonbridge Road",
                severity: 0.2,
                reason: "Increased traffic volume",
            });
        }

        if is_weekday && (hour == 8 || hour == 15) {
            scenarios.push(roads::IncidentScenario {
                route: "Via Bradbourne Vale Road",
                severity: 0.3,
                reason: "School drop-off/pick-up",
            });
            scenarios.push(roads::IncidentScenario {
                route: "A25 (High Street)",
                severity: 0.2,
                reason: "School traffic",
            });
            scenarios.push(roads::IncidentScenario {
                route: "Via Seal Hollow Road",
                severity: 0.4,
                reason: "Parents dropping children at school",
            });
        }

        if !is_weekday && (10..=16).contains(&hour) {
            scenarios.push(roads::IncidentScenario {
                route: "A21 (London Road)",
                severity: 0.2,
                reason: "Weekend leisure traffic",
            });
            scenarios.push(roads::IncidentScenario {
                route: "Via St Johns Hill",
                severity: 0.1,
                reason: "Visitors to Knole House",
            });
        }

        scenarios
    }

    /// One background update: decay or amplify existing conditions,
    /// occasionally add a new incident, drop resolved conditions.
    fn tick(&self) {
        let mut conditions = self.conditions.write();
        let mut rng = rand::thread_rng();

        let routes: Vec<String> = conditions.keys().cloned().collect();
        for route in routes {
            let Some(current) = conditions.get(&route).cloned() else {
                continue;
            };

            // Incidents tend to clear over time
            if current.severity > 0.1 && rng.gen_bool(IMPROVE_CHANCE) {
                let severity = (current.severity - rng.gen_range(0.0..0.2)).max(0.0);
                let reason = if severity > 0.1 {
                    current.reason.as_deref().map(|r| soften_reason(r))
                } else {
                    None
                };
                conditions.insert(route.clone(), TrafficCondition { severity, reason });
                continue;
            }

            // Some incidents worsen
            if current.severity > 0.0 && current.severity < 0.8 && rng.gen_bool(WORSEN_CHANCE) {
                let severity = (current.severity + rng.gen_range(0.0..0.3)).min(1.0);
                let reason = current.reason.as_deref().map(|r| escalate_reason(r));
                conditions.insert(route, TrafficCondition { severity, reason });
            }
        }

        // Add a fresh incident from the curated pool
        if rng.gen_bool(NEW_INCIDENT_CHANCE) {
            let groups = roads::incident_groups();
            let group = &groups[rng.gen_range(0..groups.len())];
            let route = group.routes[rng.gen_range(0..group.routes.len())];
            let reason = group.reasons[rng.gen_range(0..group.reasons.len())];
            let (low, high) = group.severity_range;
            let severity = rng.gen_range(low..high);
            log::info!(
                "New traffic incident: {} - {} (severity: {:.0}%)",
                route,
                reason,
                severity * 100.0
            );
            conditions.insert(
                route.to_string(),
                TrafficCondition {
                    severity,
                    reason: Some(reason.to_string()),
                },
            );
        }

        // Clear resolved incidents
        conditions.retain(|_, condition| condition.severity >= DROP_EPSILON);
    }
}

fn soften_reason(reason: &str) -> String {
    let lower = reason.to_lowercase();
    if lower.contains("accident") {
        format!("{} - vehicles being moved", reason)
    } else if lower.contains("breakdown") {
        format!("{} - recovery vehicle on route", reason)
    } else if lower.contains("roadworks") {
        format!("{} - work progressing", reason)
    } else {
        format!("{} - situation improving", reason)
    }
}

fn escalate_reason(reason: &str) -> String {
    let lower = reason.to_lowercase();
    if lower.contains("accident") {
        format!("{} - causing further delays", reason)
    } else if lower.contains("breakdown") {
        format!("{} - affecting multiple lanes", reason)
    } else if lower.contains("roadworks") {
        format!("{} - extended closure", reason)
    } else {
        format!("{} - delays increasing", reason)
    }
}
