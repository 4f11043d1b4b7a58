//! Route computation provider.
//!
//! Produces candidate routes for an origin/destination pair from
//! great-circle distance and a fixed pace assumption. Traffic-free:
//! every returned route starts CLEAR with zero delay, and the traffic
//! applier layers current conditions on top afterwards.

use async_trait::async_trait;
use rand::Rng;

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::models::{Location, Route, RouteStatus};
use crate::roads;

/// Opaque route-computation capability the scheduler depends on.
#[async_trait]
pub trait RouteSource: Send + Sync + 'static {
    /// Compute candidate routes between two locations.
    async fn compute_routes(
        &self,
        origin: &Location,
        destination: &Location,
    ) -> Result<Vec<Route>, MonitorError>;
}

/// Synthetic route provider backed by the Kent road catalogue.
///
/// Stateless with respect to the simulator; the only state is the
/// configuration it was constructed with.
#[derive(Clone)]
pub struct SyntheticRouteApi {
    config: MonitorConfig,
}

impl SyntheticRouteApi {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    fn validate_location(location: &Location) -> Result<(), MonitorError> {
        if !(-90.0..=90.0).contains(&location.latitude)
            || !(-180.0..=180.0).contains(&location.longitude)
        {
            return Err(MonitorError::Validation(format!(
                "Invalid location coordinates: ({}, {})",
                location.latitude, location.longitude
            )));
        }
        Ok(())
    }

    /// Great-circle distance between two locations in meters.
    pub fn haversine_meters(&self, origin: &Location, destination: &Location) -> f64 {
        let lat1 = origin.latitude.to_radians();
        let lat2 = destination.latitude.to_radians();
        let delta_lat = (destination.latitude - origin.latitude).to_radians();
        let delta_lon = (destination.longitude - origin.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        self.config.earth_radius_meters * c
    }

    /// Route count by distance tier. Fixed per pair so repeated polls for
    /// the same trip see a stable candidate set.
    fn route_count(distance_meters: f64) -> usize {
        if distance_meters > 20_000.0 {
            4
        } else if distance_meters > 10_000.0 {
            3
        } else {
            2
        }
    }
}

#[async_trait]
impl RouteSource for SyntheticRouteApi {
    async fn compute_routes(
        &self,
        origin: &Location,
        destination: &Location,
    ) -> Result<Vec<Route>, MonitorError> {
        Self::validate_location(origin)?;
        Self::validate_location(destination)?;

        // Simulate provider latency
        tokio::time::sleep(std::time::Duration::from_millis(
            self.config.provider_latency_ms,
        ))
        .await;

        let distance = self.haversine_meters(origin, destination);
        let base_duration =
            ((distance / 1000.0) * self.config.secs_per_km).max(self.config.min_duration_secs as f64);

        let variation = self.config.route_variation;
        let mut rng = rand::thread_rng();
        let mut routes = Vec::new();
        for i in 0..Self::route_count(distance) {
            let factor = 1.0 + rng.gen_range(-variation..=variation);
            routes.push(Route {
                id: format!("route_{}", i + 1),
                name: roads::route_name(i),
                distance: (distance * factor).round() as i64,
                static_duration: (base_duration * factor).round() as i64,
                current_duration: (base_duration * factor).round() as i64,
                delay: 0,
                delay_percentage: 0.0,
                status: RouteStatus::Clear,
                reason: None,
            });
        }

        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> MonitorConfig {
        MonitorConfig {
            provider_latency_ms: 0,
            ..MonitorConfig::default()
        }
    }

    fn location(latitude: f64, longitude: f64) -> Location {
        Location {
            latitude,
            longitude,
            address: "test".to_string(),
            name: None,
        }
    }

    #[test]
    fn haversine_matches_known_distance() {
        let api = SyntheticRouteApi::new(test_config());
        // Sevenoaks station to Dartford station, roughly 19.9 km
        let distance = api.haversine_meters(
            &location(51.2737, 0.1887),
            &location(51.4467, 0.2142),
        );
        assert!((19_000.0..21_000.0).contains(&distance), "got {}", distance);
    }

    #[test]
    fn route_count_follows_distance_tiers() {
        assert_eq!(SyntheticRouteApi::route_count(5_000.0), 2);
        assert_eq!(SyntheticRouteApi::route_count(15_000.0), 3);
        assert_eq!(SyntheticRouteApi::route_count(25_000.0), 4);
    }

    #[tokio::test]
    async fn computed_routes_start_clear() {
        let api = SyntheticRouteApi::new(test_config());
        let routes = api
            .compute_routes(&location(51.2689, 0.1845), &location(51.2737, 0.1887))
            .await
            .unwrap();

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].name, "A21 (London Road)");
        for route in &routes {
            assert_eq!(route.delay, 0);
            assert_eq!(route.status, RouteStatus::Clear);
            assert_eq!(route.current_duration, route.static_duration);
            // Short trip durations are floored at the minimum
            assert!(route.static_duration >= 255);
        }
    }

    #[tokio::test]
    async fn compute_routes_rejects_invalid_coordinates() {
        let api = SyntheticRouteApi::new(test_config());
        let result = api
            .compute_routes(&location(120.0, 0.0), &location(51.0, 0.0))
            .await;
        assert!(matches!(result, Err(MonitorError::Validation(_))));
    }
}
