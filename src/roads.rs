//! Static road catalogue and incident pools for the Kent commuter area,
//! plus the demo locations used to seed the system.

use crate::models::Location;

/// Primary A-roads used first when naming candidate routes.
pub const PRIMARY_ROADS: [&str; 6] = [
    "A21 (London Road)",
    "A25 (High Street)",
    "A224 (Dartford Road)",
    "A225 (London Road)",
    "A227 (Gravesend Road)",
    "A228 (Basted Mill)",
];

/// Local secondary roads used once the primary names are exhausted.
pub const SECONDARY_ROADS: [&str; 6] = [
    "Via Seal Hollow Road",
    "Via Bradbourne Vale Road",
    "Via Tonbridge Road",
    "Via Mount Pleasant Road",
    "Via Pembury Road",
    "Via St Johns Hill",
];

/// Selects a route name for the candidate at `index`, round-robin over
/// the primary and secondary catalogues.
pub fn route_name(index: usize) -> String {
    let slot = index % (PRIMARY_ROADS.len() + SECONDARY_ROADS.len());
    if slot < PRIMARY_ROADS.len() {
        PRIMARY_ROADS[slot].to_string()
    } else {
        SECONDARY_ROADS[slot - PRIMARY_ROADS.len()].to_string()
    }
}

/// A road/severity/reason triple used for seeding and incident injection.
pub struct IncidentScenario {
    pub route: &'static str,
    pub severity: f64,
    pub reason: &'static str,
}

/// Generic incident scenarios, each independently active with fixed
/// probability at startup.
pub fn incident_pool() -> Vec<IncidentScenario> {
    vec![
        IncidentScenario {
            route: "A21 (London Road)",
            severity: 0.7,
            reason: "Multi-vehicle accident near Sevenoaks bypass",
        },
        IncidentScenario {
            route: "M25 Junction 5",
            severity: 0.8,
            reason: "Overturned lorry blocking two lanes",
        },
        IncidentScenario {
            route: "A25 (High Street)",
            severity: 0.4,
            reason: "Roadworks - temporary traffic lights",
        },
        IncidentScenario {
            route: "A224 (Dartford Road)",
            severity: 0.5,
            reason: "Broken down vehicle in outside lane",
        },
        IncidentScenario {
            route: "Via Seal Hollow Road",
            severity: 0.3,
            reason: "Tree fallen across carriageway",
        },
        IncidentScenario {
            route: "Via Tonbridge Road",
            severity: 0.6,
            reason: "Police incident - lane restrictions",
        },
        IncidentScenario {
            route: "Via Bradbourne Vale Road",
            severity: 0.2,
            reason: "Utility work causing delays",
        },
        IncidentScenario {
            route: "A227 (Gravesend Road)",
            severity: 0.4,
            reason: "Emergency services on scene",
        },
        IncidentScenario {
            route: "Via St Johns Hill",
            severity: 0.1,
            reason: "Local event causing minor delays",
        },
        IncidentScenario {
            route: "A225 (London Road)",
            severity: 0.5,
            reason: "Contraflow system in operation",
        },
    ]
}

/// Fresh incident descriptions drawn by the simulator tick, grouped by the
/// character of the roads they occur on.
pub struct IncidentGroup {
    pub routes: &'static [&'static str],
    pub reasons: &'static [&'static str],
    /// Inclusive severity range for a new incident in this group
    pub severity_range: (f64, f64),
}

pub fn incident_groups() -> Vec<IncidentGroup> {
    vec![
        IncidentGroup {
            routes: &["A21 (London Road)", "M25 Junction 5", "A224 (Dartford Road)"],
            reasons: &[
                "Vehicle breakdown in outside lane",
                "Minor collision - debris on road",
                "Police stopping vehicle",
                "Broken down HGV causing delays",
            ],
            severity_range: (0.2, 0.6),
        },
        IncidentGroup {
            routes: &[
                "A25 (High Street)",
                "Via Bradbourne Vale Road",
                "Via Seal Hollow Road",
            ],
            reasons: &[
                "Temporary traffic lights installed",
                "Emergency gas leak - road partially closed",
                "Water main repair causing delays",
                "Local event - increased pedestrian activity",
            ],
            severity_range: (0.1, 0.4),
        },
        IncidentGroup {
            routes: &["Via Tonbridge Road", "A227 (Gravesend Road)", "Via St Johns Hill"],
            reasons: &[
                "Fallen tree blocking carriageway",
                "Surface water flooding",
                "Emergency services attending incident",
                "Abnormal load requiring escort",
            ],
            severity_range: (0.3, 0.8),
        },
    ]
}

/// Demo locations for the seeded commuter trips.
pub fn demo_locations() -> Vec<Location> {
    vec![
        Location {
            latitude: 51.2689,
            longitude: 0.1845,
            address: "Bradbourne Vale Road, Sevenoaks, Kent".to_string(),
            name: Some("Bradbourne Vale Road (Residential)".to_string()),
        },
        Location {
            latitude: 51.2737,
            longitude: 0.1887,
            address: "Station Approach, Sevenoaks, Kent".to_string(),
            name: Some("Sevenoaks Railway Station".to_string()),
        },
        Location {
            latitude: 51.1167,
            longitude: 0.2267,
            address: "Nellington Road, Tunbridge Wells, Kent".to_string(),
            name: Some("Rusthall Common (Residential)".to_string()),
        },
        Location {
            latitude: 51.1321,
            longitude: 0.2634,
            address: "Mount Pleasant Road, Tunbridge Wells, Kent".to_string(),
            name: Some("Tunbridge Wells Central Station".to_string()),
        },
        Location {
            latitude: 51.4467,
            longitude: 0.2142,
            address: "Lowfield Street, Dartford, Kent".to_string(),
            name: Some("Dartford Railway Station".to_string()),
        },
    ]
}
