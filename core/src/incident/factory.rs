//! Mock incident generator.
//!
//! Draws a category, a description template from that category's pool, a
//! location inside [`GeoBounds`] and a vehicle/driver pairing.

use super::types::{generate_id, Incident, IncidentType, Trip, TripStatus};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

const VEHICLE_NAMES: &[&str] = &[
    "Truck Alpha-7",
    "Truck Beta-3",
    "Truck Gamma-9",
    "Van Delta-2",
    "Van Epsilon-5",
    "Truck Zeta-1",
    "Van Theta-4",
    "Truck Kappa-8",
];

const DRIVER_NAMES: &[&str] = &[
    "Jean Dupont",
    "Marie Martin",
    "Pierre Bernard",
    "Sophie Dubois",
    "Luc Moreau",
    "Claire Laurent",
    "Michel Simon",
    "Isabelle Leroy",
];

const TRAFFIC_TEMPLATES: &[&str] = &[
    "Gros bouchon A7 sortie Lyon",
    "Accident sur périphérique, ralentissement 5km",
    "Travaux autoroute A6, voie fermée",
    "Embouteillage centre-ville Marseille",
    "Route barrée pour manifestation",
    "Trafic dense sur N7, temps d'attente +30min",
];

const BREAKDOWN_TEMPLATES: &[&str] = &[
    "Alerte moteur - température élevée",
    "Problème pneumatique avant gauche",
    "Niveau huile critique détecté",
    "Dysfonctionnement système de freinage",
    "Panne électrique - batterie faible",
    "Fuite liquide de refroidissement",
];

const WEATHER_TEMPLATES: &[&str] = &[
    "Brouillard épais, visibilité réduite",
    "Pluie torrentielle, route glissante",
    "Alerte neige sur col de montagne",
    "Vent violent traversier +80km/h",
    "Verglas signalé section autoroutière",
    "Orage violent, grêle possible",
];

const BEHAVIOR_TEMPLATES: &[&str] = &[
    "Alerte de freinage brusque répété",
    "Vitesse excessive détectée +20km/h",
    "Conduite agressive - accélérations brutales",
    "Non-respect temps de pause réglementaire",
    "Écart de trajectoire important",
    "Dépassement limite vitesse en zone urbaine",
];

const TRIP_STATUSES: &[TripStatus] = &[TripStatus::EnRoute, TripStatus::Delayed, TripStatus::AtRisk];

/// Description pool for a category
pub fn templates(incident_type: IncidentType) -> &'static [&'static str] {
    match incident_type {
        IncidentType::Traffic => TRAFFIC_TEMPLATES,
        IncidentType::Breakdown => BREAKDOWN_TEMPLATES,
        IncidentType::Weather => WEATHER_TEMPLATES,
        IncidentType::Behavior => BEHAVIOR_TEMPLATES,
    }
}

/// Bounding region for generated coordinates
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl GeoBounds {
    /// Metropolitan France
    pub const FRANCE: GeoBounds = GeoBounds {
        min_lat: 42.5,
        max_lat: 50.5,
        min_lng: -4.5,
        max_lng: 8.0,
    };

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lng..=self.max_lng).contains(&lng)
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self::FRANCE
    }
}

/// Randomized incident generator. Never fails.
pub struct IncidentFactory {
    bounds: GeoBounds,
    rng: Mutex<StdRng>,
}

impl IncidentFactory {
    pub fn new(bounds: GeoBounds) -> Self {
        Self {
            bounds,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic selection sequence for tests (ids and timestamps still vary)
    pub fn with_seed(bounds: GeoBounds, seed: u64) -> Self {
        Self {
            bounds,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn bounds(&self) -> GeoBounds {
        self.bounds
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // A poisoned lock still holds a usable RNG
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    pub fn generate_trip(&self) -> Trip {
        self.with_rng(|rng| Trip {
            id: generate_id(),
            vehicle_name: pick(rng, VEHICLE_NAMES).to_string(),
            driver_name: pick(rng, DRIVER_NAMES).to_string(),
            status: *TRIP_STATUSES.choose(rng).unwrap_or(&TripStatus::EnRoute),
        })
    }

    /// New incident on a freshly drawn trip
    pub fn generate(&self) -> Incident {
        let trip = self.generate_trip();
        self.generate_for_trip(&trip)
    }

    /// New incident attached to an existing trip
    pub fn generate_for_trip(&self, trip: &Trip) -> Incident {
        let bounds = self.bounds;
        self.with_rng(|rng| {
            let incident_type = *IncidentType::ALL
                .choose(rng)
                .unwrap_or(&IncidentType::Traffic);
            let description = pick(rng, templates(incident_type)).to_string();
            let location_lat = bounds.min_lat + rng.gen::<f64>() * (bounds.max_lat - bounds.min_lat);
            let location_lng = bounds.min_lng + rng.gen::<f64>() * (bounds.max_lng - bounds.min_lng);

            Incident {
                id: generate_id(),
                created_at: Utc::now(),
                trip_id: trip.id.clone(),
                incident_type,
                description,
                location_lat,
                location_lng,
                vehicle_name: Some(trip.vehicle_name.clone()),
                driver_name: Some(trip.driver_name.clone()),
            }
        })
    }
}

impl Default for IncidentFactory {
    fn default() -> Self {
        Self::new(GeoBounds::default())
    }
}

fn pick<'a>(rng: &mut StdRng, pool: &[&'a str]) -> &'a str {
    pool.choose(rng).copied().unwrap_or_default()
}
