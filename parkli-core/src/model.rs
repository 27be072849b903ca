//! Domain data structures for cities, parking facilities, and their availability.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ISO 3166-1 alpha-2 code carried by every city aggregate.
pub const COUNTRY_CODE: &str = "CH";

/// Built-in cities supported by the application.
pub enum Cities {
    /// Basel, Switzerland.
    Basel,
    /// Bern, Switzerland.
    Bern,
    /// Lucerne, Switzerland.
    Lucerne,
    /// Zurich, Switzerland.
    Zurich,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier for a city known to parkli.
pub struct CityId(pub String);

impl fmt::Display for Cities {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            Cities::Basel => "basel",
            Cities::Bern => "bern",
            Cities::Lucerne => "lucerne",
            Cities::Zurich => "zurich",
        };
        write!(formatter, "{slug}")
    }
}

impl From<Cities> for CityId {
    fn from(city: Cities) -> Self {
        CityId(city.to_string())
    }
}

impl fmt::Display for CityId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for CityId {
    fn from(id: &str) -> Self {
        CityId(id.to_owned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing a city and its human-friendly name.
pub struct CityMeta {
    /// Unique identifier.
    pub id: CityId,
    /// Localized display name.
    pub name: String,
}

impl CityMeta {
    /// Build metadata from a built-in city and its display name.
    #[must_use]
    pub fn new(city: Cities, name: &str) -> Self {
        Self {
            id: city.into(),
            name: name.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Canonical identifier of a parking facility, unique within its city.
pub struct FacilityId(pub String);

impl fmt::Display for FacilityId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for FacilityId {
    fn from(id: &str) -> Self {
        FacilityId(id.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Operational state of a facility.
pub enum FacilityStatus {
    /// Facility accepts vehicles.
    Open,
    /// Facility is closed or under maintenance.
    Closed,
    /// No reliable signal about the facility.
    #[default]
    Unknown,
}

impl FacilityStatus {
    /// Whether availability figures may be reported for this status.
    #[must_use]
    pub fn reports_availability(self) -> bool {
        matches!(self, FacilityStatus::Open)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// WGS84 coordinate pair.
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Coordinates {
    /// Combine two optional halves; both must be present.
    #[must_use]
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        Some(Self {
            latitude: latitude?,
            longitude: longitude?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A parking facility with its current availability.
///
/// Values are only produced through [`FacilityBuilder`](crate::reconcile::FacilityBuilder),
/// which enforces that `available_spaces` never exceeds a known capacity and is
/// zero whenever the status is not [`FacilityStatus::Open`].
pub struct Facility {
    /// Canonical identifier.
    pub id: FacilityId,
    /// Display name.
    pub name: String,
    /// Display name of the city the facility belongs to.
    pub city: String,
    /// Street address when known.
    pub address: Option<String>,
    /// Latitude when known.
    pub latitude: Option<f64>,
    /// Longitude when known.
    pub longitude: Option<f64>,
    /// Free spaces right now.
    pub available_spaces: u32,
    /// Capacity, `0` when unknown.
    pub total_spaces: u32,
    /// Operational state.
    pub status: FacilityStatus,
    /// When the value was produced.
    pub last_updated: DateTime<Utc>,
}

impl Facility {
    /// Coordinates of the facility if both halves are known.
    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Aggregate of all facilities of one city at one point in time.
pub struct City {
    /// Unique identifier.
    pub id: CityId,
    /// Display name.
    pub name: String,
    /// Always [`COUNTRY_CODE`].
    pub country_code: String,
    /// Latitude of the city center.
    pub latitude: Option<f64>,
    /// Longitude of the city center.
    pub longitude: Option<f64>,
    /// Facilities in discovery order: live feed first, reference-only after.
    #[serde(rename = "parkings")]
    pub facilities: Vec<Facility>,
    /// Set once a fetch has completed.
    pub last_updated: Option<DateTime<Utc>>,
}

impl City {
    /// An aggregate with no facilities that has never been fetched.
    #[must_use]
    pub fn empty(meta: &CityMeta, center: Option<Coordinates>) -> Self {
        Self {
            id: meta.id.clone(),
            name: meta.name.clone(),
            country_code: COUNTRY_CODE.to_owned(),
            latitude: center.map(|point| point.latitude),
            longitude: center.map(|point| point.longitude),
            facilities: Vec::new(),
            last_updated: None,
        }
    }

    /// Look up a facility by canonical id.
    #[must_use]
    pub fn facility(&self, id: &FacilityId) -> Option<&Facility> {
        self.facilities.iter().find(|facility| &facility.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Static, offline metadata for one facility.
pub struct ReferenceRecord {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Latitude.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude.
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Street address.
    #[serde(default)]
    pub address: Option<String>,
    /// Capacity, `0` when unknown.
    #[serde(default)]
    pub total_spaces: u32,
}

impl ReferenceRecord {
    /// Coordinates if both halves are present.
    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// City listing entry, without facilities.
pub struct CitySummary {
    /// Unique identifier.
    pub id: CityId,
    /// Display name.
    pub name: String,
    /// Time of the last completed fetch, if any.
    pub last_updated: Option<DateTime<Utc>>,
}
