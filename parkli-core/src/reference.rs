//! Static reference data: known facilities per city and city centers.
//!
//! Loading never fails a request. A missing or malformed document is logged
//! and treated as empty so live data can still be served.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::model::{Cities, CityId, Coordinates, FacilityId, ReferenceRecord};
use crate::settings::Settings;

/// Reference records of one city, in dataset order.
pub type ReferenceRecords = IndexMap<FacilityId, ReferenceRecord>;

const BUNDLED_CITIES: &str = include_str!("../data/cities.json");

fn bundled_parkings() -> [(Cities, &'static str); 4] {
    [
        (Cities::Basel, include_str!("../data/parkings/basel.json")),
        (Cities::Bern, include_str!("../data/parkings/bern.json")),
        (Cities::Lucerne, include_str!("../data/parkings/lucerne.json")),
        (Cities::Zurich, include_str!("../data/parkings/zurich.json")),
    ]
}

#[derive(Debug, Deserialize)]
struct CityRecord {
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

/// Read-only store of raw reference documents.
#[derive(Debug, Clone, Default)]
pub struct ReferenceStore {
    cities: Option<String>,
    parkings: HashMap<CityId, String>,
}

impl ReferenceStore {
    /// Dataset compiled into the crate.
    #[must_use]
    pub fn bundled() -> Self {
        Self::from_documents(
            Some(BUNDLED_CITIES.to_owned()),
            bundled_parkings()
                .into_iter()
                .map(|(city, document)| (CityId::from(city), document.to_owned())),
        )
    }

    /// Store over in-memory JSON documents.
    pub fn from_documents(
        cities: Option<String>,
        parkings: impl IntoIterator<Item = (CityId, String)>,
    ) -> Self {
        Self {
            cities,
            parkings: parkings.into_iter().collect(),
        }
    }

    /// Read `cities.json` and `parkings/<city>.json` from `dir` once.
    ///
    /// Unreadable files are logged and left out.
    #[must_use]
    pub fn from_dir(dir: &Path) -> Self {
        let cities = read_document(&dir.join("cities.json"));
        let parkings_dir = dir.join("parkings");

        let parkings = match fs::read_dir(&parkings_dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                .filter_map(|path| {
                    let city = path.file_stem()?.to_str()?.to_owned();
                    let document = read_document(&path)?;
                    Some((CityId(city), document))
                })
                .collect(),
            Err(err) => {
                warn!(dir = %parkings_dir.display(), error = %err, "reference parkings directory unreadable");
                HashMap::new()
            }
        };

        Self { cities, parkings }
    }

    /// Directory override from settings, otherwise the bundled dataset.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        settings
            .reference_dir
            .as_deref()
            .map_or_else(Self::bundled, Self::from_dir)
    }

    /// Reference records for `city`; empty when absent or malformed.
    #[must_use]
    pub fn records_for_city(&self, city: &CityId) -> ReferenceRecords {
        let Some(document) = self.parkings.get(city) else {
            debug!(%city, "no reference data for city");
            return ReferenceRecords::new();
        };

        serde_json::from_str(document).unwrap_or_else(|err| {
            warn!(%city, error = %err, "malformed reference data, ignoring");
            ReferenceRecords::new()
        })
    }

    /// Center of `city` when known.
    #[must_use]
    pub fn city_center(&self, city: &CityId) -> Option<Coordinates> {
        let document = self.cities.as_deref()?;
        let mut cities: HashMap<String, CityRecord> = serde_json::from_str(document)
            .inspect_err(|err| warn!(error = %err, "malformed city reference data, ignoring"))
            .ok()?;
        let record = cities.remove(&city.0)?;
        Coordinates::from_parts(record.latitude, record.longitude)
    }
}

fn read_document(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .inspect_err(|err| warn!(path = %path.display(), error = %err, "reference document unreadable"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_dataset_covers_every_city() {
        let store = ReferenceStore::bundled();
        for city in [Cities::Basel, Cities::Bern, Cities::Lucerne, Cities::Zurich] {
            let id = CityId::from(city);
            assert!(!store.records_for_city(&id).is_empty(), "no facilities for {id}");
            assert!(store.city_center(&id).is_some(), "no center for {id}");
        }
    }

    #[test]
    fn records_keep_dataset_order() {
        let store = ReferenceStore::from_documents(
            None,
            [(
                CityId::from("x"),
                r#"{"b": {"total_spaces": 1}, "a": {"name": "A", "total_spaces": 2}}"#.to_owned(),
            )],
        );
        let records = store.records_for_city(&CityId::from("x"));
        let ids: Vec<_> = records.keys().map(|id| id.0.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(records.get(&FacilityId::from("b")).and_then(|r| r.name.clone()), None);
    }

    #[test]
    fn malformed_or_missing_data_is_empty() {
        let store = ReferenceStore::from_documents(
            Some("{".to_owned()),
            [(CityId::from("x"), "[1, 2".to_owned())],
        );
        assert!(store.records_for_city(&CityId::from("x")).is_empty());
        assert!(store.records_for_city(&CityId::from("y")).is_empty());
        assert!(store.city_center(&CityId::from("x")).is_none());
    }

    #[test]
    fn missing_directory_is_empty() {
        let store = ReferenceStore::from_dir(Path::new("/definitely/not/here"));
        assert!(store.records_for_city(&CityId::from("basel")).is_empty());
        assert!(store.city_center(&CityId::from("basel")).is_none());
    }
}
