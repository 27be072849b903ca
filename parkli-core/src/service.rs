//! High-level service facade combining all city sources.

use std::sync::Arc;

use crate::model::{City, CityId, CitySummary, Facility, FacilityId};
use crate::plugin::SourceRegistry;
use crate::ports::{DataSource, DataSourceError};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Failures surfaced by [`ParkliService`].
///
/// A route layer answers the first two variants with "not found" and
/// [`ServiceError::Source`] with "service unavailable".
pub enum ServiceError {
    /// No source is registered for the city.
    #[error("city {0} is not supported")]
    UnsupportedCity(CityId),
    /// The city aggregate has no facility with this id.
    #[error("facility {facility} not found in {city}")]
    FacilityNotFound {
        /// City that was searched.
        city: CityId,
        /// Requested facility id.
        facility: FacilityId,
    },
    /// The city's source failed.
    #[error(transparent)]
    Source(#[from] DataSourceError),
}

/// Public entry point for listing cities and reading their parking data.
pub struct ParkliService {
    registry: Arc<SourceRegistry>,
}

impl ParkliService {
    /// Create a new service bound to the provided registry.
    #[must_use]
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self { registry }
    }

    /// All registered cities, in registration order.
    #[must_use]
    pub fn cities(&self) -> Vec<CitySummary> {
        self.registry
            .list_all()
            .into_iter()
            .map(|source| CitySummary {
                id: source.city().id.clone(),
                name: source.city().name.clone(),
                last_updated: source.last_updated(),
            })
            .collect()
    }

    /// Current aggregate for `city`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::UnsupportedCity`] for unknown ids and
    /// [`ServiceError::Source`] when the city's source fails.
    pub async fn city(&self, city: &CityId) -> Result<Arc<City>, ServiceError> {
        Ok(self.source(city)?.get_data().await?)
    }

    /// One facility of `city`.
    ///
    /// # Errors
    ///
    /// Same as [`ParkliService::city`], plus [`ServiceError::FacilityNotFound`]
    /// when the aggregate does not contain `facility`.
    pub async fn facility(
        &self,
        city: &CityId,
        facility: &FacilityId,
    ) -> Result<Facility, ServiceError> {
        let aggregate = self.city(city).await?;
        aggregate
            .facility(facility)
            .cloned()
            .ok_or_else(|| ServiceError::FacilityNotFound {
                city: city.clone(),
                facility: facility.clone(),
            })
    }

    fn source(&self, city: &CityId) -> Result<&Arc<dyn DataSource>, ServiceError> {
        self.registry
            .get(city)
            .ok_or_else(|| ServiceError::UnsupportedCity(city.clone()))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::model::{Cities, CityMeta, FacilityStatus};
    use crate::ports::ErrorKind;

    struct Canned {
        meta: CityMeta,
        result: Result<Arc<City>, DataSourceError>,
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    #[async_trait]
    impl DataSource for Canned {
        fn city(&self) -> &CityMeta {
            &self.meta
        }

        fn source_name(&self) -> &str {
            "Canned"
        }

        fn last_updated(&self) -> Option<DateTime<Utc>> {
            self.result.as_ref().ok().and_then(|city| city.last_updated)
        }

        async fn get_data(&self) -> Result<Arc<City>, DataSourceError> {
            self.result.clone()
        }
    }

    fn service() -> ParkliService {
        let bern = CityMeta::new(Cities::Bern, "Bern");
        let mut city = City::empty(&bern, None);
        city.last_updated = Some(stamp());
        city.facilities.push(Facility {
            id: FacilityId::from("parkhaus-metro"),
            name: String::from("Metro"),
            city: String::from("Bern"),
            address: None,
            latitude: None,
            longitude: None,
            available_spaces: 12,
            total_spaces: 400,
            status: FacilityStatus::Open,
            last_updated: stamp(),
        });

        let basel = CityMeta::new(Cities::Basel, "Basel");
        let registry = SourceRegistry::new(vec![
            Arc::new(Canned {
                meta: bern,
                result: Ok(Arc::new(city)),
            }),
            Arc::new(Canned {
                meta: basel,
                result: Err(DataSourceError::new(
                    ErrorKind::Fetch,
                    "BaselParkingSource",
                    "timed out",
                )),
            }),
        ]);
        ParkliService::new(Arc::new(registry))
    }

    #[test]
    fn lists_cities_with_timestamps() {
        let cities = service().cities();
        let listed: Vec<_> = cities
            .iter()
            .map(|summary| (summary.id.0.as_str(), summary.last_updated))
            .collect();
        assert_eq!(listed, [("bern", Some(stamp())), ("basel", None)]);
    }

    #[tokio::test]
    async fn facility_lookup() {
        let service = service();
        let bern = CityId::from(Cities::Bern);

        let found = service
            .facility(&bern, &FacilityId::from("parkhaus-metro"))
            .await
            .map(|facility| facility.available_spaces);
        assert_eq!(found, Ok(12));

        let missing = service
            .facility(&bern, &FacilityId::from("parkhaus-nowhere"))
            .await;
        assert!(matches!(missing, Err(ServiceError::FacilityNotFound { .. })));
    }

    #[tokio::test]
    async fn unknown_city_and_source_failure_are_distinct() {
        let service = service();

        let unknown = service.city(&CityId::from("geneva")).await;
        assert!(matches!(unknown, Err(ServiceError::UnsupportedCity(id)) if id.0 == "geneva"));

        let failing = service.city(&CityId::from(Cities::Basel)).await;
        let Err(ServiceError::Source(err)) = failing else {
            panic!("expected a source failure");
        };
        assert_eq!(err.kind(), ErrorKind::Fetch);
    }
}
