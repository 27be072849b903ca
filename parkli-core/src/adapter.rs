//! The per-city adapter: cache lookup, live fetch, reconciliation, and fallback.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::cache::{CityCache, city_key};
use crate::http::Fetcher;
use crate::identity::UnmappedKeys;
use crate::model::{City, CityMeta, Facility};
use crate::ports::{DataSource, DataSourceError, ParkingSource};
use crate::reconcile::{EstimatePolicy, Fallback, ReconcileContext, degraded, reconcile};
use crate::reference::ReferenceStore;
use crate::settings::Settings;

/// Collaborators shared by every adapter of a process.
#[derive(Debug, Clone)]
pub struct AdapterContext {
    /// One cache for all cities.
    pub cache: Arc<CityCache>,
    /// Static reference data.
    pub reference: Arc<ReferenceStore>,
    /// HTTP transport with the configured timeout.
    pub fetcher: Fetcher,
    /// Placeholder availability for facilities without live data.
    pub estimate: EstimatePolicy,
}

impl AdapterContext {
    /// Bundle explicit collaborators.
    #[must_use]
    pub fn new(
        cache: Arc<CityCache>,
        reference: Arc<ReferenceStore>,
        fetcher: Fetcher,
        estimate: EstimatePolicy,
    ) -> Self {
        Self {
            cache,
            reference,
            fetcher,
            estimate,
        }
    }

    /// Build all collaborators from settings.
    ///
    /// # Errors
    ///
    /// Returns the [`reqwest::Error`] raised when the HTTP client cannot be built.
    pub fn from_settings(settings: &Settings) -> Result<Self, reqwest::Error> {
        Ok(Self::new(
            Arc::new(CityCache::new(settings.cache_ttl())),
            Arc::new(ReferenceStore::from_settings(settings)),
            Fetcher::from_settings(settings)?,
            settings.estimate(),
        ))
    }
}

/// Runs the shared fetch and reconcile flow for one [`ParkingSource`].
pub struct CityAdapter<S> {
    source: S,
    context: AdapterContext,
    unmapped: UnmappedKeys,
    last_updated: ArcSwapOption<DateTime<Utc>>,
}

impl<S: ParkingSource> CityAdapter<S> {
    /// Adapter for `source` using the shared `context`.
    #[must_use]
    pub fn new(source: S, context: AdapterContext) -> Self {
        Self {
            source,
            context,
            unmapped: UnmappedKeys::default(),
            last_updated: ArcSwapOption::empty(),
        }
    }

    /// The wrapped source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Cache key of this adapter's aggregate.
    #[must_use]
    pub fn cache_key(&self) -> String {
        city_key(&self.source.city().id)
    }

    /// Upstream keys this adapter could not map so far.
    #[must_use]
    pub fn unmapped(&self) -> &UnmappedKeys {
        &self.unmapped
    }

    /// Build a fresh aggregate, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns the source's [`DataSourceError`] when the live feed fails and the
    /// source falls back with [`Fallback::Propagate`]. An empty feed counts as
    /// [`DataSourceError::NoData`].
    pub async fn fetch_data(&self) -> Result<City, DataSourceError> {
        let meta = self.source.city();
        let source_name = self.source.name();

        info!(city = %meta.id, source = source_name, "fetching live data");
        let live = self
            .source
            .fetch_live(&self.context.fetcher)
            .await
            .and_then(|records| {
                if records.is_empty() {
                    Err(DataSourceError::no_data(
                        source_name,
                        "upstream feed contained no records",
                    ))
                } else {
                    Ok(records)
                }
            });

        let reference = self.context.reference.records_for_city(&meta.id);
        let context = ReconcileContext {
            reference: &reference,
            unmapped: &self.unmapped,
            estimate: self.context.estimate,
            at: Utc::now(),
        };

        let facilities = match live {
            Ok(records) => reconcile(&self.source, &records, &context),
            Err(err) => match self.source.fallback() {
                Fallback::Degraded => {
                    warn!(
                        city = %meta.id,
                        source = source_name,
                        error = %err,
                        "live data unavailable, serving reference data as unknown"
                    );
                    degraded(&meta.name, &context)
                }
                Fallback::Propagate => {
                    error!(city = %meta.id, source = source_name, error = %err, "live data unavailable");
                    return Err(err);
                }
            },
        };

        info!(city = %meta.id, facilities = facilities.len(), "city data refreshed");
        Ok(self.assemble(meta, facilities, context.at))
    }

    fn assemble(
        &self,
        meta: &CityMeta,
        facilities: Vec<Facility>,
        at: DateTime<Utc>,
    ) -> City {
        let center = self.context.reference.city_center(&meta.id);
        City {
            facilities,
            last_updated: Some(at),
            ..City::empty(meta, center)
        }
    }
}

#[async_trait]
impl<S: ParkingSource> DataSource for CityAdapter<S> {
    fn city(&self) -> &CityMeta {
        self.source.city()
    }

    fn source_name(&self) -> &str {
        self.source.name()
    }

    fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated.load_full().map(|at| *at)
    }

    async fn get_data(&self) -> Result<Arc<City>, DataSourceError> {
        let key = self.cache_key();
        if let Some(city) = self.context.cache.get(&key) {
            return Ok(city);
        }

        let city = Arc::new(self.fetch_data().await?);
        self.last_updated
            .store(city.last_updated.map(Arc::new));
        self.context.cache.set(key, Arc::clone(&city));
        Ok(city)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use reqwest::Client;

    use super::*;
    use crate::identity::IdentityResolver;
    use crate::model::{Cities, CityId, FacilityId, FacilityStatus};
    use crate::ports::ErrorKind;
    use crate::reconcile::{AbsentPolicy, FacilityBuilder};

    #[derive(Clone, Copy)]
    enum Behaviour {
        Live,
        Empty,
        Fail,
    }

    struct ScriptedSource {
        meta: CityMeta,
        resolver: IdentityResolver,
        behaviour: Behaviour,
        fallback: Fallback,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(behaviour: Behaviour, fallback: Fallback) -> Self {
            Self {
                meta: CityMeta::new(Cities::Lucerne, "Luzern"),
                resolver: IdentityResolver::table(&[("AP01", "parkhaus-altstadt")]),
                behaviour,
                fallback,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ParkingSource for ScriptedSource {
        type Record = (&'static str, i64);

        fn city(&self) -> &CityMeta {
            &self.meta
        }

        fn name(&self) -> &'static str {
            "ScriptedSource"
        }

        fn resolver(&self) -> &IdentityResolver {
            &self.resolver
        }

        fn fallback(&self) -> Fallback {
            self.fallback
        }

        fn absent_policy(&self) -> AbsentPolicy {
            AbsentPolicy::Estimate
        }

        async fn fetch_live(
            &self,
            _fetcher: &Fetcher,
        ) -> Result<Vec<(&'static str, i64)>, DataSourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Live => Ok(vec![("AP01", 12), ("ZZ99", 3)]),
                Behaviour::Empty => Ok(Vec::new()),
                Behaviour::Fail => Err(DataSourceError::new(
                    ErrorKind::Fetch,
                    "ScriptedSource",
                    "connection refused",
                )),
            }
        }

        fn upstream_key<'r>(&self, record: &'r (&'static str, i64)) -> Option<&'r str> {
            Some(record.0)
        }

        fn build_facility(
            &self,
            facility: FacilityBuilder<'_>,
            record: &(&'static str, i64),
        ) -> Facility {
            facility
                .status(FacilityStatus::Open)
                .available(record.1)
                .build()
        }
    }

    fn context() -> AdapterContext {
        let reference = ReferenceStore::from_documents(
            Some(r#"{"lucerne": {"latitude": 47.05, "longitude": 8.31}}"#.to_owned()),
            [(
                CityId::from(Cities::Lucerne),
                r#"{
                    "parkhaus-altstadt": {"name": "Altstadt", "total_spaces": 170},
                    "parkhaus-flora": {"name": "Flora", "total_spaces": 200}
                }"#
                .to_owned(),
            )],
        );
        AdapterContext::new(
            Arc::new(CityCache::new(Duration::from_secs(60))),
            Arc::new(reference),
            Fetcher::new(Client::new(), Duration::from_secs(1)),
            EstimatePolicy::default(),
        )
    }

    #[tokio::test]
    async fn live_data_is_reconciled_and_cached() {
        let adapter = CityAdapter::new(ScriptedSource::new(Behaviour::Live, Fallback::Propagate), context());
        assert!(adapter.last_updated().is_none());

        let city = adapter.get_data().await;
        let Ok(city) = city else {
            panic!("live fetch should succeed: {city:?}");
        };

        let summary: Vec<_> = city
            .facilities
            .iter()
            .map(|f| (f.id.0.as_str(), f.status, f.available_spaces))
            .collect();
        assert_eq!(
            summary,
            [
                ("parkhaus-altstadt", FacilityStatus::Open, 12),
                ("parkhaus-flora", FacilityStatus::Open, 60),
            ]
        );
        assert_eq!(city.latitude, Some(47.05));
        assert_eq!(city.last_updated, adapter.last_updated());
        assert_eq!(adapter.unmapped().len(), 1);

        let again = adapter.get_data().await.ok();
        assert_eq!(adapter.source().calls.load(Ordering::SeqCst), 1);
        assert!(again.is_some_and(|cached| Arc::ptr_eq(&cached, &city)));
    }

    #[tokio::test]
    async fn failure_with_fallback_degrades() {
        let adapter = CityAdapter::new(ScriptedSource::new(Behaviour::Fail, Fallback::Degraded), context());
        let city = adapter.get_data().await;
        let Ok(city) = city else {
            panic!("degraded mode must not raise: {city:?}");
        };
        assert_eq!(city.facilities.len(), 2);
        assert!(
            city.facilities
                .iter()
                .all(|f| f.status == FacilityStatus::Unknown && f.available_spaces == 0)
        );
        assert_eq!(
            city.facility(&FacilityId::from("parkhaus-flora")).map(|f| f.total_spaces),
            Some(200)
        );
    }

    #[tokio::test]
    async fn failure_without_fallback_propagates() {
        let adapter = CityAdapter::new(ScriptedSource::new(Behaviour::Fail, Fallback::Propagate), context());
        let result = adapter.get_data().await;
        let Err(err) = result else {
            panic!("expected an error");
        };
        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert_eq!(err.source_name(), "ScriptedSource");
        assert!(adapter.last_updated().is_none());
        assert!(adapter.context.cache.is_empty());
    }

    #[tokio::test]
    async fn empty_feed_is_no_data() {
        let adapter = CityAdapter::new(ScriptedSource::new(Behaviour::Empty, Fallback::Propagate), context());
        let err = adapter.fetch_data().await.err();
        assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::NoData));
    }

    #[tokio::test]
    async fn cache_is_shared_between_adapters_of_a_context() {
        let shared = context();
        let first = CityAdapter::new(ScriptedSource::new(Behaviour::Live, Fallback::Propagate), shared.clone());
        let second = CityAdapter::new(ScriptedSource::new(Behaviour::Live, Fallback::Propagate), shared);

        let _warm = first.get_data().await;
        let _hit = second.get_data().await;
        assert_eq!(second.source().calls.load(Ordering::SeqCst), 0);
    }
}
