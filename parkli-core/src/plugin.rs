//! Registry holding one data source per supported city.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::model::{CityId, CityMeta};
use crate::ports::DataSource;

/// Lookup table from city id to its adapter, in registration order.
#[derive(Default)]
pub struct SourceRegistry {
    sources: IndexMap<CityId, Arc<dyn DataSource>>,
}

impl SourceRegistry {
    /// Build a registry from the provided sources.
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn DataSource>>) -> Self {
        let mut registry = Self::default();
        for source in sources {
            registry.register(source);
        }
        registry
    }

    /// Add a source; a later registration for the same city replaces the earlier one.
    pub fn register(&mut self, source: Arc<dyn DataSource>) {
        let id = source.city().id.clone();
        debug!(city = %id, source = source.source_name(), "registering data source");
        self.sources.insert(id, source);
    }

    /// Source for `city`, if registered.
    #[must_use]
    pub fn get(&self, city: &CityId) -> Option<&Arc<dyn DataSource>> {
        self.sources.get(city)
    }

    /// All sources in registration order.
    #[must_use]
    pub fn list_all(&self) -> Vec<&Arc<dyn DataSource>> {
        self.sources.values().collect()
    }

    /// Iterator over city metadata.
    pub fn cities_iter(&self) -> impl Iterator<Item = &CityMeta> {
        self.sources.values().map(|source| source.city())
    }

    /// Number of registered cities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no city is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
