//! Provider implementation for Zurich using the PLS RSS feed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use parkli_core::{
    adapter::{AdapterContext, CityAdapter},
    http::Fetcher,
    identity::IdentityResolver,
    model::{Cities, CityMeta, Facility, FacilityStatus},
    parse::{FormatParser, XmlElement, XmlParser},
    ports::{DataSource, DataSourceError, ParkingSource},
    reconcile::FacilityBuilder,
};

const FEED_URL: &str = "https://www.pls-zh.ch/plsFeed/rss";
const SOURCE_NAME: &str = "ZurichParkingSource";

/// State words meaning the facility does not accept vehicles.
const CLOSED_STATES: &[&str] = &["closed", "geschlossen"];

/// One RSS `<item>`.
///
/// The description has the shape `"<state> / <free>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZurichRecord {
    title: Option<String>,
    state: String,
    free: Option<i64>,
}

impl ZurichRecord {
    fn from_item(item: &XmlElement) -> Self {
        let title = item
            .child_text("title")
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_owned);
        let description = item.child_text("description").unwrap_or_default();

        let (state, free) = match description.split_once('/') {
            Some((state, free)) => (state.trim(), free.trim().parse::<i64>().ok()),
            None => (description.trim(), None),
        };
        if free.is_none() {
            warn!(source = SOURCE_NAME, title = ?title, description, "unparseable description");
        }

        Self {
            title,
            state: state.to_lowercase(),
            free,
        }
    }

    fn status(&self) -> FacilityStatus {
        match self.free {
            None => FacilityStatus::Unknown,
            Some(_) if CLOSED_STATES.contains(&self.state.as_str()) => FacilityStatus::Closed,
            Some(_) => FacilityStatus::Open,
        }
    }
}

/// Live source for Zurich.
pub struct ZurichSource {
    meta: CityMeta,
    url: String,
    resolver: IdentityResolver,
    parser: XmlParser,
}

impl ZurichSource {
    /// Source reading the public feed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_url(FEED_URL)
    }

    /// Source reading the feed from `url`.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            meta: CityMeta::new(Cities::Zurich, "Zürich"),
            url: url.into(),
            resolver: IdentityResolver::Slug,
            parser: XmlParser::new(SOURCE_NAME, "item"),
        }
    }
}

impl Default for ZurichSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParkingSource for ZurichSource {
    type Record = ZurichRecord;

    fn city(&self) -> &CityMeta {
        &self.meta
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    async fn fetch_live(&self, fetcher: &Fetcher) -> Result<Vec<ZurichRecord>, DataSourceError> {
        let payload = fetcher
            .fetch(&self.url)
            .await
            .map_err(|err| DataSourceError::from_fetch(SOURCE_NAME, &err))?;

        Ok(self
            .parser
            .parse(&payload)?
            .iter()
            .map(ZurichRecord::from_item)
            .collect())
    }

    fn upstream_key<'r>(&self, record: &'r ZurichRecord) -> Option<&'r str> {
        record.title.as_deref()
    }

    fn build_facility(&self, facility: FacilityBuilder<'_>, record: &ZurichRecord) -> Facility {
        facility
            .status(record.status())
            .available(record.free.unwrap_or(0))
            .live_title(record.title.clone())
            .build()
    }
}

/// Build the Zurich data source on top of the shared context.
#[must_use]
pub fn plugin(context: &AdapterContext) -> Arc<dyn DataSource> {
    Arc::new(CityAdapter::new(ZurichSource::new(), context.clone()))
}
