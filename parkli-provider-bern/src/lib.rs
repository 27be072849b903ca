//! Provider implementation for Bern using the parking-bern.ch XML feed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use parkli_core::{
    adapter::{AdapterContext, CityAdapter},
    http::Fetcher,
    identity::IdentityResolver,
    model::{Cities, CityMeta, Facility, FacilityStatus},
    parse::{FormatParser, XmlElement, XmlParser},
    ports::{DataSource, DataSourceError, ParkingSource},
    reconcile::FacilityBuilder,
};

const FEED_URL: &str = "https://www.parking-bern.ch/parkdata.xml";
const SOURCE_NAME: &str = "BernParkingSource";

/// `name` attribute to canonical facility id.
const PARKING_IDS: &[(&str, &str)] = &[
    ("P01", "parkhaus-bahnhof"),
    ("P02", "parkhaus-metro"),
    ("P03", "parkhaus-rathaus"),
    ("City West Parking Mu", "parkhaus-city-west"),
    ("P04", "parkhaus-bundesplatz"),
    ("P05", "parkhaus-mobiliar"),
    ("P06", "parkhaus-casino"),
    ("P+R", "parkhaus-neufeld-p+r"),
    ("P10", "parkhaus-kursaal"),
];

/// One `<parking>` element with its counts decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BernRecord {
    name: String,
    open: bool,
    /// `None` when the feed reports `-1` or omits the attribute.
    capacity: Option<i64>,
    free: i64,
}

impl BernRecord {
    fn from_element(element: &XmlElement) -> Option<Self> {
        let Some(name) = element.attribute("name").map(|name| name.trim().to_owned()) else {
            warn!(source = SOURCE_NAME, "parking element without name, skipping");
            return None;
        };

        let free = match element.attribute("spacefree").map(str::trim) {
            Some(value) => match value.parse::<i64>() {
                Ok(free) => free,
                Err(_) => {
                    warn!(source = SOURCE_NAME, key = %name, spacefree = value, "non-numeric free count, skipping");
                    return None;
                }
            },
            None => 0,
        };

        let capacity = match element.attribute("spacecount").map(str::trim) {
            Some(value) => match value.parse::<i64>() {
                Ok(-1) => None,
                Ok(count) => Some(count),
                Err(_) => {
                    warn!(source = SOURCE_NAME, key = %name, spacecount = value, "non-numeric capacity, skipping");
                    return None;
                }
            },
            None => None,
        };

        Some(Self {
            open: element.attribute("state").map(str::trim) == Some("1"),
            name,
            capacity,
            free,
        })
    }
}

/// Live source for Bern.
pub struct BernSource {
    meta: CityMeta,
    url: String,
    resolver: IdentityResolver,
    parser: XmlParser,
}

impl BernSource {
    /// Source reading the public feed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_url(FEED_URL)
    }

    /// Source reading the feed from `url`.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            meta: CityMeta::new(Cities::Bern, "Bern"),
            url: url.into(),
            resolver: IdentityResolver::table(PARKING_IDS),
            parser: XmlParser::new(SOURCE_NAME, "parking"),
        }
    }
}

impl Default for BernSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParkingSource for BernSource {
    type Record = BernRecord;

    fn city(&self) -> &CityMeta {
        &self.meta
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    async fn fetch_live(&self, fetcher: &Fetcher) -> Result<Vec<BernRecord>, DataSourceError> {
        let payload = fetcher
            .fetch(&self.url)
            .await
            .map_err(|err| DataSourceError::from_fetch(SOURCE_NAME, &err))?;

        let elements = self.parser.parse(&payload)?;
        if let Some(updated) = self.parser.root_attribute(&payload, "updated")? {
            debug!(source = SOURCE_NAME, %updated, "feed timestamp");
        }

        Ok(elements.iter().filter_map(BernRecord::from_element).collect())
    }

    fn upstream_key<'r>(&self, record: &'r BernRecord) -> Option<&'r str> {
        Some(record.name.as_str())
    }

    fn build_facility(&self, facility: FacilityBuilder<'_>, record: &BernRecord) -> Facility {
        let status = if record.open {
            FacilityStatus::Open
        } else {
            FacilityStatus::Closed
        };

        facility
            .status(status)
            .available(record.free)
            .live_capacity(record.capacity)
            .build()
    }
}

/// Build the Bern data source on top of the shared context.
#[must_use]
pub fn plugin(context: &AdapterContext) -> Arc<dyn DataSource> {
    Arc::new(CityAdapter::new(BernSource::new(), context.clone()))
}
