//! Provider implementation for Lucerne using the PLS Luzern parking API.
//!
//! Lucerne is served in degraded mode when the API is unreachable or answers
//! with anything but a successful envelope: every known facility is listed
//! with `Unknown` status instead of failing the request.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use parkli_core::{
    adapter::{AdapterContext, CityAdapter},
    http::Fetcher,
    identity::IdentityResolver,
    model::{Cities, CityMeta, Facility, FacilityStatus},
    parse::{JsonParser, ParseError},
    ports::{DataSource, DataSourceError, ParkingSource},
    reconcile::{AbsentPolicy, FacilityBuilder, Fallback},
};

const FEED_URL: &str = "https://info.pls-luzern.ch/TeqParkingWS/GetFreeParks";
const SOURCE_NAME: &str = "LucerneParkingSource";
const SUCCESS: &str = "success";

/// Parking code to canonical facility id.
const PARKING_IDS: &[(&str, &str)] = &[
    ("AP01", "parkhaus-altstadt"),
    ("NP02", "parkhaus-bahnhof"),
    ("NU01", "parkhaus-kesselturm"),
    ("VS01", "parkhaus-sempacherstrasse"),
    ("KP01", "parkhaus-europagarage"),
    ("NP08", "parkhaus-musegg"),
    ("SP01", "parkhaus-casino-palace"),
    ("AP02", "parkhaus-sportgebaude"),
    ("AP03", "parkhaus-allmend-p3"),
    ("AP04", "parkhaus-allmend-messe-p2"),
    ("NP07", "parkhaus-schweizerhof"),
    ("NP11", "parkhaus-city-parking"),
    ("NP12", "parkhaus-loewencenter"),
    ("NP13", "parkhaus-nationalhof"),
    ("NR04", "parkhaus-verkehrshaus-lido"),
    ("PKF", "parkhaus-flora"),
    ("SP02", "parkhaus-altstadt-2"),
    ("SP03", "parkhaus-kesselturm-2"),
    ("SP04", "parkhaus-kantonalbank"),
    ("SP05", "parkhaus-bahnhof-p1-p2"),
    ("SP06", "parkhaus-bahnhof-p3"),
    ("SP09", "parkhaus-hirzenmatt"),
];

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Option<EnvelopeData>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    parkings: Option<IndexMap<String, ParkingEntry>>,
}

#[derive(Debug, Deserialize)]
struct ParkingEntry {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    vacancy: Option<Count>,
    #[serde(default)]
    capacity: Option<Count>,
    #[serde(default)]
    opened: Option<bool>,
    #[serde(default)]
    maintenance: Option<bool>,
}

/// The API sends counts either as numbers or as numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Count {
    Number(i64),
    Text(String),
}

impl Count {
    fn value(&self) -> Option<i64> {
        match self {
            Count::Number(value) => Some(*value),
            Count::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// One parking of the API response, keyed by its code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LucerneRecord {
    code: String,
    description: Option<String>,
    vacancy: i64,
    capacity: Option<i64>,
    open: bool,
}

impl LucerneRecord {
    fn from_entry(code: String, entry: ParkingEntry) -> Result<Self, ParseError> {
        let count = |field: &str, value: Option<&Count>| -> Result<Option<i64>, ParseError> {
            value
                .map(|count| {
                    count.value().ok_or_else(|| {
                        ParseError::new(SOURCE_NAME, format!("{code}: {field} is not a number"))
                    })
                })
                .transpose()
        };

        Ok(Self {
            vacancy: count("vacancy", entry.vacancy.as_ref())?.unwrap_or(0),
            capacity: count("capacity", entry.capacity.as_ref())?,
            open: entry.opened.unwrap_or(false) && !entry.maintenance.unwrap_or(false),
            description: entry.description,
            code,
        })
    }
}

/// Live source for Lucerne.
pub struct LucerneSource {
    meta: CityMeta,
    url: String,
    resolver: IdentityResolver,
    parser: JsonParser<Envelope>,
}

impl LucerneSource {
    /// Source reading the public API.
    #[must_use]
    pub fn new() -> Self {
        Self::with_url(FEED_URL)
    }

    /// Source reading the API at `url`.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            meta: CityMeta::new(Cities::Lucerne, "Luzern"),
            url: url.into(),
            resolver: IdentityResolver::table(PARKING_IDS),
            parser: JsonParser::new(SOURCE_NAME),
        }
    }

    fn unwrap_envelope(envelope: Envelope) -> Result<Vec<LucerneRecord>, ParseError> {
        if envelope.status.as_deref() != Some(SUCCESS) {
            return Err(ParseError::new(
                SOURCE_NAME,
                format!("unexpected envelope status {:?}", envelope.status),
            ));
        }

        let parkings = envelope
            .data
            .and_then(|data| data.parkings)
            .ok_or_else(|| ParseError::new(SOURCE_NAME, "envelope has no data.parkings"))?;

        parkings
            .into_iter()
            .map(|(code, entry)| LucerneRecord::from_entry(code, entry))
            .collect()
    }
}

impl Default for LucerneSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParkingSource for LucerneSource {
    type Record = LucerneRecord;

    fn city(&self) -> &CityMeta {
        &self.meta
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    fn fallback(&self) -> Fallback {
        Fallback::Degraded
    }

    fn absent_policy(&self) -> AbsentPolicy {
        AbsentPolicy::Unknown
    }

    async fn fetch_live(&self, fetcher: &Fetcher) -> Result<Vec<LucerneRecord>, DataSourceError> {
        let payload = fetcher
            .fetch(&self.url)
            .await
            .map_err(|err| DataSourceError::from_fetch(SOURCE_NAME, &err))?;

        let records = Self::unwrap_envelope(self.parser.parse_document(&payload)?)?;
        debug!(source = SOURCE_NAME, parkings = records.len(), "decoded envelope");
        Ok(records)
    }

    fn upstream_key<'r>(&self, record: &'r LucerneRecord) -> Option<&'r str> {
        Some(record.code.as_str())
    }

    fn build_facility(&self, facility: FacilityBuilder<'_>, record: &LucerneRecord) -> Facility {
        let status = if record.open {
            FacilityStatus::Open
        } else {
            FacilityStatus::Closed
        };

        facility
            .status(status)
            .available(record.vacancy)
            .live_capacity(record.capacity)
            .live_title(record.description.clone())
            .build()
    }
}

/// Build the Lucerne data source on top of the shared context.
#[must_use]
pub fn plugin(context: &AdapterContext) -> Arc<dyn DataSource> {
    Arc::new(CityAdapter::new(LucerneSource::new(), context.clone()))
}
