//! Provider implementation for Basel using the data.bs.ch parking export.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use parkli_core::{
    adapter::{AdapterContext, CityAdapter},
    http::Fetcher,
    identity::IdentityResolver,
    model::{Cities, CityMeta, Coordinates, Facility, FacilityStatus},
    parse::{FormatParser, JsonParser},
    ports::{DataSource, DataSourceError, ParkingSource},
    reconcile::FacilityBuilder,
};

const FEED_URL: &str = "https://data.bs.ch/api/v2/catalog/datasets/100088/exports/json";
const SOURCE_NAME: &str = "BaselParkingSource";

/// Upstream `id2` to canonical facility id.
const PARKING_IDS: &[(&str, &str)] = &[
    ("elisabethen", "parkhaus-elisabethen"),
    ("steinen", "parkhaus-steinen"),
    ("storchen", "parkhaus-storchen"),
    ("badbahnhof", "parkhaus-bad-bahnhof"),
    ("rebgasse", "parkhaus-rebgasse"),
    ("postbasel", "parkhaus-post-basel"),
    ("centralbahn", "parkhaus-centralbahn"),
    ("bahnhofsued", "parkhaus-bahnhof-sued"),
    ("anfos", "parkhaus-anfos"),
    ("city", "parkhaus-city"),
    ("clarahuus", "parkhaus-clarahuus"),
    ("aeschen", "parkhaus-aeschen"),
    ("kunstmuseum", "parkhaus-kunstmuseum"),
    ("messe", "parkhaus-messe"),
    ("europe", "parkhaus-europe"),
    ("claramatte", "parkhaus-claramatte"),
];

/// One entry of the export.
#[derive(Debug, Clone, Deserialize)]
pub struct BaselRecord {
    #[serde(default)]
    id2: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    free: Option<i64>,
    #[serde(default)]
    total: Option<i64>,
    #[serde(default)]
    geo_point_2d: Option<GeoPoint>,
    #[serde(default)]
    address: Option<String>,
}

impl BaselRecord {
    fn is_open(&self) -> bool {
        self.status
            .as_deref()
            .map(str::trim)
            .is_some_and(|status| status.eq_ignore_ascii_case("offen"))
    }
}

/// Either half may be missing; the pair is only used when both are present.
#[derive(Debug, Clone, Copy, Deserialize)]
struct GeoPoint {
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

/// Live source for Basel.
pub struct BaselSource {
    meta: CityMeta,
    url: String,
    resolver: IdentityResolver,
    parser: JsonParser<BaselRecord>,
}

impl BaselSource {
    /// Source reading the public export.
    #[must_use]
    pub fn new() -> Self {
        Self::with_url(FEED_URL)
    }

    /// Source reading the export from `url`.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            meta: city_meta(),
            url: url.into(),
            resolver: IdentityResolver::table(PARKING_IDS),
            parser: JsonParser::new(SOURCE_NAME),
        }
    }
}

impl Default for BaselSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParkingSource for BaselSource {
    type Record = BaselRecord;

    fn city(&self) -> &CityMeta {
        &self.meta
    }

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    async fn fetch_live(&self, fetcher: &Fetcher) -> Result<Vec<BaselRecord>, DataSourceError> {
        let payload = fetcher
            .fetch(&self.url)
            .await
            .map_err(|err| DataSourceError::from_fetch(SOURCE_NAME, &err))?;
        Ok(self.parser.parse(&payload)?)
    }

    fn upstream_key<'r>(&self, record: &'r BaselRecord) -> Option<&'r str> {
        record.id2.as_deref()
    }

    fn build_facility(&self, facility: FacilityBuilder<'_>, record: &BaselRecord) -> Facility {
        let status = if record.is_open() {
            FacilityStatus::Open
        } else {
            FacilityStatus::Closed
        };

        facility
            .status(status)
            .available(record.free.unwrap_or(0))
            .live_capacity(record.total)
            .live_coordinates(
                record
                    .geo_point_2d
                    .and_then(|point| Coordinates::from_parts(point.lat, point.lon)),
            )
            .live_address(record.address.clone())
            .live_title(record.title.clone())
            .build()
    }
}

/// Build the Basel data source on top of the shared context.
#[must_use]
pub fn plugin(context: &AdapterContext) -> Arc<dyn DataSource> {
    Arc::new(CityAdapter::new(BaselSource::new(), context.clone()))
}

fn city_meta() -> CityMeta {
    CityMeta::new(Cities::Basel, "Basel")
}
