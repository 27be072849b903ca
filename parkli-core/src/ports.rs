//! Traits describing source capabilities and the error taxonomy shared by all adapters.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::http::{FetchError, Fetcher};
use crate::identity::IdentityResolver;
use crate::model::{City, CityMeta, Facility};
use crate::parse::ParseError;
use crate::reconcile::{AbsentPolicy, FacilityBuilder, Fallback};

/// Structured context attached to a [`DataSourceError`].
pub type ErrorDetails = BTreeMap<String, String>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors an adapter may surface to its caller.
///
/// The route layer maps the whole family to "service unavailable".
pub enum DataSourceError {
    /// Upstream could not be reached or timed out.
    #[error("{source_name}: {message}")]
    Fetch {
        /// Source that failed.
        source_name: String,
        /// Human-readable cause.
        message: String,
        /// Structured context such as URL or HTTP status.
        details: ErrorDetails,
    },
    /// Upstream payload could not be decoded into the expected shape.
    #[error("{source_name}: {message}")]
    Parse {
        /// Source that failed.
        source_name: String,
        /// Human-readable cause.
        message: String,
        /// Structured context.
        details: ErrorDetails,
    },
    /// Payload decoded but contained no usable records.
    #[error("{source_name}: {message}")]
    NoData {
        /// Source that failed.
        source_name: String,
        /// Human-readable cause.
        message: String,
        /// Structured context.
        details: ErrorDetails,
    },
    /// Any other failure inside an adapter.
    #[error("{source_name}: {message}")]
    Other {
        /// Source that failed.
        source_name: String,
        /// Human-readable cause.
        message: String,
        /// Structured context.
        details: ErrorDetails,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Discriminant of [`DataSourceError`].
pub enum ErrorKind {
    /// See [`DataSourceError::Fetch`].
    Fetch,
    /// See [`DataSourceError::Parse`].
    Parse,
    /// See [`DataSourceError::NoData`].
    NoData,
    /// See [`DataSourceError::Other`].
    Other,
}

impl DataSourceError {
    /// Build an error of the given kind.
    pub fn new(kind: ErrorKind, source_name: impl Into<String>, message: impl Into<String>) -> Self {
        let source_name = source_name.into();
        let message = message.into();
        let details = ErrorDetails::new();
        match kind {
            ErrorKind::Fetch => Self::Fetch {
                source_name,
                message,
                details,
            },
            ErrorKind::Parse => Self::Parse {
                source_name,
                message,
                details,
            },
            ErrorKind::NoData => Self::NoData {
                source_name,
                message,
                details,
            },
            ErrorKind::Other => Self::Other {
                source_name,
                message,
                details,
            },
        }
    }

    /// Shorthand for a [`DataSourceError::NoData`].
    pub fn no_data(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoData, source_name, message)
    }

    /// Shorthand for a [`DataSourceError::Other`].
    pub fn other(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, source_name, message)
    }

    /// Map a transport failure; body decode failures count as parse errors.
    #[must_use]
    pub fn from_fetch(source_name: &str, error: &FetchError) -> Self {
        let kind = if error.is_decode() {
            ErrorKind::Parse
        } else {
            ErrorKind::Fetch
        };
        let mut mapped = Self::new(kind, source_name, error.to_string());
        if let Some(url) = error.url() {
            mapped = mapped.with_detail("url", url);
        }
        if let Some(status) = error.status() {
            mapped = mapped.with_detail("status", status.to_string());
        }
        mapped
    }

    /// Attach one detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details_mut().insert(key.into(), value.into());
        self
    }

    /// Kind of failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::NoData { .. } => ErrorKind::NoData,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Name of the source the error originated from.
    #[must_use]
    pub fn source_name(&self) -> &str {
        match self {
            Self::Fetch { source_name, .. }
            | Self::Parse { source_name, .. }
            | Self::NoData { source_name, .. }
            | Self::Other { source_name, .. } => source_name,
        }
    }

    /// Human-readable cause without the source prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Fetch { message, .. }
            | Self::Parse { message, .. }
            | Self::NoData { message, .. }
            | Self::Other { message, .. } => message,
        }
    }

    /// Structured context.
    #[must_use]
    pub fn details(&self) -> &ErrorDetails {
        match self {
            Self::Fetch { details, .. }
            | Self::Parse { details, .. }
            | Self::NoData { details, .. }
            | Self::Other { details, .. } => details,
        }
    }

    fn details_mut(&mut self) -> &mut ErrorDetails {
        match self {
            Self::Fetch { details, .. }
            | Self::Parse { details, .. }
            | Self::NoData { details, .. }
            | Self::Other { details, .. } => details,
        }
    }
}

impl From<ParseError> for DataSourceError {
    fn from(error: ParseError) -> Self {
        Self::new(ErrorKind::Parse, error.source_name(), error.to_string())
    }
}

#[async_trait]
/// Source-specific hooks for one upstream feed.
///
/// Implementors only know how to fetch their feed and how to turn one of its
/// records into a [`Facility`]; identity resolution, merging with reference
/// data, and caching are shared and live in [`CityAdapter`](crate::adapter::CityAdapter).
pub trait ParkingSource: Send + Sync + 'static {
    /// Parsed but not yet reconciled upstream record.
    type Record: Send + Sync;

    /// Metadata describing the city served by this source.
    fn city(&self) -> &CityMeta;

    /// Name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Strategy mapping upstream keys to canonical facility ids.
    fn resolver(&self) -> &IdentityResolver;

    /// What happens when the live feed cannot be obtained.
    fn fallback(&self) -> Fallback {
        Fallback::Propagate
    }

    /// How reference facilities missing from a successful feed are reported.
    fn absent_policy(&self) -> AbsentPolicy {
        AbsentPolicy::Estimate
    }

    /// Fetch and decode the upstream feed.
    ///
    /// # Errors
    ///
    /// Returns a [`DataSourceError`] when the feed cannot be reached or decoded.
    async fn fetch_live(&self, fetcher: &Fetcher) -> Result<Vec<Self::Record>, DataSourceError>;

    /// Upstream key handed to the [`IdentityResolver`]; `None` drops the record.
    fn upstream_key<'r>(&self, record: &'r Self::Record) -> Option<&'r str>;

    /// Turn one live record into a facility.
    ///
    /// `facility` already carries the canonical id, the city, the fetch time and
    /// the matching reference record; the source adds its live components and
    /// calls [`FacilityBuilder::build`].
    fn build_facility(&self, facility: FacilityBuilder<'_>, record: &Self::Record) -> Facility;
}

#[async_trait]
/// Object-safe view of an adapter, used by the registry and the route layer.
pub trait DataSource: Send + Sync {
    /// Metadata describing the city.
    fn city(&self) -> &CityMeta;

    /// Name of the upstream source.
    fn source_name(&self) -> &str;

    /// Time of the last completed fetch.
    fn last_updated(&self) -> Option<DateTime<Utc>>;

    /// Current aggregate for the city, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns a [`DataSourceError`] when the upstream fails and the source
    /// defines no degraded fallback.
    async fn get_data(&self) -> Result<Arc<City>, DataSourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_prefixed_with_source() {
        let error = DataSourceError::no_data("BernParkingSource", "feed contained no records");
        assert_eq!(
            error.to_string(),
            "BernParkingSource: feed contained no records"
        );
        assert_eq!(error.kind(), ErrorKind::NoData);
        assert_eq!(error.message(), "feed contained no records");
    }

    #[test]
    fn details_accumulate() {
        let error = DataSourceError::other("X", "boom")
            .with_detail("url", "http://localhost")
            .with_detail("attempt", "1");
        assert_eq!(error.details().len(), 2);
        assert_eq!(
            error.details().get("url").map(String::as_str),
            Some("http://localhost")
        );
    }

    #[test]
    fn parse_errors_keep_source() {
        let parse = ParseError::new("BaselParkingSource", "expected value at line 1");
        let error = DataSourceError::from(parse);
        assert_eq!(error.kind(), ErrorKind::Parse);
        assert_eq!(error.source_name(), "BaselParkingSource");
    }
}
