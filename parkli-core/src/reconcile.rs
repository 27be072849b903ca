//! Merging live upstream records with reference data into city facilities.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::identity::UnmappedKeys;
use crate::model::{Coordinates, Facility, FacilityId, FacilityStatus, ReferenceRecord};
use crate::ports::ParkingSource;
use crate::reference::ReferenceRecords;

/// Share of capacity assumed free for reference-only facilities, in percent.
pub const DEFAULT_ESTIMATE_PERCENT: u8 = 30;

/// What an adapter does when its live feed cannot be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Raise the error to the caller.
    Propagate,
    /// Serve every reference facility as `Unknown` with no availability.
    Degraded,
}

/// How reference facilities missing from a successful live feed are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsentPolicy {
    /// `Open` with availability estimated by the adapter's [`EstimatePolicy`].
    Estimate,
    /// `Unknown` with zero availability.
    Unknown,
}

/// Placeholder availability for facilities that have no live signal.
///
/// This is a stand-in, not a measurement: a fixed share of the known capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatePolicy {
    percent: u8,
}

impl EstimatePolicy {
    /// Assume `percent` of capacity is free; values above 100 are capped.
    #[must_use]
    pub fn new(percent: u8) -> Self {
        Self {
            percent: percent.min(100),
        }
    }

    /// Configured share in percent.
    #[must_use]
    pub fn percent(self) -> u8 {
        self.percent
    }

    /// Estimated free spaces for `total_spaces`, rounded down.
    #[must_use]
    pub fn estimate(self, total_spaces: u32) -> u32 {
        let estimate = u64::from(total_spaces) * u64::from(self.percent) / 100;
        u32::try_from(estimate).unwrap_or(total_spaces)
    }
}

impl Default for EstimatePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ESTIMATE_PERCENT)
    }
}

/// Builds one [`Facility`] from typed live components and an optional reference record.
///
/// Field precedence:
/// - capacity: live when present and positive, else reference, else `0`
/// - coordinates: live when both halves are present, else reference
/// - address: live when non-empty, else reference
/// - name: reference, else live title, else `"Parking {id}"`
///
/// Availability is clamped to the capacity when it is known and forced to `0`
/// unless the status is `Open`.
#[derive(Debug, Clone)]
pub struct FacilityBuilder<'r> {
    id: FacilityId,
    city: String,
    at: DateTime<Utc>,
    reference: Option<&'r ReferenceRecord>,
    status: FacilityStatus,
    available: i64,
    capacity: Option<i64>,
    coordinates: Option<Coordinates>,
    address: Option<String>,
    title: Option<String>,
}

impl<'r> FacilityBuilder<'r> {
    /// Start a facility with `Unknown` status and nothing available.
    pub fn new(id: FacilityId, city: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id,
            city: city.into(),
            at,
            reference: None,
            status: FacilityStatus::Unknown,
            available: 0,
            capacity: None,
            coordinates: None,
            address: None,
            title: None,
        }
    }

    /// Canonical id of the facility being built.
    #[must_use]
    pub fn id(&self) -> &FacilityId {
        &self.id
    }

    /// Reference record attached to this facility, if any.
    #[must_use]
    pub fn reference_record(&self) -> Option<&'r ReferenceRecord> {
        self.reference
    }

    /// Attach the static reference record.
    #[must_use]
    pub fn reference(mut self, reference: Option<&'r ReferenceRecord>) -> Self {
        self.reference = reference;
        self
    }

    /// Canonical status.
    #[must_use]
    pub fn status(mut self, status: FacilityStatus) -> Self {
        self.status = status;
        self
    }

    /// Free spaces as reported live; negative values count as zero.
    #[must_use]
    pub fn available(mut self, available: i64) -> Self {
        self.available = available;
        self
    }

    /// Capacity as reported live.
    #[must_use]
    pub fn live_capacity(mut self, capacity: Option<i64>) -> Self {
        self.capacity = capacity;
        self
    }

    /// Coordinates as reported live.
    #[must_use]
    pub fn live_coordinates(mut self, coordinates: Option<Coordinates>) -> Self {
        self.coordinates = coordinates;
        self
    }

    /// Address as reported live.
    #[must_use]
    pub fn live_address(mut self, address: Option<String>) -> Self {
        self.address = address;
        self
    }

    /// Display name as reported live.
    #[must_use]
    pub fn live_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    /// Apply the precedence rules and produce the facility.
    #[must_use]
    pub fn build(self) -> Facility {
        let reference = self.reference;

        let total_spaces = self
            .capacity
            .filter(|capacity| *capacity > 0)
            .map(|capacity| u32::try_from(capacity).unwrap_or(u32::MAX))
            .or_else(|| reference.map(|record| record.total_spaces))
            .unwrap_or(0);

        let coordinates = self
            .coordinates
            .or_else(|| reference.and_then(ReferenceRecord::coordinates));

        let address = non_empty(self.address)
            .or_else(|| reference.and_then(|record| non_empty(record.address.clone())));

        let name = reference
            .and_then(|record| non_empty(record.name.clone()))
            .or_else(|| non_empty(self.title))
            .unwrap_or_else(|| format!("Parking {}", self.id));

        let available_spaces = if self.status.reports_availability() {
            let available = u32::try_from(self.available.max(0)).unwrap_or(u32::MAX);
            if total_spaces > 0 {
                available.min(total_spaces)
            } else {
                available
            }
        } else {
            0
        };

        Facility {
            id: self.id,
            name,
            city: self.city,
            address,
            latitude: coordinates.map(|point| point.latitude),
            longitude: coordinates.map(|point| point.longitude),
            available_spaces,
            total_spaces,
            status: self.status,
            last_updated: self.at,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

/// Inputs shared by one reconciliation run.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileContext<'a> {
    /// Reference records of the city.
    pub reference: &'a ReferenceRecords,
    /// Per-adapter record of already reported unmapped keys.
    pub unmapped: &'a UnmappedKeys,
    /// Estimate used for reference-only facilities.
    pub estimate: EstimatePolicy,
    /// Timestamp stamped on every produced facility.
    pub at: DateTime<Utc>,
}

impl ReconcileContext<'_> {
    fn builder(&self, id: FacilityId, city: &str) -> FacilityBuilder<'_> {
        let reference = self.reference.get(&id);
        FacilityBuilder::new(id, city, self.at).reference(reference)
    }
}

/// Resolve, merge, and complete a live feed.
///
/// Live facilities come first in feed order; a record whose key is missing or
/// unmapped is dropped. Reference facilities not seen live are appended after,
/// following the source's [`AbsentPolicy`].
pub fn reconcile<S: ParkingSource>(
    source: &S,
    records: &[S::Record],
    context: &ReconcileContext<'_>,
) -> Vec<Facility> {
    let city = source.city().name.as_str();
    let mut facilities = Vec::with_capacity(records.len() + context.reference.len());
    let mut seen = HashSet::new();
    let mut dropped = 0_usize;

    for record in records {
        let Some(key) = source.upstream_key(record) else {
            warn!(source = source.name(), "upstream record without key, dropping");
            dropped += 1;
            continue;
        };

        let Some(id) = source.resolver().resolve(key) else {
            context.unmapped.report(source.name(), key);
            dropped += 1;
            continue;
        };

        if seen.contains(&id) {
            debug!(source = source.name(), %id, "duplicate live record, keeping the first");
            continue;
        }
        seen.insert(id.clone());

        facilities.push(source.build_facility(context.builder(id, city), record));
    }

    let absent_status = match source.absent_policy() {
        AbsentPolicy::Estimate => FacilityStatus::Open,
        AbsentPolicy::Unknown => FacilityStatus::Unknown,
    };

    let mut reference_only = 0_usize;
    for (id, record) in context.reference {
        if seen.contains(id) {
            continue;
        }
        let available = match source.absent_policy() {
            AbsentPolicy::Estimate => context.estimate.estimate(record.total_spaces),
            AbsentPolicy::Unknown => 0,
        };
        facilities.push(
            context
                .builder(id.clone(), city)
                .status(absent_status)
                .available(i64::from(available))
                .build(),
        );
        reference_only += 1;
    }

    debug!(
        source = source.name(),
        live = seen.len(),
        reference_only,
        dropped,
        "reconciled live feed"
    );
    facilities
}

/// Every reference facility as `Unknown` with no availability.
#[must_use]
pub fn degraded(city: &str, context: &ReconcileContext<'_>) -> Vec<Facility> {
    context
        .reference
        .keys()
        .map(|id| {
            context
                .builder(id.clone(), city)
                .status(FacilityStatus::Unknown)
                .build()
        })
        .collect()
}
