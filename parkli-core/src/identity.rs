//! Mapping upstream identifiers and names to canonical facility ids.

use std::collections::HashMap;

use dashmap::DashSet;
use tracing::warn;

use crate::model::FacilityId;

/// Strategy a source uses to turn its upstream keys into canonical ids.
#[derive(Debug, Clone)]
pub enum IdentityResolver {
    /// Fixed per-source table. Keys missing from the table are dropped.
    Table(MappingTable),
    /// Derive the id from the display name with [`slugify`].
    Slug,
}

impl IdentityResolver {
    /// Resolver backed by a static `(upstream, canonical)` table.
    #[must_use]
    pub fn table(entries: &[(&str, &str)]) -> Self {
        IdentityResolver::Table(MappingTable::new(entries))
    }

    /// Canonical id for `key`, or `None` when the table has no entry.
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<FacilityId> {
        match self {
            IdentityResolver::Table(table) => table.get(key),
            IdentityResolver::Slug => Some(FacilityId(slugify(key))),
        }
    }
}

/// Upstream key to canonical id lookup table.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    entries: HashMap<String, FacilityId>,
}

impl MappingTable {
    /// Build a table from `(upstream, canonical)` pairs.
    #[must_use]
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(upstream, canonical)| ((*upstream).to_owned(), FacilityId::from(*canonical)))
                .collect(),
        }
    }

    /// Canonical id mapped from `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<FacilityId> {
        self.entries.get(key).cloned()
    }

    /// Number of mapped keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Derive a canonical id from a display name.
///
/// Lowercases, turns spaces into hyphens and spells out German umlauts.
/// Applying it to its own output is a no-op.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.to_lowercase().chars() {
        match ch {
            ' ' => slug.push('-'),
            'ä' => slug.push_str("ae"),
            'ö' => slug.push_str("oe"),
            'ü' => slug.push_str("ue"),
            other => slug.push(other),
        }
    }
    slug
}

/// Upstream keys that already produced an "unmapped" warning.
///
/// Owned by one adapter, so each key is reported once per process run.
#[derive(Debug, Default)]
pub struct UnmappedKeys {
    seen: DashSet<String>,
}

impl UnmappedKeys {
    /// Record an unmapped key, warning only the first time it is seen.
    ///
    /// Returns whether this call emitted the warning.
    pub fn report(&self, source: &str, key: &str) -> bool {
        if self.seen.contains(key) || !self.seen.insert(key.to_owned()) {
            return false;
        }
        warn!(source, key, "no canonical id mapped for upstream key, dropping record");
        true
    }

    /// Number of distinct keys reported so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether no key has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
