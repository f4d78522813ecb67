//! Core type definitions for BlockIt
//!
//! These types map directly to the values kept in the extension's
//! persistent key-value namespace and are serialized with the same
//! camelCase field names.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::url::strip_www;

/// Browser tab identifier.
pub type TabId = i32;

/// Milliseconds since the Unix epoch.
pub type EpochMillis = i64;

const DAY_MS: i64 = 86_400_000;

// =============================================================================
// Scheme Masks
// =============================================================================

bitflags::bitflags! {
    /// URL scheme mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SchemeMask: u8 {
        const HTTP = 1 << 0;
        const HTTPS = 1 << 1;
        /// Browser-internal pages (chrome://, about:, extension pages)
        const INTERNAL = 1 << 2;
        /// Schemes whose top-level navigations can be blocked
        const BLOCKABLE = Self::HTTP.bits() | Self::HTTPS.bits();
    }
}

// =============================================================================
// Sites
// =============================================================================

/// Site identifier: the creation timestamp in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub u64);

impl SiteId {
    /// Allocate an id from `now`, bumped past `last` so ids stay unique
    /// even when two sites are created within the same millisecond.
    pub fn allocate(now: DateTime<Utc>, last: Option<SiteId>) -> Self {
        let candidate = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        match last {
            Some(SiteId(prev)) if prev >= candidate => SiteId(prev + 1),
            _ => SiteId(candidate),
        }
    }
}

impl std::fmt::Display for SiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A domain the user wants blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: SiteId,
    /// Lowercase, without a leading `www.`
    pub domain: String,
    pub enabled: bool,
    pub added_at: DateTime<Utc>,
}

impl Site {
    /// Create an enabled site.
    pub fn new(id: SiteId, domain: impl Into<String>, added_at: DateTime<Utc>) -> Self {
        Self {
            id,
            domain: domain.into(),
            enabled: true,
            added_at,
        }
    }

    /// The stored domain with any leading `www.` removed and lowercased.
    ///
    /// Older records may predate normalisation, so comparisons always go
    /// through this.
    pub fn bare_domain(&self) -> String {
        strip_www(&self.domain.to_ascii_lowercase()).to_string()
    }

    /// Whether this site refers to `domain` (case-insensitive, ignoring `www.`).
    pub fn matches(&self, domain: &str) -> bool {
        self.bare_domain() == strip_www(&domain.to_ascii_lowercase())
    }
}

// =============================================================================
// Break Times
// =============================================================================

/// Temporary exemptions: domain -> expiry in epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BreakTimes(BTreeMap<String, EpochMillis>);

impl BreakTimes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the exemption for `domain`.
    pub fn grant(&mut self, domain: impl Into<String>, expires_at: EpochMillis) {
        self.0.insert(domain.into(), expires_at);
    }

    pub fn expiry(&self, domain: &str) -> Option<EpochMillis> {
        self.0.get(domain).copied()
    }

    /// A domain is exempt while its expiry lies strictly in the future.
    pub fn is_exempt(&self, domain: &str, now: EpochMillis) -> bool {
        matches!(self.expiry(domain), Some(expiry) if expiry > now)
    }

    pub fn remove(&mut self, domain: &str) -> Option<EpochMillis> {
        self.0.remove(domain)
    }

    /// Drop every entry whose expiry has passed; returns the removed domains.
    pub fn prune_expired(&mut self, now: EpochMillis) -> Vec<String> {
        let expired: Vec<String> = self
            .0
            .iter()
            .filter(|(_, &expiry)| expiry <= now)
            .map(|(domain, _)| domain.clone())
            .collect();
        for domain in &expired {
            self.0.remove(domain);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, EpochMillis)> {
        self.0.iter().map(|(domain, &expiry)| (domain.as_str(), expiry))
    }
}

// =============================================================================
// Block Hits
// =============================================================================

/// Per-domain count of blocked-page views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHits(BTreeMap<String, u64>);

impl BlockHits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter for `domain` and return the new value.
    pub fn record(&mut self, domain: &str) -> u64 {
        let count = self.0.entry(domain.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn get(&self, domain: &str) -> u64 {
        self.0.get(domain).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// Update Cache
// =============================================================================

/// Result of the most recent release-feed check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub latest_version: Option<String>,
    pub update_available: bool,
    pub release_url: Option<String>,
    pub last_check: Option<DateTime<Utc>>,
}

// =============================================================================
// Theme
// =============================================================================

/// Display preference shared by every extension page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Whole days since install, rounded to nearest, never below 1.
pub fn days_active(install_date: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let elapsed = now.timestamp_millis() - install_date.timestamp_millis();
    let days = (elapsed as f64 / DAY_MS as f64).round();
    if days < 1.0 {
        1
    } else {
        days.min(u32::MAX as f64) as u32
    }
}
