//! BlockIt Core Library
//!
//! This crate provides the data model and pure domain logic for the BlockIt
//! site blocker. Nothing in here performs I/O; the background service and the
//! wasm bindings layer storage, rule installation and tab control on top.
//!
//! # Modules
//!
//! - `types`: Persisted records (sites, break times, hit counters, update cache)
//! - `url`: Scheme / host extraction, `www.` stripping and domain normalisation
//! - `version`: Lenient `major.minor.patch` parsing and comparison
//! - `resolve`: Blocked-page domain resolution and view model
//! - `error`: Domain error type

pub mod error;
pub mod resolve;
pub mod types;
pub mod url;
pub mod version;

// Re-export commonly used types
pub use error::DomainError;
pub use resolve::{resolve_blocked_domain, DomainSource, InterstitialView, ResolvedDomain};
pub use types::{
    days_active, BlockHits, BreakTimes, EpochMillis, SchemeMask, Site, SiteId, TabId, Theme,
    UpdateInfo,
};
pub use url::{domain_from_url, normalize_domain, strip_www};
pub use version::Version;
