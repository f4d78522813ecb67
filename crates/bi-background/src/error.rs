//! Error types for the background service.
//!
//! `BackgroundError`'s `Display` text is what the pages show the user, so
//! the short messages are part of the command contract.

use bi_core::{DomainError, SiteId, TabId};

/// Error type for the persistent and session key-value stores.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Backend(String),
    #[error("stored value for '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("cannot encode value for '{key}': {reason}")]
    Encode { key: String, reason: String },
}

/// Error type for the host rule engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuleEngineError {
    #[error("rule engine unavailable: {0}")]
    Backend(String),
    #[error("rule update rejected: {0}")]
    Rejected(String),
}

/// Error type for tab access.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TabsError {
    #[error("tab {0} not found")]
    NotFound(TabId),
    #[error("tabs unavailable: {0}")]
    Backend(String),
}

/// Error type for the release feed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("release feed not configured")]
    NotConfigured,
    #[error("release feed request failed: {0}")]
    Network(String),
    #[error("release feed returned HTTP {0}")]
    Status(u16),
    #[error("release feed response malformed: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BackgroundError {
    #[error("Already blocked")]
    AlreadyBlocked { domain: String },
    #[error("No URL")]
    NoUrl,
    #[error("Site not found")]
    SiteNotFound(SiteId),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    RuleEngine(#[from] RuleEngineError),
    #[error(transparent)]
    Tabs(#[from] TabsError),
    #[error(transparent)]
    Feed(#[from] FeedError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        let already = BackgroundError::AlreadyBlocked { domain: "a.com".into() };
        assert_eq!(already.to_string(), "Already blocked");
        let page = BackgroundError::from(DomainError::UnsupportedScheme);
        assert_eq!(page.to_string(), "Cannot block this page type");
        assert_eq!(BackgroundError::NoUrl.to_string(), "No URL");
    }
}
