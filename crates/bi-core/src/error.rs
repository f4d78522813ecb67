//! Errors raised while interpreting URLs and user-supplied domains.

/// Error type for URL and domain handling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),
    #[error("Cannot block this page type")]
    UnsupportedScheme,
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
}
