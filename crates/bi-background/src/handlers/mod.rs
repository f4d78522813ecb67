//! Command handlers.
//!
//! Each handler is an inherent method on [`Background`](crate::Background)
//! returning the success payload; the dispatcher turns errors into failure
//! responses. Handlers that change blocking state always await a resync
//! before returning.

mod breaks;
mod data;
mod pending;
mod prefs;
mod sites;
mod stats;
mod updates;

use bi_core::strip_www;

/// Lowercase, trim and drop a leading `www.` from a domain sent by a page.
pub(crate) fn bare(domain: &str) -> String {
    strip_www(&domain.trim().to_ascii_lowercase()).to_string()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare() {
        assert_eq!(bare(" WWW.Reddit.com "), "reddit.com");
        assert_eq!(bare("news.ycombinator.com"), "news.ycombinator.com");
    }
}
