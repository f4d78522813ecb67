//! Blocked-page domain resolution
//!
//! The redirect that lands a tab on the blocked page can lose the original
//! URL, so the page works through three sources in priority order: the
//! background's per-tab record, the page's own `site` query parameter, and
//! the referrer. The first non-empty answer wins; there are no retries.

use crate::url::{domain_from_url, query_param, strip_www};

/// Query parameter carrying the blocked domain on the blocked page URL.
pub const SITE_PARAM: &str = "site";

/// Placeholder shown when no domain could be recovered.
pub const UNKNOWN_SITE: &str = "this site";

/// Break lengths offered on the blocked page, in minutes.
pub const BREAK_MINUTES: [u32; 3] = [5, 15, 30];

pub const QUOTES: &[&str] = &[
    "Stay focused. You blocked this site for a reason.",
    "Deep work beats distraction. Keep going.",
    "Your future self will thank you.",
    "Focus is a superpower. You have it.",
    "DROP AND GIVE ME 20 MINUTES OF PRODUCTIVITY, PRIVATE!",
    "IS THAT A TAB I SEE? EYES ON THE CODE, SOLDIER!",
    "YOU THINK THE ENEMY IS WATCHING CAT VIDEOS? GET BACK TO WORK!",
    "I\u{2019}m not mad, I\u{2019}m just disappointed. Get back to work.",
    "Is this really what we\u{2019}re doing with our life today?",
    "Oh, look who\u{2019}s trying to procrastinate again. How original.",
    "Error 404: Willpower not found. (Just kidding, go work.)",
    "This site is a trap. Don\u{2019}t be a snack.",
    "Congratulations! You just saved 15 minutes of your life. Use them wisely.",
    "Nothing to see here but your own untapped potential. Get moving.",
];

/// Where a resolved domain came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainSource {
    Tracker,
    UrlParameter,
    Referrer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDomain {
    pub domain: String,
    pub source: DomainSource,
}

/// Resolve the blocked domain from the tracker answer, the page URL and the
/// referrer, in that order.
pub fn resolve_blocked_domain(
    tracked: Option<&str>,
    page_url: &str,
    referrer: Option<&str>,
) -> Option<ResolvedDomain> {
    if let Some(domain) = tracked.map(str::trim).filter(|d| !d.is_empty()) {
        return Some(ResolvedDomain {
            domain: domain.to_string(),
            source: DomainSource::Tracker,
        });
    }

    if let Some(domain) = domain_from_page_url(page_url) {
        return Some(ResolvedDomain {
            domain,
            source: DomainSource::UrlParameter,
        });
    }

    domain_from_referrer(referrer).map(|domain| ResolvedDomain {
        domain,
        source: DomainSource::Referrer,
    })
}

/// The non-tracker part of the chain, sent to the background as the
/// `getBlockedDomain` fallback.
pub fn url_fallback(page_url: &str, referrer: Option<&str>) -> Option<String> {
    domain_from_page_url(page_url).or_else(|| domain_from_referrer(referrer))
}

fn domain_from_page_url(page_url: &str) -> Option<String> {
    query_param(page_url, SITE_PARAM)
        .map(|site| strip_www(&site.trim().to_ascii_lowercase()).to_string())
        .filter(|site| !site.is_empty())
}

fn domain_from_referrer(referrer: Option<&str>) -> Option<String> {
    referrer
        .filter(|r| !r.trim().is_empty())
        .and_then(|r| domain_from_url(r).ok())
        .filter(|d| !d.is_empty())
}

/// Everything the blocked page needs to render itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterstitialView {
    pub domain: Option<String>,
    pub display_name: String,
    pub title: String,
    pub quote: &'static str,
    /// Stats bar, unblock button and break buttons are only live with a domain.
    pub actions_enabled: bool,
    pub break_minutes: &'static [u32],
}

impl InterstitialView {
    pub fn new(domain: Option<&str>, seed: u32) -> Self {
        let domain = domain.map(str::trim).filter(|d| !d.is_empty());
        let quote = QUOTES[seed as usize % QUOTES.len()];

        match domain {
            Some(domain) => Self {
                domain: Some(domain.to_string()),
                display_name: domain.to_string(),
                title: format!("Blocked: {domain} \u{2014} BlockIt"),
                quote,
                actions_enabled: true,
                break_minutes: &BREAK_MINUTES,
            },
            None => Self {
                domain: None,
                display_name: UNKNOWN_SITE.to_string(),
                title: "Blocked \u{2014} BlockIt".to_string(),
                quote,
                actions_enabled: false,
                break_minutes: &[],
            },
        }
    }
}
