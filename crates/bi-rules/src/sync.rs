//! State to rule-set projection.
//!
//! A rule exists for domain D at instant T iff the global switch is on, some
//! enabled site has domain D, and D has no break time expiring after T.

use bi_core::url::encode_component;
use bi_core::{BreakTimes, EpochMillis, Site};
use log::{debug, warn};

use crate::ids::{RuleIdAllocator, DEFAULT_RULE_ID_OFFSET, DEFAULT_RULE_ID_RANGE};
use crate::rule::{Rule, RuleId, RuleSet};

pub const DEFAULT_INTERSTITIAL_PATH: &str = "/blocked.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub rule_id_offset: RuleId,
    pub rule_id_range: RuleId,
    /// Extension-relative path of the blocked page.
    pub interstitial_path: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            rule_id_offset: DEFAULT_RULE_ID_OFFSET,
            rule_id_range: DEFAULT_RULE_ID_RANGE,
            interstitial_path: DEFAULT_INTERSTITIAL_PATH.to_string(),
        }
    }
}

impl SyncOptions {
    pub fn allocator(&self) -> RuleIdAllocator {
        RuleIdAllocator::new(self.rule_id_offset, self.rule_id_range)
    }

    /// Blocked page path carrying `domain` as the `site` parameter.
    pub fn redirect_path(&self, domain: &str) -> String {
        format!("{}?site={}", self.interstitial_path, encode_component(domain))
    }
}

/// Compute the rule set with default options.
pub fn synchronize(
    sites: &[Site],
    global_enabled: bool,
    break_times: &BreakTimes,
    now: EpochMillis,
) -> RuleSet {
    synchronize_with(&SyncOptions::default(), sites, global_enabled, break_times, now)
}

/// Compute the rule set that should be installed for the given state.
pub fn synchronize_with(
    options: &SyncOptions,
    sites: &[Site],
    global_enabled: bool,
    break_times: &BreakTimes,
    now: EpochMillis,
) -> RuleSet {
    if !global_enabled {
        return RuleSet::default();
    }

    let mut active: Vec<(&Site, String)> = sites
        .iter()
        .filter(|site| site.enabled)
        .map(|site| (site, site.bare_domain()))
        .filter(|(_, domain)| !domain.is_empty())
        .filter(|(site, domain)| {
            let exempt = break_times.is_exempt(domain, now);
            if exempt {
                debug!("site {} ({}) on break, no rule", site.id, domain);
            }
            !exempt
        })
        .collect();

    // Allocation order must not depend on list order.
    active.sort_by_key(|(site, _)| site.id);

    let mut allocator = options.allocator();
    let mut rules = Vec::with_capacity(active.len());
    for (site, domain) in active {
        match allocator.allocate(site.id) {
            Some(id) => rules.push(Rule::redirect(id, &domain, options.redirect_path(&domain))),
            None => warn!("rule id range exhausted, site {} ({}) left unblocked", site.id, domain),
        }
    }

    RuleSet::new(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bi_core::SiteId;
    use chrono::{TimeZone, Utc};

    const NOW: EpochMillis = 1_700_000_000_000;
    const MINUTE: EpochMillis = 60_000;

    fn site(id: u64, domain: &str, enabled: bool) -> Site {
        let mut site = Site::new(SiteId(id), domain, Utc.timestamp_millis_opt(id as i64).unwrap());
        site.enabled = enabled;
        site
    }

    #[test]
    fn test_single_site_rule() {
        let sites = vec![site(1_700_000_000_001, "reddit.com", true)];
        let set = synchronize(&sites, true, &BreakTimes::new(), NOW);

        assert_eq!(set.len(), 1);
        let rule = &set.rules[0];
        assert_eq!(rule.id, 1000 + (1_700_000_000_001u64 % 900_000) as u32);
        assert_eq!(rule.condition.request_domains, vec!["reddit.com", "www.reddit.com"]);
        assert_eq!(rule.extension_path(), "/blocked.html?site=reddit.com");
    }

    #[test]
    fn test_disabled_and_global_off() {
        let sites = vec![site(1, "a.com", true), site(2, "b.com", false)];
        let set = synchronize(&sites, true, &BreakTimes::new(), NOW);
        assert_eq!(set.len(), 1);
        assert!(set.rule_for("a.com").is_some());

        assert!(synchronize(&sites, false, &BreakTimes::new(), NOW).is_empty());
    }

    #[test]
    fn test_break_time_exemption_window() {
        let sites = vec![site(1, "reddit.com", true)];
        let mut breaks = BreakTimes::new();
        breaks.grant("reddit.com", NOW + 5 * MINUTE);

        assert!(synchronize(&sites, true, &breaks, NOW).is_empty());
        assert!(synchronize(&sites, true, &breaks, NOW + 5 * MINUTE).rule_for("reddit.com").is_some());
        assert!(synchronize(&sites, true, &breaks, NOW + 6 * MINUTE).rule_for("reddit.com").is_some());
    }

    #[test]
    fn test_stored_www_domain_is_stripped() {
        let sites = vec![site(3, "WWW.Example.com", true)];
        let set = synchronize(&sites, true, &BreakTimes::new(), NOW);
        assert_eq!(set.rules[0].condition.request_domains, vec!["example.com", "www.example.com"]);
    }

    #[test]
    fn test_idempotent_and_order_independent() {
        let a = vec![site(5, "a.com", true), site(900_005, "b.com", true)];
        let b = vec![site(900_005, "b.com", true), site(5, "a.com", true)];
        let first = synchronize(&a, true, &BreakTimes::new(), NOW);
        let second = synchronize(&a, true, &BreakTimes::new(), NOW);
        let reordered = synchronize(&b, true, &BreakTimes::new(), NOW);
        assert_eq!(first, second);
        assert_eq!(first, reordered);
        assert_eq!(first.ids(), vec![1005, 1006]);
    }

    #[test]
    fn test_ids_injective_under_collisions() {
        let sites: Vec<Site> = (0..50)
            .map(|i| site(7 + i * 900_000, &format!("site{i}.com"), true))
            .collect();
        let set = synchronize(&sites, true, &BreakTimes::new(), NOW);
        let mut ids = set.ids();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_custom_interstitial_and_encoding() {
        let options = SyncOptions {
            interstitial_path: "/pages/blocked.html".to_string(),
            ..SyncOptions::default()
        };
        let sites = vec![site(1, "xn--bcher-kva.example", true)];
        let set = synchronize_with(&options, &sites, true, &BreakTimes::new(), NOW);
        assert_eq!(set.rules[0].extension_path(), "/pages/blocked.html?site=xn--bcher-kva.example");
        assert_eq!(options.redirect_path("a b"), "/pages/blocked.html?site=a%20b");
    }
}
