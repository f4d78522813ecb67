//! Service configuration.
//!
//! Every field has a default, so hosts only pass what they override.

use std::time::Duration;

use bi_rules::ids::{DEFAULT_RULE_ID_OFFSET, DEFAULT_RULE_ID_RANGE};
use bi_rules::sync::DEFAULT_INTERSTITIAL_PATH;
use bi_rules::{RuleId, SyncOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Version of the running extension, compared against the release feed.
    pub current_version: String,
    /// Latest-release endpoint; without one update checks report no update.
    pub release_feed_url: Option<String>,
    pub interstitial_path: String,
    /// Wait between removing a rule and sending the tab to the site.
    pub unblock_redirect_delay_ms: u64,
    pub sweep_interval_secs: u64,
    pub rule_id_offset: RuleId,
    pub rule_id_range: RuleId,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            current_version: env!("CARGO_PKG_VERSION").to_string(),
            release_feed_url: None,
            interstitial_path: DEFAULT_INTERSTITIAL_PATH.to_string(),
            unblock_redirect_delay_ms: 350,
            sweep_interval_secs: 30,
            rule_id_offset: DEFAULT_RULE_ID_OFFSET,
            rule_id_range: DEFAULT_RULE_ID_RANGE,
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            rule_id_offset: self.rule_id_offset,
            rule_id_range: self.rule_id_range,
            interstitial_path: self.interstitial_path.clone(),
        }
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.unblock_redirect_delay_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{"currentVersion":"1.0.0","sweepIntervalSecs":10}"#).unwrap();
        assert_eq!(config.current_version, "1.0.0");
        assert_eq!(config.sweep_interval(), Duration::from_secs(10));
        assert_eq!(config.redirect_delay(), Duration::from_millis(350));
        assert_eq!(config.sync_options(), SyncOptions::default());
    }
}
