//! Periodic break-time sweep.
//!
//! Deletes expired break entries and, when any expired, resyncs and reloads
//! the tabs still showing those domains so blocking resumes right away.

use bi_core::domain_from_url;
use log::{debug, info};

use crate::error::BackgroundError;
use crate::service::Background;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Domains whose break ended
    pub expired: Vec<String>,
    /// Tabs reloaded because they were on an expired domain
    pub reloaded: Vec<bi_core::TabId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty()
    }
}

impl Background {
    pub async fn sweep_break_times(&self) -> Result<SweepReport, BackgroundError> {
        let local = self.local();
        let mut breaks = local.break_times().await?;
        let expired = breaks.prune_expired(self.now().timestamp_millis());
        if expired.is_empty() {
            return Ok(SweepReport::default());
        }

        local.save_break_times(&breaks).await?;
        info!("break ended for {}", expired.join(", "));
        self.sync_rules().await?;

        let mut reloaded = Vec::new();
        for tab in self.host().tabs.open_tabs().await? {
            let Some(domain) = tab.url.as_deref().and_then(|url| domain_from_url(url).ok()) else {
                continue;
            };
            if !expired.contains(&domain) {
                continue;
            }
            match self.host().tabs.reload(tab.id).await {
                Ok(()) => reloaded.push(tab.id),
                Err(e) => debug!("reload of tab {} failed: {e}", tab.id),
            }
        }

        Ok(SweepReport { expired, reloaded })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::handlers::testing::setup;

    #[tokio::test]
    async fn test_sweep_reblocks_and_reloads() {
        let (mem, bg) = setup();
        bg.add_site("reddit.com").await.unwrap();
        bg.set_break_time("reddit.com", 5, None).await.unwrap();
        bg.set_break_time("example.com", 30, None).await.unwrap();
        mem.tabs.open(1, Some("https://www.reddit.com/r/rust"));
        mem.tabs.open(2, Some("https://example.com/"));
        mem.tabs.open(3, None);

        assert!(bg.sweep_break_times().await.unwrap().is_empty());
        assert!(mem.rules.rules().is_empty());

        mem.clock.advance(Duration::minutes(5));
        let report = bg.sweep_break_times().await.unwrap();
        assert_eq!(report.expired, vec!["reddit.com".to_string()]);
        assert_eq!(report.reloaded, vec![1]);
        assert_eq!(mem.rules.rules().len(), 1);

        let breaks = bg.local().break_times().await.unwrap();
        assert!(breaks.expiry("reddit.com").is_none());
        assert!(breaks.expiry("example.com").is_some());
    }
}
