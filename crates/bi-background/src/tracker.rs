//! Navigation tracking.
//!
//! Before a redirect rule fires, remember which blocked domain each tab was
//! heading to so the interstitial can recover it even when the redirect
//! drops the query string.

use bi_core::{domain_from_url, TabId};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::BackgroundError;
use crate::service::Background;

/// A "before navigate" event from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEvent {
    pub tab_id: TabId,
    /// 0 for the top-level frame
    pub frame_id: i64,
    pub url: String,
}

impl NavigationEvent {
    pub fn is_top_level(&self) -> bool {
        self.frame_id == 0
    }
}

impl Background {
    /// Record a pending-block marker when `event` targets a blocked domain.
    ///
    /// Best effort: every failure is logged at debug level and dropped, the
    /// interstitial falls back to its URL parameter and referrer.
    pub async fn on_before_navigate(&self, event: &NavigationEvent) {
        if !event.is_top_level() {
            return;
        }
        // Fallible and ignored.
        if let Err(e) = self.track(event).await {
            debug!("navigation tracking skipped for tab {}: {e}", event.tab_id);
        }
    }

    async fn track(&self, event: &NavigationEvent) -> Result<(), BackgroundError> {
        let domain = domain_from_url(&event.url)?;

        let state = self.local().block_state().await?;
        if !state.global_enabled {
            return Ok(());
        }

        let now = self.now().timestamp_millis();
        if state.break_times.is_exempt(&domain, now) {
            return Ok(());
        }

        if state.sites.iter().any(|site| site.enabled && site.matches(&domain)) {
            self.pending().set(event.tab_id, &domain).await?;
            debug!("tab {} heading to blocked {}", event.tab_id, domain);
        }
        Ok(())
    }

    /// Forget a closed tab's marker.
    pub async fn on_tab_removed(&self, tab: TabId) {
        if let Err(e) = self.pending().clear(tab).await {
            debug!("could not clear marker for tab {tab}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::setup;

    fn nav(tab_id: TabId, url: &str) -> NavigationEvent {
        NavigationEvent {
            tab_id,
            frame_id: 0,
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_marks_blocked_navigation() {
        let (_mem, bg) = setup();
        bg.add_site("reddit.com").await.unwrap();

        bg.on_before_navigate(&nav(1, "https://www.reddit.com/r/rust")).await;
        bg.on_before_navigate(&nav(2, "https://example.com/")).await;
        assert_eq!(bg.pending().get(1).await.unwrap().as_deref(), Some("reddit.com"));
        assert_eq!(bg.pending().get(2).await.unwrap(), None);

        bg.on_tab_removed(1).await;
        assert_eq!(bg.pending().get(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ignores_subframes_breaks_and_disabled() {
        let (_mem, bg) = setup();
        bg.add_site("reddit.com").await.unwrap();

        let mut frame = nav(1, "https://reddit.com/");
        frame.frame_id = 3;
        bg.on_before_navigate(&frame).await;
        assert_eq!(bg.pending().get(1).await.unwrap(), None);

        bg.set_break_time("reddit.com", 5, None).await.unwrap();
        bg.on_before_navigate(&nav(1, "https://reddit.com/")).await;
        assert_eq!(bg.pending().get(1).await.unwrap(), None);

        bg.set_global_enabled(false).await.unwrap();
        bg.on_before_navigate(&nav(2, "https://reddit.com/")).await;
        assert_eq!(bg.pending().get(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let (mem, bg) = setup();
        bg.add_site("reddit.com").await.unwrap();
        mem.session.set_failing(true);

        bg.on_before_navigate(&nav(1, "https://reddit.com/")).await;
        bg.on_before_navigate(&nav(1, "not a url")).await;
        bg.on_before_navigate(&nav(1, "chrome://settings")).await;
        bg.on_tab_removed(1).await;
    }
}
