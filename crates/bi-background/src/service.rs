//! The background service: rule resynchronization, lifecycle hooks and
//! command dispatch.

use bi_core::TabId;
use bi_rules::{synchronize_with, RuleSet, RuleUpdate, SyncOptions};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::command::{Command, Payload, Request, Response};
use crate::config::Config;
use crate::error::BackgroundError;
use crate::host::Host;
use crate::storage::{LocalState, PendingBlocks};

pub struct Background {
    host: Host,
    config: Config,
    sync: SyncOptions,
}

impl Background {
    pub fn new(host: Host, config: Config) -> Self {
        let sync = config.sync_options();
        Self { host, config, sync }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn local(&self) -> LocalState<'_> {
        LocalState::new(self.host.local.as_ref())
    }

    pub(crate) fn pending(&self) -> PendingBlocks<'_> {
        PendingBlocks::new(self.host.session.as_ref())
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.host.clock.now()
    }

    /// Recompute the rule set from stored state and install it.
    ///
    /// Only rules inside the managed id range are touched, and only the ones
    /// that differ, so a repeat call with unchanged state applies nothing.
    pub async fn sync_rules(&self) -> Result<RuleSet, BackgroundError> {
        let state = self.local().block_state().await?;
        let now = self.now().timestamp_millis();
        let desired = synchronize_with(
            &self.sync,
            &state.sites,
            state.global_enabled,
            &state.break_times,
            now,
        );

        let installed = self.host.rules.installed_rules().await?;
        let update = RuleUpdate::diff(&installed, &desired, &self.sync.allocator());
        if update.is_empty() {
            debug!("rules up to date ({} active)", desired.len());
            return Ok(desired);
        }

        self.host.rules.update_rules(&update).await?;
        info!(
            "rules replaced: -{} +{} ({} active)",
            update.remove_rule_ids.len(),
            update.add_rules.len(),
            desired.len()
        );
        Ok(desired)
    }

    /// First install or extension update: fill in missing defaults, then sync.
    pub async fn on_installed(&self) -> Result<(), BackgroundError> {
        let written = self.local().init_defaults(self.now()).await?;
        if !written.is_empty() {
            info!("initialised defaults: {}", written.join(", "));
        }
        self.sync_rules().await?;
        Ok(())
    }

    pub async fn on_startup(&self) -> Result<(), BackgroundError> {
        self.sync_rules().await?;
        Ok(())
    }

    /// Clear a released tab's marker, resync, then send the tab to the site.
    ///
    /// The rule has to be gone before the navigation or the tab bounces
    /// straight back to the interstitial.
    pub(crate) async fn release_tab(&self, tab: Option<TabId>, domain: &str) -> Result<(), BackgroundError> {
        if let Some(tab) = tab {
            self.pending().clear(tab).await?;
        }

        self.sync_rules().await?;

        if let Some(tab) = tab {
            self.host
                .tabs
                .navigate_later(tab, format!("https://{domain}"), self.config.redirect_delay());
        }
        Ok(())
    }

    /// Handle one command. Never fails: errors become `{success: false}`.
    pub async fn dispatch(&self, request: Request) -> Response {
        let Request { command, sender_tab } = request;
        let result = match command {
            Command::SyncRules => self.sync_rules().await.map(|_| Payload::empty()),
            Command::BlockCurrentTab { tab_id } => self.block_current_tab(tab_id).await,
            Command::GetBlockedDomain { fallback } => {
                return self.get_blocked_domain(sender_tab, fallback).await;
            }
            Command::GetStats { domain } => self.get_stats(&domain).await,
            Command::UnblockSite { domain } => self.unblock_site(&domain, sender_tab).await,
            Command::SetBreakTime { domain, minutes } => {
                self.set_break_time(&domain, minutes, sender_tab).await
            }
            Command::CheckForUpdates => self.check_for_updates().await,
            Command::GetUpdateInfo => self.get_update_info().await,
            Command::ClearAllData => self.clear_all_data().await,
            Command::AddSite { input } => self.add_site(&input).await,
            Command::ToggleSite { id, enabled } => self.toggle_site(id, enabled).await,
            Command::RemoveSite { id } => self.remove_site(id).await,
            Command::SetGlobalEnabled { enabled } => self.set_global_enabled(enabled).await,
            Command::ListSites => self.list_sites().await,
            Command::GetTheme => self.get_theme().await,
            Command::SetTheme { theme } => self.set_theme(theme).await,
            Command::DismissUpdate => self.dismiss_update().await,
        };

        match result {
            Ok(payload) => Response::ok(payload),
            Err(e) => {
                warn!("command failed: {e}");
                Response::failure(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RuleEngine;
    use crate::memory::MemoryHost;
    use crate::storage::keys;
    use bi_core::{Site, SiteId};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn service(mem: &MemoryHost) -> Background {
        Background::new(mem.host(), Config::default())
    }

    fn store_sites(mem: &MemoryHost, sites: &[Site]) {
        mem.local.insert(keys::SITES, serde_json::to_value(sites).unwrap());
    }

    #[tokio::test]
    async fn test_sync_installs_and_is_idempotent() {
        let mem = MemoryHost::new(now());
        store_sites(&mem, &[Site::new(SiteId(5), "reddit.com", now())]);
        let bg = service(&mem);

        let rules = bg.sync_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(mem.rules.rules().len(), 1);
        assert_eq!(mem.rules.update_count(), 1);

        bg.sync_rules().await.unwrap();
        assert_eq!(mem.rules.update_count(), 1);
    }

    #[tokio::test]
    async fn test_sync_leaves_unmanaged_rules() {
        let mem = MemoryHost::new(now());
        let foreign = bi_rules::Rule::redirect(7, "other.com", "/x.html".into());
        mem.rules
            .update_rules(&RuleUpdate {
                remove_rule_ids: vec![],
                add_rules: vec![foreign],
            })
            .await
            .unwrap();

        service(&mem).sync_rules().await.unwrap();
        assert_eq!(mem.rules.rules().len(), 1);
        assert_eq!(mem.rules.rules()[0].id, 7);
    }

    #[tokio::test]
    async fn test_sync_replaces_unreadable_managed_rule() {
        let mem = MemoryHost::new(now());
        let site = Site::new(SiteId(5), "reddit.com", now());
        store_sites(&mem, &[site]);
        let bg = service(&mem);
        let id = bg.sync_rules().await.unwrap().rules[0].id;

        // Same slot now holds a rule this build cannot decode.
        mem.rules
            .update_rules(&RuleUpdate {
                remove_rule_ids: vec![id],
                add_rules: vec![],
            })
            .await
            .unwrap();
        mem.rules.insert_unreadable(id);
        mem.rules.insert_unreadable(7);

        bg.sync_rules().await.unwrap();
        assert_eq!(mem.rules.unreadable(), vec![7]);
        assert_eq!(mem.rules.rules().len(), 1);
        assert_eq!(mem.rules.rules()[0].id, id);
    }

    #[tokio::test]
    async fn test_on_installed_keeps_existing_state() {
        let mem = MemoryHost::new(now());
        mem.local.insert(keys::GLOBAL_ENABLED, json!(false));
        store_sites(&mem, &[Site::new(SiteId(5), "reddit.com", now())]);

        service(&mem).on_installed().await.unwrap();
        assert_eq!(mem.local.value(keys::GLOBAL_ENABLED), Some(json!(false)));
        assert!(mem.local.value(keys::INSTALL_DATE).is_some());
        assert!(mem.rules.rules().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_converts_errors() {
        let mem = MemoryHost::new(now());
        mem.local.set_failing(true);
        let response = service(&mem).dispatch(Request::new(Command::SyncRules)).await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("simulated failure"));
    }
}
