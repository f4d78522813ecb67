use bi_core::{domain_from_url, normalize_domain, Site, SiteId, TabId};
use log::info;

use super::bare;
use crate::command::Payload;
use crate::error::BackgroundError;
use crate::service::Background;

impl Background {
    /// Block the site open in `tab`.
    pub async fn block_current_tab(&self, tab: TabId) -> Result<Payload, BackgroundError> {
        let url = self.host().tabs.url(tab).await?.ok_or(BackgroundError::NoUrl)?;
        let domain = domain_from_url(&url)?;
        self.add_domain(domain).await
    }

    /// Block a domain typed by the user.
    pub async fn add_site(&self, input: &str) -> Result<Payload, BackgroundError> {
        let domain = normalize_domain(input)?;
        self.add_domain(domain).await
    }

    async fn add_domain(&self, domain: String) -> Result<Payload, BackgroundError> {
        let local = self.local();
        let mut sites = local.sites().await?;
        if sites.iter().any(|site| site.matches(&domain)) {
            return Err(BackgroundError::AlreadyBlocked { domain });
        }

        let now = self.now();
        let last = sites.iter().map(|site| site.id).max();
        let site = Site::new(SiteId::allocate(now, last), domain.clone(), now);
        sites.push(site.clone());
        local.save_sites(&sites).await?;
        info!("blocked {} (site {})", domain, site.id);

        self.sync_rules().await?;
        Ok(Payload::Site { domain, site })
    }

    pub async fn toggle_site(&self, id: SiteId, enabled: bool) -> Result<Payload, BackgroundError> {
        let local = self.local();
        let mut sites = local.sites().await?;
        let site = sites
            .iter_mut()
            .find(|site| site.id == id)
            .ok_or(BackgroundError::SiteNotFound(id))?;
        site.enabled = enabled;
        let site = site.clone();

        local.save_sites(&sites).await?;
        info!("site {} ({}) enabled={}", id, site.domain, enabled);

        self.sync_rules().await?;
        Ok(Payload::Site {
            domain: site.domain.clone(),
            site,
        })
    }

    /// Delete a site by id. Removing an unknown id is not an error.
    pub async fn remove_site(&self, id: SiteId) -> Result<Payload, BackgroundError> {
        let local = self.local();
        let mut sites = local.sites().await?;
        let before = sites.len();
        sites.retain(|site| site.id != id);
        if sites.len() != before {
            local.save_sites(&sites).await?;
            info!("removed site {}", id);
        }

        self.sync_rules().await?;
        Ok(Payload::empty())
    }

    /// Remove `domain` from the block list and send the sender tab to it.
    pub async fn unblock_site(&self, domain: &str, tab: Option<TabId>) -> Result<Payload, BackgroundError> {
        let domain = bare(domain);
        let local = self.local();
        let mut sites = local.sites().await?;
        let before = sites.len();
        sites.retain(|site| !site.matches(&domain));
        if sites.len() != before {
            local.save_sites(&sites).await?;
            info!("unblocked {}", domain);
        }

        self.release_tab(tab, &domain).await?;
        Ok(Payload::Domain { domain: Some(domain) })
    }

    pub async fn set_global_enabled(&self, enabled: bool) -> Result<Payload, BackgroundError> {
        self.local().set_global_enabled(enabled).await?;
        info!("blocking {}", if enabled { "enabled" } else { "disabled" });
        self.sync_rules().await?;
        Ok(Payload::GlobalEnabled { global_enabled: enabled })
    }

    pub async fn list_sites(&self) -> Result<Payload, BackgroundError> {
        let state = self.local().block_state().await?;
        Ok(Payload::Sites {
            sites: state.sites,
            global_enabled: state.global_enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::testing::{now, setup};
    use super::*;
    use crate::storage::LocalState;

    #[tokio::test]
    async fn test_block_current_tab() {
        let (mem, bg) = setup();
        mem.tabs.open(1, Some("https://www.Reddit.com/r/rust"));

        let payload = bg.block_current_tab(1).await.unwrap();
        let Payload::Site { domain, site } = payload else {
            panic!("unexpected payload");
        };
        assert_eq!(domain, "reddit.com");
        assert_eq!(site.id, SiteId(1_700_000_000_000));
        assert!(site.enabled);
        assert_eq!(mem.rules.rules().len(), 1);
    }

    #[tokio::test]
    async fn test_block_current_tab_errors() {
        let (mem, bg) = setup();
        mem.tabs.open(1, Some("chrome://extensions"));
        mem.tabs.open(2, None);

        let err = bg.block_current_tab(1).await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot block this page type");
        let err = bg.block_current_tab(2).await.unwrap_err();
        assert_eq!(err.to_string(), "No URL");
        assert!(matches!(
            bg.block_current_tab(3).await,
            Err(BackgroundError::Tabs(_))
        ));
    }

    #[tokio::test]
    async fn test_block_ip_literal_tab_leaves_rules_alone() {
        let (mem, bg) = setup();
        mem.tabs.open(1, Some("http://[::1]:8080/"));

        assert!(matches!(
            bg.block_current_tab(1).await,
            Err(BackgroundError::Domain(_))
        ));
        let sites = LocalState::new(mem.local.as_ref()).sites().await.unwrap();
        assert!(sites.is_empty());
        assert_eq!(mem.rules.update_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_rejected_without_change() {
        let (mem, bg) = setup();
        bg.add_site("reddit.com").await.unwrap();
        let updates = mem.rules.update_count();

        let err = bg.add_site("https://WWW.reddit.com/").await.unwrap_err();
        assert!(matches!(err, BackgroundError::AlreadyBlocked { ref domain } if domain == "reddit.com"));
        let sites = LocalState::new(mem.local.as_ref()).sites().await.unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(mem.rules.update_count(), updates);
    }

    #[tokio::test]
    async fn test_ids_unique_within_same_millisecond() {
        let (mem, bg) = setup();
        bg.add_site("a.com").await.unwrap();
        bg.add_site("b.com").await.unwrap();
        let sites = LocalState::new(mem.local.as_ref()).sites().await.unwrap();
        assert_ne!(sites[0].id, sites[1].id);
        assert_eq!(mem.rules.rules().len(), 2);
    }

    #[tokio::test]
    async fn test_add_site_invalid() {
        let (_mem, bg) = setup();
        let err = bg.add_site("not a domain").await.unwrap_err();
        assert!(err.to_string().starts_with("Invalid domain"));
    }

    #[tokio::test]
    async fn test_toggle_and_remove() {
        let (mem, bg) = setup();
        bg.add_site("a.com").await.unwrap();
        let id = SiteId(now().timestamp_millis() as u64);

        bg.toggle_site(id, false).await.unwrap();
        assert!(mem.rules.rules().is_empty());
        bg.toggle_site(id, true).await.unwrap();
        assert_eq!(mem.rules.rules().len(), 1);

        assert!(matches!(
            bg.toggle_site(SiteId(1), true).await,
            Err(BackgroundError::SiteNotFound(SiteId(1)))
        ));

        bg.remove_site(id).await.unwrap();
        bg.remove_site(id).await.unwrap();
        assert!(mem.rules.rules().is_empty());
    }

    #[tokio::test]
    async fn test_unblock_navigates_after_rule_removed() {
        let (mem, bg) = setup();
        bg.add_site("reddit.com").await.unwrap();
        bg.pending().set(4, "reddit.com").await.unwrap();

        let payload = bg.unblock_site("reddit.com", Some(4)).await.unwrap();
        assert_eq!(payload, Payload::Domain { domain: Some("reddit.com".into()) });
        assert!(mem.rules.rules().is_empty());
        assert_eq!(bg.pending().get(4).await.unwrap(), None);

        let navs = mem.tabs.navigations();
        assert_eq!(navs.len(), 1);
        assert_eq!(navs[0].tab, 4);
        assert_eq!(navs[0].url, "https://reddit.com");
        assert_eq!(navs[0].delay, Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_unblock_without_tab_does_not_navigate() {
        let (mem, bg) = setup();
        bg.add_site("reddit.com").await.unwrap();
        bg.unblock_site("reddit.com", None).await.unwrap();
        assert!(mem.tabs.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_global_toggle() {
        let (mem, bg) = setup();
        bg.add_site("a.com").await.unwrap();
        bg.set_global_enabled(false).await.unwrap();
        assert!(mem.rules.rules().is_empty());

        let Payload::Sites { sites, global_enabled } = bg.list_sites().await.unwrap() else {
            panic!("unexpected payload");
        };
        assert_eq!(sites.len(), 1);
        assert!(!global_enabled);
    }
}
