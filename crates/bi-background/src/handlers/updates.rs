use bi_core::{UpdateInfo, Version};
use log::{info, warn};

use crate::command::Payload;
use crate::error::{BackgroundError, FeedError};
use crate::service::Background;

impl Background {
    /// Ask the release feed for the latest version and cache the answer.
    ///
    /// A feed failure leaves the cache alone and reports no update.
    pub async fn check_for_updates(&self) -> Result<Payload, BackgroundError> {
        let local = self.local();
        let cached = local.update_info().await?;

        let release = match &self.host().feed {
            Some(feed) => feed.latest_release().await,
            None => Err(FeedError::NotConfigured),
        };
        let release = match release {
            Ok(release) => release,
            Err(e) => {
                warn!("update check failed: {e}");
                return self.update_payload(UpdateInfo::default()).await;
            }
        };

        let latest = release
            .tag_name
            .trim()
            .trim_start_matches(['v', 'V'])
            .to_string();
        let current = Version::parse(&self.config().current_version);
        let update_available = Version::parse(&latest).is_newer_than(&current);
        if update_available {
            info!("update available: {current} -> {latest}");
        }

        if cached.latest_version.as_deref() != Some(latest.as_str()) {
            local.set_update_dismissed(false).await?;
        }

        let info = UpdateInfo {
            latest_version: Some(latest),
            update_available,
            release_url: Some(release.html_url),
            last_check: Some(self.now()),
        };
        local.save_update_info(&info).await?;
        self.update_payload(info).await
    }

    /// The cached result of the last successful check.
    pub async fn get_update_info(&self) -> Result<Payload, BackgroundError> {
        let info = self.local().update_info().await?;
        self.update_payload(info).await
    }

    /// Hide the update banner until a different version is published.
    pub async fn dismiss_update(&self) -> Result<Payload, BackgroundError> {
        self.local().set_update_dismissed(true).await?;
        Ok(Payload::empty())
    }

    async fn update_payload(&self, info: UpdateInfo) -> Result<Payload, BackgroundError> {
        let dismissed = self.local().update_dismissed().await?;
        Ok(Payload::Update {
            update_available: info.update_available,
            latest_version: info.latest_version,
            release_url: info.release_url,
            current_version: self.config().current_version.clone(),
            last_check: info.last_check,
            dismissed,
        })
    }
}
