use bi_core::days_active;
use log::debug;

use super::bare;
use crate::command::Payload;
use crate::error::BackgroundError;
use crate::service::Background;

impl Background {
    /// Count one interstitial view of `domain` and report the stats.
    pub async fn get_stats(&self, domain: &str) -> Result<Payload, BackgroundError> {
        let domain = bare(domain);
        let local = self.local();

        let mut hits = local.block_hits().await?;
        let times_blocked = hits.record(&domain);
        local.save_block_hits(&hits).await?;
        debug!("{} blocked {} times", domain, times_blocked);

        let sites_blocked = local.sites().await?.iter().filter(|site| site.enabled).count();
        let days_active = match local.install_date().await? {
            Some(installed) => days_active(installed, self.now()),
            None => 1,
        };

        Ok(Payload::Stats {
            times_blocked,
            sites_blocked,
            days_active,
        })
    }
}
