use bi_core::TabId;
use log::info;

use super::bare;
use crate::command::Payload;
use crate::error::BackgroundError;
use crate::service::Background;

const MINUTE_MS: i64 = 60_000;

impl Background {
    /// Exempt `domain` from blocking for `minutes` and send the sender tab to it.
    ///
    /// A second grant for the same domain replaces the first expiry.
    pub async fn set_break_time(
        &self,
        domain: &str,
        minutes: u32,
        tab: Option<TabId>,
    ) -> Result<Payload, BackgroundError> {
        let domain = bare(domain);
        let expiry = self.now().timestamp_millis() + i64::from(minutes) * MINUTE_MS;

        let local = self.local();
        let mut breaks = local.break_times().await?;
        breaks.grant(domain.clone(), expiry);
        local.save_break_times(&breaks).await?;
        info!("break for {} ({} min)", domain, minutes);

        self.release_tab(tab, &domain).await?;
        Ok(Payload::Break { domain, expiry })
    }
}
