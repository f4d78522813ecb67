use log::info;

use crate::command::Payload;
use crate::error::BackgroundError;
use crate::service::Background;

impl Background {
    /// Wipe both namespaces, restore first-run defaults and resync.
    pub async fn clear_all_data(&self) -> Result<Payload, BackgroundError> {
        self.local().clear().await?;
        self.host().session.clear().await?;
        self.local().init_defaults(self.now()).await?;
        info!("all data cleared");

        self.sync_rules().await?;
        Ok(Payload::empty())
    }
}
