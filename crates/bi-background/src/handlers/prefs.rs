use bi_core::Theme;

use crate::command::Payload;
use crate::error::BackgroundError;
use crate::service::Background;

impl Background {
    pub async fn get_theme(&self) -> Result<Payload, BackgroundError> {
        let theme = self.local().theme().await?;
        Ok(Payload::Theme { theme })
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<Payload, BackgroundError> {
        self.local().set_theme(theme).await?;
        Ok(Payload::Theme { theme })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::setup;
    use super::*;
    use crate::storage::keys;

    #[tokio::test]
    async fn test_theme_defaults_to_dark() {
        let (mem, bg) = setup();
        assert_eq!(bg.get_theme().await.unwrap(), Payload::Theme { theme: Theme::Dark });

        bg.set_theme(Theme::Light).await.unwrap();
        assert_eq!(mem.local.value(keys::THEME), Some(serde_json::json!("light")));
        assert_eq!(bg.get_theme().await.unwrap(), Payload::Theme { theme: Theme::Light });
    }
}
