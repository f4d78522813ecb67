//! Release feed over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use bi_background::{FeedError, Release, ReleaseFeed};
use reqwest::header::ACCEPT;

pub struct ReqwestFeed {
    client: reqwest::Client,
    url: String,
}

impl ReqwestFeed {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("blockit-cli/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait(?Send)]
impl ReleaseFeed for ReqwestFeed {
    async fn latest_release(&self) -> Result<Release, FeedError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        response
            .json::<Release>()
            .await
            .map_err(|e| FeedError::Decode(e.to_string()))
    }
}
