//! Host interfaces
//!
//! Everything the background needs from the browser. The host runs one
//! event at a time on a single thread, so the traits are `?Send` and the
//! bundle is shared through `Rc`.

use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use bi_core::TabId;
use bi_rules::{InstalledRules, RuleUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FeedError, RuleEngineError, StoreError, TabsError};

/// A key-value namespace (persistent or session scoped).
#[async_trait(?Send)]
pub trait KeyValueStore {
    /// Fetch the given keys; absent keys are omitted from the result.
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError>;

    /// Write every entry of `items`, leaving other keys untouched.
    async fn set(&self, items: Map<String, Value>) -> Result<(), StoreError>;

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;

    /// Remove every key in the namespace.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// The browser's declarative request rule engine.
#[async_trait(?Send)]
pub trait RuleEngine {
    async fn installed_rules(&self) -> Result<InstalledRules, RuleEngineError>;

    /// Apply removals and additions as one atomic step.
    async fn update_rules(&self, update: &RuleUpdate) -> Result<(), RuleEngineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTab {
    pub id: TabId,
    pub url: Option<String>,
}

#[async_trait(?Send)]
pub trait Tabs {
    /// Current URL of a tab, `None` when the browser withholds it.
    async fn url(&self, tab: TabId) -> Result<Option<String>, TabsError>;

    async fn open_tabs(&self) -> Result<Vec<OpenTab>, TabsError>;

    async fn reload(&self, tab: TabId) -> Result<(), TabsError>;

    /// Navigate `tab` to `url` once `delay` has passed. Not cancellable;
    /// failures (tab closed meanwhile) are dropped by the host.
    fn navigate_later(&self, tab: TabId, url: String, delay: Duration);
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Latest-release descriptor as published by the release feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Version tag, usually `v`-prefixed
    pub tag_name: String,
    pub html_url: String,
}

#[async_trait(?Send)]
pub trait ReleaseFeed {
    async fn latest_release(&self) -> Result<Release, FeedError>;
}

/// Every host facility the background service uses.
#[derive(Clone)]
pub struct Host {
    /// Persistent namespace
    pub local: Rc<dyn KeyValueStore>,
    /// Session namespace, cleared on browser restart
    pub session: Rc<dyn KeyValueStore>,
    pub rules: Rc<dyn RuleEngine>,
    pub tabs: Rc<dyn Tabs>,
    pub clock: Rc<dyn Clock>,
    pub feed: Option<Rc<dyn ReleaseFeed>>,
}
