//! In-memory host
//!
//! Backs the service in tests and offline tools. Each piece can be told to
//! fail so error paths can be exercised.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use bi_core::TabId;
use bi_rules::{InstalledRules, Rule, RuleId, RuleUpdate};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{FeedError, RuleEngineError, StoreError, TabsError};
use crate::host::{Clock, Host, KeyValueStore, OpenTab, Release, ReleaseFeed, RuleEngine, Tabs};

// =============================================================================
// Key-value store
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RefCell<Map<String, Value>>,
    failing: Cell<bool>,
}

impl MemoryStore {
    pub fn from_map(data: Map<String, Value>) -> Self {
        Self {
            data: RefCell::new(data),
            failing: Cell::new(false),
        }
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.data.borrow_mut().insert(key.to_string(), value);
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.data.borrow().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.data.borrow().keys().cloned().collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.get() {
            Err(StoreError::Backend("simulated failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait(?Send)]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        self.check()?;
        let data = self.data.borrow();
        Ok(keys
            .iter()
            .filter_map(|&key| data.get(key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StoreError> {
        self.check()?;
        self.data.borrow_mut().extend(items);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.check()?;
        let mut data = self.data.borrow_mut();
        for key in keys {
            data.remove(*key);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.check()?;
        self.data.borrow_mut().clear();
        Ok(())
    }
}

// =============================================================================
// Rule engine
// =============================================================================

/// Applies updates the way the browser does: all or nothing, and an added
/// id that is still installed rejects the whole update.
#[derive(Debug, Default)]
pub struct MemoryRuleEngine {
    rules: RefCell<BTreeMap<RuleId, Rule>>,
    unreadable: RefCell<BTreeSet<RuleId>>,
    updates: Cell<usize>,
    failing: Cell<bool>,
}

impl MemoryRuleEngine {
    pub fn rules(&self) -> Vec<Rule> {
        self.rules.borrow().values().cloned().collect()
    }

    /// Install a rule under `id` that reads back only as an id.
    pub fn insert_unreadable(&self, id: RuleId) {
        self.unreadable.borrow_mut().insert(id);
    }

    pub fn unreadable(&self) -> Vec<RuleId> {
        self.unreadable.borrow().iter().copied().collect()
    }

    /// Number of non-empty updates applied so far.
    pub fn update_count(&self) -> usize {
        self.updates.get()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }
}

#[async_trait(?Send)]
impl RuleEngine for MemoryRuleEngine {
    async fn installed_rules(&self) -> Result<InstalledRules, RuleEngineError> {
        if self.failing.get() {
            return Err(RuleEngineError::Backend("simulated failure".into()));
        }
        Ok(InstalledRules {
            rules: self.rules(),
            unreadable: self.unreadable(),
        })
    }

    async fn update_rules(&self, update: &RuleUpdate) -> Result<(), RuleEngineError> {
        if self.failing.get() {
            return Err(RuleEngineError::Backend("simulated failure".into()));
        }

        let mut next = self.rules.borrow().clone();
        let mut unreadable = self.unreadable.borrow().clone();
        for id in &update.remove_rule_ids {
            next.remove(id);
            unreadable.remove(id);
        }
        for rule in &update.add_rules {
            if unreadable.contains(&rule.id) || next.insert(rule.id, rule.clone()).is_some() {
                return Err(RuleEngineError::Rejected(format!("duplicate rule id {}", rule.id)));
            }
        }

        *self.rules.borrow_mut() = next;
        *self.unreadable.borrow_mut() = unreadable;
        self.updates.set(self.updates.get() + 1);
        Ok(())
    }
}

// =============================================================================
// Tabs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledNavigation {
    pub tab: TabId,
    pub url: String,
    pub delay: Duration,
}

/// Tabs keyed by id. Scheduled navigations are recorded, not performed.
#[derive(Debug, Default)]
pub struct MemoryTabs {
    tabs: RefCell<BTreeMap<TabId, Option<String>>>,
    navigations: RefCell<Vec<ScheduledNavigation>>,
    reloads: RefCell<Vec<TabId>>,
}

impl MemoryTabs {
    pub fn open(&self, tab: TabId, url: Option<&str>) {
        self.tabs.borrow_mut().insert(tab, url.map(str::to_string));
    }

    pub fn close(&self, tab: TabId) {
        self.tabs.borrow_mut().remove(&tab);
    }

    pub fn navigations(&self) -> Vec<ScheduledNavigation> {
        self.navigations.borrow().clone()
    }

    pub fn reloads(&self) -> Vec<TabId> {
        self.reloads.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Tabs for MemoryTabs {
    async fn url(&self, tab: TabId) -> Result<Option<String>, TabsError> {
        self.tabs
            .borrow()
            .get(&tab)
            .cloned()
            .ok_or(TabsError::NotFound(tab))
    }

    async fn open_tabs(&self) -> Result<Vec<OpenTab>, TabsError> {
        Ok(self
            .tabs
            .borrow()
            .iter()
            .map(|(&id, url)| OpenTab { id, url: url.clone() })
            .collect())
    }

    async fn reload(&self, tab: TabId) -> Result<(), TabsError> {
        if !self.tabs.borrow().contains_key(&tab) {
            return Err(TabsError::NotFound(tab));
        }
        self.reloads.borrow_mut().push(tab);
        Ok(())
    }

    fn navigate_later(&self, tab: TabId, url: String, delay: Duration) {
        self.navigations
            .borrow_mut()
            .push(ScheduledNavigation { tab, url, delay });
    }
}

// =============================================================================
// Clock
// =============================================================================

#[derive(Debug)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

// =============================================================================
// Release feed
// =============================================================================

/// Answers every request with a canned result.
#[derive(Debug)]
pub struct StaticFeed {
    result: RefCell<Result<Release, FeedError>>,
}

impl StaticFeed {
    pub fn new(result: Result<Release, FeedError>) -> Self {
        Self {
            result: RefCell::new(result),
        }
    }

    pub fn release(tag_name: &str, html_url: &str) -> Self {
        Self::new(Ok(Release {
            tag_name: tag_name.to_string(),
            html_url: html_url.to_string(),
        }))
    }

    pub fn set(&self, result: Result<Release, FeedError>) {
        *self.result.borrow_mut() = result;
    }
}

#[async_trait(?Send)]
impl ReleaseFeed for StaticFeed {
    async fn latest_release(&self) -> Result<Release, FeedError> {
        self.result.borrow().clone()
    }
}

// =============================================================================
// Bundle
// =============================================================================

/// A complete in-memory host with handles kept for inspection.
pub struct MemoryHost {
    pub local: Rc<MemoryStore>,
    pub session: Rc<MemoryStore>,
    pub rules: Rc<MemoryRuleEngine>,
    pub tabs: Rc<MemoryTabs>,
    pub clock: Rc<ManualClock>,
    pub feed: Rc<StaticFeed>,
}

impl MemoryHost {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            local: Rc::new(MemoryStore::default()),
            session: Rc::new(MemoryStore::default()),
            rules: Rc::new(MemoryRuleEngine::default()),
            tabs: Rc::new(MemoryTabs::default()),
            clock: Rc::new(ManualClock::new(now)),
            feed: Rc::new(StaticFeed::new(Err(FeedError::NotConfigured))),
        }
    }

    pub fn host(&self) -> Host {
        Host {
            local: self.local.clone(),
            session: self.session.clone(),
            rules: self.rules.clone(),
            tabs: self.tabs.clone(),
            clock: self.clock.clone(),
            feed: Some(self.feed.clone() as Rc<dyn ReleaseFeed>),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: RuleId) -> Rule {
        Rule::redirect(id, "a.com", String::new())
    }

    #[tokio::test]
    async fn test_store_get_omits_missing() {
        let store = MemoryStore::default();
        store.insert("a", Value::Bool(true));
        let got = store.get(&["a", "b"]).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got["a"], Value::Bool(true));
    }

    #[tokio::test]
    async fn test_store_failure_injection() {
        let store = MemoryStore::default();
        store.set_failing(true);
        assert!(matches!(store.get(&["a"]).await, Err(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn test_rule_engine_rejects_duplicates_atomically() {
        let engine = MemoryRuleEngine::default();
        let add = RuleUpdate {
            remove_rule_ids: vec![],
            add_rules: vec![rule(1), rule(2)],
        };
        engine.update_rules(&add).await.unwrap();

        let dup = RuleUpdate {
            remove_rule_ids: vec![1],
            add_rules: vec![rule(3), rule(2)],
        };
        assert!(engine.update_rules(&dup).await.is_err());
        assert_eq!(engine.rules().len(), 2);
        assert!(engine.rules().iter().any(|r| r.id == 1));
        assert_eq!(engine.update_count(), 1);
    }

    #[tokio::test]
    async fn test_tabs_unknown_tab() {
        let tabs = MemoryTabs::default();
        assert!(matches!(tabs.url(3).await, Err(TabsError::NotFound(3))));
        tabs.open(3, None);
        assert_eq!(tabs.url(3).await.unwrap(), None);
    }
}
