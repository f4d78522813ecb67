//! Extension API bindings and the host implementations built on them.

use std::time::Duration;

use async_trait::async_trait;
use bi_background::{
    Clock, FeedError, KeyValueStore, OpenTab, Release, ReleaseFeed, RuleEngine, RuleEngineError,
    StoreError, Tabs, TabsError,
};
use bi_core::TabId;
use bi_rules::{InstalledRules, Rule, RuleId, RuleUpdate};
use chrono::{DateTime, TimeZone, Utc};
use js_sys::{Object, Reflect};
use log::{debug, warn};
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};

use crate::convert::{error_text, from_json, keys_array, to_json, to_map};

#[wasm_bindgen]
extern "C" {
    /// `chrome.storage.local` / `chrome.storage.session`
    #[derive(Clone)]
    pub type StorageArea;

    #[wasm_bindgen(method, catch)]
    async fn get(this: &StorageArea, keys: JsValue) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(method, catch)]
    async fn set(this: &StorageArea, items: JsValue) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(method, catch)]
    async fn remove(this: &StorageArea, keys: JsValue) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(method, catch)]
    async fn clear(this: &StorageArea) -> Result<JsValue, JsValue>;

    /// `chrome.declarativeNetRequest`
    #[derive(Clone)]
    pub type DeclarativeNetRequest;

    #[wasm_bindgen(method, catch, js_name = getDynamicRules)]
    async fn get_dynamic_rules(this: &DeclarativeNetRequest) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(method, catch, js_name = updateDynamicRules)]
    async fn update_dynamic_rules(this: &DeclarativeNetRequest, options: JsValue) -> Result<JsValue, JsValue>;

    /// `chrome.tabs`
    #[derive(Clone)]
    pub type TabsApi;

    #[wasm_bindgen(method, catch, js_name = get)]
    async fn get_tab(this: &TabsApi, tab_id: i32) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(method, catch)]
    async fn query(this: &TabsApi, query: JsValue) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(method, catch)]
    async fn reload(this: &TabsApi, tab_id: i32) -> Result<JsValue, JsValue>;
    #[wasm_bindgen(method, catch)]
    async fn update(this: &TabsApi, tab_id: i32, properties: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_name = setTimeout)]
    pub fn set_timeout(handler: &JsValue, timeout: i32) -> JsValue;

    #[wasm_bindgen(js_name = setInterval)]
    pub fn set_interval(handler: &JsValue, timeout: i32) -> JsValue;

    #[wasm_bindgen(js_name = fetch)]
    fn fetch_url(url: &str) -> js_sys::Promise;
}

/// Look up a property path such as `chrome.storage.local` on the global object.
pub fn global_path<T: JsCast>(path: &[&str]) -> Result<T, JsValue> {
    let mut current: JsValue = js_sys::global().into();
    for segment in path {
        current = Reflect::get(&current, &JsValue::from_str(segment))?;
        if current.is_undefined() || current.is_null() {
            return Err(JsValue::from_str(&format!("{} is not available", path.join("."))));
        }
    }
    Ok(current.unchecked_into())
}

// =============================================================================
// Storage
// =============================================================================

pub struct ChromeStorage {
    area: StorageArea,
}

impl ChromeStorage {
    pub fn local() -> Result<Self, JsValue> {
        Ok(Self {
            area: global_path(&["chrome", "storage", "local"])?,
        })
    }

    pub fn session() -> Result<Self, JsValue> {
        Ok(Self {
            area: global_path(&["chrome", "storage", "session"])?,
        })
    }
}

fn store_error(error: JsValue) -> StoreError {
    StoreError::Backend(error_text(&error))
}

#[async_trait(?Send)]
impl KeyValueStore for ChromeStorage {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let found = self.area.get(keys_array(keys).into()).await.map_err(store_error)?;
        to_map(&found).map_err(store_error)
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StoreError> {
        let items = from_json(&Value::Object(items)).map_err(store_error)?;
        self.area.set(items).await.map_err(store_error)?;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.area.remove(keys_array(keys).into()).await.map_err(store_error)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.area.clear().await.map_err(store_error)?;
        Ok(())
    }
}

// =============================================================================
// Rules
// =============================================================================

pub struct ChromeRules {
    api: DeclarativeNetRequest,
}

impl ChromeRules {
    pub fn new() -> Result<Self, JsValue> {
        Ok(Self {
            api: global_path(&["chrome", "declarativeNetRequest"])?,
        })
    }
}

fn rule_error(error: JsValue) -> RuleEngineError {
    RuleEngineError::Backend(error_text(&error))
}

#[async_trait(?Send)]
impl RuleEngine for ChromeRules {
    async fn installed_rules(&self) -> Result<InstalledRules, RuleEngineError> {
        let rules = self.api.get_dynamic_rules().await.map_err(rule_error)?;
        let Value::Array(rules) = to_json(&rules).map_err(rule_error)? else {
            return Ok(InstalledRules::default());
        };

        let mut installed = InstalledRules::default();
        for value in rules {
            let id = value
                .get("id")
                .and_then(Value::as_u64)
                .and_then(|id| RuleId::try_from(id).ok());
            match serde_json::from_value::<Rule>(value) {
                Ok(rule) => installed.rules.push(rule),
                Err(e) => {
                    warn!("unrecognised dynamic rule {id:?}: {e}");
                    installed.unreadable.extend(id);
                }
            }
        }
        Ok(installed)
    }

    async fn update_rules(&self, update: &RuleUpdate) -> Result<(), RuleEngineError> {
        let options = serde_json::to_value(update).map_err(|e| RuleEngineError::Rejected(e.to_string()))?;
        let options = from_json(&options).map_err(rule_error)?;
        self.api
            .update_dynamic_rules(options)
            .await
            .map_err(|e| RuleEngineError::Rejected(error_text(&e)))?;
        Ok(())
    }
}

// =============================================================================
// Tabs
// =============================================================================

#[derive(Clone)]
pub struct ChromeTabs {
    api: TabsApi,
}

impl ChromeTabs {
    pub fn new() -> Result<Self, JsValue> {
        Ok(Self {
            api: global_path(&["chrome", "tabs"])?,
        })
    }
}

fn tab_url(tab: &JsValue) -> Option<String> {
    Reflect::get(tab, &"url".into())
        .ok()
        .and_then(|url| url.as_string())
        .filter(|url| !url.is_empty())
}

#[async_trait(?Send)]
impl Tabs for ChromeTabs {
    async fn url(&self, tab: TabId) -> Result<Option<String>, TabsError> {
        let found = self
            .api
            .get_tab(tab)
            .await
            .map_err(|e| TabsError::Backend(error_text(&e)))?;
        if found.is_undefined() || found.is_null() {
            return Err(TabsError::NotFound(tab));
        }
        Ok(tab_url(&found))
    }

    async fn open_tabs(&self) -> Result<Vec<OpenTab>, TabsError> {
        let found = self
            .api
            .query(Object::new().into())
            .await
            .map_err(|e| TabsError::Backend(error_text(&e)))?;

        Ok(js_sys::Array::from(&found)
            .iter()
            .filter_map(|tab| {
                let id = Reflect::get(&tab, &"id".into()).ok()?.as_f64()? as TabId;
                Some(OpenTab { id, url: tab_url(&tab) })
            })
            .collect())
    }

    async fn reload(&self, tab: TabId) -> Result<(), TabsError> {
        self.api
            .reload(tab)
            .await
            .map_err(|e| TabsError::Backend(error_text(&e)))?;
        Ok(())
    }

    fn navigate_later(&self, tab: TabId, url: String, delay: Duration) {
        let api = self.api.clone();
        let handler = Closure::once_into_js(move || {
            spawn_local(async move {
                let properties = Object::new();
                let _ = Reflect::set(&properties, &"url".into(), &JsValue::from_str(&url));
                // Tab may be gone by now.
                if let Err(e) = api.update(tab, properties.into()).await {
                    debug!("delayed navigation of tab {} failed: {}", tab, error_text(&e));
                }
            });
        });
        set_timeout(&handler, i32::try_from(delay.as_millis()).unwrap_or(i32::MAX));
    }
}

// =============================================================================
// Clock
// =============================================================================

/// `Date.now()`; the std clock is unavailable on wasm32-unknown-unknown.
pub struct JsClock;

impl Clock for JsClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = js_sys::Date::now() as i64;
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or_default()
    }
}

// =============================================================================
// Release feed
// =============================================================================

pub struct FetchFeed {
    url: String,
}

impl FetchFeed {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait(?Send)]
impl ReleaseFeed for FetchFeed {
    async fn latest_release(&self) -> Result<Release, FeedError> {
        let response = JsFuture::from(fetch_url(&self.url))
            .await
            .map_err(|e| FeedError::Network(error_text(&e)))?;
        let response: web_sys::Response = response
            .dyn_into()
            .map_err(|_| FeedError::Decode("fetch did not return a Response".into()))?;

        if !response.ok() {
            return Err(FeedError::Status(response.status()));
        }

        let body = response.json().map_err(|e| FeedError::Decode(error_text(&e)))?;
        let body = JsFuture::from(body)
            .await
            .map_err(|e| FeedError::Decode(error_text(&e)))?;
        let body = to_json(&body).map_err(|e| FeedError::Decode(error_text(&e)))?;
        serde_json::from_value(body).map_err(|e| FeedError::Decode(e.to_string()))
    }
}
