//! Typed access to the persistent and session namespaces.
//!
//! Values are always read and written whole (the full site list, the full
//! break-time map) so concurrent writers never drop sibling keys.

use bi_core::{BlockHits, BreakTimes, Site, TabId, Theme, UpdateInfo};
use chrono::{DateTime, Utc};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::host::KeyValueStore;

pub mod keys {
    pub const SITES: &str = "sites";
    pub const GLOBAL_ENABLED: &str = "globalEnabled";
    pub const BLOCK_HITS: &str = "blockHits";
    pub const BREAK_TIMES: &str = "breakTimes";
    pub const INSTALL_DATE: &str = "installDate";
    pub const LAST_UPDATE_CHECK: &str = "lastUpdateCheck";
    pub const LATEST_VERSION: &str = "latestVersion";
    pub const UPDATE_AVAILABLE: &str = "updateAvailable";
    pub const RELEASE_URL: &str = "releaseUrl";
    pub const THEME: &str = "theme";
    pub const UPDATE_DISMISSED: &str = "updateDismissed";

    pub const PENDING_BLOCK_PREFIX: &str = "pendingBlock_";
}

/// The inputs of rule synchronization, read in one store round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockState {
    pub sites: Vec<Site>,
    pub global_enabled: bool,
    pub break_times: BreakTimes,
}

fn decode<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Result<Option<T>, StoreError> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            }),
    }
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Encode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Persistent extension state.
#[derive(Clone, Copy)]
pub struct LocalState<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> LocalState<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let mut map = self.store.get(&[key]).await?;
        decode(&mut map, key)
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let mut items = Map::new();
        items.insert(key.to_string(), encode(key, value)?);
        self.store.set(items).await
    }

    pub async fn block_state(&self) -> Result<BlockState, StoreError> {
        let mut map = self
            .store
            .get(&[keys::SITES, keys::GLOBAL_ENABLED, keys::BREAK_TIMES])
            .await?;
        Ok(BlockState {
            sites: decode(&mut map, keys::SITES)?.unwrap_or_default(),
            global_enabled: decode(&mut map, keys::GLOBAL_ENABLED)?.unwrap_or(true),
            break_times: decode(&mut map, keys::BREAK_TIMES)?.unwrap_or_default(),
        })
    }

    pub async fn sites(&self) -> Result<Vec<Site>, StoreError> {
        Ok(self.read(keys::SITES).await?.unwrap_or_default())
    }

    pub async fn save_sites(&self, sites: &[Site]) -> Result<(), StoreError> {
        self.write(keys::SITES, &sites).await
    }

    /// Defaults to enabled when never written.
    pub async fn global_enabled(&self) -> Result<bool, StoreError> {
        Ok(self.read(keys::GLOBAL_ENABLED).await?.unwrap_or(true))
    }

    pub async fn set_global_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.write(keys::GLOBAL_ENABLED, &enabled).await
    }

    pub async fn break_times(&self) -> Result<BreakTimes, StoreError> {
        Ok(self.read(keys::BREAK_TIMES).await?.unwrap_or_default())
    }

    pub async fn save_break_times(&self, breaks: &BreakTimes) -> Result<(), StoreError> {
        self.write(keys::BREAK_TIMES, breaks).await
    }

    pub async fn block_hits(&self) -> Result<BlockHits, StoreError> {
        Ok(self.read(keys::BLOCK_HITS).await?.unwrap_or_default())
    }

    pub async fn save_block_hits(&self, hits: &BlockHits) -> Result<(), StoreError> {
        self.write(keys::BLOCK_HITS, hits).await
    }

    /// An unreadable install date only costs the "days active" stat.
    pub async fn install_date(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        match self.read(keys::INSTALL_DATE).await {
            Ok(date) => Ok(date),
            Err(StoreError::Corrupt { reason, .. }) => {
                warn!("ignoring unreadable install date: {reason}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn theme(&self) -> Result<Theme, StoreError> {
        Ok(self.read(keys::THEME).await?.unwrap_or_default())
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<(), StoreError> {
        self.write(keys::THEME, &theme).await
    }

    pub async fn update_info(&self) -> Result<UpdateInfo, StoreError> {
        let mut map = self
            .store
            .get(&[
                keys::LATEST_VERSION,
                keys::UPDATE_AVAILABLE,
                keys::RELEASE_URL,
                keys::LAST_UPDATE_CHECK,
            ])
            .await?;
        Ok(UpdateInfo {
            latest_version: decode(&mut map, keys::LATEST_VERSION)?,
            update_available: decode(&mut map, keys::UPDATE_AVAILABLE)?.unwrap_or(false),
            release_url: decode(&mut map, keys::RELEASE_URL)?,
            last_check: decode(&mut map, keys::LAST_UPDATE_CHECK)?,
        })
    }

    pub async fn save_update_info(&self, info: &UpdateInfo) -> Result<(), StoreError> {
        let mut items = Map::new();
        items.insert(keys::LATEST_VERSION.into(), encode(keys::LATEST_VERSION, &info.latest_version)?);
        items.insert(keys::UPDATE_AVAILABLE.into(), Value::Bool(info.update_available));
        items.insert(keys::RELEASE_URL.into(), encode(keys::RELEASE_URL, &info.release_url)?);
        items.insert(keys::LAST_UPDATE_CHECK.into(), encode(keys::LAST_UPDATE_CHECK, &info.last_check)?);
        self.store.set(items).await
    }

    pub async fn update_dismissed(&self) -> Result<bool, StoreError> {
        Ok(self.read(keys::UPDATE_DISMISSED).await?.unwrap_or(false))
    }

    pub async fn set_update_dismissed(&self, dismissed: bool) -> Result<(), StoreError> {
        self.write(keys::UPDATE_DISMISSED, &dismissed).await
    }

    /// Write first-run defaults for every key that is missing; existing
    /// values are kept. Returns the keys that were initialised.
    pub async fn init_defaults(&self, now: DateTime<Utc>) -> Result<Vec<&'static str>, StoreError> {
        let existing = self
            .store
            .get(&[
                keys::SITES,
                keys::BLOCK_HITS,
                keys::BREAK_TIMES,
                keys::GLOBAL_ENABLED,
                keys::INSTALL_DATE,
            ])
            .await?;

        let defaults: [(&'static str, Value); 5] = [
            (keys::SITES, Value::Array(Vec::new())),
            (keys::BLOCK_HITS, Value::Object(Map::new())),
            (keys::BREAK_TIMES, Value::Object(Map::new())),
            (keys::GLOBAL_ENABLED, Value::Bool(true)),
            (keys::INSTALL_DATE, encode(keys::INSTALL_DATE, &now)?),
        ];

        let mut items = Map::new();
        let mut written = Vec::new();
        for (key, value) in defaults {
            if existing.get(key).map_or(true, Value::is_null) {
                items.insert(key.to_string(), value);
                written.push(key);
            }
        }

        if !items.is_empty() {
            self.store.set(items).await?;
        }
        Ok(written)
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.clear().await
    }
}

/// Session-scoped markers recording which blocked domain a tab was headed to.
#[derive(Clone, Copy)]
pub struct PendingBlocks<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> PendingBlocks<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    pub fn key(tab: TabId) -> String {
        format!("{}{}", keys::PENDING_BLOCK_PREFIX, tab)
    }

    pub async fn get(&self, tab: TabId) -> Result<Option<String>, StoreError> {
        let key = Self::key(tab);
        let mut map = self.store.get(&[key.as_str()]).await?;
        let domain: Option<String> = decode(&mut map, &key)?;
        Ok(domain.filter(|d| !d.is_empty()))
    }

    pub async fn set(&self, tab: TabId, domain: &str) -> Result<(), StoreError> {
        let mut items = Map::new();
        items.insert(Self::key(tab), Value::String(domain.to_string()));
        self.store.set(items).await
    }

    pub async fn clear(&self, tab: TabId) -> Result<(), StoreError> {
        let key = Self::key(tab);
        self.store.remove(&[key.as_str()]).await
    }
}
