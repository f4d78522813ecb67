//! Command and response wire format.
//!
//! Pages send `{ "action": "...", ...fields }` and get back
//! `{ "success": bool, "error"?: string, ...payload }`.

use bi_core::{EpochMillis, Site, SiteId, TabId, Theme};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BackgroundError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    SyncRules,
    BlockCurrentTab { tab_id: TabId },
    GetBlockedDomain { fallback: Option<String> },
    GetStats { domain: String },
    UnblockSite { domain: String },
    SetBreakTime { domain: String, minutes: u32 },
    CheckForUpdates,
    GetUpdateInfo,
    ClearAllData,
    AddSite { input: String },
    ToggleSite { id: SiteId, enabled: bool },
    RemoveSite { id: SiteId },
    SetGlobalEnabled { enabled: bool },
    ListSites,
    GetTheme,
    SetTheme { theme: Theme },
    DismissUpdate,
}

/// A command plus the tab of the page that sent it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub sender_tab: Option<TabId>,
}

impl Request {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            sender_tab: None,
        }
    }

    pub fn from_tab(command: Command, tab: TabId) -> Self {
        Self {
            command,
            sender_tab: Some(tab),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    #[serde(rename_all = "camelCase")]
    Site { domain: String, site: Site },
    #[serde(rename_all = "camelCase")]
    Domain { domain: Option<String> },
    #[serde(rename_all = "camelCase")]
    Stats {
        times_blocked: u64,
        sites_blocked: usize,
        days_active: u32,
    },
    #[serde(rename_all = "camelCase")]
    Break { domain: String, expiry: EpochMillis },
    #[serde(rename_all = "camelCase")]
    Update {
        update_available: bool,
        latest_version: Option<String>,
        release_url: Option<String>,
        current_version: String,
        last_check: Option<DateTime<Utc>>,
        dismissed: bool,
    },
    #[serde(rename_all = "camelCase")]
    Sites { sites: Vec<Site>, global_enabled: bool },
    #[serde(rename_all = "camelCase")]
    GlobalEnabled { global_enabled: bool },
    #[serde(rename_all = "camelCase")]
    Theme { theme: Theme },
    Empty {},
}

impl Payload {
    pub fn empty() -> Self {
        Self::Empty {}
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Response {
    pub fn ok(payload: Payload) -> Self {
        Self {
            success: true,
            error: None,
            payload,
        }
    }

    pub fn failure(error: &BackgroundError) -> Self {
        let payload = match error {
            BackgroundError::AlreadyBlocked { domain } => Payload::Domain {
                domain: Some(domain.clone()),
            },
            _ => Payload::empty(),
        };
        Self {
            success: false,
            error: Some(error.to_string()),
            payload,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Every payload is a plain struct of serializable fields.
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "success": false, "error": e.to_string() })
        })
    }
}
