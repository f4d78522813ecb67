//! BlockIt Background Service
//!
//! The long-lived half of the extension. It owns the persistent state,
//! keeps the installed redirect rules in step with it, and answers the
//! commands sent by the popup, settings and blocked pages.
//!
//! Every browser facility is reached through the traits in [`host`], so
//! the same service runs against the extension APIs (see `bi-wasm`) or
//! against the in-memory host in [`memory`].

pub mod command;
pub mod config;
pub mod error;
pub mod handlers;
pub mod host;
pub mod memory;
pub mod service;
pub mod storage;
pub mod sweep;
pub mod tracker;

pub use command::{Command, Payload, Request, Response};
pub use config::Config;
pub use error::{BackgroundError, FeedError, RuleEngineError, StoreError, TabsError};
pub use host::{Clock, Host, KeyValueStore, OpenTab, Release, ReleaseFeed, RuleEngine, Tabs};
pub use service::Background;
pub use sweep::SweepReport;
pub use tracker::NavigationEvent;
