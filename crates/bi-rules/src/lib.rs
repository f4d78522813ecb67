//! BlockIt Rule Synchronizer
//!
//! This crate projects the blocker state (site list, global switch, break
//! times) into the declarative redirect rules installed in the browser's
//! request layer, and computes the update that moves the installed set to
//! the desired one.

pub mod ids;
pub mod rule;
pub mod sync;
pub mod update;

pub use ids::RuleIdAllocator;
pub use rule::{Redirect, ResourceType, Rule, RuleAction, RuleCondition, RuleId, RuleSet};
pub use sync::{synchronize, synchronize_with, SyncOptions};
pub use update::{InstalledRules, RuleUpdate};
