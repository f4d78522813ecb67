//! Installed-set to desired-set update.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ids::RuleIdAllocator;
use crate::rule::{Rule, RuleId, RuleSet};

/// Rules read back from the browser.
///
/// `unreadable` holds the ids of installed rules whose shape could not be
/// decoded; they are known only by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledRules {
    pub rules: Vec<Rule>,
    pub unreadable: Vec<RuleId>,
}

impl From<Vec<Rule>> for InstalledRules {
    fn from(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            unreadable: Vec::new(),
        }
    }
}

/// One atomic change to the installed rules: removals are applied before
/// additions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    pub remove_rule_ids: Vec<RuleId>,
    pub add_rules: Vec<Rule>,
}

impl RuleUpdate {
    /// Smallest update that turns the managed part of `installed` into
    /// `desired`. Rules outside the managed id range are left alone.
    /// Unreadable managed rules are always removed.
    pub fn diff(installed: &InstalledRules, desired: &RuleSet, allocator: &RuleIdAllocator) -> Self {
        let current: BTreeMap<RuleId, &Rule> = installed
            .rules
            .iter()
            .filter(|rule| allocator.is_managed(rule.id))
            .map(|rule| (rule.id, rule))
            .collect();
        let wanted: BTreeMap<RuleId, &Rule> = desired.iter().map(|rule| (rule.id, rule)).collect();

        let unreadable: BTreeSet<RuleId> = installed
            .unreadable
            .iter()
            .copied()
            .filter(|&id| allocator.is_managed(id))
            .collect();

        let remove_rule_ids: BTreeSet<RuleId> = current
            .iter()
            .filter(|&(id, &rule)| wanted.get(id).copied() != Some(rule))
            .map(|(&id, _)| id)
            .chain(unreadable.iter().copied())
            .collect();

        let add_rules = wanted
            .iter()
            .filter(|&(id, &rule)| unreadable.contains(id) || current.get(id).copied() != Some(rule))
            .map(|(_, &rule)| rule.clone())
            .collect();

        Self {
            remove_rule_ids: remove_rule_ids.into_iter().collect(),
            add_rules,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remove_rule_ids.is_empty() && self.add_rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: RuleId, domain: &str) -> Rule {
        Rule::redirect(id, domain, format!("/blocked.html?site={domain}"))
    }

    #[test]
    fn test_diff_from_empty() {
        let desired = RuleSet::new(vec![rule(1001, "a.com")]);
        let update = RuleUpdate::diff(&InstalledRules::default(), &desired, &RuleIdAllocator::default());
        assert!(update.remove_rule_ids.is_empty());
        assert_eq!(update.add_rules, desired.rules);
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let desired = RuleSet::new(vec![rule(1001, "a.com"), rule(1002, "b.com")]);
        let update = RuleUpdate::diff(&desired.rules.clone().into(), &desired, &RuleIdAllocator::default());
        assert!(update.is_empty());
    }

    #[test]
    fn test_diff_replaces_changed_and_drops_stale() {
        let installed = vec![rule(1001, "a.com"), rule(1002, "old.com"), rule(1003, "c.com")];
        let desired = RuleSet::new(vec![rule(1001, "a.com"), rule(1002, "new.com")]);
        let update = RuleUpdate::diff(&installed.into(), &desired, &RuleIdAllocator::default());
        assert_eq!(update.remove_rule_ids, vec![1002, 1003]);
        assert_eq!(update.add_rules, vec![rule(1002, "new.com")]);
    }

    #[test]
    fn test_diff_ignores_unmanaged_ids() {
        let installed = vec![rule(5, "foreign.com")];
        let update = RuleUpdate::diff(&installed.into(), &RuleSet::default(), &RuleIdAllocator::default());
        assert!(update.is_empty());
    }

    #[test]
    fn test_diff_removes_unreadable_managed_ids() {
        let installed = InstalledRules {
            rules: vec![rule(1001, "a.com")],
            unreadable: vec![1002, 7],
        };
        let desired = RuleSet::new(vec![rule(1001, "a.com"), rule(1002, "b.com")]);
        let update = RuleUpdate::diff(&installed, &desired, &RuleIdAllocator::default());
        assert_eq!(update.remove_rule_ids, vec![1002]);
        assert_eq!(update.add_rules, vec![rule(1002, "b.com")]);
    }

    #[test]
    fn test_update_json_shape() {
        let update = RuleUpdate {
            remove_rule_ids: vec![1001],
            add_rules: vec![],
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "removeRuleIds": [1001], "addRules": [] }));
    }
}
