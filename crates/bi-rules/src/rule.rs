//! Declarative rule model.
//!
//! Serializes to the dynamic-rule JSON accepted by the browser's
//! declarative request API.

use serde::{Deserialize, Serialize};

pub type RuleId = u32;

/// Priority given to every redirect rule.
pub const RULE_PRIORITY: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleAction {
    Redirect { redirect: Redirect },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub extension_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub request_domains: Vec<String>,
    pub resource_types: Vec<ResourceType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
}

impl Rule {
    /// Redirect top-level navigations to `domain` (and its `www.` variant)
    /// onto `extension_path`.
    pub fn redirect(id: RuleId, domain: &str, extension_path: String) -> Self {
        let mut request_domains = vec![domain.to_string()];
        if !domain.starts_with("www.") {
            request_domains.push(format!("www.{domain}"));
        }

        Self {
            id,
            priority: RULE_PRIORITY,
            action: RuleAction::Redirect {
                redirect: Redirect { extension_path },
            },
            condition: RuleCondition {
                request_domains,
                resource_types: vec![ResourceType::MainFrame],
            },
        }
    }

    /// The bare domain this rule targets.
    pub fn domain(&self) -> Option<&str> {
        self.condition.request_domains.first().map(String::as_str)
    }

    pub fn extension_path(&self) -> &str {
        match &self.action {
            RuleAction::Redirect { redirect } => &redirect.extension_path,
        }
    }
}

/// The full set of rules that should be installed, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by_key(|rule| rule.id);
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn ids(&self) -> Vec<RuleId> {
        self.rules.iter().map(|rule| rule.id).collect()
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// Rule whose primary domain is `domain`.
    pub fn rule_for(&self, domain: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.domain() == Some(domain))
    }

    /// Whether any rule matches `host` (bare or `www.` form).
    pub fn blocks_host(&self, host: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.condition.request_domains.iter().any(|d| d == host))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_rule_json_shape() {
        let rule = Rule::redirect(1000, "reddit.com", "/blocked.html?site=reddit.com".to_string());
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 1000,
                "priority": 1,
                "action": {
                    "type": "redirect",
                    "redirect": { "extensionPath": "/blocked.html?site=reddit.com" }
                },
                "condition": {
                    "requestDomains": ["reddit.com", "www.reddit.com"],
                    "resourceTypes": ["main_frame"]
                }
            })
        );
    }

    #[test]
    fn test_www_not_doubled() {
        let rule = Rule::redirect(1, "www.example.com", String::new());
        assert_eq!(rule.condition.request_domains, vec!["www.example.com".to_string()]);
    }

    #[test]
    fn test_rule_parses_back_from_engine_json() {
        let raw = r#"[{"id":7,"priority":1,"action":{"type":"redirect","redirect":{"extensionPath":"/blocked.html?site=a.com"}},"condition":{"requestDomains":["a.com","www.a.com"],"resourceTypes":["main_frame"]}}]"#;
        let rules: Vec<Rule> = serde_json::from_str(raw).unwrap();
        assert_eq!(rules[0].domain(), Some("a.com"));
        assert_eq!(rules[0].extension_path(), "/blocked.html?site=a.com");
    }

    #[test]
    fn test_rule_set_sorted_and_queried() {
        let set = RuleSet::new(vec![
            Rule::redirect(9, "b.com", String::new()),
            Rule::redirect(3, "a.com", String::new()),
        ]);
        assert_eq!(set.ids(), vec![3, 9]);
        assert!(set.blocks_host("www.b.com"));
        assert!(!set.blocks_host("c.com"));
        assert_eq!(set.rule_for("a.com").map(|r| r.id), Some(3));
    }
}
