//! Rule matching against event payloads.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::RuleStore;
use crate::error::AppResult;
use crate::models::NotificationRule;

/// Selects the rules that apply to an event
pub struct RuleMatcher {
    store: Arc<dyn RuleStore>,
}

impl RuleMatcher {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }

    /// Active rules for (module, event) whose conditions hold, in execution order
    pub async fn match_rules(
        &self,
        module: &str,
        event: &str,
        data: &Map<String, Value>,
    ) -> AppResult<Vec<NotificationRule>> {
        let candidates = self.store.fetch_active_rules(module, event).await?;
        let total = candidates.len();

        let matched: Vec<NotificationRule> = candidates
            .into_iter()
            .filter(|rule| rule_matches(rule, data))
            .collect();

        log::debug!(
            "{} of {} active rules matched {}.{}",
            matched.len(),
            total,
            module,
            event
        );

        Ok(matched)
    }
}

/// Whether a rule applies to an event payload. Rules whose stored
/// conditions could not be read never apply.
pub fn rule_matches(rule: &NotificationRule, data: &Map<String, Value>) -> bool {
    !rule.malformed_conditions && conditions_match(&rule.conditions, data)
}

/// Every condition must be present in `data` with an identical JSON value.
///
/// `1` and `"1"` differ, as do `1` and `1.0`. No conditions means a match.
pub fn conditions_match(conditions: &Map<String, Value>, data: &Map<String, Value>) -> bool {
    conditions
        .iter()
        .all(|(key, expected)| data.get(key) == Some(expected))
}
