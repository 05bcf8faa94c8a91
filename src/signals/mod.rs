pub mod fusion;
pub mod rules;

use crate::core::snapshot::normalize_state;
use crate::core::{RuleAlert, Snapshot};
use rules::Rule;

/// The rule engine applies every rule to one snapshot; rules are stateless
/// and independent, so any number of them may fire.
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule + Send + Sync>>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            rules: rules::default_rules(),
        }
    }

    pub fn evaluate(&self, snapshot: &Snapshot) -> Vec<RuleAlert> {
        if !snapshot.has_state_field {
            return vec![rules::missing_state_alert()];
        }

        let states: Vec<String> = snapshot
            .records
            .iter()
            .map(|r| normalize_state(r.state.as_deref()))
            .collect();

        self.rules
            .iter()
            .filter_map(|rule| {
                rule.evaluate(&states).map(|message| RuleAlert {
                    rule_name: rule.name().to_string(),
                    message,
                })
            })
            .collect()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}
