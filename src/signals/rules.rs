use crate::core::RuleAlert;
use crate::core::snapshot::{STATE_ACTIVE, STATE_INACTIVE};

/// More active sensors than this in one snapshot is a mass activation.
pub const MASS_ACTIVATION_THRESHOLD: usize = 3;

pub const MISSING_STATE_RULE: &str = "missing_state";

/// A deterministic check over one snapshot's normalized (trimmed, lowercased) states.
/// Returns the alert text when the rule fires.
pub trait Rule {
    fn name(&self) -> &str;
    fn evaluate(&self, states: &[String]) -> Option<String>;
}

/// Return all default rules in evaluation order.
pub fn default_rules() -> Vec<Box<dyn Rule + Send + Sync>> {
    vec![
        Box::new(EmptyStateRule),
        Box::new(MassActivationRule {
            threshold: MASS_ACTIVATION_THRESHOLD,
        }),
        Box::new(InactiveSensorRule),
    ]
}

/// Sole alert when the snapshot carries no state column at all.
pub fn missing_state_alert() -> RuleAlert {
    RuleAlert {
        rule_name: MISSING_STATE_RULE.to_string(),
        message: "No 'state' column in data".to_string(),
    }
}

// --- Individual Rules ---

struct EmptyStateRule;
impl Rule for EmptyStateRule {
    fn name(&self) -> &str { "empty_state" }
    fn evaluate(&self, states: &[String]) -> Option<String> {
        states
            .iter()
            .any(|s| s.is_empty())
            .then(|| "Empty sensor states present".to_string())
    }
}

struct MassActivationRule {
    threshold: usize,
}
impl Rule for MassActivationRule {
    fn name(&self) -> &str { "mass_activation" }
    fn evaluate(&self, states: &[String]) -> Option<String> {
        let active = states.iter().filter(|s| *s == STATE_ACTIVE).count();
        (active > self.threshold)
            .then(|| format!("Mass activation (>{} active in file)", self.threshold))
    }
}

/// Informational: flags the file for cross-file continuity review. Fires often.
struct InactiveSensorRule;
impl Rule for InactiveSensorRule {
    fn name(&self) -> &str { "inactive_present" }
    fn evaluate(&self, states: &[String]) -> Option<String> {
        states
            .iter()
            .any(|s| s == STATE_INACTIVE)
            .then(|| "Inactive sensors present (check continuity across files)".to_string())
    }
}
