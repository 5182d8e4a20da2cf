//! Subscription rule matching
//!
//! Pure evaluation of an alert's rules against a lobby snapshot. All rules
//! must pass (conjunction). A rule against a missing or empty lobby field
//! never matches.

use crate::types::{Lobby, Rule, RuleKey, RuleValue};
use crate::utils::contains_ci;

/// Evaluate every rule against the lobby; true only if all match
pub fn matches(rules: &[Rule], lobby: &Lobby) -> bool {
    !rules.is_empty() && rules.iter().all(|rule| rule_matches(rule, lobby))
}

fn rule_matches(rule: &Rule, lobby: &Lobby) -> bool {
    let field = lobby.rule_field(rule.key);
    if field.is_empty() {
        return false;
    }

    match &rule.value {
        // Server rules accept a comma-separated list of realms; any token
        // matching is enough.
        RuleValue::Literal(value) if rule.key == RuleKey::Server => value
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .any(|token| contains_ci(field, token)),
        RuleValue::Literal(value) => contains_ci(field, value),
        RuleValue::Pattern(pattern) => pattern.is_match(field),
    }
}
