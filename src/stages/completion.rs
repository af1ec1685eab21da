//! Stage completion rules.
//!
//! Completion is about presence and shape only. Format checks (postal
//! codes, SINs, expiry dates in the past) belong to the form validation
//! layer and never reach this module.

use serde_json::{Map, Value};

use super::registry::FieldRule;

/// Whether every rule in `rules` holds against `data`.
///
/// Missing stage data is treated as an empty record.
pub fn is_stage_complete(rules: &[FieldRule], data: Option<&Map<String, Value>>) -> bool {
    let empty = Map::new();
    let data = data.unwrap_or(&empty);
    rules.iter().all(|rule| rule_satisfied(rule, data))
}

/// Evaluate a single rule.
pub fn rule_satisfied(rule: &FieldRule, data: &Map<String, Value>) -> bool {
    match rule {
        FieldRule::Required { field } => has_value(data.get(*field)),
        FieldRule::RequiredComposite { field, keys } => match data.get(*field) {
            Some(Value::Object(group)) => keys.iter().all(|k| has_value(group.get(*k))),
            _ => false,
        },
        FieldRule::RequiredBoolean { field } => matches!(data.get(*field), Some(Value::Bool(true))),
        FieldRule::AlwaysSatisfied { .. } => true,
    }
}

fn has_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
