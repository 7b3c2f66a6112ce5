//! Evaluation of conditional-target tests against directory entries

use serde_json::Value;

use crate::protocol::{
    agent::AgentDirectoryEntry,
    target::{AgentCondition, ConditionKind, ConditionOperator},
};

/// The entry attribute a condition reads, if the entry has it
fn attribute(condition: &AgentCondition, entry: &AgentDirectoryEntry) -> Option<Value> {
    match condition.kind {
        ConditionKind::Capability => Some(Value::from(entry.capabilities.clone())),
        ConditionKind::Resource => Some(Value::from(entry.load)),
        ConditionKind::Status => Some(Value::from(entry.status.as_str())),
        ConditionKind::Location => entry.metadata.get("location").cloned(),
        ConditionKind::Custom => condition
            .key
            .as_ref()
            .and_then(|key| entry.metadata.get(key))
            .cloned(),
    }
}

/// Whether `entry` passes `condition`
///
/// A missing attribute only satisfies `not_equals`.
pub(crate) fn evaluate(condition: &AgentCondition, entry: &AgentDirectoryEntry) -> bool {
    match attribute(condition, entry) {
        Some(actual) => compare(condition.operator, &actual, &condition.value),
        None => condition.operator == ConditionOperator::NotEquals,
    }
}

fn compare(operator: ConditionOperator, actual: &Value, expected: &Value) -> bool {
    match operator {
        ConditionOperator::Equals => equals(actual, expected),
        ConditionOperator::NotEquals => !equals(actual, expected),
        ConditionOperator::Contains => contains(actual, expected),
        ConditionOperator::GreaterThan => numeric(actual, expected).is_some_and(|(a, e)| a > e),
        ConditionOperator::LessThan => numeric(actual, expected).is_some_and(|(a, e)| a < e),
    }
}

fn numeric(actual: &Value, expected: &Value) -> Option<(f64, f64)> {
    Some((actual.as_f64()?, expected.as_f64()?))
}

fn equals(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        // Capability sets compare regardless of order
        (Value::Array(a), Value::Array(e)) => {
            let mut a: Vec<String> = a.iter().map(Value::to_string).collect();
            let mut e: Vec<String> = e.iter().map(Value::to_string).collect();
            a.sort();
            e.sort();
            a == e
        }
        (Value::Number(_), Value::Number(_)) => numeric(actual, expected).is_some_and(|(a, e)| a == e),
        _ => actual == expected,
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Array(items), Value::Array(wanted)) => wanted.iter().all(|w| items.contains(w)),
        (Value::Array(items), wanted) => items.contains(wanted),
        (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
        _ => false,
    }
}
