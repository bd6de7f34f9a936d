use std::collections::HashMap;

use serde_json::Value;

use super::substitute_str;

/// Evaluate a step condition after variable substitution.
///
/// Deliberately not an expression language: `>` and `<` compare both
/// sides as numbers, `==` compares trimmed strings, and anything else
/// falls back to the truthiness of the substituted string (empty and
/// literal "false" are false). Malformed input evaluates to false.
pub fn evaluate_condition(expression: &str, variables: &HashMap<String, Value>) -> bool {
    let substituted = substitute_str(expression, variables);

    if let Some((left, right)) = substituted.split_once("==") {
        return left.trim() == right.trim();
    }
    if let Some((left, right)) = substituted.split_once('>') {
        return match (parse_number(left), parse_number(right)) {
            (Some(l), Some(r)) => l > r,
            _ => false,
        };
    }
    if let Some((left, right)) = substituted.split_once('<') {
        return match (parse_number(left), parse_number(right)) {
            (Some(l), Some(r)) => l < r,
            _ => false,
        };
    }

    let trimmed = substituted.trim();
    !trimmed.is_empty() && trimmed != "false"
}

fn parse_number(side: &str) -> Option<f64> {
    side.trim().parse::<f64>().ok()
}
