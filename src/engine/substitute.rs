use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

/// Replace `{{name}}` placeholders in a string with the stringified
/// variable value. Undefined names are left literal. Pure: no code runs
/// during substitution, and equal inputs always yield equal output.
pub fn substitute_str(input: &str, variables: &HashMap<String, Value>) -> String {
    let re = Regex::new(r"\{\{(\w+)\}\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        match variables.get(&caps[1]) {
            Some(value) => value_to_string(value),
            None => caps[0].to_string(),
        }
    })
    .to_string()
}

/// Recursive substitution over a JSON value: strings are scanned,
/// arrays and objects are mapped, other primitives pass through.
pub fn substitute_value(input: &Value, variables: &HashMap<String, Value>) -> Value {
    match input {
        Value::String(s) => Value::String(substitute_str(s, variables)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute_value(item, variables))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn vars() -> HashMap<String, Value> {
        HashMap::from([
            ("name".to_string(), json!("Ada")),
            ("count".to_string(), json!(3)),
            ("flag".to_string(), json!(true)),
        ])
    }

    #[test]
    fn test_simple_substitution() {
        assert_eq!(substitute_str("hello {{name}}", &vars()), "hello Ada");
    }

    #[test]
    fn test_non_string_values_are_stringified() {
        assert_eq!(
            substitute_str("{{count}} items, flag={{flag}}", &vars()),
            "3 items, flag=true"
        );
    }

    #[test]
    fn test_undefined_placeholders_stay_literal() {
        assert_eq!(substitute_str("hi {{missing}}", &vars()), "hi {{missing}}");
    }

    #[test]
    fn test_dotted_paths_are_not_placeholders() {
        // \w+ does not match dots; dotted paths stay literal.
        assert_eq!(substitute_str("{{a.b}}", &vars()), "{{a.b}}");
    }

    #[test]
    fn test_recursive_substitution() {
        let input = json!({
            "query": "{{name}}",
            "nested": {"text": "{{count}}"},
            "list": ["{{name}}", 7],
            "untouched": 42
        });
        let output = substitute_value(&input, &vars());
        assert_eq!(
            output,
            json!({
                "query": "Ada",
                "nested": {"text": "3"},
                "list": ["Ada", 7],
                "untouched": 42
            })
        );
    }

    #[test]
    fn test_substitution_is_pure() {
        let input = json!({"a": "{{name}} and {{missing}}"});
        let variables = vars();
        let first = substitute_value(&input, &variables);
        let second = substitute_value(&input, &variables);
        assert_eq!(first, second);
    }
}
