use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

/// The strict shape the planner demands from the model.
#[derive(Debug, Deserialize)]
pub struct PlanResponse {
    #[serde(default)]
    pub thought: String,
    pub steps: Vec<PlannedStep>,
}

#[derive(Debug, Deserialize)]
pub struct PlannedStep {
    pub tool: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Pull a JSON object out of model output that may be wrapped in prose
/// or code fences. Strategies are tried in order: the first balanced
/// brace slice, then a fenced code block, then the prefix up to the
/// last closing brace.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Some(value) = balanced_brace_slice(text) {
        return Some(value);
    }
    if let Some(value) = fenced_block(text) {
        return Some(value);
    }
    prefix_to_last_brace(text)
}

/// From the first `{`, scan to its matching close, honoring strings and
/// escapes, and parse the slice.
fn balanced_brace_slice(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut inside_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        match c {
            '"' if !escaped => inside_string = !inside_string,
            '\\' if inside_string => {
                escaped = !escaped;
                continue;
            }
            '{' if !inside_string => depth += 1,
            '}' if !inside_string => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..start + offset + c.len_utf8()];
                    return serde_json::from_str(candidate).ok();
                }
            }
            _ => {}
        }
        escaped = false;
    }
    None
}

fn fenced_block(text: &str) -> Option<Value> {
    let re = Regex::new(r"```(?:(?:[\w+-]\s*)+)?\s*\n\s*([\s\S]+?)\s*```").unwrap();
    let caps = re.captures(text)?;
    let inner = caps.get(1)?.as_str().trim();
    serde_json::from_str(inner).ok()
}

fn prefix_to_last_brace(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_plain_json() {
        let value = extract_json(r#"{"thought": "t", "steps": []}"#).unwrap();
        assert_eq!(value["thought"], json!("t"));
    }

    #[test]
    fn test_json_with_surrounding_prose() {
        let text = "Sure! Here is the plan:\n{\"thought\": \"go\", \"steps\": []}\nHope it helps.";
        let value = extract_json(text).unwrap();
        assert_eq!(value["thought"], json!("go"));
    }

    #[test]
    fn test_fenced_code_block() {
        let text = "```json\n{\"thought\": \"fenced\", \"steps\": []}\n```";
        let value = extract_json(text).unwrap();
        assert_eq!(value["thought"], json!("fenced"));
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_extraction() {
        let text = r#"{"thought": "use {curly} braces", "steps": []}"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["thought"], json!("use {curly} braces"));
    }

    #[test]
    fn test_no_json_returns_none() {
        assert!(extract_json("I cannot help with that.").is_none());
    }

    #[test]
    fn test_plan_response_deserializes() {
        let value = extract_json(
            r#"{"thought": "simple", "steps": [{"tool": "navigate", "params": {"url": "https://x"}, "rationale": "open it"}]}"#,
        )
        .unwrap();
        let plan: PlanResponse = serde_json::from_value(value).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].tool, "navigate");
    }
}
