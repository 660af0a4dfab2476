//! Cleaning of raw model output

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"```(?:json|JSON)?").unwrap()
});

/// Extract and parse the JSON object embedded in model output
///
/// Strips code fences, slices from the first `{` to the last `}` and
/// parses the slice. Anything that does not yield a JSON object is `None`.
#[must_use]
pub fn clean_and_parse(raw: &str) -> Option<Value> {
    let stripped = FENCE.replace_all(raw, "");
    let cleaned = stripped.trim();

    let slice = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => cleaned,
    };

    serde_json::from_str::<Value>(slice)
        .ok()
        .filter(Value::is_object)
}

/// Shorten text for log output
#[must_use]
pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let count = input.chars().count();
    if count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [{count} chars]"));
    preview
}
