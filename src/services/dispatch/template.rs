//! `{{placeholder}}` substitution for rule message templates.

use serde_json::{Map, Value};

/// Replaces every `{{key}}` whose value in `data` is a scalar.
///
/// Arrays, objects and null leave their placeholder untouched. The template
/// is scanned once, so placeholders inside substituted values stay literal.
pub fn render(template: &str, data: &Map<String, Value>) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        rendered.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];

        let substituted = after_open.find("}}").and_then(|close| {
            data.get(&after_open[..close])
                .and_then(scalar_to_string)
                .map(|text| (text, close))
        });

        match substituted {
            Some((text, close)) => {
                rendered.push_str(&text);
                rest = &after_open[close + 2..];
            }
            // Step past one brace only, so `{{{key}}}` still finds `{{key}}`
            None => {
                rendered.push('{');
                rest = &rest[open + 1..];
            }
        }
    }

    rendered.push_str(rest);
    rendered
}

/// Renders an optional template, absent templates yield an empty string
pub fn render_opt(template: Option<&str>, data: &Map<String, Value>) -> String {
    template.map(|t| render(t, data)).unwrap_or_default()
}

/// String form of a scalar JSON value
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
