use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use super::RenderError;

// {{ field }} or {{ field | default }}
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([a-z0-9][a-z0-9-]*)\s*(?:\|\s*([^}]*?)\s*)?\}\}").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub field: String,
    pub default: Option<String>,
}

impl Placeholder {
    fn from_captures(captures: &Captures) -> Self {
        Self {
            field: captures[1].to_owned(),
            default: captures.get(2).map(|default| default.as_str().to_owned()),
        }
    }

    /// Typed form of the default, so that `{{ replicas | 1 }}` yields a number.
    fn typed_default(&self) -> Option<Value> {
        let default = self.default.as_deref()?;

        if default.is_empty() {
            return Some(Value::String(String::new()));
        }

        match serde_yaml::from_str::<Value>(default) {
            Ok(Value::Null) | Err(_) => Some(Value::String(default.to_owned())),
            Ok(value) => Some(value),
        }
    }
}

/// Collects every field referenced by string scalars of a template body, in order of
/// first appearance.
pub fn scan_fields(value: &Value, fields: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            for captures in PLACEHOLDER.captures_iter(text) {
                let field = &captures[1];
                if !fields.iter().any(|known| known == field) {
                    fields.push(field.to_owned());
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| scan_fields(item, fields)),
        Value::Object(map) => map.values().for_each(|item| scan_fields(item, fields)),
        _ => {}
    }
}

/// Replaces every placeholder of a template body with the value returned by `resolve`.
///
/// A placeholder spanning the whole scalar is replaced by the resolved value as is, which
/// may be a map, a list or a number. Placeholders embedded in a longer string are replaced
/// by the string form of their value.
pub fn substitute<F>(value: &Value, resolve: &F) -> Result<Value, RenderError>
where
    F: Fn(&str) -> Result<Option<Value>, RenderError>,
{
    match value {
        Value::String(text) => substitute_string(text, resolve),
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| substitute(item, resolve))
                .collect::<Result<_, _>>()?,
        )),
        Value::Object(map) => {
            let mut substituted = serde_json::Map::new();
            for (key, item) in map {
                substituted.insert(key.to_owned(), substitute(item, resolve)?);
            }

            Ok(Value::Object(substituted))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string<F>(text: &str, resolve: &F) -> Result<Value, RenderError>
where
    F: Fn(&str) -> Result<Option<Value>, RenderError>,
{
    let trimmed = text.trim();

    if let Some(captures) = PLACEHOLDER.captures(trimmed) {
        let whole = captures.get(0).map(|m| m.range()) == Some(0..trimmed.len());
        if whole {
            return resolve_placeholder(&Placeholder::from_captures(&captures), resolve);
        }
    }

    let mut output = String::with_capacity(text.len());
    let mut last = 0;

    for captures in PLACEHOLDER.captures_iter(text) {
        let Some(range) = captures.get(0).map(|m| m.range()) else {
            continue;
        };
        let value = resolve_placeholder(&Placeholder::from_captures(&captures), resolve)?;

        output.push_str(&text[last..range.start]);
        output.push_str(&to_inline_string(&value));
        last = range.end;
    }

    output.push_str(&text[last..]);

    Ok(Value::String(output))
}

fn resolve_placeholder<F>(placeholder: &Placeholder, resolve: &F) -> Result<Value, RenderError>
where
    F: Fn(&str) -> Result<Option<Value>, RenderError>,
{
    match resolve(&placeholder.field)? {
        Some(value) => Ok(value),
        None => placeholder
            .typed_default()
            .ok_or_else(|| RenderError::MissingConfiguration(placeholder.field.to_owned())),
    }
}

fn to_inline_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.to_owned(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
