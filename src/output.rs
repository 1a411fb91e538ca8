//! JSON and JSONP encoding of parsed feeds.
//!
//! Serving the result (HTTP headers, status codes) is up to the caller;
//! [`CONTENT_TYPE_JSON`] and [`CONTENT_TYPE_JSONP`] are the types to declare.

use serde_json::{Map, Value};

use crate::feed::ParsedFeed;

/// Callback name used when none (or nothing usable) is supplied.
pub const DEFAULT_CALLBACK: &str = "callback";

pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
pub const CONTENT_TYPE_JSONP: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonOptions {
    /// Emit every array as an object keyed by index (`[]` becomes `{}`)
    pub force_object: bool,
    pub pretty: bool,
}

/// Serialize `feed` as JSON.
///
/// ```
/// use feedjson::feed::ParsedFeed;
/// use feedjson::output::{to_json, JsonOptions};
///
/// let empty = ParsedFeed::default();
/// assert_eq!(to_json(&empty, JsonOptions::default()).unwrap(), "[]");
///
/// let forced = JsonOptions { force_object: true, ..JsonOptions::default() };
/// assert_eq!(to_json(&empty, forced).unwrap(), "{}");
/// ```
pub fn to_json(feed: &ParsedFeed, options: JsonOptions) -> serde_json::Result<String> {
    let mut value = feed.to_value();
    if options.force_object {
        value = force_object(value);
    }

    if options.pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
}

/// Serialize `feed` as `<callback>(<json>);`.
///
/// The callback name is passed through [`sanitize_callback`] first.
pub fn to_jsonp(
    feed: &ParsedFeed,
    options: JsonOptions,
    callback: Option<&str>,
) -> serde_json::Result<String> {
    let json = to_json(feed, options)?;
    let name = sanitize_callback(callback.unwrap_or(DEFAULT_CALLBACK));
    Ok(format!("{name}({json});"))
}

/// Reduce `raw` to a safe JavaScript callback reference.
///
/// Only dot-separated identifier segments (`[A-Za-z_$][A-Za-z0-9_$]*`)
/// survive: every other character is removed. If nothing valid remains,
/// [`DEFAULT_CALLBACK`] is returned.
///
/// ```
/// use feedjson::output::sanitize_callback;
///
/// assert_eq!(sanitize_callback("jQuery.cb_1"), "jQuery.cb_1");
/// assert_eq!(sanitize_callback("alert(1);x"), "alert1x");
/// assert_eq!(sanitize_callback("();"), "callback");
/// ```
pub fn sanitize_callback(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
        .collect();

    let valid = !stripped.is_empty() && stripped.split('.').all(is_identifier);
    if valid {
        return stripped;
    }

    tracing::warn!(callback = %raw, "Unusable JSONP callback name, using default");
    DEFAULT_CALLBACK.to_string()
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn force_object(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Object(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), force_object(item)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, force_object(item)))
                .collect(),
        ),
        other => other,
    }
}
