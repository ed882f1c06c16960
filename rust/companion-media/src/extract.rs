use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value, json};

use crate::{MediaClient, MediaError};

/// Fields that carry base64 media.
const INLINE_FIELDS: [&str; 3] = ["image", "binary_data_base64", "data"];
/// Fields that carry a link to the media.
const LINK_FIELDS: [&str; 3] = ["image_url", "url", "image_urls"];
/// Top-level containers searched, in order.
const CONTAINERS: [&str; 2] = ["data", "result"];

const SUMMARY_LIMIT: usize = 350;
const SUMMARY_DEPTH: usize = 5;
const LONG_STRING: usize = 300;
const LONG_STRING_PREFIX: usize = 100;

/// File written to the diagnostics directory for unrecognized responses.
pub const DIAGNOSTICS_FILE: &str = "last_response.json";

/// Where the generated media lives in a service response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Base64-encoded bytes embedded in the response
    Inline(String),
    /// A URL the bytes must be fetched from
    Remote(String),
    /// Nothing recognizable; carries a sanitized summary of the response
    Unrecognized(String),
}

impl Payload {
    /// Locate the media in a decoded response body.
    ///
    /// Base64 anywhere in the response wins over a link. Each search visits
    /// `data` before `result`; within a container, direct fields win over
    /// the first entry of `images`, which wins over the container being a
    /// bare string or a list.
    pub fn locate(body: &Value) -> Payload {
        let containers: Vec<&Value> = CONTAINERS
            .iter()
            .filter_map(|name| body.get(*name))
            .collect();

        if let Some(encoded) = containers
            .iter()
            .find_map(|container| search(container, &INLINE_FIELDS, |s| !is_link(s)))
        {
            return Payload::Inline(encoded.to_string());
        }

        containers
            .iter()
            .find_map(|container| {
                search(container, &LINK_FIELDS, |_| true)
                    .or_else(|| search(container, &INLINE_FIELDS, is_link))
            })
            .map(|url| Payload::Remote(url.to_string()))
            .unwrap_or_else(|| Payload::Unrecognized(summarize(body)))
    }

    /// Decode an inline payload with the standard base64 alphabet.
    ///
    /// Surrounding whitespace and a `data:<mime>;base64,` prefix are ignored.
    pub fn decode(encoded: &str) -> Result<Vec<u8>, MediaError> {
        let trimmed = encoded.trim();
        let stripped = match trimmed.strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
            None => trimmed,
        };
        let compact: String = stripped
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        STANDARD
            .decode(compact)
            .map_err(|e| MediaError::Decode(e.to_string()))
    }
}

fn search<'a>(container: &'a Value, fields: &[&str], accept: fn(&str) -> bool) -> Option<&'a str> {
    match container {
        Value::Object(map) => from_fields(map, fields, accept).or_else(|| {
            container
                .get("images")
                .and_then(Value::as_array)
                .and_then(|images| images.first())
                .and_then(|entry| from_entry(entry, fields, accept))
        }),
        Value::Array(entries) => entries
            .first()
            .and_then(|entry| from_entry(entry, fields, accept)),
        Value::String(_) => from_entry(container, fields, accept),
        _ => None,
    }
}

fn from_entry<'a>(entry: &'a Value, fields: &[&str], accept: fn(&str) -> bool) -> Option<&'a str> {
    match entry {
        Value::Object(map) => from_fields(map, fields, accept),
        Value::String(value) if !value.is_empty() && accept(value) => Some(value.as_str()),
        _ => None,
    }
}

fn from_fields<'a>(
    map: &'a Map<String, Value>,
    fields: &[&str],
    accept: fn(&str) -> bool,
) -> Option<&'a str> {
    fields
        .iter()
        .find_map(|name| first_string(map.get(*name)?).filter(|value| accept(*value)))
}

/// A non-empty string, or the first non-empty string of a list.
fn first_string(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.as_str()),
        Value::Array(items) => items.first().and_then(Value::as_str).filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn is_link(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Replace long strings and repeated list entries so a response can be
/// logged without dumping megabytes of base64.
pub fn sanitize(value: &Value) -> Value {
    sanitize_at(value, 0)
}

fn sanitize_at(value: &Value, depth: usize) -> Value {
    if depth > SUMMARY_DEPTH {
        return Value::String("<max_depth>".into());
    }
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), sanitize_at(value, depth + 1)))
                .collect(),
        ),
        Value::Array(items) => match items.first() {
            Some(first) => {
                let mut kept = vec![sanitize_at(first, depth + 1)];
                if items.len() > 1 {
                    kept.push(Value::String("...".into()));
                }
                Value::Array(kept)
            }
            None => Value::Array(Vec::new()),
        },
        Value::String(s) if s.chars().count() > LONG_STRING => {
            let prefix: String = s.chars().take(LONG_STRING_PREFIX).collect();
            Value::String(format!("{}...<len={}>", prefix, s.chars().count()))
        }
        other => other.clone(),
    }
}

/// Sanitized, truncated one-line rendering of a response.
pub fn summarize(body: &Value) -> String {
    crate::client::truncate(&sanitize(body).to_string(), SUMMARY_LIMIT)
}

impl MediaClient {
    /// Turn a located payload into bytes.
    pub(crate) async fn resolve(&self, payload: Payload, body: &Value) -> Result<Vec<u8>, MediaError> {
        match payload {
            Payload::Inline(encoded) => Payload::decode(&encoded),
            Payload::Remote(url) => self.fetch(&url).await,
            Payload::Unrecognized(summary) => Err(self.unrecognized(body, summary).await),
        }
    }

    /// Schema error for `body`, saving it to the diagnostics directory first.
    pub(crate) async fn unrecognized(&self, body: &Value, summary: String) -> MediaError {
        if let Some(dir) = self.diagnostics_dir() {
            write_diagnostics(dir, body).await;
        }
        MediaError::Schema { summary }
    }

    /// Download a media URL and return the body as-is.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        tracing::debug!(url, "fetching media");

        let response = self
            .http()
            .get(url)
            .timeout(self.config().fetch_timeout())
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(MediaError::Status {
                status,
                message: format!("download of {} failed", url),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(MediaError::Status {
                status,
                message: format!("download of {} returned no content", url),
            });
        }
        Ok(bytes.to_vec())
    }
}

/// Best effort: a failure to write diagnostics never masks the real error.
async fn write_diagnostics(dir: &Path, body: &Value) {
    let mut keys = json!({
        "top": body.as_object().map(|o| o.keys().cloned().collect::<Vec<_>>()).unwrap_or_default(),
        "data_type": body.get("data").map(type_name).unwrap_or("null"),
    });
    if let Some(fields) = body.get("data").and_then(Value::as_object) {
        keys["data_keys"] = json!(fields.keys().collect::<Vec<_>>());
    }

    let mut report = Map::new();
    report.insert("_response_keys".into(), keys);
    match sanitize(body) {
        Value::Object(fields) => report.extend(fields),
        other => {
            report.insert("body".into(), other);
        }
    }

    let path = dir.join(DIAGNOSTICS_FILE);
    let written = async {
        tokio::fs::create_dir_all(dir).await?;
        let text = serde_json::to_vec_pretty(&Value::Object(report)).map_err(std::io::Error::other)?;
        tokio::fs::write(&path, text).await
    };
    match written.await {
        Ok(()) => tracing::info!(path = %path.display(), "saved unrecognized response"),
        Err(error) => tracing::warn!(path = %path.display(), %error, "could not save response"),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
