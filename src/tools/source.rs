/// Remote Table Sources
///
/// Each tool reads one spreadsheet-backed table published as JSON. Tables are
/// fetched whole on every call; nothing is cached. The helpers at the bottom
/// implement the row access and matching rules shared by all tools.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::error::ToolError;

/// One table row: column name to cell value.
pub type Row = Map<String, Value>;

const USER_AGENT: &str = concat!("navi-mcp-server/", env!("CARGO_PKG_VERSION"));

/// Something that yields the rows of a table.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Short dataset name used in logs.
    fn name(&self) -> &str;

    async fn fetch_rows(&self) -> Result<Vec<Row>, ToolError>;
}

/// Build the HTTP client shared by all remote tables.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// A table served as JSON over HTTP GET.
pub struct RemoteTable {
    name: &'static str,
    url: String,
    client: reqwest::Client,
}

impl RemoteTable {
    pub fn new(name: &'static str, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name,
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl TableSource for RemoteTable {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch_rows(&self) -> Result<Vec<Row>, ToolError> {
        let started = std::time::Instant::now();
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::UpstreamStatus {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }
        let body: Value = response.json().await?;
        let rows = normalize(body)?;
        tracing::debug!(
            table = self.name,
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched table"
        );
        Ok(rows)
    }
}

/// Turn a remote payload into rows.
///
/// Accepts either a bare JSON array or an object with a `results` array.
/// Array elements that are not objects are skipped. Any other shape is a
/// `ToolError::Payload`.
pub fn normalize(payload: Value) -> Result<Vec<Row>, ToolError> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(mut envelope) => match envelope.remove("results") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(ToolError::Payload(format!(
                    "`results` is {}, expected an array",
                    kind(&other)
                )));
            }
            None => {
                return Err(ToolError::Payload(
                    "object without a `results` array".to_string(),
                ));
            }
        },
        other => {
            return Err(ToolError::Payload(format!(
                "got {}, expected an array of rows",
                kind(&other)
            )));
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(row) => Some(row),
            _ => None,
        })
        .collect())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Cell text for `key`; absent and null cells read as "".
pub fn field(row: &Row, key: &str) -> String {
    match row.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// First non-empty cell among `keys`.
pub fn first_field(row: &Row, keys: &[&str]) -> String {
    keys.iter()
        .map(|key| field(row, key))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

/// Case-insensitive substring containment.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Case-insensitive whole-value equality.
pub fn equals_ci(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Treat missing and blank string arguments alike.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
