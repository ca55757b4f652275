//! Per-task run log: selection key, paging and record decoding.

use crate::{deserialize_height, Task, TaskKind, DEFAULT_PAGE_LIMIT};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Identifies whose run log the last-run store currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LastRunKey {
    pub task_id: String,
    pub network: String,
    pub chain_id: String,
    pub kind: TaskKind,
}

impl LastRunKey {
    pub fn from_task(task: &Task) -> Self {
        Self {
            task_id: task.task_id.clone(),
            network: task.network.clone(),
            chain_id: task.chain_id.clone(),
            kind: task.kind.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_LIMIT)
    }
}

impl Page {
    pub fn first(limit: u64) -> Self {
        Self {
            limit: limit.max(1),
            offset: 0,
        }
    }

    pub fn next(self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit),
            ..self
        }
    }

    pub fn prev(self) -> Self {
        Self {
            offset: self.offset.saturating_sub(self.limit),
            ..self
        }
    }

    /// One-based page number for display.
    pub fn number(self) -> u64 {
        self.offset / self.limit.max(1) + 1
    }
}

/// Full key of the last-run store: the selection plus the requested page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastRunQuery {
    pub key: LastRunKey,
    pub page: Page,
}

impl LastRunQuery {
    pub fn new(key: LastRunKey, page: Page) -> Self {
        Self { key, page }
    }

    pub fn request(&self) -> ListRunningRequest {
        ListRunningRequest {
            kind: self.key.kind.as_str().to_string(),
            network: self.key.network.clone(),
            task_id: self.key.task_id.clone(),
            chain_id: self.key.chain_id.clone(),
            limit: self.page.limit,
            offset: self.page.offset,
        }
    }
}

/// Body of `POST /scheduler/runner/{kind}/listRunning`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ListRunningRequest {
    pub kind: String,
    pub network: String,
    pub task_id: String,
    pub chain_id: String,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LastRunRecord {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub task_id: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub hash: String,
    #[serde(default, deserialize_with = "deserialize_height")]
    pub height: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_time")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_time")]
    pub last_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub nonce: String,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub retry_count: u64,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub error: String,
}

impl LastRunRecord {
    /// Decoded error message. Absent or undecodable errors render as empty.
    pub fn error_text(&self) -> String {
        decode_base64_text(&self.error).unwrap_or_default()
    }

    pub fn has_error(&self) -> bool {
        !self.error_text().trim().is_empty()
    }

    /// Nonce as text when it decodes to something printable, else as received.
    pub fn nonce_text(&self) -> String {
        match decode_base64_text(&self.nonce) {
            Some(text) if !text.is_empty() && !text.chars().any(char::is_control) => text,
            _ => self.nonce.clone(),
        }
    }

    pub fn time_label(&self) -> String {
        format_time(self.time)
    }

    pub fn last_time_label(&self) -> String {
        format_time(self.last_time)
    }
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn decode_base64_text(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(raw)
        .ok()?;
    String::from_utf8(bytes).ok()
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    Ok(match val {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_height(deserializer)?.unwrap_or_default())
}

fn deserialize_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    let Value::String(raw) = val else {
        return Ok(None);
    };
    Ok(DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(error: &str) -> LastRunRecord {
        LastRunRecord {
            error: error.to_string(),
            ..LastRunRecord::default()
        }
    }

    #[test]
    fn decodes_base64_error() {
        assert_eq!(record("Zm9v").error_text(), "foo");
        assert!(record("Zm9v").has_error());
    }

    #[test]
    fn empty_or_garbled_error_renders_empty() {
        assert_eq!(record("").error_text(), "");
        assert_eq!(record("not base64!").error_text(), "");
        assert!(!record("").has_error());
    }

    #[test]
    fn record_tolerates_backend_shape() {
        let rec: LastRunRecord = serde_json::from_value(json!({
            "task_id": "hub-last",
            "hash": "0xabc",
            "height": 1024,
            "time": "2024-03-01T10:20:30Z",
            "nonce": "MTIz",
            "retry_count": 2,
            "error": null
        }))
        .expect("record");

        assert_eq!(rec.height, Some(1024));
        assert_eq!(
            rec.time,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 20, 30).unwrap())
        );
        assert_eq!(rec.time_label(), "2024-03-01 10:20:30");
        assert_eq!(rec.last_time_label(), "");
        assert_eq!(rec.nonce_text(), "123");
        assert_eq!(rec.retry_count, 2);
        assert_eq!(rec.error_text(), "");
    }

    #[test]
    fn binary_nonce_is_kept_verbatim() {
        let rec = LastRunRecord {
            nonce: "AAEC".to_string(),
            ..LastRunRecord::default()
        };
        assert_eq!(rec.nonce_text(), "AAEC");
    }

    #[test]
    fn paging_never_goes_negative() {
        let page = Page::default();
        assert_eq!(page.limit, 100);
        assert_eq!(page.prev().offset, 0);
        let third = page.next().next();
        assert_eq!(third.offset, 200);
        assert_eq!(third.number(), 3);
        assert_eq!(third.prev().offset, 100);
    }

    #[test]
    fn request_carries_selection_and_page() {
        let query = LastRunQuery::new(
            LastRunKey {
                task_id: "t1".into(),
                network: "cosmos".into(),
                chain_id: "hub".into(),
                kind: TaskKind::SyncRange,
            },
            Page::default().next(),
        );
        let body = serde_json::to_value(query.request()).expect("body");
        assert_eq!(
            body,
            json!({
                "kind": "syncrange",
                "network": "cosmos",
                "task_id": "t1",
                "chain_id": "hub",
                "limit": 100,
                "offset": 100
            })
        );
    }
}
