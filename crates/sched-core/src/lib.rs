use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub mod dashboard;
pub mod form;
pub mod lastrun;
pub mod store;
pub mod sync;

pub use dashboard::{DashCommand, DashEvent, Dashboard, Mutation, MutationBusy, Resource};
pub use form::{FormError, NewTaskForm, NewTaskRequest, SyncRangeConfig};
pub use lastrun::{LastRunKey, LastRunQuery, LastRunRecord, ListRunningRequest, Page};
pub use store::{FetchFailure, ResourceStore};
pub use sync::{FetchReason, FetchTicket, Resolution, SkipReason, SyncDecision, SyncOutcome};

pub const DEFAULT_PAGE_LIMIT: u64 = 100;

/// Runner kind of a scheduled task. Unknown kinds are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TaskKind {
    #[default]
    LastData,
    SyncRange,
    Other(String),
}

impl TaskKind {
    pub fn as_str(&self) -> &str {
        match self {
            TaskKind::LastData => "lastdata",
            TaskKind::SyncRange => "syncrange",
            TaskKind::Other(raw) => raw.as_str(),
        }
    }

    /// Range-sync kinds carry a height window in their configuration.
    pub fn is_range_sync(&self) -> bool {
        matches!(self, TaskKind::SyncRange)
    }

    /// Cycles through the kinds the add-task form offers.
    pub fn next(&self) -> Self {
        match self {
            TaskKind::LastData => TaskKind::SyncRange,
            _ => TaskKind::LastData,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "" => Err("empty task kind".to_string()),
            "lastdata" | "last-data" | "last_data" => Ok(TaskKind::LastData),
            "syncrange" | "sync-range" | "sync_range" => Ok(TaskKind::SyncRange),
            _ => Ok(TaskKind::Other(input.trim().to_string())),
        }
    }
}

impl Serialize for TaskKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(raw.parse().unwrap_or_default())
    }
}

/// One schedule entry as returned by `GET /scheduler/core/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Backend-generated schedule identifier.
    #[serde(default, deserialize_with = "deserialize_opt_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_string")]
    pub run_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string")]
    pub task_id: String,
    #[serde(default, deserialize_with = "deserialize_string")]
    pub network: String,
    #[serde(default, deserialize_with = "deserialize_string")]
    pub chain_id: String,
    #[serde(default, deserialize_with = "deserialize_string")]
    pub version: String,
    #[serde(default)]
    pub kind: TaskKind,
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub duration: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "deserialize_string")]
    pub status: String,
    #[serde(default)]
    pub config: Option<Value>,
}

impl Task {
    /// Identifier used by the enable/disable endpoints. The schedule id when the
    /// backend sent one, the task id otherwise.
    pub fn schedule_ref(&self) -> &str {
        match self.id.as_deref() {
            Some(id) if !id.trim().is_empty() => id,
            _ => self.task_id.as_str(),
        }
    }

    pub fn config_pretty(&self) -> String {
        match &self.config {
            None | Some(Value::Null) => String::new(),
            Some(value) => pretty_json(value),
        }
    }

    /// Single-line rendering of the configuration for table cells.
    pub fn config_inline(&self) -> String {
        match &self.config {
            None | Some(Value::Null) => String::new(),
            Some(value) => value.to_string(),
        }
    }
}

/// Row of `GET /scheduler/core/getLastHeights`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LastHeight {
    #[serde(default, deserialize_with = "deserialize_string")]
    pub network: String,
    #[serde(default, deserialize_with = "deserialize_string")]
    pub chain_id: String,
    #[serde(default, deserialize_with = "deserialize_height")]
    pub height: Option<u64>,
}

/// Raw `{ error?: string }` body of the mutation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MutationReply {
    #[serde(default)]
    pub error: Option<String>,
}

/// Application-level result of a mutation, replacing the `error: ""` sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    Rejected(String),
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            MutationOutcome::Applied => None,
            MutationOutcome::Rejected(message) => Some(message.as_str()),
        }
    }
}

impl From<MutationReply> for MutationOutcome {
    fn from(reply: MutationReply) -> Self {
        match reply.error {
            Some(error) if !error.trim().is_empty() => MutationOutcome::Rejected(error),
            _ => MutationOutcome::Applied,
        }
    }
}

/// Renders a nanosecond count the way the backend prints durations, e.g. `1m30s`.
pub fn format_duration_nanos(nanos: i64) -> String {
    if nanos == 0 {
        return "0s".to_string();
    }
    let sign = if nanos < 0 { "-" } else { "" };
    let nanos = nanos.unsigned_abs();
    if nanos < 1_000 {
        return format!("{sign}{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{sign}{}us", nanos / 1_000);
    }
    if nanos < 1_000_000_000 {
        return format!("{sign}{}ms", nanos / 1_000_000);
    }

    let total_secs = nanos / 1_000_000_000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::from(sign);
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 || out.len() == sign.len() {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

pub fn pretty_json(value: &Value) -> String {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    if value.serialize(&mut ser).is_err() {
        return value.to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|_| value.to_string())
}

/// Accepts strings, numbers and null for string-typed fields.
fn deserialize_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_opt_string(deserializer)?.unwrap_or_default())
}

fn deserialize_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        _ => Err(serde::de::Error::custom("expected string or number")),
    }
}

/// Durations arrive as nanosecond integers or preformatted strings.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => {
            if let Some(nanos) = n.as_i64() {
                Ok(format_duration_nanos(nanos))
            } else if let Some(nanos) = n.as_f64() {
                Ok(format_duration_nanos(nanos as i64))
            } else {
                Ok(n.to_string())
            }
        }
        _ => Err(serde::de::Error::custom("expected duration as number or string")),
    }
}

pub(crate) fn deserialize_height<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_u64()),
        Value::String(s) => Ok(s.trim().parse::<u64>().ok()),
        _ => Err(serde::de::Error::custom("expected height as number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_accepts_minimal_payload() {
        let task: Task = serde_json::from_value(json!({ "task_id": "a" })).expect("task");
        assert_eq!(task.task_id, "a");
        assert_eq!(task.kind, TaskKind::LastData);
        assert!(!task.enabled);
        assert_eq!(task.schedule_ref(), "a");
        assert_eq!(task.config_pretty(), "");
    }

    #[test]
    fn task_decodes_backend_shape() {
        let task: Task = serde_json::from_value(json!({
            "id": "0b9f6a3c-5d0e-4ad4-9d49-cf1b8e0a1f11",
            "run_id": "8e7c1a52-2f4f-4c45-b5cf-4b3f3b1e0d22",
            "network": "cosmos",
            "chain_id": "cosmoshub-4",
            "version": "0.0.1",
            "task_id": "hub-last",
            "duration": 90_000_000_000i64,
            "kind": "syncrange",
            "enabled": true,
            "status": "running",
            "config": { "height_from": "10", "height_to": "20" }
        }))
        .expect("task");

        assert_eq!(task.schedule_ref(), "0b9f6a3c-5d0e-4ad4-9d49-cf1b8e0a1f11");
        assert_eq!(task.duration, "1m30s");
        assert_eq!(task.kind, TaskKind::SyncRange);
        assert!(task.kind.is_range_sync());
        assert_eq!(
            task.config_pretty(),
            "{\n    \"height_from\": \"10\",\n    \"height_to\": \"20\"\n}"
        );
    }

    #[test]
    fn unknown_kind_round_trips() {
        let kind: TaskKind = serde_json::from_value(json!("blockwatch")).expect("kind");
        assert_eq!(kind, TaskKind::Other("blockwatch".to_string()));
        assert_eq!(serde_json::to_value(&kind).expect("ser"), json!("blockwatch"));
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration_nanos(0), "0s");
        assert_eq!(format_duration_nanos(500), "500ns");
        assert_eq!(format_duration_nanos(250_000_000), "250ms");
        assert_eq!(format_duration_nanos(10_000_000_000), "10s");
        assert_eq!(format_duration_nanos(3_600_000_000_000), "1h");
        assert_eq!(format_duration_nanos(3_723_000_000_000), "1h2m3s");
    }

    #[test]
    fn empty_error_means_applied() {
        let applied: MutationOutcome = MutationReply { error: None }.into();
        let blank: MutationOutcome = MutationReply {
            error: Some(String::new()),
        }
        .into();
        let rejected: MutationOutcome = MutationReply {
            error: Some("not found".to_string()),
        }
        .into();
        assert!(applied.is_applied());
        assert!(blank.is_applied());
        assert_eq!(rejected.message(), Some("not found"));
    }

    #[test]
    fn last_height_tolerates_nulls() {
        let row: LastHeight =
            serde_json::from_value(json!({ "network": "skale", "chain_id": null, "height": 12 }))
                .expect("row");
        assert_eq!(row.chain_id, "");
        assert_eq!(row.height, Some(12));
    }
}
