use crate::TaskKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid interval '{0}' (expected e.g. 30s, 5m, 1h30m)")]
    InvalidInterval(String),
    #[error("{field} must be an unsigned integer, got '{value}'")]
    InvalidHeight { field: &'static str, value: String },
    #[error("height_from ({from}) is greater than height_to ({to})")]
    HeightRange { from: u64, to: u64 },
}

/// Height window sent for range-sync tasks. The backend parses both bounds
/// from strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncRangeConfig {
    pub height_from: String,
    pub height_to: String,
}

/// Body of `POST /scheduler/core/addTask/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTaskRequest {
    pub task_id: String,
    pub kind: TaskKind,
    pub network: String,
    pub chain_id: String,
    pub interval: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<SyncRangeConfig>,
}

/// Raw, user-edited add-task input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTaskForm {
    pub task_id: String,
    pub kind: TaskKind,
    pub network: String,
    pub chain_id: String,
    pub interval: String,
    pub height_from: String,
    pub height_to: String,
}

impl NewTaskForm {
    pub fn validate(&self) -> Result<NewTaskRequest, FormError> {
        let task_id = required("task_id", &self.task_id)?;
        let network = required("network", &self.network)?;
        let chain_id = required("chain_id", &self.chain_id)?;
        let interval = required("interval", &self.interval)?;
        if !interval_pattern().is_match(&interval) {
            return Err(FormError::InvalidInterval(interval));
        }

        let config = if self.kind.is_range_sync() {
            let from = parse_height("height_from", &self.height_from)?;
            let to = parse_height("height_to", &self.height_to)?;
            if from > to {
                return Err(FormError::HeightRange { from, to });
            }
            Some(SyncRangeConfig {
                height_from: from.to_string(),
                height_to: to.to_string(),
            })
        } else {
            None
        };

        Ok(NewTaskRequest {
            task_id,
            kind: self.kind.clone(),
            network,
            chain_id,
            interval,
            config,
        })
    }
}

fn interval_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:[0-9]+(?:\.[0-9]+)?(?:ns|us|µs|ms|s|m|h))+$").expect("valid regex")
    })
}

fn required(field: &'static str, value: &str) -> Result<String, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FormError::Missing(field));
    }
    Ok(value.to_string())
}

fn parse_height(field: &'static str, value: &str) -> Result<u64, FormError> {
    let trimmed = required(field, value)?;
    trimmed.parse::<u64>().map_err(|_| FormError::InvalidHeight {
        field,
        value: trimmed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filled(kind: TaskKind) -> NewTaskForm {
        NewTaskForm {
            task_id: "hub-range".into(),
            kind,
            network: "cosmos".into(),
            chain_id: "cosmoshub-4".into(),
            interval: "30s".into(),
            height_from: "100".into(),
            height_to: "200".into(),
        }
    }

    #[test]
    fn lastdata_payload_omits_config() {
        let request = filled(TaskKind::LastData).validate().expect("valid");
        assert_eq!(
            serde_json::to_value(&request).expect("json"),
            json!({
                "task_id": "hub-range",
                "kind": "lastdata",
                "network": "cosmos",
                "chain_id": "cosmoshub-4",
                "interval": "30s"
            })
        );
    }

    #[test]
    fn syncrange_payload_nests_height_window() {
        let request = filled(TaskKind::SyncRange).validate().expect("valid");
        let body = serde_json::to_value(&request).expect("json");
        assert_eq!(
            body["config"],
            json!({ "height_from": "100", "height_to": "200" })
        );
    }

    #[test]
    fn rejects_blank_fields() {
        let mut form = filled(TaskKind::LastData);
        form.network = "  ".into();
        assert_eq!(form.validate(), Err(FormError::Missing("network")));
    }

    #[test]
    fn interval_must_carry_unit() {
        let mut form = filled(TaskKind::LastData);
        for ok in ["500ms", "1h30m", "1.5h", "10s"] {
            form.interval = ok.into();
            assert!(form.validate().is_ok(), "{ok} should be accepted");
        }
        for bad in ["30", "s", "5 minutes", "-1s"] {
            form.interval = bad.into();
            assert!(
                matches!(form.validate(), Err(FormError::InvalidInterval(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn range_heights_are_checked() {
        let mut form = filled(TaskKind::SyncRange);
        form.height_to = "abc".into();
        assert!(matches!(
            form.validate(),
            Err(FormError::InvalidHeight { field: "height_to", .. })
        ));

        form.height_to = "50".into();
        assert_eq!(
            form.validate(),
            Err(FormError::HeightRange { from: 100, to: 50 })
        );

        // heights are ignored for other kinds
        let mut plain = filled(TaskKind::LastData);
        plain.height_to = "abc".into();
        assert!(plain.validate().is_ok());
    }
}
