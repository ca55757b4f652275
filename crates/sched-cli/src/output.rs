use sched_core::{LastHeight, LastRunRecord, Task};
use serde_json::{json, Value};

pub fn tasks_table(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks scheduled.".to_string();
    }
    let mut out = format!(
        "{:<24} {:<12} {:<18} {:<10} {:<9} {:<4} {}\n",
        "TASK", "NETWORK", "CHAIN", "KIND", "INTERVAL", "ON", "STATUS"
    );
    for task in tasks {
        out.push_str(&format!(
            "{:<24} {:<12} {:<18} {:<10} {:<9} {:<4} {}\n",
            task.task_id,
            task.network,
            task.chain_id,
            task.kind,
            task.duration,
            if task.enabled { "yes" } else { "no" },
            task.status
        ));
    }
    out.trim_end().to_string()
}

pub fn task_detail(task: &Task) -> String {
    let mut out = format!(
        "task:     {}\nschedule: {}\nnetwork:  {}/{}\nkind:     {}\ninterval: {}\nenabled:  {}",
        task.task_id,
        task.schedule_ref(),
        task.network,
        task.chain_id,
        task.kind,
        task.duration,
        task.enabled
    );
    let config = task.config_pretty();
    if !config.is_empty() {
        out.push_str("\nconfig:\n");
        out.push_str(&config);
    }
    out
}

pub fn runs_table(records: &[LastRunRecord]) -> String {
    if records.is_empty() {
        return "No runs recorded.".to_string();
    }
    let mut out = format!(
        "{:<19} {:<10} {:<20} {:<7} {}\n",
        "TIME", "HEIGHT", "HASH", "RETRIES", "ERROR"
    );
    for record in records {
        out.push_str(&format!(
            "{:<19} {:<10} {:<20} {:<7} {}\n",
            record.time_label(),
            record
                .height
                .map(|height| height.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.hash,
            record.retry_count,
            record.error_text()
        ));
    }
    out.trim_end().to_string()
}

/// Records with the error and nonce already decoded.
pub fn runs_json(records: &[LastRunRecord]) -> Value {
    Value::Array(
        records
            .iter()
            .map(|record| {
                json!({
                    "task_id": record.task_id,
                    "time": record.time,
                    "last_time": record.last_time,
                    "height": record.height,
                    "hash": record.hash,
                    "retry_count": record.retry_count,
                    "nonce": record.nonce_text(),
                    "error": record.error_text(),
                })
            })
            .collect(),
    )
}

pub fn heights_table(heights: &[LastHeight]) -> String {
    if heights.is_empty() {
        return "No heights reported.".to_string();
    }
    let mut out = format!("{:<16} {:<24} {}\n", "NETWORK", "CHAIN", "HEIGHT");
    for row in heights {
        out.push_str(&format!(
            "{:<16} {:<24} {}\n",
            row.network,
            row.chain_id,
            row.height
                .map(|height| height.to_string())
                .unwrap_or_else(|| "-".to_string())
        ));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(value: Value) -> Task {
        serde_json::from_value(value).expect("task")
    }

    #[test]
    fn tasks_table_keeps_server_order() {
        let table = tasks_table(&[
            task(json!({ "task_id": "b", "enabled": true })),
            task(json!({ "task_id": "a" })),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("b "));
        assert!(lines[2].starts_with("a "));
        assert!(lines[1].contains("yes"));
    }

    #[test]
    fn runs_output_decodes_errors() {
        let records = vec![LastRunRecord {
            task_id: "a".into(),
            error: "Zm9v".into(),
            height: Some(7),
            ..LastRunRecord::default()
        }];
        assert!(runs_table(&records).lines().nth(1).unwrap_or("").ends_with("foo"));
        assert_eq!(runs_json(&records)[0]["error"], "foo");
        assert_eq!(runs_json(&records)[0]["height"], 7);
    }

    #[test]
    fn detail_prints_indented_config() {
        let detail = task_detail(&task(json!({
            "id": "uuid-1",
            "task_id": "r",
            "kind": "syncrange",
            "config": { "height_from": "1" }
        })));
        assert!(detail.contains("schedule: uuid-1"));
        assert!(detail.ends_with("{\n    \"height_from\": \"1\"\n}"));
    }

    #[test]
    fn empty_collections_have_messages() {
        assert_eq!(tasks_table(&[]), "No tasks scheduled.");
        assert_eq!(heights_table(&[]), "No heights reported.");
    }
}
