//! Scheduled Task Monitor
//!
//! Enumerates scheduled tasks and flags definitions referencing interpreters
//! or delay keywords, excluding names the baseline trusts.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::logic::event::Payload;
use crate::logic::{baseline, pipeline};

/// Keywords that make a task definition suspicious
const TASK_KEYWORDS: [&str; 5] = ["temp", "sleep", "delay", ".exe", "powershell"];

/// One task per name per agent run
static SEEN_TASKS: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// One enumerated scheduled task
#[derive(Debug, Clone)]
pub struct TaskEntry {
    pub name: String,
    pub definition: String,
}

/// Run one sweep over the host's scheduled tasks
pub fn check_scheduled_tasks() {
    let trust = baseline::current();
    for task in enumerate_tasks() {
        if !is_suspicious(&task.definition) {
            continue;
        }
        if trust.is_task_trusted(&task.name) {
            continue;
        }
        if !SEEN_TASKS.lock().insert(task.name.clone()) {
            continue;
        }
        pipeline::emit(
            "logic_bomb",
            "Suspicious Scheduled Task",
            Payload::new()
                .with("task", task.name)
                .with("details", task.definition),
        );
    }
}

pub fn is_suspicious(definition: &str) -> bool {
    let lower = definition.to_lowercase();
    TASK_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[cfg(windows)]
fn enumerate_tasks() -> Vec<TaskEntry> {
    let output = match std::process::Command::new("schtasks")
        .args(["/query", "/fo", "LIST", "/v"])
        .output()
    {
        Ok(o) => o,
        Err(e) => {
            log::warn!("schtasks query failed: {}", e);
            return vec![];
        }
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .split("\r\n\r\n")
        .filter(|block| !block.trim().is_empty())
        .map(|block| {
            let name = block
                .lines()
                .find(|l| l.starts_with("TaskName:"))
                .map(|l| l.trim_start_matches("TaskName:").trim().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            TaskEntry {
                name,
                definition: block.to_string(),
            }
        })
        .collect()
}

#[cfg(not(windows))]
fn enumerate_tasks() -> Vec<TaskEntry> {
    let mut tasks = Vec::new();

    if let Ok(output) = std::process::Command::new("crontab").arg("-l").output() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        for (i, line) in stdout.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            tasks.push(TaskEntry {
                name: format!("crontab:{}", i + 1),
                definition: line.to_string(),
            });
        }
    }

    if let Ok(entries) = std::fs::read_dir("/etc/cron.d") {
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            for (i, line) in content.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                tasks.push(TaskEntry {
                    name: format!("{}:{}", path.display(), i + 1),
                    definition: line.to_string(),
                });
            }
        }
    }

    tasks
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_detection() {
        assert!(is_suspicious("0 3 * * * powershell -enc AAAA"));
        assert!(is_suspicious("run C:\\Temp\\job.exe nightly"));
        assert!(is_suspicious("@reboot sleep 600 && ./run"));
        assert!(!is_suspicious("0 2 * * * /usr/local/bin/backup --all"));
    }
}
