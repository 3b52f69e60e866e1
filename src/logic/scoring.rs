//! Severity Scorer
//!
//! Pure additive rule table mapping (event type, payload) to a 0-10 score.
//! The weights are part of the agent's external contract: backend analytics
//! and the fallback decision tier both depend on them.
//!
//! `score` itself has no side effects; `score_event` is the pipeline-boundary
//! wrapper that also appends to the severity score log and relays a
//! `severity_score` record.

use serde_json::json;
use uuid::Uuid;

use super::event::{Event, Payload};
use super::{recorder, relay};
use crate::constants;

/// Module name for the score log and relay records
const SCORE_MODULE: &str = "severity_score";

/// Name fragments of dual-use interpreters checked on process creation
const DUAL_USE_NAMES: [&str; 4] = ["powershell", "cmd", "wscript", "mshta"];

// ============================================================================
// SCORE TABLE
// ============================================================================

/// Score an event. Deterministic, total, clamped to [0, 10]; absent payload
/// fields read as zero/false/empty and contribute nothing.
pub fn score(event_type: &str, payload: &Payload) -> u8 {
    let mut score: i64 = 0;

    match event_type {
        "Suspicious Sleep Detected" => {
            score += if payload.num_get("uptime") > 600.0 { 6 } else { 4 };
            if payload.num_get("cpu") < 1.0 {
                score += 2;
            }
        }
        "Long sleep() in Script" => {
            score += (payload.num_get("duration") as i64 / 100).min(5);
        }
        "Suspicious Scheduled Task" => {
            let task = payload.to_lowercase_string();
            score += if task.contains("powershell") {
                7
            } else if task.contains("cmd") {
                5
            } else {
                4
            };
        }
        "Consistent Execution Time" => score += 6,
        "Time-Based Execution Window" => score += 5,
        "File-triggered Process" => {
            score += 7;
            if payload.str_get("proc_name").to_lowercase().contains("powershell") {
                score += 2;
            }
        }
        "Process Created" => {
            let name = payload.str_get("name").to_lowercase();
            let parent = payload.str_get("parent").to_lowercase();
            if DUAL_USE_NAMES.iter().any(|k| name.contains(k)) {
                score += 4;
            }
            if constants::SUSPICIOUS_EXECUTABLES.contains(&parent.as_str()) {
                score += 3;
            }
            score = score.max(1);
        }
        "Suspicious Process" | "Suspicious Parent Process" | "Suspicious Process Modules" => {
            score += 6;
        }
        "Network Connection" => {
            if !payload.bool_get("trusted", true) {
                score += 4;
            }
            if let Some(port) = remote_port(payload.str_get("remote_addr")) {
                if constants::SUSPICIOUS_PORTS.contains(&port) {
                    score += 3;
                }
            }
            score = score.max(1);
        }
        "Suspicious Network" => score += 7,
        "File Modified" | "File Created" | "File Deleted" | "System File Touched" => {
            score += 2;
            let path = first_path(payload);
            if is_system_path(&path) {
                score += 3;
            }
        }
        "Suspicious File Extension" => score += 6,
        "Autorun Entry Detected" => score += 6,
        "USB Inserted" => score += 3,
        "USB Removed" => score += 1,
        "Untrusted Process Tree" => score += 7,
        "YARA Match Detected" => score += 8,
        "Download Detected" => {
            if payload.num_get("entropy") > 7.5 {
                score += 3;
            }
            let ext = if payload.has("file_extension") {
                payload.str_get("file_extension").to_string()
            } else {
                payload.str_get("path").to_string()
            };
            let ext = ext.to_lowercase();
            if constants::EXECUTABLE_EXTENSIONS
                .iter()
                .any(|e| ext.ends_with(e))
            {
                score += 4;
            }
        }
        _ => {}
    }

    score.clamp(0, 10) as u8
}

fn first_path(payload: &Payload) -> String {
    let file = payload.str_get("file");
    if !file.is_empty() {
        file.to_string()
    } else {
        payload.str_get("path").to_string()
    }
}

fn is_system_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    constants::SYSTEM_DIR_PREFIXES
        .iter()
        .any(|p| lower.starts_with(p))
}

fn remote_port(remote_addr: &str) -> Option<u16> {
    remote_addr.split(':').nth(1).and_then(|p| p.parse().ok())
}

// ============================================================================
// PIPELINE BOUNDARY
// ============================================================================

/// Score an event and record the fact: the score is attached to the event,
/// appended to the severity score log under a fresh id, and relayed to the
/// backend as a `severity_score` record.
pub fn score_event(event: &mut Event) {
    let severity = score(&event.event_type, &event.payload);
    event.set_severity(severity);

    let record = json!({
        "event_id": Uuid::new_v4().to_string(),
        "timestamp": chrono::Utc::now().timestamp() as f64,
        "event_type": event.event_type,
        "source": "agent",
        "data": event.payload.as_value(),
        "score": severity,
    });

    recorder::append(SCORE_MODULE, &record);
    relay::send(SCORE_MODULE, &event.event_type, record);
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> Payload {
        Payload::new()
    }

    #[test]
    fn test_empty_payload_never_panics() {
        let types = [
            "Suspicious Sleep Detected",
            "Long sleep() in Script",
            "Suspicious Scheduled Task",
            "Consistent Execution Time",
            "Time-Based Execution Window",
            "File-triggered Process",
            "Process Created",
            "Suspicious Process",
            "Suspicious Parent Process",
            "Suspicious Process Modules",
            "Network Connection",
            "Suspicious Network",
            "File Modified",
            "File Created",
            "File Deleted",
            "System File Touched",
            "Suspicious File Extension",
            "Autorun Entry Detected",
            "USB Inserted",
            "USB Removed",
            "Untrusted Process Tree",
            "YARA Match Detected",
            "Download Detected",
            "Completely Unknown Event",
        ];
        for t in types {
            let s = score(t, &p());
            assert!(s <= 10, "{} scored {}", t, s);
        }
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let payload = p()
            .with("uptime", 900)
            .with("cpu", 0.2)
            .with("name", "powershell.exe");
        let a = score("Suspicious Sleep Detected", &payload);
        let b = score("Suspicious Sleep Detected", &payload);
        assert_eq!(a, b);
    }

    #[test]
    fn test_idle_process_branches() {
        // Long uptime, idle CPU: 6 + 2
        let payload = p().with("uptime", 700).with("cpu", 0.1);
        assert_eq!(score("Suspicious Sleep Detected", &payload), 8);
        // Short uptime, busy CPU: 4
        let payload = p().with("uptime", 100).with("cpu", 5.0);
        assert_eq!(score("Suspicious Sleep Detected", &payload), 4);
        // Missing fields: uptime 0 (<= 600) and cpu 0 (< 1): 4 + 2
        assert_eq!(score("Suspicious Sleep Detected", &p()), 6);
    }

    #[test]
    fn test_script_sleep_is_capped() {
        assert_eq!(score("Long sleep() in Script", &p().with("duration", 300)), 3);
        assert_eq!(score("Long sleep() in Script", &p().with("duration", 5000)), 5);
        assert_eq!(score("Long sleep() in Script", &p().with("duration", 50)), 0);
    }

    #[test]
    fn test_scheduled_task_interpreter_tiers() {
        let ps = p().with("task", "run powershell -enc AAAA");
        assert_eq!(score("Suspicious Scheduled Task", &ps), 7);
        let cmd = p().with("task", "cmd /c del backups");
        assert_eq!(score("Suspicious Scheduled Task", &cmd), 5);
        let other = p().with("task", "python backup.py");
        assert_eq!(score("Suspicious Scheduled Task", &other), 4);
    }

    #[test]
    fn test_file_triggered_process_shell_bonus() {
        let shell = p().with("proc_name", "powershell.exe");
        assert_eq!(score("File-triggered Process", &shell), 9);
        let other = p().with("proc_name", "notepad.exe");
        assert_eq!(score("File-triggered Process", &other), 7);
    }

    #[test]
    fn test_process_created_floor_and_bonuses() {
        assert_eq!(score("Process Created", &p()), 1);
        let shell = p().with("name", "powershell.exe").with("parent", "explorer.exe");
        assert_eq!(score("Process Created", &shell), 4);
        let spawned = p().with("name", "evil.exe").with("parent", "cmd.exe");
        assert_eq!(score("Process Created", &spawned), 3);
        let both = p().with("name", "wscript.exe").with("parent", "mshta.exe");
        assert_eq!(score("Process Created", &both), 7);
    }

    #[test]
    fn test_network_connection_rules() {
        assert_eq!(score("Network Connection", &p()), 1);
        let untrusted = p().with("trusted", false).with("remote_addr", "8.8.8.8:443");
        assert_eq!(score("Network Connection", &untrusted), 4);
        let backdoor = p().with("trusted", false).with("remote_addr", "8.8.8.8:1337");
        assert_eq!(score("Network Connection", &backdoor), 7);
        let trusted_bad_port = p().with("trusted", true).with("remote_addr", "10.0.0.1:9001");
        assert_eq!(score("Network Connection", &trusted_bad_port), 3);
    }

    #[test]
    fn test_file_events_system_dir_bonus() {
        let user_file = p().with("path", "/home/user/notes.txt");
        assert_eq!(score("File Modified", &user_file), 2);
        let system_file = p().with("file", "C:/Windows/System32/drivers/etc/hosts");
        assert_eq!(score("System File Touched", &system_file), 5);
        let unix_system = p().with("path", "/etc/passwd");
        assert_eq!(score("File Created", &unix_system), 5);
    }

    #[test]
    fn test_flat_scores() {
        assert_eq!(score("Consistent Execution Time", &p()), 6);
        assert_eq!(score("Time-Based Execution Window", &p()), 5);
        assert_eq!(score("Suspicious Process", &p()), 6);
        assert_eq!(score("Suspicious Network", &p()), 7);
        assert_eq!(score("Suspicious File Extension", &p()), 6);
        assert_eq!(score("Autorun Entry Detected", &p()), 6);
        assert_eq!(score("USB Inserted", &p()), 3);
        assert_eq!(score("USB Removed", &p()), 1);
        assert_eq!(score("Untrusted Process Tree", &p()), 7);
        assert_eq!(score("YARA Match Detected", &p()), 8);
    }

    #[test]
    fn test_download_heuristics() {
        let packed = p().with("entropy", 7.9).with("file_extension", ".exe");
        assert_eq!(score("Download Detected", &packed), 7);
        let plain = p().with("entropy", 4.2).with("file_extension", ".txt");
        assert_eq!(score("Download Detected", &plain), 0);
        // Extension falls back to the path when file_extension is absent
        let by_path = p().with("path", "/home/user/Downloads/setup.msi");
        assert_eq!(score("Download Detected", &by_path), 4);
    }

    #[test]
    fn test_unknown_type_scores_zero() {
        assert_eq!(score("Unheard Of", &p().with("uptime", 10_000)), 0);
    }

    #[test]
    fn test_remote_port_parsing() {
        assert_eq!(remote_port("10.1.2.3:443"), Some(443));
        assert_eq!(remote_port("10.1.2.3"), None);
        assert_eq!(remote_port(""), None);
        assert_eq!(remote_port("host:notaport"), None);
    }
}
