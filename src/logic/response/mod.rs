//! Response Module - Enforcement Executor
//!
//! Carries out `block` decisions against the live system.
//!
//! # Components
//! - `process.rs`: graceful-then-forced process termination
//! - `quarantine.rs`: atomic file relocation into the quarantine store
//!
//! Every failure is reported as a structured result string; nothing in this
//! module raises to the sensor loop.

pub mod process;
pub mod quarantine;

use serde::{Deserialize, Serialize};

use super::decision::Action;
use super::event::Event;

// ============================================================================
// OUTCOME
// ============================================================================

/// Result of an enforcement attempt, surfaced to the backend on the event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutcome {
    pub executed: bool,
    pub result: String,
}

impl ExecOutcome {
    fn ok(result: impl Into<String>) -> Self {
        Self {
            executed: true,
            result: result.into(),
        }
    }

    fn failed(result: impl Into<String>) -> Self {
        Self {
            executed: false,
            result: result.into(),
        }
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Execute an arbitrated action. Only `block` has effects; everything else
/// is a no-op. Target resolution: pid first, then file path, else "no
/// target".
pub fn execute(action: Action, event: &Event) -> ExecOutcome {
    if action != Action::Block {
        return ExecOutcome::failed("no-op");
    }

    if event.payload.has("pid") {
        let pid = event.payload.int_get("pid");
        if pid <= 0 || pid > u32::MAX as i64 {
            return ExecOutcome::failed(format!("invalid pid: {}", pid));
        }
        return match process::kill_process(pid as u32) {
            Ok(result) => ExecOutcome::ok(result),
            Err(e) => ExecOutcome::failed(e),
        };
    }

    let path = {
        let p = event.payload.str_get("path");
        if p.is_empty() {
            event.payload.str_get("file")
        } else {
            p
        }
    };
    if !path.is_empty() {
        return match quarantine::quarantine_file(std::path::Path::new(path)) {
            Ok(dest) => ExecOutcome::ok(dest.to_string_lossy().to_string()),
            Err(e) => ExecOutcome::failed(e),
        };
    }

    ExecOutcome::failed("no target")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::event::Payload;

    #[test]
    fn test_non_block_is_noop() {
        let event = Event::new("process", "Process Created", Payload::new().with("pid", 1));
        let outcome = execute(Action::Alert, &event);
        assert!(!outcome.executed);
        assert_eq!(outcome.result, "no-op");

        let outcome = execute(Action::Log, &event);
        assert!(!outcome.executed);
    }

    #[test]
    fn test_block_without_target() {
        let event = Event::new("usb", "USB Inserted", Payload::new().with("device", "/dev/sdb1"));
        let outcome = execute(Action::Block, &event);
        assert!(!outcome.executed);
        assert_eq!(outcome.result, "no target");
    }

    #[test]
    fn test_block_nonexistent_pid_reports_error() {
        // PID near the top of the valid range should not exist
        let event = Event::new(
            "process",
            "Suspicious Process",
            Payload::new().with("pid", 4_000_000_000u32),
        );
        let outcome = execute(Action::Block, &event);
        assert!(!outcome.executed);
        assert!(!outcome.result.is_empty());
    }

    #[test]
    fn test_block_invalid_pid_reports_error() {
        let event = Event::new(
            "process",
            "Suspicious Process",
            Payload::new().with("pid", -5),
        );
        let outcome = execute(Action::Block, &event);
        assert!(!outcome.executed);
        assert!(outcome.result.contains("invalid pid"));
    }

    #[test]
    fn test_block_missing_file_reports_error() {
        let event = Event::new(
            "file",
            "Suspicious File Extension",
            Payload::new().with("file", "/nonexistent/evil.locked"),
        );
        let outcome = execute(Action::Block, &event);
        assert!(!outcome.executed);
        assert!(!outcome.result.is_empty());
    }
}
