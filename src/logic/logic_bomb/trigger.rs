//! File-Trigger Correlation
//!
//! Watches a set of sensitive files; a modification opens (or refreshes) a
//! correlation window for that path. A deferred task lets the window elapse,
//! then samples running processes once and reports every script interpreter
//! that started inside the window.
//!
//! The sampling is deliberately point-in-time: a process that starts and
//! exits within the window is not observed. That gap is part of the detection
//! contract, not an oversight.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::json;
use sysinfo::System;

use crate::constants;
use crate::logic::event::{Event, Payload};
use crate::logic::{pipeline, recorder, relay, scoring};

/// Module tag for trigger findings
const MODULE: &str = "logic_bomb";

/// Slack added on top of the window before sampling, so a process created at
/// the very edge of the window is still visible
const SAMPLE_SLACK_SECS: u64 = 1;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// Correlation window between modification and process start
    pub window: Duration,
    /// Interpreter executable names that qualify as trigger targets
    pub executables: Vec<String>,
    /// Directories placed under watch
    pub watch_paths: Vec<PathBuf>,
    /// Specific files that qualify; empty means every file under the
    /// watched directories
    pub watch_files: Vec<PathBuf>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(constants::TRIGGER_WINDOW_SECS),
            executables: constants::SUSPICIOUS_EXECUTABLES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            watch_paths: constants::trigger_paths(),
            watch_files: constants::trigger_files(),
        }
    }
}

// ============================================================================
// WINDOW STATE
// ============================================================================

struct WindowState {
    generation: u64,
}

/// Open correlation windows, one per path; refresh bumps the generation so a
/// superseded deferred check knows to stand down.
static WINDOWS: Lazy<Mutex<HashMap<PathBuf, WindowState>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

// ============================================================================
// PROCESS SAMPLING
// ============================================================================

/// One sampled running process
#[derive(Debug, Clone)]
pub struct ProcSample {
    pub pid: u32,
    pub name: String,
    /// Unix start time, seconds
    pub start_time: u64,
}

fn sample_processes() -> Vec<ProcSample> {
    let mut sys = System::new();
    sys.refresh_processes();
    sys.processes()
        .iter()
        .map(|(pid, proc_)| ProcSample {
            pid: pid.as_u32(),
            name: proc_.name().to_string(),
            start_time: proc_.start_time(),
        })
        .collect()
}

/// Select processes matching the interpreter set whose start time falls
/// within the window measured back from `now`.
pub fn select_recent<'a>(
    procs: &'a [ProcSample],
    executables: &[String],
    window: Duration,
    now: u64,
) -> Vec<&'a ProcSample> {
    procs
        .iter()
        .filter(|p| {
            let name = p.name.to_lowercase();
            executables.iter().any(|e| e.to_lowercase() == name)
                && now.saturating_sub(p.start_time) <= window.as_secs()
        })
        .collect()
}

// ============================================================================
// WATCHER
// ============================================================================

/// Start the trigger watcher on its own thread. The notify callback only
/// records the trigger and schedules the deferred check; it never sleeps.
pub fn start(config: TriggerConfig) {
    let handle = match tokio::runtime::Handle::try_current() {
        Ok(h) => h,
        Err(_) => {
            log::error!("Trigger monitor requires a runtime, not started");
            return;
        }
    };

    std::thread::spawn(move || {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = match RecommendedWatcher::new(tx, Config::default()) {
            Ok(w) => w,
            Err(e) => {
                log::error!("Trigger watcher init failed: {}", e);
                return;
            }
        };

        for path in &config.watch_paths {
            if let Err(e) = watcher.watch(path, RecursiveMode::Recursive) {
                log::warn!("Cannot watch {:?}: {}", path, e);
            }
        }
        log::info!("File trigger monitor running on {} paths", config.watch_paths.len());

        for result in rx {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("Trigger watch error: {}", e);
                    continue;
                }
            };
            if !matches!(event.kind, notify::EventKind::Modify(_)) {
                continue;
            }
            for path in event.paths {
                if qualifies(&path, &config.watch_files) {
                    record_trigger(path, &config, &handle);
                }
            }
        }
    });
}

fn qualifies(path: &Path, watch_files: &[PathBuf]) -> bool {
    if watch_files.is_empty() {
        return path.is_file();
    }
    watch_files.iter().any(|f| f == path)
}

/// Open or refresh the window for a path and schedule the deferred sample.
/// Latest trigger wins: the bumped generation retires any check in flight.
fn record_trigger(path: PathBuf, config: &TriggerConfig, handle: &tokio::runtime::Handle) {
    let generation = {
        let mut windows = WINDOWS.lock();
        let state = windows
            .entry(path.clone())
            .or_insert(WindowState { generation: 0 });
        state.generation += 1;
        state.generation
    };

    log::info!("[Trigger Watch] File modified: {}", path.display());

    let window = config.window;
    let executables = config.executables.clone();
    handle.spawn(async move {
        tokio::time::sleep(window + Duration::from_secs(SAMPLE_SLACK_SECS)).await;
        run_delayed_check(path, generation, window, executables);
    });
}

fn run_delayed_check(path: PathBuf, generation: u64, window: Duration, executables: Vec<String>) {
    {
        let mut windows = WINDOWS.lock();
        match windows.get(&path) {
            Some(state) if state.generation == generation => {
                windows.remove(&path);
            }
            // A newer trigger refreshed the window; its own check will run.
            _ => return,
        }
    }

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    let procs = sample_processes();
    let matches = select_recent(&procs, &executables, window, now);

    for proc_ in matches {
        let payload = Payload::new()
            .with("file", path.to_string_lossy().to_string())
            .with("proc_name", proc_.name.clone())
            .with("pid", proc_.pid)
            .with("created_at", proc_.start_time);

        log::warn!("File-triggered process detected: {} -> {}", path.display(), proc_.name);
        pipeline::emit(MODULE, "File-triggered Process", payload);
        log_correlation(&path, proc_);
    }
}

/// Denormalized pairing of the trigger file and the matched process, kept as
/// its own record alongside the scored finding.
fn log_correlation(trigger_file: &Path, proc_: &ProcSample) {
    let correlation = json!({
        "trigger_file": trigger_file.to_string_lossy(),
        "trigger_time": chrono::Utc::now().to_rfc3339(),
        "process_name": proc_.name,
        "pid": proc_.pid,
        "process_start_time": proc_.start_time,
    });

    let mut corr_event = Event::new(
        MODULE,
        "Correlated Trigger-Process",
        Payload::new()
            .with("trigger_file", trigger_file.to_string_lossy().to_string())
            .with("process_name", proc_.name.clone())
            .with("pid", proc_.pid),
    );
    scoring::score_event(&mut corr_event);

    recorder::append(
        MODULE,
        &json!({"event": "Correlated Trigger-Process", "correlation": correlation}),
    );
    relay::send(MODULE, "Correlated Trigger-Process", correlation);
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn shells() -> Vec<String> {
        vec!["powershell.exe".to_string(), "cmd.exe".to_string()]
    }

    fn proc_(pid: u32, name: &str, start_time: u64) -> ProcSample {
        ProcSample {
            pid,
            name: name.to_string(),
            start_time,
        }
    }

    #[test]
    fn test_select_inside_window() {
        let now = 1_700_000_010;
        let procs = vec![
            proc_(100, "powershell.exe", now - 1),
            proc_(101, "PowerShell.EXE", now - 3),
            proc_(102, "notepad.exe", now - 1),
        ];
        let matches = select_recent(&procs, &shells(), Duration::from_secs(3), now);
        let pids: Vec<u32> = matches.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![100, 101]);
    }

    #[test]
    fn test_select_excludes_stale_starts() {
        let now = 1_700_000_010;
        let procs = vec![proc_(100, "cmd.exe", now - 4)];
        let matches = select_recent(&procs, &shells(), Duration::from_secs(3), now);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_select_ignores_future_clock_skew() {
        let now = 1_700_000_010;
        // Start time slightly ahead of the sample clock still counts
        let procs = vec![proc_(100, "cmd.exe", now + 1)];
        let matches = select_recent(&procs, &shells(), Duration::from_secs(3), now);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_refresh_retires_older_check() {
        let path = PathBuf::from("/tmp/watched-refresh-test");
        {
            let mut windows = WINDOWS.lock();
            windows.insert(path.clone(), WindowState { generation: 2 });
        }

        // The generation-1 check must stand down and leave the window alone
        run_delayed_check(path.clone(), 1, Duration::from_secs(3), vec![]);
        assert!(WINDOWS.lock().contains_key(&path));

        // The generation-2 check consumes the window
        run_delayed_check(path.clone(), 2, Duration::from_secs(3), vec![]);
        assert!(!WINDOWS.lock().contains_key(&path));
    }
}
