//! Logic Bomb Detection
//!
//! Temporal correlation engine: file-trigger windows, recurring execution
//! patterns, idle long-sleepers, time-of-day execution windows, long
//! in-script sleeps, and suspicious scheduled tasks.
//!
//! # Components
//! - `trigger.rs`: file modification -> process spawn correlation
//! - `history.rs`: per-executable launch-minute ring buffers
//! - `scripts.rs`: literal sleep scanner for scripts
//! - `tasks.rs`: scheduled task monitor

pub mod history;
pub mod scripts;
pub mod tasks;
pub mod trigger;

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{Datelike, Local, TimeZone, Timelike};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use sysinfo::{ProcessStatus, System};

use self::history::ExecutionHistory;
use super::event::Payload;
use super::pipeline;
use crate::constants;

const MODULE: &str = "logic_bomb";

/// Delay between the two CPU refreshes of an idle sweep
const CPU_SAMPLE_SECS: u64 = 1;

// ============================================================================
// SHARED STATE
// ============================================================================

/// Launch-minute ring buffers, one per executable name
static HISTORIES: Lazy<Mutex<HashMap<String, ExecutionHistory>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Pids already reported as suspicious sleepers
static SLEEP_ALERTED: Lazy<Mutex<HashSet<u32>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Pids already sampled by the execution-pattern tracker
static PATTERN_SEEN: Lazy<Mutex<HashSet<u32>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Hour buckets already reported by the time-trigger check ("YYYY-MM-DD HH")
static TIME_WINDOWS_SEEN: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

// ============================================================================
// STARTUP
// ============================================================================

/// Spawn every logic-bomb detector. Called once from main inside the
/// runtime.
pub fn start() {
    for dir in constants::script_scan_dirs() {
        scripts::scan_dir(&dir);
    }

    trigger::start(trigger::TriggerConfig::default());

    tokio::spawn(idle_sweep_loop());
    log::info!("Sleep monitoring started");

    tokio::spawn(time_trigger_loop());
    log::info!("Time trigger detection started");

    tokio::spawn(pattern_sweep_loop());
    log::info!("Execution pattern tracking started");

    tokio::spawn(task_query_loop());
    log::info!("Scheduled task monitoring started");
}

// ============================================================================
// IDLE / SLEEP DETECTION
// ============================================================================

async fn idle_sweep_loop() {
    let mut sys = System::new();
    loop {
        sys.refresh_processes();
        tokio::time::sleep(Duration::from_secs(CPU_SAMPLE_SECS)).await;
        sys.refresh_processes();

        let mut live = HashSet::new();
        for (pid, proc_) in sys.processes() {
            let pid = pid.as_u32();
            live.insert(pid);

            if !matches!(proc_.status(), ProcessStatus::Sleep) {
                continue;
            }
            let uptime = proc_.run_time();
            let cpu = proc_.cpu_usage();
            if uptime <= constants::SLEEP_THRESHOLD_SECS || cpu >= constants::IDLE_CPU_THRESHOLD {
                continue;
            }
            if !SLEEP_ALERTED.lock().insert(pid) {
                continue;
            }

            pipeline::emit(
                MODULE,
                "Suspicious Sleep Detected",
                Payload::new()
                    .with("pid", pid)
                    .with("name", proc_.name().to_string())
                    .with("uptime", uptime)
                    .with("cpu", cpu)
                    .with("status", "sleeping"),
            );
        }

        SLEEP_ALERTED.lock().retain(|pid| live.contains(pid));
        tokio::time::sleep(Duration::from_secs(constants::IDLE_CHECK_INTERVAL_SECS)).await;
    }
}

// ============================================================================
// TIME TRIGGER DETECTION
// ============================================================================

async fn time_trigger_loop() {
    loop {
        check_time_trigger();
        tokio::time::sleep(Duration::from_secs(constants::TIME_TRIGGER_INTERVAL_SECS)).await;
    }
}

fn check_time_trigger() {
    let now = Local::now();
    let in_hours = constants::SUSPICIOUS_HOURS.contains(&now.hour());
    let in_dates = constants::SUSPICIOUS_DATES.contains(&(now.day(), now.month()));
    if !in_hours && !in_dates {
        return;
    }

    let bucket = now.format("%Y-%m-%d %H").to_string();
    if !TIME_WINDOWS_SEEN.lock().insert(bucket) {
        return;
    }

    pipeline::emit(
        MODULE,
        "Time-Based Execution Window",
        Payload::new().with("timestamp", now.to_rfc3339()),
    );
}

// ============================================================================
// EXECUTION PATTERN TRACKING
// ============================================================================

async fn pattern_sweep_loop() {
    let dedup = constants::pattern_dedup_enabled();
    let mut sys = System::new();
    loop {
        sys.refresh_processes();

        let mut live = HashSet::new();
        for (pid, proc_) in sys.processes() {
            let pid = pid.as_u32();
            live.insert(pid);
            if !PATTERN_SEEN.lock().insert(pid) {
                continue;
            }

            let name = proc_.name().to_string();
            if name.is_empty() {
                continue;
            }
            let Some(minute) = minute_of_day(proc_.start_time()) else {
                continue;
            };
            track_launch(&name, minute, dedup);
        }

        PATTERN_SEEN.lock().retain(|pid| live.contains(pid));
        tokio::time::sleep(Duration::from_secs(constants::PATTERN_SWEEP_INTERVAL_SECS)).await;
    }
}

/// Push one launch sample and emit the pattern finding if the buffer says so
fn track_launch(name: &str, minute: u32, dedup: bool) {
    let finding = {
        let mut histories = HISTORIES.lock();
        let history = histories.entry(name.to_string()).or_insert_with(|| {
            ExecutionHistory::new(
                constants::EXECUTION_PATTERN_WINDOW,
                constants::EXECUTION_TIME_VARIANCE_MIN,
                dedup,
            )
        });
        history.push(minute)
    };

    if let Some(finding) = finding {
        let times: Vec<String> = finding
            .samples
            .iter()
            .map(|m| format!("{:02}:{:02}", m / 60, m % 60))
            .collect();
        pipeline::emit(
            MODULE,
            "Consistent Execution Time",
            Payload::new().with("name", name).with("times", times),
        );
    }
}

fn minute_of_day(start_time: u64) -> Option<u32> {
    let local = Local.timestamp_opt(start_time as i64, 0).single()?;
    Some(local.hour() * 60 + local.minute())
}

// ============================================================================
// SCHEDULED TASKS
// ============================================================================

async fn task_query_loop() {
    loop {
        tasks::check_scheduled_tasks();
        tokio::time::sleep(Duration::from_secs(constants::TASK_QUERY_INTERVAL_SECS)).await;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minute_of_day_bounds() {
        let m = minute_of_day(1_700_000_000).unwrap();
        assert!(m < 24 * 60);
    }
}
