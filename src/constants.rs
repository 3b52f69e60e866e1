//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! To change the default backend collector, only edit this file.

use std::path::PathBuf;

/// Default backend collector URL
///
/// This is the fallback URL when no environment variable is set.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000/log";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "EDR-Agent";

// ============================================
// Detection thresholds
// ============================================

/// Uptime above which a sleeping process is considered suspicious (seconds)
pub const SLEEP_THRESHOLD_SECS: u64 = 300;

/// CPU utilisation below which a process counts as idle (percent)
pub const IDLE_CPU_THRESHOLD: f32 = 1.0;

/// Interval between idle-process sweeps (seconds)
pub const IDLE_CHECK_INTERVAL_SECS: u64 = 5;

/// Correlation window between a file trigger and a process start (seconds)
pub const TRIGGER_WINDOW_SECS: u64 = 3;

/// Execution-pattern ring buffer capacity (samples)
pub const EXECUTION_PATTERN_WINDOW: usize = 7;

/// Maximum minute-of-day spread for a consistent execution pattern (minutes)
pub const EXECUTION_TIME_VARIANCE_MIN: u32 = 2;

/// Interval between execution-pattern sweeps (seconds)
pub const PATTERN_SWEEP_INTERVAL_SECS: u64 = 30;

/// Interval between time-trigger checks (seconds)
pub const TIME_TRIGGER_INTERVAL_SECS: u64 = 60;

/// Interval between scheduled-task checks (seconds)
pub const TASK_QUERY_INTERVAL_SECS: u64 = 60;

/// Interval between process sweeps (seconds)
pub const PROCESS_POLL_SECS: u64 = 3;

/// Interval between network connection sweeps (seconds)
pub const NETWORK_POLL_SECS: u64 = 5;

/// Interval between removable-media sweeps (seconds)
pub const USB_POLL_SECS: u64 = 10;

/// Interval between autorun sweeps (seconds)
pub const AUTORUN_POLL_SECS: u64 = 30;

/// Interval between process-tree sweeps (seconds)
pub const TREE_POLL_SECS: u64 = 30;

/// Interval between signature scans (seconds)
pub const SIGNATURE_SCAN_INTERVAL_SECS: u64 = 300;

/// Rapid file modification burst threshold (events per window)
pub const FILE_MOD_THRESHOLD: u32 = 30;

/// Rapid file modification window (seconds)
pub const FILE_MOD_WINDOW_SECS: u64 = 30;

/// Grace period before a terminate escalates to a forced kill (seconds)
pub const KILL_GRACE_SECS: u64 = 5;

/// Hours of day considered suspicious for time-based execution
pub const SUSPICIOUS_HOURS: [u32; 4] = [2, 3, 4, 23];

/// (day, month) pairs considered suspicious for time-based execution
pub const SUSPICIOUS_DATES: [(u32, u32); 2] = [(29, 7), (31, 12)];

/// Script-interpreter executables watched by the trigger correlation
pub const SUSPICIOUS_EXECUTABLES: [&str; 4] =
    ["powershell.exe", "cmd.exe", "wscript.exe", "mshta.exe"];

/// Name fragments that mark a process as suspicious on sight
pub const SUSPICIOUS_KEYWORDS: [&str; 7] = [
    "keylogger", "rat", "remoteadmin", "ransom", "locker", "stealer", "info_stealer",
];

/// Remote ports commonly used by backdoors and remote shells
pub const SUSPICIOUS_PORTS: [u16; 7] = [1337, 5555, 6666, 8081, 9001, 3389, 22];

/// Ransomware-style file extensions
pub const SUSPICIOUS_EXTENSIONS: [&str; 7] = [
    ".locked", ".crypted", ".enc", ".encrypt", ".rnsm", ".crpt", ".encfile",
];

/// Executable-like extensions flagged on downloads
pub const EXECUTABLE_EXTENSIONS: [&str; 7] =
    [".exe", ".dll", ".scr", ".js", ".vbs", ".jar", ".msi"];

/// Path prefixes treated as the OS system directory
pub const SYSTEM_DIR_PREFIXES: [&str; 6] =
    ["c:/windows", "c:\\windows", "/usr", "/etc", "/bin", "/sbin"];

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get backend collector URL from environment or use default
pub fn get_backend_url() -> String {
    std::env::var("EDR_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string())
}

/// Per-user data root (logs, quarantine, baseline, models, signatures)
pub fn data_root() -> PathBuf {
    std::env::var("EDR_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("edr-agent")
        })
}

/// Directory holding the per-module append-only logs
pub fn log_dir() -> PathBuf {
    data_root().join("logs")
}

/// Quarantine root directory
pub fn quarantine_dir() -> PathBuf {
    data_root().join("quarantine")
}

/// Baseline trust-list file
pub fn baseline_path() -> PathBuf {
    std::env::var("EDR_BASELINE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_root().join("baseline").join("baseline.json"))
}

/// Versioned ONNX model artifact path
pub fn model_path() -> PathBuf {
    std::env::var("EDR_MODEL_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_root().join("models").join("realtime_v1.onnx"))
}

/// Directory holding signature rule files
pub fn signature_dir() -> PathBuf {
    std::env::var("EDR_SIGNATURE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_root().join("signatures"))
}

fn env_path_list(var: &str) -> Option<Vec<PathBuf>> {
    std::env::var(var).ok().map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect()
    })
}

/// Directories watched by the general file monitor
pub fn watch_paths() -> Vec<PathBuf> {
    env_path_list("EDR_WATCH_PATHS").unwrap_or_else(|| {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        vec![home.join("Desktop"), home.join("Documents")]
    })
}

/// Directories watched by the file-trigger correlation
pub fn trigger_paths() -> Vec<PathBuf> {
    env_path_list("EDR_TRIGGER_PATHS").unwrap_or_else(|| {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        vec![home.join("Documents")]
    })
}

/// Specific files whose modification opens a correlation window.
/// Empty means every file under the trigger paths qualifies.
pub fn trigger_files() -> Vec<PathBuf> {
    env_path_list("EDR_TRIGGER_FILES").unwrap_or_default()
}

/// Directories scanned for long in-script sleeps
pub fn script_scan_dirs() -> Vec<PathBuf> {
    env_path_list("EDR_SCRIPT_DIRS").unwrap_or_default()
}

/// Directories scanned by the signature sweep
pub fn scan_dirs() -> Vec<PathBuf> {
    env_path_list("EDR_SCAN_DIRS").unwrap_or_else(|| {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        vec![home.join("Downloads"), home.join("Desktop")]
    })
}

/// Download directory watched for new artifacts
pub fn download_dir() -> PathBuf {
    std::env::var("EDR_DOWNLOAD_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::download_dir().unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("Downloads")
            })
        })
}

/// Whether repeated execution-pattern findings are de-duplicated
pub fn pattern_dedup_enabled() -> bool {
    std::env::var("EDR_PATTERN_DEDUP")
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(true)
}
