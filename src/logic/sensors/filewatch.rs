//! File Activity Monitor
//!
//! Watches the configured directories for create/modify/delete activity,
//! flags touches under the system directories and ransomware-style
//! extensions, and counts modification bursts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::constants;
use crate::logic::event::Payload;
use crate::logic::pipeline;

const MODULE: &str = "file";

// ============================================================================
// WATCHER
// ============================================================================

/// Start the file monitor on its own thread.
pub fn start(paths: Vec<PathBuf>) {
    std::thread::spawn(move || {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = match RecommendedWatcher::new(tx, Config::default()) {
            Ok(w) => w,
            Err(e) => {
                log::error!("File watcher init failed: {}", e);
                return;
            }
        };

        for path in &paths {
            if let Err(e) = watcher.watch(path, RecursiveMode::Recursive) {
                log::warn!("Cannot watch {:?}: {}", path, e);
            }
        }
        log::info!("File monitoring started on {} paths", paths.len());

        let mut burst = BurstCounter::new(
            constants::FILE_MOD_THRESHOLD,
            Duration::from_secs(constants::FILE_MOD_WINDOW_SECS),
        );

        for result in rx {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("File watch error: {}", e);
                    continue;
                }
            };
            for path in &event.paths {
                match event.kind {
                    EventKind::Modify(_) => on_modified(path, &mut burst),
                    EventKind::Create(_) => on_created(path),
                    EventKind::Remove(_) => on_deleted(path),
                    _ => {}
                }
            }
        }
    });
}

fn on_modified(path: &Path, burst: &mut BurstCounter) {
    let path_str = path.to_string_lossy().to_string();

    pipeline::emit(MODULE, "File Modified", Payload::new().with("path", path_str.clone()));

    if is_system_path(&path_str) {
        pipeline::emit(MODULE, "System File Touched", Payload::new().with("file", path_str.clone()));
    }

    if let Some(total) = burst.record(path) {
        pipeline::emit(
            MODULE,
            "Suspicious Behavior",
            Payload::new()
                .with("reason", "Rapid file modification")
                .with("count", total),
        );
    }
}

fn on_created(path: &Path) {
    let path_str = path.to_string_lossy().to_string();

    pipeline::emit(MODULE, "File Created", Payload::new().with("path", path_str.clone()));

    let lower = path_str.to_lowercase();
    if constants::SUSPICIOUS_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(ext))
    {
        pipeline::emit(
            MODULE,
            "Suspicious File Extension",
            Payload::new().with("file", path_str),
        );
    }
}

fn on_deleted(path: &Path) {
    pipeline::emit(
        MODULE,
        "File Deleted",
        Payload::new().with("path", path.to_string_lossy().to_string()),
    );
}

fn is_system_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    constants::SYSTEM_DIR_PREFIXES
        .iter()
        .any(|p| lower.starts_with(p))
}

// ============================================================================
// BURST COUNTER
// ============================================================================

/// Rolling per-path modification counter that resets each window and fires
/// when the total crosses the threshold.
struct BurstCounter {
    counts: HashMap<PathBuf, u32>,
    last_reset: Instant,
    threshold: u32,
    window: Duration,
}

impl BurstCounter {
    fn new(threshold: u32, window: Duration) -> Self {
        Self {
            counts: HashMap::new(),
            last_reset: Instant::now(),
            threshold,
            window,
        }
    }

    /// Record one modification; returns the running total when it exceeds
    /// the threshold.
    fn record(&mut self, path: &Path) -> Option<u32> {
        if self.last_reset.elapsed() > self.window {
            self.counts.clear();
            self.last_reset = Instant::now();
        }

        *self.counts.entry(path.to_path_buf()).or_insert(0) += 1;
        let total: u32 = self.counts.values().sum();
        (total > self.threshold).then_some(total)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_fires_over_threshold() {
        let mut burst = BurstCounter::new(3, Duration::from_secs(60));
        let p = Path::new("/tmp/a");
        assert_eq!(burst.record(p), None);
        assert_eq!(burst.record(p), None);
        assert_eq!(burst.record(p), None);
        assert_eq!(burst.record(p), Some(4));
    }

    #[test]
    fn test_burst_counts_across_paths() {
        let mut burst = BurstCounter::new(2, Duration::from_secs(60));
        assert_eq!(burst.record(Path::new("/tmp/a")), None);
        assert_eq!(burst.record(Path::new("/tmp/b")), None);
        assert_eq!(burst.record(Path::new("/tmp/c")), Some(3));
    }

    #[test]
    fn test_burst_resets_after_window() {
        let mut burst = BurstCounter::new(1, Duration::from_millis(10));
        burst.record(Path::new("/tmp/a"));
        burst.record(Path::new("/tmp/a"));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(burst.record(Path::new("/tmp/a")), None);
    }
}
