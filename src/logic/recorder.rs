//! Local Event Log
//!
//! Append-only JSONL writer, one file per sensor module.
//! Write failures are logged and swallowed; only a missing log directory at
//! startup is fatal.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::constants;

/// Log file suffix
const LOG_SUFFIX: &str = "_logs.jsonl";

// ============================================================================
// STATE
// ============================================================================

static RECORDER: Lazy<Mutex<Option<Recorder>>> = Lazy::new(|| Mutex::new(None));

static RECORDS_WRITTEN: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// RECORDER
// ============================================================================

/// Append-only JSONL recorder with one writer per module
pub struct Recorder {
    base_dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl Recorder {
    /// Create a recorder rooted at the given directory
    pub fn new(base_dir: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&base_dir)?;
        log::info!("Local event log directory: {:?}", base_dir);
        Ok(Self {
            base_dir,
            writers: HashMap::new(),
        })
    }

    /// Append one record to the module's log file
    pub fn append(&mut self, module: &str, record: &serde_json::Value) -> std::io::Result<()> {
        let writer = match self.writers.entry(module.to_string()) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(v) => {
                let path = self.base_dir.join(format!("{}{}", module, LOG_SUFFIX));
                let file = OpenOptions::new().create(true).append(true).open(&path)?;
                v.insert(BufWriter::new(file))
            }
        };

        let line = record.to_string();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        RECORDS_WRITTEN.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }
}

// ============================================================================
// GLOBAL API
// ============================================================================

/// Initialize the global recorder. This is the one startup step that may
/// abort the agent: without a writable log directory the pipeline would run
/// silently half-configured.
pub fn init(base_dir: Option<PathBuf>) -> std::io::Result<()> {
    let dir = base_dir.unwrap_or_else(constants::log_dir);
    let recorder = Recorder::new(dir)?;
    *RECORDER.lock() = Some(recorder);
    Ok(())
}

/// Append a record to a module log (global function). Failures are logged
/// and never propagate to the caller.
pub fn append(module: &str, record: &serde_json::Value) {
    let mut guard = RECORDER.lock();
    match guard.as_mut() {
        Some(recorder) => {
            if let Err(e) = recorder.append(module, record) {
                log::error!("Failed to write {} log: {}", module, e);
            }
        }
        None => {
            log::warn!("Recorder not initialized, {} record dropped", module);
        }
    }
}

/// Total records written this session
pub fn records_written() -> u64 {
    RECORDS_WRITTEN.load(Ordering::SeqCst)
}

/// Current log directory, if initialized
pub fn current_dir() -> Option<PathBuf> {
    RECORDER.lock().as_ref().map(|r| r.base_dir().clone())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_append_writes_jsonl() {
        let temp = TempDir::new().unwrap();
        let mut recorder = Recorder::new(temp.path().to_path_buf()).unwrap();

        for i in 0..3 {
            recorder
                .append("process", &json!({"event": "Process Created", "n": i}))
                .unwrap();
        }

        let content =
            std::fs::read_to_string(temp.path().join("process_logs.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in lines {
            assert!(serde_json::from_str::<serde_json::Value>(line).is_ok());
        }
    }

    #[test]
    fn test_modules_get_separate_files() {
        let temp = TempDir::new().unwrap();
        let mut recorder = Recorder::new(temp.path().to_path_buf()).unwrap();

        recorder.append("process", &json!({"a": 1})).unwrap();
        recorder.append("network", &json!({"b": 2})).unwrap();

        assert!(temp.path().join("process_logs.jsonl").exists());
        assert!(temp.path().join("network_logs.jsonl").exists());
    }
}
