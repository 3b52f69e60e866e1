//! File Quarantine
//!
//! Atomic relocation of a suspect file into the quarantine store under a
//! timestamp-prefixed name. Rename is tried first; copy-and-delete is only
//! the cross-device fallback, so the original path is not left executable
//! during a slow copy.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::constants;
use crate::logic::recorder;

/// Module tag for quarantine records in the local log
const RESPONSE_MODULE: &str = "response";

/// Quarantine a file into the configured quarantine root.
pub fn quarantine_file(path: &Path) -> Result<PathBuf, String> {
    quarantine_into(path, &constants::quarantine_dir())
}

/// Quarantine a file into the given root. Returns the destination path.
pub fn quarantine_into(path: &Path, root: &Path) -> Result<PathBuf, String> {
    if !path.exists() {
        return Err(format!("file not found: {}", path.display()));
    }

    if let Err(e) = fs::create_dir_all(root) {
        log::warn!("Failed to create quarantine dir {:?}: {}", root, e);
    }

    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let ts = chrono::Utc::now().timestamp();

    // Timestamp prefix plus a counter suffix so equal basenames captured in
    // the same second never overwrite each other.
    let mut dest = root.join(format!("{}_{}", ts, base));
    let mut n = 1;
    while dest.exists() {
        dest = root.join(format!("{}_{}_{}", ts, n, base));
        n += 1;
    }

    fs::rename(path, &dest)
        .or_else(|_| fs::copy(path, &dest).and_then(|_| fs::remove_file(path)).map(|_| ()))
        .map_err(|e| format!("failed to quarantine {}: {}", path.display(), e))?;

    recorder::append(
        RESPONSE_MODULE,
        &json!({
            "event": "File Quarantined",
            "source": path.to_string_lossy(),
            "destination": dest.to_string_lossy(),
            "time": chrono::Utc::now().to_rfc3339(),
        }),
    );
    log::warn!("Quarantined file: {} -> {}", path.display(), dest.display());

    Ok(dest)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_quarantine_moves_file() {
        let src_dir = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let src = src_dir.path().join("payload.bin");
        fs::write(&src, b"malicious bytes").unwrap();

        let dest = quarantine_into(&src, root.path()).unwrap();

        assert!(!src.exists());
        assert!(dest.exists());
        assert!(dest
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("payload.bin"));
        assert_eq!(fs::read(&dest).unwrap(), b"malicious bytes");
    }

    #[test]
    fn test_same_basename_gets_distinct_entries() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();

        let a = dir_a.path().join("dropper.exe");
        let b = dir_b.path().join("dropper.exe");
        fs::write(&a, b"first").unwrap();
        fs::write(&b, b"second").unwrap();

        let dest_a = quarantine_into(&a, root.path()).unwrap();
        let dest_b = quarantine_into(&b, root.path()).unwrap();

        assert_ne!(dest_a, dest_b);
        assert_eq!(fs::read(&dest_a).unwrap(), b"first");
        assert_eq!(fs::read(&dest_b).unwrap(), b"second");
    }

    #[test]
    fn test_missing_source_errors() {
        let root = TempDir::new().unwrap();
        let result = quarantine_into(Path::new("/nonexistent/evil.bin"), root.path());
        assert!(result.is_err());
        assert!(!result.unwrap_err().is_empty());
    }
}
