//! Download Monitor
//!
//! Watches the download directory for new artifacts, waits for the file to
//! stop growing, then fingerprints it (sha256, Shannon entropy, extension
//! risk flags) and reports it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sha2::{Digest, Sha256};

use crate::constants;
use crate::logic::event::Payload;
use crate::logic::pipeline;

const MODULE: &str = "download";

/// Browser temp-file suffixes skipped until the rename lands
const TEMP_SUFFIXES: [&str; 4] = [".tmp", ".crdownload", ".part", ".download"];

/// Delay before the first size-stability check
const STABILITY_DELAY_SECS: u64 = 3;

/// Bytes hashed / measured per artifact
const MAX_ANALYSIS_BYTES: usize = 10 * 1024 * 1024;

// ============================================================================
// WATCHER
// ============================================================================

/// Start the download monitor on its own thread.
pub fn start(download_dir: PathBuf) {
    std::thread::spawn(move || {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = match RecommendedWatcher::new(tx, Config::default()) {
            Ok(w) => w,
            Err(e) => {
                log::error!("Download watcher init failed: {}", e);
                return;
            }
        };

        if let Err(e) = watcher.watch(&download_dir, RecursiveMode::NonRecursive) {
            log::warn!("Cannot watch downloads {:?}: {}", download_dir, e);
            return;
        }
        log::info!("Download monitoring started in {:?}", download_dir);

        for result in rx {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("Download watch error: {}", e);
                    continue;
                }
            };
            if !matches!(event.kind, EventKind::Create(_)) {
                continue;
            }
            for path in event.paths {
                if is_temp_file(&path) || path.is_dir() {
                    continue;
                }
                std::thread::spawn(move || {
                    wait_until_stable(&path);
                });
            }
        }
    });
}

fn is_temp_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    TEMP_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Block until the file size stops changing, then report it. Runs on a
/// short-lived thread per artifact so the watcher stays responsive.
fn wait_until_stable(path: &Path) {
    std::thread::sleep(Duration::from_secs(STABILITY_DELAY_SECS));
    loop {
        let Ok(size1) = std::fs::metadata(path).map(|m| m.len()) else {
            return;
        };
        std::thread::sleep(Duration::from_secs(1));
        let Ok(size2) = std::fs::metadata(path).map(|m| m.len()) else {
            return;
        };
        if size1 == size2 && size1 > 0 {
            report_download(path);
            return;
        }
    }
}

// ============================================================================
// ANALYSIS
// ============================================================================

fn report_download(path: &Path) {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    let bytes = read_capped(path);
    let entropy = shannon_entropy(&bytes);
    let sha256 = hex::encode(Sha256::digest(&bytes));

    let suspicious_ext = constants::EXECUTABLE_EXTENSIONS.contains(&extension.as_str());

    pipeline::emit(
        MODULE,
        "Download Detected",
        Payload::new()
            .with("file_name", file_name)
            .with("path", path.to_string_lossy().to_string())
            .with("size_bytes", size)
            .with("file_extension", extension)
            .with("entropy", entropy)
            .with("sha256", sha256)
            .with("high_entropy", entropy > 7.5)
            .with("suspicious_extension", suspicious_ext),
    );
}

fn read_capped(path: &Path) -> Vec<u8> {
    use std::io::Read;
    let Ok(file) = std::fs::File::open(path) else {
        return vec![];
    };
    let mut bytes = Vec::new();
    let mut reader = std::io::BufReader::new(file).take(MAX_ANALYSIS_BYTES as u64);
    if reader.read_to_end(&mut bytes).is_err() {
        return vec![];
    }
    bytes
}

/// Shannon entropy in bits per byte (0.0 - 8.0)
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    let len = data.len() as f64;
    let mut entropy = 0.0;
    for &count in counts.iter() {
        if count > 0 {
            let frequency = count as f64 / len;
            entropy -= frequency * frequency.log2();
        }
    }
    entropy
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_of_uniform_data() {
        let data: Vec<u8> = (0..=255u8).collect::<Vec<u8>>().repeat(64);
        let e = shannon_entropy(&data);
        assert!((e - 8.0).abs() < 0.01);
    }

    #[test]
    fn test_entropy_of_constant_data() {
        let data = vec![0x41u8; 4096];
        assert_eq!(shannon_entropy(&data), 0.0);
    }

    #[test]
    fn test_entropy_of_empty_data() {
        assert_eq!(shannon_entropy(&[]), 0.0);
    }

    #[test]
    fn test_entropy_of_text_is_moderate() {
        let data = b"the quick brown fox jumps over the lazy dog ".repeat(100);
        let e = shannon_entropy(&data);
        assert!(e > 3.0 && e < 5.0);
    }

    #[test]
    fn test_temp_file_detection() {
        assert!(is_temp_file(Path::new("/dl/setup.exe.crdownload")));
        assert!(is_temp_file(Path::new("/dl/video.part")));
        assert!(!is_temp_file(Path::new("/dl/setup.exe")));
    }
}
