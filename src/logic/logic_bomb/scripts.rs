//! In-Script Sleep Scanner
//!
//! Finds long literal sleep calls in scripts - the classic delayed-payload
//! pattern. Covers Python, shell, and PowerShell call forms.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::SLEEP_THRESHOLD_SECS;
use crate::logic::event::Payload;
use crate::logic::pipeline;

/// Extensions scanned for sleep calls
const SCRIPT_EXTENSIONS: [&str; 3] = ["py", "sh", "ps1"];

/// Upper bound on bytes read per script
const MAX_SCRIPT_BYTES: u64 = 1024 * 1024;

static SLEEP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"time\.sleep\(\s*(\d+)",
        r"\bsleep\(\s*(\d+)",
        r"(?m)^\s*sleep\s+(\d+)",
        r"(?i)Start-Sleep\s+(?:-s(?:econds)?\s+)?(\d+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Scan a directory tree, emitting a finding per script with a long sleep
pub fn scan_dir(dir: &Path) {
    walk(dir, &mut |path| {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return;
        };
        if !SCRIPT_EXTENSIONS.contains(&ext) {
            return;
        }
        if let Some(duration) = longest_sleep(path) {
            if duration >= SLEEP_THRESHOLD_SECS {
                pipeline::emit(
                    "logic_bomb",
                    "Long sleep() in Script",
                    Payload::new()
                        .with("file", path.to_string_lossy().to_string())
                        .with("duration", duration),
                );
            }
        }
    });
}

/// Longest literal sleep duration found in the file, if any
pub fn longest_sleep(path: &Path) -> Option<u64> {
    let metadata = std::fs::metadata(path).ok()?;
    if metadata.len() > MAX_SCRIPT_BYTES {
        return None;
    }
    let content = std::fs::read_to_string(path).ok()?;
    longest_sleep_in(&content)
}

fn longest_sleep_in(content: &str) -> Option<u64> {
    let mut longest = None;
    for pattern in SLEEP_PATTERNS.iter() {
        for captures in pattern.captures_iter(content) {
            if let Some(duration) = captures.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) {
                if longest.map(|l| duration > l).unwrap_or(true) {
                    longest = Some(duration);
                }
            }
        }
    }
    longest
}

fn walk(dir: &Path, visit: &mut dyn FnMut(&Path)) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, visit);
        } else {
            visit(&path);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_sleep() {
        let src = "import time\ntime.sleep(600)\nprint('done')\n";
        assert_eq!(longest_sleep_in(src), Some(600));
    }

    #[test]
    fn test_shell_sleep() {
        let src = "#!/bin/sh\nsleep 3600\n./payload\n";
        assert_eq!(longest_sleep_in(src), Some(3600));
    }

    #[test]
    fn test_powershell_sleep() {
        let src = "Start-Sleep -Seconds 900\nInvoke-Thing\n";
        assert_eq!(longest_sleep_in(src), Some(900));
    }

    #[test]
    fn test_longest_wins() {
        let src = "time.sleep(10)\ntime.sleep(500)\ntime.sleep(90)\n";
        assert_eq!(longest_sleep_in(src), Some(500));
    }

    #[test]
    fn test_no_sleep() {
        assert_eq!(longest_sleep_in("print('hello')\n"), None);
    }

    #[test]
    fn test_non_literal_duration_ignored() {
        assert_eq!(longest_sleep_in("time.sleep(interval)\n"), None);
    }
}
