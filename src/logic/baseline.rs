//! Baseline Trust Lists
//!
//! Externally supplied allow-list of trusted process names, parent/child
//! pairs, IP CIDR ranges, and scheduled-task names. Read-mostly: loaded into
//! an `Arc` and swapped whole on reload, never mutated in place. A missing or
//! corrupt baseline file degrades to "nothing trusted".

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Deserialize;

use crate::constants;

// ============================================================================
// STATE
// ============================================================================

static CURRENT: Lazy<RwLock<Arc<Baseline>>> =
    Lazy::new(|| RwLock::new(Arc::new(Baseline::default())));

// ============================================================================
// FILE FORMAT
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct BaselineFile {
    #[serde(default)]
    processes: Vec<String>,
    #[serde(default)]
    process_pairs: Vec<PairEntry>,
    #[serde(default)]
    trusted_ips: Vec<String>,
    #[serde(default)]
    scheduled_tasks: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PairEntry {
    parent: String,
    child: String,
}

// ============================================================================
// BASELINE
// ============================================================================

/// Immutable snapshot of the trust lists
#[derive(Debug, Default)]
pub struct Baseline {
    processes: HashSet<String>,
    pairs: HashSet<(String, String)>,
    ranges: Vec<String>,
    tasks: HashSet<String>,
}

impl Baseline {
    fn from_file(file: BaselineFile) -> Self {
        Self {
            processes: file
                .processes
                .into_iter()
                .map(|p| p.to_lowercase())
                .collect(),
            pairs: file
                .process_pairs
                .into_iter()
                .map(|p| (p.parent.to_lowercase(), p.child.to_lowercase()))
                .collect(),
            ranges: file.trusted_ips,
            tasks: file.scheduled_tasks.into_iter().collect(),
        }
    }

    pub fn is_process_trusted(&self, name: &str) -> bool {
        self.processes.contains(&name.to_lowercase())
    }

    pub fn is_pair_trusted(&self, parent: &str, child: &str) -> bool {
        self.pairs
            .contains(&(parent.to_lowercase(), child.to_lowercase()))
    }

    pub fn is_task_trusted(&self, task: &str) -> bool {
        self.tasks.contains(task)
    }

    /// Check an address against the trusted CIDR ranges. Unparseable
    /// addresses are untrusted.
    pub fn is_ip_trusted(&self, ip: &str) -> bool {
        let Ok(addr) = ip.parse::<IpAddr>() else {
            return false;
        };
        self.ranges.iter().any(|cidr| cidr_contains(cidr, addr))
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
            && self.pairs.is_empty()
            && self.ranges.is_empty()
            && self.tasks.is_empty()
    }
}

// ============================================================================
// CIDR MATCHING
// ============================================================================

/// Check if an IP address falls within a CIDR range. A bare address is
/// treated as an exact match.
fn cidr_contains(cidr: &str, ip: IpAddr) -> bool {
    let Some((addr_str, prefix_str)) = cidr.split_once('/') else {
        return cidr.parse::<IpAddr>().map(|a| a == ip).unwrap_or(false);
    };
    let Ok(prefix_len) = prefix_str.parse::<u8>() else {
        return false;
    };
    let Ok(network) = addr_str.parse::<IpAddr>() else {
        return false;
    };

    match (network, ip) {
        (IpAddr::V4(net), IpAddr::V4(addr)) => {
            if prefix_len == 0 {
                return true;
            }
            if prefix_len >= 32 {
                return net == addr;
            }
            let mask = u32::MAX << (32 - prefix_len);
            (u32::from(net) & mask) == (u32::from(addr) & mask)
        }
        (IpAddr::V6(net), IpAddr::V6(addr)) => {
            if prefix_len == 0 {
                return true;
            }
            if prefix_len >= 128 {
                return net == addr;
            }
            let mask = u128::MAX << (128 - prefix_len);
            (u128::from(net) & mask) == (u128::from(addr) & mask)
        }
        _ => false,
    }
}

// ============================================================================
// GLOBAL API
// ============================================================================

/// Load the baseline at startup
pub fn init() {
    reload();
    let baseline = current();
    if baseline.is_empty() {
        log::info!("No baseline loaded - treating everything as untrusted");
    } else {
        log::info!("Baseline loaded from {:?}", constants::baseline_path());
    }
}

/// Re-read the baseline file and swap the shared snapshot
pub fn reload() {
    let baseline = load_from(&constants::baseline_path());
    *CURRENT.write() = Arc::new(baseline);
}

/// Current baseline snapshot
pub fn current() -> Arc<Baseline> {
    CURRENT.read().clone()
}

fn load_from(path: &Path) -> Baseline {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<BaselineFile>(&content) {
            Ok(file) => Baseline::from_file(file),
            Err(e) => {
                log::warn!(
                    "Baseline file {:?} is corrupt ({}), using empty baseline",
                    path,
                    e
                );
                Baseline::default()
            }
        },
        Err(_) => Baseline::default(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_is_empty_baseline() {
        let baseline = load_from(Path::new("/nonexistent/baseline.json"));
        assert!(baseline.is_empty());
        assert!(!baseline.is_ip_trusted("10.0.0.1"));
        assert!(!baseline.is_pair_trusted("explorer.exe", "cmd.exe"));
    }

    #[test]
    fn test_corrupt_file_is_empty_baseline() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("baseline.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"{ not json").unwrap();

        let baseline = load_from(&path);
        assert!(baseline.is_empty());
    }

    #[test]
    fn test_load_trust_lists() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("baseline.json");
        std::fs::write(
            &path,
            r#"{
                "processes": ["Explorer.EXE"],
                "process_pairs": [{"parent": "services.exe", "child": "svchost.exe"}],
                "trusted_ips": ["10.0.0.0/8", "192.168.1.1"],
                "scheduled_tasks": ["\\Microsoft\\Windows\\Defrag"]
            }"#,
        )
        .unwrap();

        let baseline = load_from(&path);
        assert!(baseline.is_process_trusted("explorer.exe"));
        assert!(baseline.is_pair_trusted("SERVICES.EXE", "svchost.exe"));
        assert!(baseline.is_task_trusted("\\Microsoft\\Windows\\Defrag"));
        assert!(!baseline.is_task_trusted("\\Evil\\Task"));
        assert!(baseline.is_ip_trusted("10.200.3.4"));
        assert!(baseline.is_ip_trusted("192.168.1.1"));
        assert!(!baseline.is_ip_trusted("8.8.8.8"));
        assert!(!baseline.is_ip_trusted("not-an-ip"));
    }

    #[test]
    fn test_cidr_matching() {
        assert!(cidr_contains("10.0.0.0/8", "10.200.3.4".parse().unwrap()));
        assert!(!cidr_contains("10.0.0.0/8", "11.0.0.1".parse().unwrap()));
        assert!(cidr_contains("192.168.1.0/24", "192.168.1.254".parse().unwrap()));
        assert!(!cidr_contains("192.168.1.0/24", "192.168.2.1".parse().unwrap()));
        assert!(cidr_contains("0.0.0.0/0", "8.8.8.8".parse().unwrap()));
        assert!(cidr_contains("192.168.1.7", "192.168.1.7".parse().unwrap()));
        assert!(cidr_contains("fd00::/8", "fd12::1".parse().unwrap()));
        assert!(!cidr_contains("fd00::/8", "fe80::1".parse().unwrap()));
        assert!(!cidr_contains("10.0.0.0/8", "fd00::1".parse().unwrap()));
        assert!(!cidr_contains("garbage/8", "10.0.0.1".parse().unwrap()));
    }
}
