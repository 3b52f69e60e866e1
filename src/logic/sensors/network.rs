//! Network Connection Monitor
//!
//! Enumerates established connections by parsing `ss` (Linux), `lsof`
//! (macOS), or `netstat` (Windows) output, reports each new
//! (pid, remote) pair, and flags untrusted destinations, suspicious ports,
//! and unattributable sockets.

use std::collections::HashSet;
use std::time::Duration;

use sysinfo::{Pid, System};

use crate::constants;
use crate::logic::event::Payload;
use crate::logic::{baseline, pipeline};

const MODULE: &str = "network";

/// Cap on the remembered connection set
const MAX_SEEN: usize = 10_000;

/// A live established connection
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub pid: Option<u32>,
    pub local_addr: String,
    pub remote_addr: String,
    pub state: String,
}

pub async fn run() {
    let mut sys = System::new_all();
    let mut seen: HashSet<(u32, String)> = HashSet::new();

    loop {
        sys.refresh_processes();
        let trust = baseline::current();

        for conn in enumerate_connections() {
            if conn.state != "ESTABLISHED" || conn.remote_addr.is_empty() {
                continue;
            }
            let key = (conn.pid.unwrap_or(0), conn.remote_addr.clone());
            if !seen.insert(key) {
                continue;
            }

            let proc_name = conn
                .pid
                .and_then(|pid| sys.process(Pid::from_u32(pid)))
                .map(|p| p.name().to_string())
                .unwrap_or_else(|| "Unknown".to_string());

            let (remote_ip, remote_port) = split_addr(&conn.remote_addr);
            let trusted = trust.is_ip_trusted(&remote_ip);

            let payload = Payload::new()
                .with("pid", conn.pid.unwrap_or(0))
                .with("process", proc_name.clone())
                .with("local_addr", conn.local_addr.clone())
                .with("remote_addr", conn.remote_addr.clone())
                .with("status", conn.state.clone())
                .with("trusted", trusted);

            pipeline::emit(MODULE, "Network Connection", payload.clone());

            let bad_port = remote_port
                .map(|p| constants::SUSPICIOUS_PORTS.contains(&p))
                .unwrap_or(false);
            if !trusted || bad_port || proc_name == "Unknown" {
                pipeline::emit(
                    MODULE,
                    "Suspicious Network",
                    payload.with("reason", "Untrusted IP / Suspicious port / Unknown process"),
                );
            }
        }

        if seen.len() > MAX_SEEN {
            seen.clear();
        }
        tokio::time::sleep(Duration::from_secs(constants::NETWORK_POLL_SECS)).await;
    }
}

/// Split "ip:port" keeping IPv6 brackets out of the port
fn split_addr(addr: &str) -> (String, Option<u16>) {
    match addr.rsplit_once(':') {
        Some((ip, port)) => (
            ip.trim_matches(|c| c == '[' || c == ']').to_string(),
            port.parse().ok(),
        ),
        None => (addr.to_string(), None),
    }
}

// ============================================================================
// PLATFORM ENUMERATION
// ============================================================================

#[cfg(target_os = "linux")]
fn enumerate_connections() -> Vec<Connection> {
    let Ok(output) = std::process::Command::new("ss").args(["-tnp"]).output() else {
        return vec![];
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.lines().skip(1).filter_map(parse_ss_line).collect()
}

#[cfg(target_os = "linux")]
fn parse_ss_line(line: &str) -> Option<Connection> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return None;
    }
    let state = match parts[0] {
        "ESTAB" => "ESTABLISHED".to_string(),
        other => other.to_string(),
    };
    let pid = parts.get(5).and_then(|s| {
        s.split("pid=")
            .nth(1)
            .and_then(|p| p.split(',').next())
            .and_then(|p| p.parse().ok())
    });
    Some(Connection {
        pid,
        local_addr: parts[3].to_string(),
        remote_addr: parts[4].to_string(),
        state,
    })
}

#[cfg(target_os = "macos")]
fn enumerate_connections() -> Vec<Connection> {
    let Ok(output) = std::process::Command::new("lsof")
        .args(["-i", "-n", "-P"])
        .output()
    else {
        return vec![];
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.lines().skip(1).filter_map(parse_lsof_line).collect()
}

#[cfg(target_os = "macos")]
fn parse_lsof_line(line: &str) -> Option<Connection> {
    if !line.contains("(ESTABLISHED)") {
        return None;
    }
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 9 {
        return None;
    }
    let pid = parts[1].parse().ok();
    let name_col = parts[8];
    let (local, remote) = name_col.split_once("->")?;
    Some(Connection {
        pid,
        local_addr: local.to_string(),
        remote_addr: remote.to_string(),
        state: "ESTABLISHED".to_string(),
    })
}

#[cfg(target_os = "windows")]
fn enumerate_connections() -> Vec<Connection> {
    let Ok(output) = std::process::Command::new("netstat").args(["-ano"]).output() else {
        return vec![];
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.lines().filter_map(parse_netstat_line).collect()
}

#[cfg(target_os = "windows")]
fn parse_netstat_line(line: &str) -> Option<Connection> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 || parts[0] != "TCP" {
        return None;
    }
    Some(Connection {
        pid: parts[4].parse().ok(),
        local_addr: parts[1].to_string(),
        remote_addr: parts[2].to_string(),
        state: parts[3].to_string(),
    })
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn enumerate_connections() -> Vec<Connection> {
    vec![]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_addr() {
        assert_eq!(split_addr("10.0.0.1:443"), ("10.0.0.1".to_string(), Some(443)));
        assert_eq!(split_addr("[::1]:8080"), ("::1".to_string(), Some(8080)));
        assert_eq!(split_addr("10.0.0.1"), ("10.0.0.1".to_string(), None));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_parse_ss_line() {
        let line =
            "ESTAB      0      0      192.168.1.5:55123   93.184.216.34:443   users:((\"curl\",pid=4242,fd=5))";
        let conn = parse_ss_line(line).unwrap();
        assert_eq!(conn.state, "ESTABLISHED");
        assert_eq!(conn.local_addr, "192.168.1.5:55123");
        assert_eq!(conn.remote_addr, "93.184.216.34:443");
        assert_eq!(conn.pid, Some(4242));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_parse_ss_line_without_process() {
        let line = "ESTAB      0      0      10.0.0.2:22   10.0.0.9:51000";
        let conn = parse_ss_line(line).unwrap();
        assert_eq!(conn.pid, None);
        assert_eq!(conn.remote_addr, "10.0.0.9:51000");
    }
}
