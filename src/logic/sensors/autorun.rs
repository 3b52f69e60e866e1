//! Autorun Persistence Monitor
//!
//! Enumerates autostart entries (registry Run key on Windows, XDG autostart
//! and cron drop-ins elsewhere) and reports each entry once.

use std::collections::HashSet;
use std::time::Duration;

use crate::constants;
use crate::logic::event::Payload;
use crate::logic::pipeline;

const MODULE: &str = "autorun";

pub async fn run() {
    let mut seen: HashSet<String> = HashSet::new();

    loop {
        for (name, command) in enumerate_autoruns() {
            let key = format!("{}={}", name, command);
            if !seen.insert(key) {
                continue;
            }
            pipeline::emit(
                MODULE,
                "Autorun Entry Detected",
                Payload::new().with("name", name).with("command", command),
            );
        }
        tokio::time::sleep(Duration::from_secs(constants::AUTORUN_POLL_SECS)).await;
    }
}

#[cfg(windows)]
fn enumerate_autoruns() -> Vec<(String, String)> {
    let Ok(output) = std::process::Command::new("reg")
        .args([
            "query",
            r"HKCU\Software\Microsoft\Windows\CurrentVersion\Run",
        ])
        .output()
    else {
        return vec![];
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.trim().splitn(3, "    ").collect();
            match parts.as_slice() {
                [name, kind, value] if kind.starts_with("REG_") => {
                    Some((name.trim().to_string(), value.trim().to_string()))
                }
                _ => None,
            }
        })
        .collect()
}

#[cfg(not(windows))]
fn enumerate_autoruns() -> Vec<(String, String)> {
    let mut entries = Vec::new();

    if let Some(autostart) = dirs::config_dir().map(|c| c.join("autostart")) {
        if let Ok(dir) = std::fs::read_dir(&autostart) {
            for entry in dir.flatten() {
                let path = entry.path();
                if path.extension().map(|e| e != "desktop").unwrap_or(true) {
                    continue;
                }
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let command = std::fs::read_to_string(&path)
                    .ok()
                    .and_then(|content| {
                        content
                            .lines()
                            .find(|l| l.starts_with("Exec="))
                            .map(|l| l.trim_start_matches("Exec=").to_string())
                    })
                    .unwrap_or_default();
                entries.push((name, command));
            }
        }
    }

    if let Ok(dir) = std::fs::read_dir("/etc/cron.d") {
        for entry in dir.flatten() {
            let path = entry.path();
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "cron".to_string());
                entries.push((name, line.to_string()));
            }
        }
    }

    entries
}
