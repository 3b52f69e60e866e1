//! Process Monitor
//!
//! Sweeps the process table and reports each new pid, flagging suspicious
//! names and interpreter parents.

use std::collections::HashSet;
use std::time::Duration;

use sysinfo::System;

use crate::constants;
use crate::logic::event::Payload;
use crate::logic::pipeline;

const MODULE: &str = "process";

pub async fn run() {
    let mut sys = System::new_all();
    let mut seen: HashSet<u32> = HashSet::new();

    loop {
        sys.refresh_processes();

        let mut live = HashSet::new();
        for (pid, proc_) in sys.processes() {
            let pid = pid.as_u32();
            live.insert(pid);
            if !seen.insert(pid) {
                continue;
            }

            let name = proc_.name().to_string();
            let parent_name = proc_
                .parent()
                .and_then(|ppid| sys.process(ppid))
                .map(|p| p.name().to_lowercase())
                .unwrap_or_else(|| "unknown".to_string());

            pipeline::emit(
                MODULE,
                "Process Created",
                Payload::new()
                    .with("pid", pid)
                    .with("name", name.clone())
                    .with("parent", parent_name.clone()),
            );

            let name_lower = name.to_lowercase();
            if constants::SUSPICIOUS_KEYWORDS
                .iter()
                .any(|k| name_lower.contains(k))
            {
                pipeline::emit(
                    MODULE,
                    "Suspicious Process",
                    Payload::new()
                        .with("pid", pid)
                        .with("name", name.clone())
                        .with("reason", "Matched suspicious keyword"),
                );
            }

            if constants::SUSPICIOUS_EXECUTABLES.contains(&parent_name.as_str()) {
                pipeline::emit(
                    MODULE,
                    "Suspicious Parent Process",
                    Payload::new()
                        .with("pid", pid)
                        .with("name", name)
                        .with("parent", parent_name),
                );
            }
        }

        seen.retain(|pid| live.contains(pid));
        tokio::time::sleep(Duration::from_secs(constants::PROCESS_POLL_SECS)).await;
    }
}
