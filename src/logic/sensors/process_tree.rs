//! Process Tree Monitor
//!
//! Compares every (parent, child) edge in the process table against the
//! baseline's trusted relationships. Anything off-baseline is reported once
//! per pid.

use std::collections::HashSet;
use std::time::Duration;

use sysinfo::System;

use crate::constants;
use crate::logic::event::Payload;
use crate::logic::{baseline, pipeline};

const MODULE: &str = "process_tree";

pub async fn run() {
    let mut sys = System::new_all();
    let mut reported: HashSet<u32> = HashSet::new();

    loop {
        sys.refresh_processes();
        let trust = baseline::current();

        let mut live = HashSet::new();
        for (pid, proc_) in sys.processes() {
            let pid_u32 = pid.as_u32();
            live.insert(pid_u32);

            let Some(ppid) = proc_.parent() else {
                continue;
            };
            let Some(parent) = sys.process(ppid) else {
                continue;
            };

            let child_name = proc_.name().to_string();
            let parent_name = parent.name().to_string();

            if trust.is_pair_trusted(&parent_name, &child_name) {
                continue;
            }
            if !reported.insert(pid_u32) {
                continue;
            }

            pipeline::emit(
                MODULE,
                "Untrusted Process Tree",
                Payload::new()
                    .with("parent", parent_name)
                    .with("child", child_name)
                    .with("pid", pid_u32)
                    .with("ppid", ppid.as_u32())
                    .with("timestamp", chrono::Utc::now().to_rfc3339()),
            );
        }

        reported.retain(|pid| live.contains(pid));
        tokio::time::sleep(Duration::from_secs(constants::TREE_POLL_SECS)).await;
    }
}
