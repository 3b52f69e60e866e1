//! Removable Media Monitor
//!
//! Diffs the set of mounted removable disks each sweep and reports
//! insertions and removals.

use std::collections::HashSet;
use std::time::Duration;

use sysinfo::Disks;

use crate::constants;
use crate::logic::event::Payload;
use crate::logic::pipeline;

const MODULE: &str = "usb";

pub async fn run() {
    let mut disks = Disks::new_with_refreshed_list();
    let mut known: HashSet<String> = removable_set(&disks);

    loop {
        tokio::time::sleep(Duration::from_secs(constants::USB_POLL_SECS)).await;
        disks.refresh_list();

        let current = removable_set(&disks);

        for device in current.difference(&known) {
            pipeline::emit(
                MODULE,
                "USB Inserted",
                Payload::new().with("device", device.clone()),
            );
        }
        for device in known.difference(&current) {
            pipeline::emit(
                MODULE,
                "USB Removed",
                Payload::new().with("device", device.clone()),
            );
        }

        known = current;
    }
}

fn removable_set(disks: &Disks) -> HashSet<String> {
    disks
        .list()
        .iter()
        .filter(|d| d.is_removable())
        .map(|d| d.mount_point().to_string_lossy().to_string())
        .collect()
}
