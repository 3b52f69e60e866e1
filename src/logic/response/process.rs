//! Process Termination
//!
//! Graceful terminate first, forced kill after the grace period. Failures
//! (process already gone, access denied) come back as error strings.

use std::time::{Duration, Instant};

use sysinfo::{Pid, Signal, System};

use crate::constants::KILL_GRACE_SECS;

/// Poll step while waiting for a terminated process to exit
const WAIT_POLL_MS: u64 = 200;

/// Terminate a process by pid: send the graceful signal, wait up to the
/// grace period, then force-kill if it is still alive.
pub fn kill_process(pid: u32) -> Result<String, String> {
    let spid = Pid::from_u32(pid);
    let mut sys = System::new();

    if !sys.refresh_process(spid) {
        return Err(format!("process {} not found", pid));
    }
    let Some(proc_) = sys.process(spid) else {
        return Err(format!("process {} not found", pid));
    };
    let name = proc_.name().to_string();

    // Graceful terminate where the platform supports it, direct kill where
    // it does not.
    let signalled = proc_.kill_with(Signal::Term).unwrap_or_else(|| proc_.kill());
    if !signalled {
        return Err(format!("failed to signal process {} ({})", pid, name));
    }

    let deadline = Instant::now() + Duration::from_secs(KILL_GRACE_SECS);
    while Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(WAIT_POLL_MS));
        if !sys.refresh_process(spid) {
            log::warn!("Terminated process {} ({})", pid, name);
            return Ok("terminated".to_string());
        }
    }

    // Still alive after the grace period
    if let Some(proc_) = sys.process(spid) {
        if !proc_.kill() {
            return Err(format!("failed to force-kill process {} ({})", pid, name));
        }
    }
    log::warn!("Force-killed process {} ({}) after grace period", pid, name);
    Ok("killed (forced)".to_string())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_nonexistent_process_errors() {
        let result = kill_process(4_000_000_000);
        assert!(result.is_err());
        let message = result.unwrap_err();
        assert!(message.contains("not found"));
    }
}
