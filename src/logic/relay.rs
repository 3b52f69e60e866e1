//! Backend Relay
//!
//! Best-effort delivery of finalized events to the remote collector.
//! Failures are logged and swallowed; a slow or dead backend never stalls a
//! sensor loop, so delivery is fire-and-forget on the shared runtime.

use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::{json, Value};

use crate::constants;

/// Request timeout, matching the collector's expectations
const RELAY_TIMEOUT_SECS: u64 = 3;

// ============================================================================
// STATE
// ============================================================================

static HTTP: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(RELAY_TIMEOUT_SECS))
        .build()
        .expect("Failed to create HTTP client")
});

/// Runtime handle captured at startup so sensor threads outside the runtime
/// (file watchers) can still hand off relay work.
static RUNTIME: Lazy<RwLock<Option<tokio::runtime::Handle>>> =
    Lazy::new(|| RwLock::new(None));

static AGENT_NAME: Lazy<String> = Lazy::new(|| {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "Unknown".to_string())
});

static AGENT_IP: Lazy<String> = Lazy::new(detect_agent_ip);

// ============================================================================
// GLOBAL API
// ============================================================================

/// Capture the runtime handle. Called once from main.
pub fn init(handle: tokio::runtime::Handle) {
    *RUNTIME.write() = Some(handle);
}

/// Queue one event for delivery. Never blocks, never fails the caller.
pub fn send(module: &str, event: &str, data: Value) {
    let payload = json!({
        "agent_ip": AGENT_IP.as_str(),
        "agent_name": AGENT_NAME.as_str(),
        "module": module,
        "event": event,
        "data": data,
        "timestamp": chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    });

    let guard = RUNTIME.read();
    match guard.as_ref() {
        Some(handle) => {
            handle.spawn(post(payload));
        }
        None => {
            log::debug!("Relay not initialized, event dropped: {}", event);
        }
    }
}

async fn post(payload: Value) {
    let url = constants::get_backend_url();
    match HTTP.post(&url).json(&payload).send().await {
        Ok(response) => {
            if !response.status().is_success() {
                log::warn!("Backend rejected event: HTTP {}", response.status());
            }
        }
        Err(e) => {
            log::warn!("Backend relay failed: {}", e);
        }
    }
}

fn detect_agent_ip() -> String {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "Unknown".to_string())
}
