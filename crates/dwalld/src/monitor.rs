use log::{debug, warn};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::coordinator::Event;
use crate::rules::strip_ssid_quotes;

/// Current SSID, empty when disconnected or when no wireless tool answers.
pub fn current_ssid() -> String {
    if let Some(ssid) = iwgetid_ssid() {
        return ssid;
    }
    nmcli_ssid().unwrap_or_default()
}

fn iwgetid_ssid() -> Option<String> {
    let output = Command::new("iwgetid").arg("-r").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let ssid = String::from_utf8_lossy(&output.stdout);
    let ssid = strip_ssid_quotes(&ssid);
    if ssid.is_empty() {
        None
    } else {
        Some(ssid.to_string())
    }
}

fn nmcli_ssid() -> Option<String> {
    let output = Command::new("nmcli")
        .args(["-t", "-f", "active,ssid", "dev", "wifi"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_nmcli(&String::from_utf8_lossy(&output.stdout))
}

fn parse_nmcli(out: &str) -> Option<String> {
    for line in out.lines() {
        if let Some(ssid) = line.strip_prefix("yes:") {
            let ssid = strip_ssid_quotes(ssid);
            if !ssid.is_empty() {
                return Some(ssid.to_string());
            }
        }
    }
    None
}

/// Polls the SSID and reports connectivity transitions to the coordinator.
/// After a change is seen the monitor waits a short settle delay before
/// reporting, since the SSID is not resolved instantly after association.
pub struct WifiMonitor {
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl WifiMonitor {
    pub fn start(poll_interval: Duration, settle_delay: Duration, events: Sender<Event>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = Arc::clone(&shutdown);

        let worker = std::thread::spawn(move || {
            let mut last = current_ssid();
            debug!("wifi monitor started, ssid={last:?}");

            while !worker_shutdown.load(Ordering::Relaxed) {
                std::thread::sleep(poll_interval);
                if worker_shutdown.load(Ordering::Relaxed) {
                    break;
                }

                let seen = current_ssid();
                if seen == last {
                    continue;
                }

                std::thread::sleep(settle_delay);
                last = current_ssid();
                debug!("wifi changed, ssid={last:?}");
                if events.send(Event::Network).is_err() {
                    warn!("coordinator gone, wifi monitor exiting");
                    return;
                }
            }
        });

        Self {
            shutdown,
            worker: Some(worker),
        }
    }
}

impl Drop for WifiMonitor {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
