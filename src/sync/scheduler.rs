//! Debounced/interval sync scheduler (`spec.md` §4.7).
//!
//! Grounded on `SPEC_FULL.md` §H: a dedicated background thread owning the
//! debounce and interval timers, driven by `mpsc` control messages rather
//! than recursive callbacks (DESIGN NOTES §9, "from cooperative async to
//! explicit task"). The single-flight gate itself lives in
//! [`super::coordinator::SyncCoordinator`]; this module only decides *when*
//! to call it.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::StoreConfig;

use super::coordinator::SyncCoordinator;

/// Control messages sent to the background scheduler thread.
enum SchedulerMsg {
    /// A live mutation occurred; (re)arm the debounce timer if
    /// `auto_sync && sync_on_change`.
    Change(String),
    /// Configuration changed; rebuild the interval baseline so a new
    /// `sync_interval_minutes` takes effect immediately rather than
    /// waiting out whatever was left of the old interval.
    Reconfigured,
    Shutdown,
}

/// Owns the background thread that drives on-change debounce and periodic
/// sync. Dropping it stops the thread.
pub struct Scheduler {
    sender: mpsc::Sender<SchedulerMsg>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    #[must_use]
    pub fn spawn(coordinator: Arc<SyncCoordinator>, config: Arc<Mutex<StoreConfig>>) -> Self {
        let (sender, receiver) = mpsc::channel();
        let handle = thread::spawn(move || run(&receiver, &coordinator, &config));
        Self { sender, handle: Some(handle) }
    }

    /// Notify the scheduler of a live mutation. Arms (or rearms) the
    /// debounce timer for `reason` if the config allows it at fire time.
    pub fn notify_change(&self, reason: &str) {
        let _ = self.sender.send(SchedulerMsg::Change(reason.to_owned()));
    }

    /// Notify the scheduler that configuration changed, so the interval
    /// timer is rebuilt against the new `sync_interval_minutes` rather than
    /// continuing to count down the old period.
    pub fn notify_reconfigured(&self) {
        let _ = self.sender.send(SchedulerMsg::Reconfigured);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _ = self.sender.send(SchedulerMsg::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(receiver: &mpsc::Receiver<SchedulerMsg>, coordinator: &Arc<SyncCoordinator>, config: &Arc<Mutex<StoreConfig>>) {
    let mut debounce_deadline: Option<Instant> = None;
    let mut debounce_reason: Option<String> = None;
    let mut interval_baseline = Instant::now();

    loop {
        let cfg = config.lock().expect("config lock poisoned").clone();
        let wait = next_wait(&cfg, debounce_deadline, interval_baseline);

        match receiver.recv_timeout(wait) {
            Ok(SchedulerMsg::Change(reason)) => {
                if cfg.auto_sync && cfg.sync_on_change {
                    debounce_deadline = Some(Instant::now() + cfg.debounce);
                    debounce_reason = Some(reason);
                }
            }
            Ok(SchedulerMsg::Reconfigured) => {
                interval_baseline = Instant::now();
            }
            Ok(SchedulerMsg::Shutdown) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {
                let now = Instant::now();
                if let Some(deadline) = debounce_deadline {
                    if now >= deadline {
                        debounce_deadline = None;
                        let reason = debounce_reason.take().unwrap_or_else(|| "change".to_owned());
                        let _ = coordinator.sync(&reason);
                    }
                }
                if cfg.auto_sync && cfg.sync_interval_minutes > 0 {
                    let interval = interval_duration(cfg.sync_interval_minutes);
                    if now.duration_since(interval_baseline) >= interval {
                        interval_baseline = now;
                        let _ = coordinator.sync("interval");
                    }
                }
            }
        }
    }
}

fn interval_duration(minutes: u32) -> Duration {
    Duration::from_secs(u64::from(minutes) * 60)
}

/// How long the scheduler thread should block before it next needs to
/// check anything, given the currently-armed debounce deadline (if any)
/// and the periodic interval's baseline.
fn next_wait(config: &StoreConfig, debounce_deadline: Option<Instant>, interval_baseline: Instant) -> Duration {
    let now = Instant::now();
    let mut candidates = Vec::new();

    if let Some(deadline) = debounce_deadline {
        candidates.push(deadline.saturating_duration_since(now));
    }
    if config.auto_sync && config.sync_interval_minutes > 0 {
        let interval = interval_duration(config.sync_interval_minutes);
        let elapsed = now.duration_since(interval_baseline);
        candidates.push(interval.saturating_sub(elapsed));
    }

    candidates.into_iter().min().unwrap_or(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_wait_with_nothing_armed_falls_back_to_a_minute() {
        let cfg = StoreConfig { auto_sync: false, ..StoreConfig::default() };
        let wait = next_wait(&cfg, None, Instant::now());
        assert_eq!(wait, Duration::from_secs(60));
    }

    #[test]
    fn next_wait_prefers_the_sooner_of_debounce_and_interval() {
        let cfg = StoreConfig { auto_sync: true, sync_interval_minutes: 5, ..StoreConfig::default() };
        let soon = Instant::now() + Duration::from_millis(50);
        let wait = next_wait(&cfg, Some(soon), Instant::now());
        assert!(wait <= Duration::from_millis(100));
    }

    #[test]
    fn interval_duration_converts_minutes_to_seconds() {
        assert_eq!(interval_duration(2), Duration::from_secs(120));
    }
}
