use crate::queue::{ActivityQueue, QueuedRecord};
use anyhow::{Result, anyhow};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use vigil_common::config::AppConfig;
use vigil_core::records::ActivityRecord;
use vigil_storage::RecordStore;

#[derive(Debug, Clone)]
pub struct FlushSettings {
    pub interval: Duration,
    /// Failed persist attempts allowed per record before it is dead-lettered.
    pub max_persist_attempts: u32,
    /// Soft deadline per persist call; overruns are logged. The store is
    /// expected to bound its own blocking (e.g. the sqlite busy timeout).
    pub persist_deadline: Duration,
    pub dead_letter_capacity: usize,
}

impl FlushSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.flush_interval_secs),
            max_persist_attempts: config.max_persist_attempts.max(1),
            persist_deadline: Duration::from_millis(config.persist_deadline_ms),
            dead_letter_capacity: config.dead_letter_capacity,
        }
    }
}

impl Default for FlushSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// What one flush cycle did. `skipped` is set when the cycle was a no-op
/// because a previous one was still in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub drained: usize,
    pub persisted: usize,
    pub retried: usize,
    pub dead_lettered: usize,
    pub skipped: bool,
}

struct FlushInner {
    queue: ActivityQueue,
    store: Arc<dyn RecordStore>,
    settings: FlushSettings,
    running: AtomicBool,
    in_flight: AtomicBool,
    dead_letters: Mutex<VecDeque<ActivityRecord>>,
}

impl FlushInner {
    fn run_cycle(&self) -> FlushOutcome {
        // At-most-one active flush: a tick that fires while a cycle is
        // still running is a no-op.
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("flush cycle still in flight, skipping tick");
            return FlushOutcome {
                skipped: true,
                ..FlushOutcome::default()
            };
        }
        let outcome = self.drain_and_persist();
        self.in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    fn drain_and_persist(&self) -> FlushOutcome {
        // Capture the length up front so records re-enqueued during this
        // cycle wait for the next one.
        let batch = self.queue.drain_up_to(self.queue.len());
        let mut outcome = FlushOutcome {
            drained: batch.len(),
            ..FlushOutcome::default()
        };
        if batch.is_empty() {
            vigil_storage::record_flush_cycle(0, 0, 0, Utc::now());
            return outcome;
        }
        debug!("flushing {} queued records", batch.len());

        for entry in batch {
            let started = Instant::now();
            let result = self.store.save_activity(&entry.record);
            let elapsed = started.elapsed();
            if elapsed > self.settings.persist_deadline {
                warn!(
                    "persist of record for user {} took {:?}, over the {:?} deadline",
                    entry.record.user_id, elapsed, self.settings.persist_deadline
                );
            }
            match result {
                Ok(_) => outcome.persisted += 1,
                Err(e) => {
                    warn!(
                        "failed to persist record for user {} (attempt {}): {:#}",
                        entry.record.user_id,
                        entry.attempts + 1,
                        e
                    );
                    if entry.attempts + 1 >= self.settings.max_persist_attempts {
                        self.dead_letter(entry);
                        outcome.dead_lettered += 1;
                    } else {
                        self.queue.requeue(entry);
                        outcome.retried += 1;
                    }
                }
            }
        }

        vigil_storage::record_flush_cycle(
            outcome.persisted as u64,
            outcome.retried as u64,
            outcome.dead_lettered as u64,
            Utc::now(),
        );
        vigil_storage::set_queue_depth(self.queue.len() as u64);
        outcome
    }

    fn dead_letter(&self, entry: QueuedRecord) {
        error!(
            "record for user {} exhausted {} persist attempts, dead-lettering",
            entry.record.user_id, self.settings.max_persist_attempts
        );
        let mut dead = self.dead_letters.lock().expect("dead letter mutex poisoned");
        if dead.len() >= self.settings.dead_letter_capacity {
            // Bounded buffer: the oldest casualty makes room.
            dead.pop_front();
        }
        dead.push_back(entry.record);
    }
}

/// Recurring batch flush worker. Drains the activity queue into the record
/// store on a fixed interval; persist failures are absorbed, retried, and
/// eventually dead-lettered. A per-record failure never terminates the
/// worker.
pub struct FlushWorker {
    inner: Arc<FlushInner>,
    handle: Option<JoinHandle<()>>,
}

impl FlushWorker {
    pub fn new(queue: ActivityQueue, store: Arc<dyn RecordStore>, settings: FlushSettings) -> Self {
        Self {
            inner: Arc::new(FlushInner {
                queue,
                store,
                settings,
                running: AtomicBool::new(false),
                in_flight: AtomicBool::new(false),
                dead_letters: Mutex::new(VecDeque::new()),
            }),
            handle: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(anyhow!("flush worker is already running"));
        }
        info!(
            "starting flush worker with interval {:?}",
            self.inner.settings.interval
        );

        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("vigil-flush".to_string())
            .spawn(move || {
                while inner.running.load(Ordering::SeqCst) {
                    let started = Instant::now();
                    inner.run_cycle();
                    // Sleep in slices so stop() stays responsive.
                    while started.elapsed() < inner.settings.interval
                        && inner.running.load(Ordering::SeqCst)
                    {
                        let remaining = inner.settings.interval - started.elapsed();
                        thread::sleep(remaining.min(Duration::from_millis(200)));
                    }
                }
                debug!("flush worker loop exited");
            })
            .map_err(|e| anyhow!("failed to spawn flush worker thread: {e}"))?;

        self.handle = Some(handle);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.inner.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("flush worker thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Run one cycle synchronously. Used by tests and by shutdown paths that
    /// want a final drain without waiting for the timer.
    pub fn run_cycle(&self) -> FlushOutcome {
        self.inner.run_cycle()
    }

    /// Records that exhausted their persist attempts, oldest first.
    pub fn dead_letters(&self) -> Vec<ActivityRecord> {
        self.inner
            .dead_letters
            .lock()
            .expect("dead letter mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

impl Drop for FlushWorker {
    fn drop(&mut self) {
        self.inner.running.store(false, Ordering::SeqCst);
        // The thread notices within one sleep slice; do not block the drop.
    }
}
