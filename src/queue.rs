use crossbeam_channel::{Receiver, Sender};
use vigil_core::records::ActivityRecord;

/// Queue entry: the enriched record plus how many persist attempts have
/// failed for it so far.
#[derive(Debug, Clone)]
pub struct QueuedRecord {
    pub record: ActivityRecord,
    pub attempts: u32,
}

/// Unbounded concurrent FIFO of enriched-but-unpersisted activity records.
///
/// Enqueue never blocks and never fails. FIFO order holds for records that
/// are never retried; a record re-enqueued after a failed persist goes to
/// the tail, behind anything enqueued in the meantime.
#[derive(Clone)]
pub struct ActivityQueue {
    tx: Sender<QueuedRecord>,
    rx: Receiver<QueuedRecord>,
}

impl ActivityQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn enqueue(&self, record: ActivityRecord) {
        // The receiver half lives as long as self, so send cannot fail.
        let _ = self.tx.send(QueuedRecord {
            record,
            attempts: 0,
        });
    }

    /// Push a failed entry back to the tail with its attempt count bumped.
    pub fn requeue(&self, mut entry: QueuedRecord) {
        entry.attempts += 1;
        let _ = self.tx.send(entry);
    }

    /// Remove and return up to `n` entries from the front.
    pub fn drain_up_to(&self, n: usize) -> Vec<QueuedRecord> {
        let mut drained = Vec::with_capacity(n.min(self.rx.len()));
        for _ in 0..n {
            match self.rx.try_recv() {
                Ok(entry) => drained.push(entry),
                Err(_) => break,
            }
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for ActivityQueue {
    fn default() -> Self {
        Self::new()
    }
}
