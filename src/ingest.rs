use crate::accounts::AccountResolver;
use crate::queue::ActivityQueue;
use log::{debug, warn};
use std::sync::Arc;
use thiserror::Error;
use vigil_common::clock::Clock;
use vigil_core::categorize;
use vigil_core::integrity::IntegrityStamper;
use vigil_core::raw::RawActivityLog;
use vigil_core::records::{ActivityRecord, ActivityStatus};
use vigil_storage::RecordStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    /// Required field missing or malformed; the entry is skipped, its batch
    /// siblings still processed.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// The user id does not resolve to an account. Rejected before queuing;
    /// this is what keeps orphaned records from ever being persisted.
    #[error("user {0} does not exist")]
    UnknownUser(i64),
}

/// Where a batch came from: the submitting agent's network address and the
/// machine it runs on. Stamped onto every record for the audit trail.
#[derive(Debug, Clone)]
pub struct Origin {
    pub ip_address: String,
    pub machine_id: String,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub accepted: usize,
    pub skipped: usize,
    /// (batch index, reason) for every skipped entry.
    pub errors: Vec<(usize, IngestError)>,
}

/// Validates and enriches raw client entries into queue-ready activity
/// records. Pure CPU work; no storage or network I/O happens here.
pub struct Enricher {
    resolver: Arc<dyn AccountResolver>,
    stamper: Arc<IntegrityStamper>,
    clock: Arc<dyn Clock>,
    origin: Origin,
}

impl Enricher {
    pub fn new(
        resolver: Arc<dyn AccountResolver>,
        stamper: Arc<IntegrityStamper>,
        clock: Arc<dyn Clock>,
        origin: Origin,
    ) -> Self {
        Self {
            resolver,
            stamper,
            clock,
            origin,
        }
    }

    /// Enrichment steps, in order:
    /// 1. user id must be present and resolve to an existing account
    /// 2. monitoring defaults, then the required-field check
    /// 3. defaults finalized into a record (created-at, start/end, duration)
    /// 4. categorization; status derived from category when the client sent none
    /// 5. origin metadata stamped
    /// 6. integrity hash over (user id, process name, created-at, machine id)
    /// 7. process-legitimacy check; failure flags the record, never rejects it
    pub fn enrich(&self, raw: &RawActivityLog) -> Result<ActivityRecord, IngestError> {
        let user_id = raw.user_id.ok_or(IngestError::MissingField("userId"))?;
        if !self.resolver.exists_user(user_id) {
            return Err(IngestError::UnknownUser(user_id));
        }
        if !self.resolver.is_active(user_id) {
            debug!("ingesting activity for inactive user {}", user_id);
        }

        let mut raw = raw.clone();
        raw.apply_monitoring_defaults();
        let had_explicit_status = raw.status.is_some();

        let mut record = raw
            .finalize_defaults(self.clock.now())
            .map_err(IngestError::MissingField)?;

        let category = categorize::categorize(record.process_name.as_deref().unwrap_or(""));
        if record.application_category.is_none() {
            record.application_category = Some(category.as_str().to_string());
        }
        if !had_explicit_status {
            record.status = if category.is_productive() {
                ActivityStatus::Active
            } else {
                ActivityStatus::Idle
            };
        }

        record.ip_address = Some(self.origin.ip_address.clone());
        record.machine_id = Some(self.origin.machine_id.clone());

        let content = format!(
            "{}{}{}{}",
            record.user_id,
            record.process_name.as_deref().unwrap_or(""),
            record.created_at.to_rfc3339(),
            self.origin.machine_id,
        );
        let digest = self.stamper.hash(&content);
        if let Some(process_id) = &record.process_id {
            self.stamper.remember(process_id, &digest);
        }
        record.integrity_hash = Some(digest);

        let process_id = record.process_id.as_deref().unwrap_or("");
        if !self.stamper.is_valid_process(process_id, &self.origin.machine_id) {
            record.flag_tamper("Invalid process detected");
        }

        Ok(record)
    }
}

/// Batch ingestion entry point: enrich each entry, persist its sibling
/// process-track record directly, and queue the activity record for the
/// batch flush worker.
pub struct Ingestor {
    enricher: Enricher,
    queue: ActivityQueue,
    store: Arc<dyn RecordStore>,
}

impl Ingestor {
    pub fn new(enricher: Enricher, queue: ActivityQueue, store: Arc<dyn RecordStore>) -> Self {
        Self {
            enricher,
            queue,
            store,
        }
    }

    /// A malformed entry is skipped and reported; the rest of the batch
    /// still goes through. Never all-or-nothing.
    pub fn ingest_batch(&self, batch: &[RawActivityLog]) -> IngestReport {
        let mut report = IngestReport::default();
        debug!("ingesting batch of {} entries", batch.len());

        for (index, raw) in batch.iter().enumerate() {
            match self.enricher.enrich(raw) {
                Ok(record) => {
                    self.save_process_track(raw, &record);
                    self.queue.enqueue(record);
                    report.accepted += 1;
                }
                Err(e) => {
                    warn!("skipping batch entry {}: {}", index, e);
                    report.skipped += 1;
                    report.errors.push((index, e));
                }
            }
        }

        vigil_storage::set_queue_depth(self.queue.len() as u64);
        report
    }

    // The direct tracking path: not queued, categorized on its own, and a
    // failure here does not hold up the activity record.
    fn save_process_track(&self, raw: &RawActivityLog, record: &ActivityRecord) {
        let category = categorize::categorize(raw.process_name.as_deref().unwrap_or(""));
        let track = match raw.to_process_track(
            category.as_str(),
            category.is_productive(),
            record.created_at,
        ) {
            Some(track) => track,
            None => return,
        };
        if let Err(e) = self.store.save_process_track(&track) {
            warn!(
                "failed to persist process track for {}: {:#}",
                track.process_name, e
            );
        }
    }
}
