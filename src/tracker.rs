use crate::error::CaptionError;
use crate::types::{DebugStep, RunRecord, RunSource, RunStatus};

/// Slot index of a run inside a [`RunTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunHandle(usize);

/// Append-only table of the runs of one invocation.
///
/// Each run owns a slot that is settled exactly once, from `Pending` to
/// `Success` or `Error`. Successful captions are also appended to a flat
/// list in settlement order.
#[derive(Debug, Default, Clone)]
pub struct RunTracker {
    records: Vec<RunRecord>,
    captions: Vec<String>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a pending run and return its slot.
    pub fn begin(&mut self, source: RunSource, image_url: &str) -> RunHandle {
        self.records.push(RunRecord::pending(source, image_url));
        RunHandle(self.records.len() - 1)
    }

    pub fn get(&self, handle: RunHandle) -> Option<&RunRecord> {
        self.records.get(handle.0)
    }

    /// Settle a pending run as successful. Returns false if the slot was
    /// already terminal.
    pub fn succeed(
        &mut self,
        handle: RunHandle,
        captions: Vec<String>,
        image_id: Option<String>,
        flavor_rejected: bool,
    ) -> bool {
        let Some(record) = self.pending_slot(handle) else {
            return false;
        };
        record.status = RunStatus::Success;
        record.captions = captions.clone();
        record.image_id = image_id;
        record.flavor_rejected = flavor_rejected;
        self.captions.extend(captions);
        true
    }

    /// Settle a pending run as failed. Returns false if the slot was already
    /// terminal.
    pub fn fail(
        &mut self,
        handle: RunHandle,
        error: &CaptionError,
        image_id: Option<String>,
        flavor_rejected: bool,
        debug: Option<DebugStep>,
    ) -> bool {
        let Some(record) = self.pending_slot(handle) else {
            return false;
        };
        record.status = RunStatus::Error;
        record.error = Some(error.user_message());
        record.error_kind = Some(error.kind());
        record.debug = debug;
        record.image_id = image_id;
        record.flavor_rejected = flavor_rejected;
        true
    }

    /// Append a run that failed before any network call.
    pub fn reject(&mut self, source: RunSource, image_url: &str, error: &CaptionError) -> RunHandle {
        let handle = self.begin(source, image_url);
        self.fail(handle, error, None, false, error.debug_step(Some(image_url)));
        handle
    }

    pub fn captions(&self) -> &[String] {
        &self.captions
    }

    pub fn pending_count(&self) -> usize {
        self.count(RunStatus::Pending)
    }

    pub fn succeeded_count(&self) -> usize {
        self.count(RunStatus::Success)
    }

    pub fn failed_count(&self) -> usize {
        self.count(RunStatus::Error)
    }

    /// Consume the tracker, yielding the run history and caption list.
    pub fn into_parts(self) -> (Vec<RunRecord>, Vec<String>) {
        (self.records, self.captions)
    }

    fn count(&self, status: RunStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    fn pending_slot(&mut self, handle: RunHandle) -> Option<&mut RunRecord> {
        let record = self.records.get_mut(handle.0)?;
        if record.status != RunStatus::Pending {
            tracing::warn!(run_id = %record.id, "ignoring second settlement of run");
            return None;
        }
        Some(record)
    }
}
