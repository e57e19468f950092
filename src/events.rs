//! Batch events broadcast to the presentation layer.

use crate::batch::BatchReport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vidconv_av::ErrorKind;
use vidconv_common::{BatchId, JobId};

/// Capacity of the event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A status change in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum BatchEvent {
    // ========================================================================
    // Queue
    // ========================================================================
    /// A job was added to the session.
    JobQueued {
        id: JobId,
        source: PathBuf,
        target: PathBuf,
    },
    /// A pending job was removed.
    JobRemoved { id: JobId },

    // ========================================================================
    // Jobs
    // ========================================================================
    /// A job was handed to the encoder.
    JobStarted { id: JobId, source: PathBuf },
    /// Encoder progress for a running job.
    JobProgress { id: JobId, progress: f32, step: String },
    /// A job produced its output.
    JobSucceeded {
        id: JobId,
        output: PathBuf,
        bytes_written: u64,
    },
    /// A job failed.
    JobFailed {
        id: JobId,
        kind: ErrorKind,
        error: String,
    },

    // ========================================================================
    // Batch
    // ========================================================================
    /// Dispatch began.
    BatchStarted { batch_id: BatchId, pending: usize },
    /// Cancellation was requested.
    BatchCancelling { batch_id: BatchId },
    /// Dispatch finished, normally or after cancellation.
    BatchFinished {
        #[serde(flatten)]
        report: BatchReport,
    },
    /// The encoder became unusable and the batch stopped.
    BatchAborted { batch_id: BatchId, error: String },
}

impl BatchEvent {
    /// The job this event concerns, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            BatchEvent::JobQueued { id, .. }
            | BatchEvent::JobRemoved { id }
            | BatchEvent::JobStarted { id, .. }
            | BatchEvent::JobProgress { id, .. }
            | BatchEvent::JobSucceeded { id, .. }
            | BatchEvent::JobFailed { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn job_queued(id: JobId, source: PathBuf, target: PathBuf) -> Self {
        BatchEvent::JobQueued { id, source, target }
    }

    pub fn job_removed(id: JobId) -> Self {
        BatchEvent::JobRemoved { id }
    }

    pub fn job_started(id: JobId, source: PathBuf) -> Self {
        BatchEvent::JobStarted { id, source }
    }

    pub fn job_progress(id: JobId, progress: f32, step: impl Into<String>) -> Self {
        BatchEvent::JobProgress {
            id,
            progress,
            step: step.into(),
        }
    }

    pub fn job_succeeded(id: JobId, output: PathBuf, bytes_written: u64) -> Self {
        BatchEvent::JobSucceeded {
            id,
            output,
            bytes_written,
        }
    }

    pub fn job_failed(id: JobId, kind: ErrorKind, error: impl Into<String>) -> Self {
        BatchEvent::JobFailed {
            id,
            kind,
            error: error.into(),
        }
    }

    pub fn batch_started(batch_id: BatchId, pending: usize) -> Self {
        BatchEvent::BatchStarted { batch_id, pending }
    }

    pub fn batch_cancelling(batch_id: BatchId) -> Self {
        BatchEvent::BatchCancelling { batch_id }
    }

    pub fn batch_finished(report: BatchReport) -> Self {
        BatchEvent::BatchFinished { report }
    }

    pub fn batch_aborted(batch_id: BatchId, error: impl Into<String>) -> Self {
        BatchEvent::BatchAborted {
            batch_id,
            error: error.into(),
        }
    }
}
