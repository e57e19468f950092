use super::job::{ConversionJob, JobStatus};
use super::queue::JobQueue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use vidconv_common::BatchId;

/// Overall state of a batch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Cancelled,
    Completed,
    /// Stopped because the encoder became unusable.
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Cancelled => "cancelled",
            SessionState::Completed => "completed",
            SessionState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Jobs plus overall state, owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct BatchSession {
    pub id: BatchId,
    pub state: SessionState,
    pub queue: JobQueue,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchSession {
    pub fn new() -> Self {
        Self {
            id: BatchId::new(),
            state: SessionState::Idle,
            queue: JobQueue::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn counts(&self) -> JobCounts {
        let mut counts = JobCounts {
            total: self.queue.len(),
            ..JobCounts::default()
        };
        for job in self.queue.jobs() {
            match job.status() {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Succeeded => counts.succeeded += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            id: self.id,
            state: self.state,
            jobs: self.queue.jobs().cloned().collect(),
            counts: self.counts(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

impl Default for BatchSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Job counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Read-only copy of a session for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub id: BatchId,
    pub state: SessionState,
    pub jobs: Vec<ConversionJob>,
    pub counts: JobCounts,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchSnapshot {
    pub fn job(&self, id: vidconv_common::JobId) -> Option<&ConversionJob> {
        self.jobs.iter().find(|j| j.id == id)
    }
}
