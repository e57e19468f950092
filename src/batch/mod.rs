//! Batch conversion: jobs, the queue, and the orchestrator that drains it.
//!
//! A [`BatchSession`] owns an ordered [`JobQueue`] of [`ConversionJob`]s.
//! The [`Orchestrator`] moves each job Pending -> Running -> Succeeded/Failed
//! by handing it to an injected [`vidconv_av::Encoder`], and publishes
//! [`crate::events::BatchEvent`]s as it goes.

mod job;
mod orchestrator;
mod queue;
mod session;

pub use job::{ConversionJob, InvalidTransition, JobFailure, JobStatus};
pub use orchestrator::{
    effective_concurrency, BatchError, BatchReport, CancelHandle, Orchestrator,
};
pub use queue::{JobQueue, QueueError};
pub use session::{BatchSession, BatchSnapshot, JobCounts, SessionState};
