//! Drains a session's queue through an [`Encoder`] with bounded parallelism.

use super::job::{ConversionJob, JobFailure};
use super::queue::QueueError;
use super::session::{BatchSession, BatchSnapshot, SessionState};
use crate::events::{BatchEvent, EVENT_CHANNEL_CAPACITY};
use chrono::Utc;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vidconv_av::{ConversionOptions, EncodeRequest, Encoder, ErrorKind, ProgressCallback};
use vidconv_common::{BatchId, JobId};

/// Aggregate outcome of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: BatchId,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs still Pending when dispatch stopped.
    pub not_started: usize,
    pub cancelled: bool,
    pub elapsed_secs: f64,
}

impl BatchReport {
    /// True when every job in the session succeeded.
    pub fn all_succeeded(&self) -> bool {
        !self.cancelled && self.failed == 0 && self.not_started == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The encoder cannot run; no further job can succeed.
    #[error("encoder unavailable: {0}")]
    EncoderUnavailable(#[source] vidconv_av::Error),

    #[error("batch is already running")]
    AlreadyRunning,
}

/// Requests cancellation of a running batch.
///
/// Cloneable and usable from any task or signal handler.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Stop dispatching and kill in-flight encodes.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Clamp a requested parallelism to `[1, available CPUs]`.
pub fn effective_concurrency(requested: usize) -> usize {
    let max = num_cpus::get().max(1);
    let limit = requested.clamp(1, max);
    if limit != requested {
        warn!(
            "Concurrency {} out of range, using {} (1..={})",
            requested, limit, max
        );
    }
    limit
}

struct Inner {
    session: RwLock<BatchSession>,
    encoder: Arc<dyn Encoder>,
    event_tx: broadcast::Sender<BatchEvent>,
    cancel: CancellationToken,
    /// First fatal encoder error seen during the current run.
    fatal: Mutex<Option<vidconv_av::Error>>,
}

impl Inner {
    fn broadcast(&self, event: BatchEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("No subscribers for batch event");
        }
    }
}

/// Owns a batch session and runs its jobs.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use vidconv::batch::Orchestrator;
/// use vidconv_av::{Container, ConversionOptions, EncoderConfig, FfmpegEncoder};
///
/// # async fn example() -> anyhow::Result<()> {
/// let encoder = Arc::new(FfmpegEncoder::new(EncoderConfig::discover()));
/// let orchestrator = Orchestrator::new(encoder);
/// orchestrator.enqueue("a.mov", "out/a.mp4", ConversionOptions::new(Container::Mp4))?;
///
/// let report = orchestrator.run_batch(1).await?;
/// println!("{} succeeded, {} failed", report.succeeded, report.failed);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                session: RwLock::new(BatchSession::new()),
                encoder,
                event_tx,
                cancel: CancellationToken::new(),
                fatal: Mutex::new(None),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.inner.cancel.clone(),
        }
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        self.inner.session.read().snapshot()
    }

    /// Copy of a single job.
    pub fn job(&self, id: JobId) -> Option<ConversionJob> {
        self.inner.session.read().queue.get(id).cloned()
    }

    /// Add a conversion to the session.
    pub fn enqueue(
        &self,
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        options: ConversionOptions,
    ) -> Result<JobId, QueueError> {
        self.enqueue_job(ConversionJob::new(source, target, options))
    }

    pub fn enqueue_job(&self, job: ConversionJob) -> Result<JobId, QueueError> {
        let (source, target) = (job.source.clone(), job.target.clone());
        let id = self.inner.session.write().queue.enqueue(job)?;
        debug!("Queued job {}: {:?} -> {:?}", id, source, target);
        self.inner.broadcast(BatchEvent::job_queued(id, source, target));
        Ok(id)
    }

    /// Remove a job that has not started.
    pub fn remove(&self, id: JobId) -> Result<ConversionJob, QueueError> {
        let job = self.inner.session.write().queue.remove(id)?;
        self.inner.broadcast(BatchEvent::job_removed(id));
        Ok(job)
    }

    /// Run every pending job, at most `concurrency` at a time.
    ///
    /// Per-job failures are recorded on the job and do not stop the batch.
    /// Cancellation stops dispatch and kills in-flight encodes; those jobs end
    /// Failed with [`ErrorKind::Cancelled`] and undispatched jobs stay Pending.
    ///
    /// # Errors
    ///
    /// [`BatchError::EncoderUnavailable`] when the encoder fails its preflight
    /// (nothing is dispatched) or reports a missing tool mid-batch (dispatch
    /// stops and the session is Aborted).
    pub async fn run_batch(&self, concurrency: usize) -> Result<BatchReport, BatchError> {
        let started = Instant::now();
        let batch_id = {
            let mut session = self.inner.session.write();
            if session.state == SessionState::Running {
                return Err(BatchError::AlreadyRunning);
            }
            session.state = SessionState::Running;
            session.id
        };

        let limit = effective_concurrency(concurrency);

        if self.inner.cancel.is_cancelled() {
            info!("Batch {} cancelled before dispatch", batch_id);
            return Ok(self.finish(SessionState::Cancelled, started));
        }

        if let Err(e) = self.inner.encoder.preflight().await {
            error!("Encoder {} unavailable: {}", self.inner.encoder.name(), e);
            self.abort(batch_id, &e);
            return Err(BatchError::EncoderUnavailable(e));
        }

        let pending = {
            let mut session = self.inner.session.write();
            session.started_at = Some(Utc::now());
            session.finished_at = None;
            session.queue.pending_count()
        };
        info!(
            "Starting batch {} with {} job(s), concurrency {}",
            batch_id, pending, limit
        );
        self.inner.broadcast(BatchEvent::batch_started(batch_id, pending));

        *self.inner.fatal.lock() = None;
        let stop = CancellationToken::new();
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut in_flight = JoinSet::new();

        loop {
            if self.inner.cancel.is_cancelled() || stop.is_cancelled() {
                break;
            }

            let permit = tokio::select! {
                biased;
                _ = self.inner.cancel.cancelled() => break,
                _ = stop.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            // A job that just released its permit may have asked us to stop.
            if self.inner.cancel.is_cancelled() || stop.is_cancelled() {
                break;
            }

            let Some(request) = self.dispatch_next() else {
                break;
            };

            let inner = Arc::clone(&self.inner);
            let stop = stop.clone();
            in_flight.spawn(async move {
                let _permit = permit;
                run_job(inner, request, stop).await;
            });

            // Reap finished tasks so the set does not grow with the batch.
            while let Some(result) = in_flight.try_join_next() {
                if let Err(e) = result {
                    error!("Job task failed to complete: {}", e);
                }
            }
        }

        if self.inner.cancel.is_cancelled() {
            info!("Batch {} cancelling, waiting for in-flight jobs", batch_id);
            self.inner.broadcast(BatchEvent::batch_cancelling(batch_id));
        }

        while let Some(result) = in_flight.join_next().await {
            if let Err(e) = result {
                error!("Job task failed to complete: {}", e);
            }
        }

        let fatal = self.inner.fatal.lock().take();
        if let Some(e) = fatal {
            error!("Batch {} aborted: {}", batch_id, e);
            self.abort(batch_id, &e);
            return Err(BatchError::EncoderUnavailable(e));
        }

        let state = if self.inner.cancel.is_cancelled() {
            SessionState::Cancelled
        } else {
            SessionState::Completed
        };
        Ok(self.finish(state, started))
    }

    /// Move the next pending job to Running and build its request.
    fn dispatch_next(&self) -> Option<(JobId, EncodeRequest)> {
        let mut session = self.inner.session.write();
        while let Some(id) = session.queue.dequeue_next() {
            let Some(job) = session.queue.get_mut(id) else {
                continue;
            };
            if let Err(e) = job.start() {
                warn!("Skipping job {}: {}", id, e);
                continue;
            }
            let request = EncodeRequest {
                source: job.source.clone(),
                target: job.target.clone(),
                options: job.options.clone(),
            };
            drop(session);

            info!("Starting job {}: {:?}", id, request.source);
            self.inner
                .broadcast(BatchEvent::job_started(id, request.source.clone()));
            return Some((id, request));
        }
        None
    }

    fn finish(&self, state: SessionState, started: Instant) -> BatchReport {
        let report = {
            let mut session = self.inner.session.write();
            session.state = state;
            session.finished_at = Some(Utc::now());
            let counts = session.counts();
            BatchReport {
                batch_id: session.id,
                total: counts.total,
                succeeded: counts.succeeded,
                failed: counts.failed,
                not_started: counts.pending,
                cancelled: state == SessionState::Cancelled,
                elapsed_secs: started.elapsed().as_secs_f64(),
            }
        };

        info!(
            "Batch {} {}: {} succeeded, {} failed, {} not started",
            report.batch_id, state, report.succeeded, report.failed, report.not_started
        );
        self.inner.broadcast(BatchEvent::batch_finished(report.clone()));
        report
    }

    fn abort(&self, batch_id: BatchId, err: &vidconv_av::Error) {
        {
            let mut session = self.inner.session.write();
            session.state = SessionState::Aborted;
            session.finished_at = Some(Utc::now());
        }
        self.inner
            .broadcast(BatchEvent::batch_aborted(batch_id, err.to_string()));
    }
}

async fn run_job(inner: Arc<Inner>, (id, request): (JobId, EncodeRequest), stop: CancellationToken) {
    let progress: ProgressCallback = {
        let inner = Arc::clone(&inner);
        Arc::new(move |percent: f32, step: &str| {
            if let Some(job) = inner.session.write().queue.get_mut(id) {
                job.update_progress(percent, step);
            }
            inner.broadcast(BatchEvent::job_progress(id, percent, step));
        })
    };

    let convert = inner
        .encoder
        .convert(&request, progress, inner.cancel.clone());
    let result = match AssertUnwindSafe(convert).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(vidconv_av::Error::encoding(
            inner.encoder.name(),
            "encoder panicked",
        )),
    };

    match result {
        Ok(outcome) => {
            let recorded = inner
                .session
                .write()
                .queue
                .get_mut(id)
                .map(|job| job.succeed(outcome.bytes_written));
            if let Some(Err(e)) = recorded {
                warn!("Job {}: {}", id, e);
            }
            info!(
                "Job {} succeeded: {:?} ({} bytes, {:.1}s)",
                id,
                outcome.output,
                outcome.bytes_written,
                outcome.elapsed.as_secs_f64()
            );
            inner.broadcast(BatchEvent::job_succeeded(
                id,
                outcome.output,
                outcome.bytes_written,
            ));
        }
        Err(e) => {
            let failure = JobFailure::from(&e);
            match failure.kind {
                ErrorKind::Cancelled => info!("Job {} cancelled", id),
                _ => error!("Job {} failed: {}", id, failure),
            }

            let recorded = inner
                .session
                .write()
                .queue
                .get_mut(id)
                .map(|job| job.fail(failure.clone()));
            if let Some(Err(err)) = recorded {
                warn!("Job {}: {}", id, err);
            }
            inner.broadcast(BatchEvent::job_failed(id, failure.kind, failure.message));

            if e.is_fatal() {
                inner.fatal.lock().get_or_insert(e);
                stop.cancel();
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.inner.session.read();
        f.debug_struct("Orchestrator")
            .field("encoder", &self.inner.encoder.name())
            .field("state", &session.state)
            .field("jobs", &session.queue.len())
            .finish()
    }
}
