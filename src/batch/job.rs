use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use vidconv_av::{ConversionOptions, ErrorKind};
use vidconv_common::JobId;

/// Lifecycle of a conversion job.
///
/// Transitions only move forward: Pending -> Running -> Succeeded | Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    fn can_become(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid job transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Why a job failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&vidconv_av::Error> for JobFailure {
    fn from(err: &vidconv_av::Error) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// One requested conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    pub id: JobId,
    pub source: PathBuf,
    pub target: PathBuf,
    pub file_name: String,
    pub options: ConversionOptions,
    status: JobStatus,
    pub progress: f32,
    pub current_step: Option<String>,
    error: Option<JobFailure>,
    pub output_bytes: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ConversionJob {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>, options: ConversionOptions) -> Self {
        let source = source.into();
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            id: JobId::new(),
            source,
            target: target.into(),
            file_name,
            options,
            status: JobStatus::Pending,
            progress: 0.0,
            current_step: None,
            error: None,
            output_bytes: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Failure detail; only present when the job is Failed.
    pub fn error(&self) -> Option<&JobFailure> {
        self.error.as_ref()
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_become(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(Utc::now());
        self.progress = 0.0;
        Ok(())
    }

    /// Record encoder progress. Ignored unless the job is Running.
    pub fn update_progress(&mut self, progress: f32, step: &str) {
        if self.status != JobStatus::Running {
            return;
        }
        self.progress = progress.clamp(0.0, 100.0);
        self.current_step = Some(step.to_string());
    }

    pub fn succeed(&mut self, output_bytes: u64) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Succeeded)?;
        self.progress = 100.0;
        self.current_step = None;
        self.output_bytes = Some(output_bytes);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, failure: JobFailure) -> Result<(), InvalidTransition> {
        self.transition(JobStatus::Failed)?;
        self.current_step = None;
        self.error = Some(failure);
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use vidconv_av::Container;

    fn job() -> ConversionJob {
        ConversionJob::new("/in/a.mov", "/out/a.mp4", ConversionOptions::new(Container::Mp4))
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = job();
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.file_name, "a.mov");
        assert!(job.error().is_none());
        assert!(job.started_at.is_none());
    }

    #[test]
    fn test_success_path() {
        let mut job = job();
        job.start().unwrap();
        job.update_progress(42.0, "encoding");
        assert_eq!(job.progress, 42.0);

        job.succeed(1024).unwrap();
        assert_eq!(job.status(), JobStatus::Succeeded);
        assert_eq!(job.progress, 100.0);
        assert_eq!(job.output_bytes, Some(1024));
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_failure_records_detail() {
        let mut job = job();
        job.start().unwrap();
        let err = vidconv_av::Error::input("/in/a.mov", "unreadable");
        job.fail(JobFailure::from(&err)).unwrap();

        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error().map(|e| e.kind), Some(ErrorKind::Input));
    }

    #[test]
    fn test_transitions_are_monotonic() {
        let mut job = job();
        assert_matches!(
            job.succeed(0),
            Err(InvalidTransition {
                from: JobStatus::Pending,
                to: JobStatus::Succeeded
            })
        );

        job.start().unwrap();
        assert!(job.start().is_err());
        job.fail(JobFailure::new(ErrorKind::Encoding, "exit 1")).unwrap();

        // Terminal: nothing moves it again, and the failure is kept.
        assert!(job.start().is_err());
        assert!(job.succeed(10).is_err());
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error().map(|e| e.message.as_str()), Some("exit 1"));
    }

    #[test]
    fn test_progress_ignored_when_not_running() {
        let mut job = job();
        job.update_progress(50.0, "encoding");
        assert_eq!(job.progress, 0.0);
        assert!(job.current_step.is_none());
    }

    #[test]
    fn test_progress_clamped() {
        let mut job = job();
        job.start().unwrap();
        job.update_progress(140.0, "encoding");
        assert_eq!(job.progress, 100.0);
    }
}
