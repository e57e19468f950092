use super::job::{ConversionJob, JobStatus};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use vidconv_common::paths::{is_same_path, normalize_path};
use vidconv_common::JobId;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("source and target are the same file: {}", .0.display())]
    SameSourceAndTarget(PathBuf),

    #[error("target {} is already used by job {job}", path.display())]
    DuplicateTarget { path: PathBuf, job: JobId },

    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job {id} is {status} and can no longer be removed")]
    NotPending { id: JobId, status: JobStatus },
}

/// Ordered collection of conversion jobs.
///
/// Jobs keep their insertion order for display; pending jobs are handed out
/// first-in first-out.
#[derive(Debug, Default, Clone)]
pub struct JobQueue {
    order: Vec<JobId>,
    jobs: HashMap<JobId, ConversionJob>,
    pending: VecDeque<JobId>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job. It is (re)set to Pending.
    pub fn enqueue(&mut self, job: ConversionJob) -> Result<JobId, QueueError> {
        if is_same_path(&job.source, &job.target) {
            return Err(QueueError::SameSourceAndTarget(job.source.clone()));
        }

        let target = normalize_path(&job.target);
        if let Some(existing) = self
            .jobs
            .values()
            .find(|j| normalize_path(&j.target) == target)
        {
            return Err(QueueError::DuplicateTarget {
                path: job.target.clone(),
                job: existing.id,
            });
        }

        // Callers may hand in a job that was already moved along; start it over.
        let job = if job.status() == JobStatus::Pending {
            job
        } else {
            ConversionJob::new(job.source, job.target, job.options)
        };

        let id = job.id;
        self.order.push(id);
        self.pending.push_back(id);
        self.jobs.insert(id, job);
        Ok(id)
    }

    /// Next pending job in insertion order, removed from the pending line.
    ///
    /// The job itself stays Pending until the caller starts it.
    pub fn dequeue_next(&mut self) -> Option<JobId> {
        while let Some(id) = self.pending.pop_front() {
            if self.jobs.get(&id).map(|j| j.status()) == Some(JobStatus::Pending) {
                return Some(id);
            }
        }
        None
    }

    /// Remove a job that has not been dispatched.
    pub fn remove(&mut self, id: JobId) -> Result<ConversionJob, QueueError> {
        let status = self
            .jobs
            .get(&id)
            .map(|j| j.status())
            .ok_or(QueueError::NotFound(id))?;

        if status != JobStatus::Pending {
            return Err(QueueError::NotPending { id, status });
        }

        self.order.retain(|j| *j != id);
        self.pending.retain(|j| *j != id);
        self.jobs.remove(&id).ok_or(QueueError::NotFound(id))
    }

    pub fn get(&self, id: JobId) -> Option<&ConversionJob> {
        self.jobs.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: JobId) -> Option<&mut ConversionJob> {
        self.jobs.get_mut(&id)
    }

    /// Jobs in insertion order.
    pub fn jobs(&self) -> impl Iterator<Item = &ConversionJob> {
        self.order.iter().filter_map(|id| self.jobs.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.count(JobStatus::Pending)
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.jobs.values().filter(|j| j.status() == status).count()
    }
}
