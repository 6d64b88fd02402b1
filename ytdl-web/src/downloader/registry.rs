//! Process-wide job registry.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, warn};

use super::job::{Job, JobStatus};
use super::slot::ProgressSlot;
use crate::{Error, Result};

struct JobEntry {
    job: Job,
    slot: ProgressSlot,
}

/// Map of job identifier to job state plus its pending progress slot.
///
/// Each job has a single writer for its status (its executor) and a single
/// writer for its slot (the progress hook); the map only has to guard its
/// own structure against concurrent inserts from different jobs.
#[derive(Default)]
pub struct JobRegistry {
    jobs: DashMap<String, JobEntry>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job and return its progress slot.
    pub fn insert(&self, job: Job) -> Result<ProgressSlot> {
        use dashmap::mapref::entry::Entry;

        match self.jobs.entry(job.id.clone()) {
            Entry::Occupied(_) => Err(Error::validation(format!("Job {} already exists", job.id))),
            Entry::Vacant(vacant) => {
                let slot = ProgressSlot::new();
                debug!(download_id = %job.id, kind = %job.kind, "Registered job");
                vacant.insert(JobEntry {
                    job,
                    slot: slot.clone(),
                });
                Ok(slot)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.jobs.get(id).map(|entry| entry.job.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.jobs.contains_key(id)
    }

    pub fn slot(&self, id: &str) -> Option<ProgressSlot> {
        self.jobs.get(id).map(|entry| entry.slot.clone())
    }

    /// Move a job to `next`, enforcing the status state machine.
    pub fn transition(&self, id: &str, next: JobStatus) -> Result<Job> {
        let mut entry = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| Error::not_found("Job", id))?;
        let current = entry.job.status;
        if !current.can_transition_to(next) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        entry.job.status = next;
        entry.job.updated_at = Utc::now();
        Ok(entry.job.clone())
    }

    /// Record a failure, creating the entry from `fallback` if it is missing.
    ///
    /// A job that already reached a terminal state keeps it.
    pub fn fail(&self, id: &str, message: &str, fallback: impl FnOnce() -> Job) -> Job {
        let message = if message.trim().is_empty() {
            "Unknown error".to_string()
        } else {
            message.to_string()
        };

        let mut entry = self.jobs.entry(id.to_string()).or_insert_with(|| JobEntry {
            job: fallback(),
            slot: ProgressSlot::new(),
        });

        if entry.job.status.is_terminal() {
            warn!(
                download_id = %id,
                status = %entry.job.status,
                error = %message,
                "Ignoring failure for finished job"
            );
            return entry.job.clone();
        }

        entry.job.status = JobStatus::Error;
        entry.job.error = Some(message);
        entry.job.updated_at = Utc::now();
        entry.job.clone()
    }

    /// Copy of every job, keyed by identifier.
    pub fn snapshot(&self) -> BTreeMap<String, Job> {
        self.jobs
            .iter()
            .map(|entry| (entry.key().clone(), entry.job.clone()))
            .collect()
    }

    /// Slots that currently hold an undelivered event.
    pub fn pending_slots(&self) -> Vec<(String, ProgressSlot)> {
        self.jobs
            .iter()
            .filter(|entry| !entry.slot.is_empty())
            .map(|entry| (entry.key().clone(), entry.slot.clone()))
            .collect()
    }

    /// Drop terminal jobs not updated within `max_age`. Returns the number removed.
    pub fn purge_finished(&self, max_age: Duration) -> usize {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let cutoff = Utc::now() - max_age;
        let before = self.jobs.len();
        self.jobs
            .retain(|_, entry| !(entry.job.status.is_terminal() && entry.job.updated_at < cutoff));
        before.saturating_sub(self.jobs.len())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
