//! Job state machine and the registry that owns job records

use crate::error::JobError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    Pending,
    ExtractingComponents,
    ResolvingDependencies,
    Assembling,
    Complete,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }

    /// Forward along the pipeline one phase at a time, or to `Failed` from
    /// any non-terminal state.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Pending, ExtractingComponents)
            | (ExtractingComponents, ResolvingDependencies)
            | (ResolvingDependencies, Assembling)
            | (Assembling, Complete) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub state: JobState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Every state entered, starting with `Pending`.
    pub history: Vec<Transition>,
}

impl JobRecord {
    pub fn states(&self) -> Vec<JobState> {
        self.history.iter().map(|t| t.state).collect()
    }
}

/// Job records keyed by id. Thread-safe; all mutation goes through
/// validated transitions.
pub struct JobRegistry {
    jobs: DashMap<JobId, JobRecord>,
    next_id: AtomicU64,
}

impl JobRegistry {
    pub fn new() -> Self {
        JobRegistry {
            jobs: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new job in `Pending`.
    pub fn create(&self) -> JobId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        self.jobs.insert(
            id,
            JobRecord {
                id,
                state: JobState::Pending,
                created_at: now,
                updated_at: now,
                history: vec![Transition {
                    state: JobState::Pending,
                    at: now,
                }],
            },
        );
        id
    }

    pub fn transition(&self, id: JobId, to: JobState) -> Result<(), JobError> {
        let mut record = self.jobs.get_mut(&id).ok_or(JobError::UnknownJob(id))?;
        let from = record.state;
        if !from.can_transition_to(to) {
            return Err(JobError::IllegalTransition { job: id, from, to });
        }

        let now = Utc::now();
        record.state = to;
        record.updated_at = now;
        record.history.push(Transition { state: to, at: now });
        info!("Job {}: {:?} -> {:?}", id, from, to);
        Ok(())
    }

    pub fn state(&self, id: JobId) -> Option<JobState> {
        self.jobs.get(&id).map(|r| r.state)
    }

    /// Snapshot of a job record.
    pub fn get(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.get(&id).map(|r| r.value().clone())
    }

    /// Drop a finished job. Running jobs stay.
    pub fn remove(&self, id: JobId) -> Option<JobRecord> {
        self.jobs
            .remove_if(&id, |_, record| record.state.is_terminal())
            .map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
