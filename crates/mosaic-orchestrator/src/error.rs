//! Error types for mosaic-orchestrator

use crate::job::{JobId, JobState};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("unknown job {0}")]
    UnknownJob(JobId),

    #[error("job {job}: illegal transition {from:?} -> {to:?}")]
    IllegalTransition { job: JobId, from: JobState, to: JobState },
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("component name `{0}` is not a single directory name")]
    InvalidName(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize resolution: {0}")]
    Serialize(#[from] serde_json::Error),
}
