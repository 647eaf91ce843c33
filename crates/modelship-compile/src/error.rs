//! Compilation failure taxonomy.

use std::time::Duration;

use thiserror::Error;

use crate::job::JobStatus;

#[derive(Error, Debug)]
pub enum CompileError {
    /// The service refused the submission; nothing was started.
    #[error("Submission of {job} rejected: {source}")]
    Rejected {
        job: String,
        #[source]
        source: modelship_core::Error,
    },

    /// The job was accepted and then ended without an artifact.
    #[error("Compilation job {job} {status}: {payload}")]
    Failed {
        job: String,
        status: JobStatus,
        payload: serde_json::Value,
    },

    /// The local deadline passed while the job was still in progress.
    #[error("Compilation job {job} still in progress after {polls} polls ({waited:?})")]
    TimedOut {
        job: String,
        polls: u32,
        waited: Duration,
    },

    #[error("Compilation job {job} completed without an artifact location")]
    MissingArtifact { job: String },

    /// A status query failed (network fault, malformed response).
    #[error("Status query for {job} failed: {source}")]
    Query {
        job: String,
        #[source]
        source: modelship_core::Error,
    },
}

impl CompileError {
    pub fn job(&self) -> &str {
        match self {
            CompileError::Rejected { job, .. }
            | CompileError::Failed { job, .. }
            | CompileError::TimedOut { job, .. }
            | CompileError::MissingArtifact { job }
            | CompileError::Query { job, .. } => job,
        }
    }

    /// Diagnostic payload of a job that failed remotely.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            CompileError::Failed { payload, .. } => Some(payload),
            _ => None,
        }
    }
}
