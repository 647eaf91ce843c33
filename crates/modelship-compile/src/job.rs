//! Compilation job request and status types.

use std::fmt;
use std::time::Duration;

use modelship_core::{Framework, InputShape, S3Uri, TargetDevice};
use serde::Serialize;

/// Runtime budget used when a job does not declare one.
pub const DEFAULT_MAX_RUNTIME: Duration = Duration::from_secs(900);

/// Where the packaged model lives and how to read it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputConfig {
    pub location: S3Uri,
    pub shape: InputShape,
    pub framework: Framework,
}

/// Where the compiled artifact goes and which hardware it targets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputConfig {
    pub location: S3Uri,
    pub target: TargetDevice,
}

/// One compilation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompilationJob {
    /// Must be unique among recent jobs in the account and region.
    pub name: String,
    pub role_arn: String,
    pub input: InputConfig,
    pub output: OutputConfig,
    /// Remote-side budget; the service stops the job once it is spent.
    pub max_runtime: Duration,
}

impl CompilationJob {
    pub fn new(
        name: impl Into<String>,
        role_arn: impl Into<String>,
        input: InputConfig,
        output: OutputConfig,
    ) -> Self {
        Self {
            name: name.into(),
            role_arn: role_arn.into(),
            input,
            output,
            max_runtime: DEFAULT_MAX_RUNTIME,
        }
    }

    pub fn with_max_runtime(mut self, max_runtime: Duration) -> Self {
        self.max_runtime = max_runtime;
        self
    }
}

/// Job status as reported by the status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Starting, running or stopping on the remote side.
    InProgress,
    Completed,
    Failed,
    /// Stopped before completion, e.g. after the runtime budget ran out.
    Stopped,
}

impl JobStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::InProgress)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::InProgress => write!(f, "in-progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Status-query response.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescription {
    pub name: String,
    pub status: JobStatus,
    /// Compiled artifact, present once completed.
    pub artifact: Option<S3Uri>,
    pub failure_reason: Option<String>,
    /// The full response document, surfaced as-is on failure.
    pub raw: serde_json::Value,
}

impl JobDescription {
    pub fn in_progress(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: JobStatus::InProgress,
            artifact: None,
            failure_reason: None,
            raw: serde_json::json!({ "CompilationJobStatus": "INPROGRESS" }),
        }
    }

    pub fn completed(name: &str, artifact: S3Uri) -> Self {
        Self {
            name: name.to_string(),
            status: JobStatus::Completed,
            raw: serde_json::json!({
                "CompilationJobStatus": "COMPLETED",
                "ModelArtifacts": { "S3ModelArtifacts": artifact.to_string() },
            }),
            artifact: Some(artifact),
            failure_reason: None,
        }
    }

    pub fn failed(name: &str, payload: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            status: JobStatus::Failed,
            artifact: None,
            failure_reason: payload
                .get("FailureReason")
                .and_then(|r| r.as_str())
                .map(str::to_string),
            raw: payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Stopped.is_terminal());
    }

    #[test]
    fn test_failed_description_keeps_payload() {
        let payload = json!({
            "CompilationJobStatus": "FAILED",
            "FailureReason": "ClientError: InputConfiguration: Unable to load model",
        });
        let desc = JobDescription::failed("job-A", payload.clone());
        assert_eq!(desc.raw, payload);
        assert_eq!(
            desc.failure_reason.as_deref(),
            Some("ClientError: InputConfiguration: Unable to load model")
        );
    }

    #[test]
    fn test_job_defaults() {
        let job = CompilationJob::new(
            "job-A",
            "arn:aws:iam::123:role/Exec",
            InputConfig {
                location: S3Uri::new("bucket", "in/model.tar.gz"),
                shape: InputShape::single("input0", vec![1, 3, 224, 224]),
                framework: Framework::PyTorch,
            },
            OutputConfig {
                location: S3Uri::new("bucket", "out"),
                target: TargetDevice::MlP3,
            },
        );
        assert_eq!(job.max_runtime, DEFAULT_MAX_RUNTIME);
        let job = job.with_max_runtime(Duration::from_secs(60));
        assert_eq!(job.max_runtime.as_secs(), 60);
    }
}
