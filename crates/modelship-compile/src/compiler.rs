//! Compilation orchestrator: one submission, then poll to a terminal status.

use std::sync::Arc;
use std::time::Duration;

use modelship_core::{poll_until, PlatformConfig, PollError, PollPolicy, Probe, S3Uri};
use serde::Serialize;
use tracing::{error, info};

use crate::api::CompilationApi;
use crate::error::CompileError;
use crate::job::{CompilationJob, JobStatus};

/// Result of a successful compilation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompilationReport {
    pub job_name: String,
    /// Location of the compiled model archive.
    pub artifact: S3Uri,
    /// Status queries issued, including the terminal one.
    pub polls: u32,
    pub waited: Duration,
}

/// Submits compilation jobs and waits for them to finish.
pub struct Compiler {
    api: Arc<dyn CompilationApi>,
    interval: Duration,
    margin: Duration,
    local_timeout: bool,
}

impl Compiler {
    /// Create a compiler polling at the configured interval, with a local
    /// deadline of each job's runtime budget plus the configured margin.
    pub fn new(api: Arc<dyn CompilationApi>, config: &PlatformConfig) -> Self {
        Self {
            api,
            interval: config.poll_interval(),
            margin: config.timeout_margin(),
            local_timeout: true,
        }
    }

    /// Poll until the remote side reports a terminal status, however long it takes.
    pub fn without_local_timeout(mut self) -> Self {
        self.local_timeout = false;
        self
    }

    /// Poll policy for a job.
    pub fn policy_for(&self, job: &CompilationJob) -> PollPolicy {
        if self.local_timeout {
            PollPolicy::for_budget(self.interval, job.max_runtime, self.margin)
        } else {
            PollPolicy::unbounded(self.interval)
        }
    }

    /// Submit a job. Issues exactly one submission call.
    pub async fn submit(&self, job: &CompilationJob) -> Result<String, CompileError> {
        info!(
            "Submitting compilation job {}: {} model at {} for {}",
            job.name, job.input.framework, job.input.location, job.output.target
        );

        let arn = self
            .api
            .create_compilation_job(job)
            .await
            .map_err(|source| {
                error!("Compilation job {} rejected: {}", job.name, source);
                CompileError::Rejected {
                    job: job.name.clone(),
                    source,
                }
            })?;

        info!("Compilation job {} accepted ({})", job.name, arn);
        Ok(arn)
    }

    /// Poll a submitted job until it completes, fails, or the policy deadline passes.
    pub async fn wait(
        &self,
        job_name: &str,
        policy: &PollPolicy,
    ) -> Result<CompilationReport, CompileError> {
        let api = &self.api;

        let polled = poll_until(policy, "describe_compilation_job", || async move {
            let desc = api.describe_compilation_job(job_name).await?;
            Ok::<_, modelship_core::Error>(if desc.status.is_terminal() {
                Probe::Ready(desc)
            } else {
                Probe::Pending(desc.status.to_string())
            })
        })
        .await
        .map_err(|e| match e {
            PollError::Probe(source) => CompileError::Query {
                job: job_name.to_string(),
                source,
            },
            PollError::TimedOut { polls, waited } => CompileError::TimedOut {
                job: job_name.to_string(),
                polls,
                waited,
            },
        })?;

        let desc = polled.value;
        match desc.status {
            JobStatus::Completed => {
                let artifact = desc.artifact.ok_or_else(|| CompileError::MissingArtifact {
                    job: job_name.to_string(),
                })?;
                info!(
                    "Compilation job {} completed after {} polls: {}",
                    job_name, polled.polls, artifact
                );
                Ok(CompilationReport {
                    job_name: job_name.to_string(),
                    artifact,
                    polls: polled.polls,
                    waited: polled.waited,
                })
            }
            status => {
                error!(
                    "Compilation job {} {}: {}",
                    job_name,
                    status,
                    desc.failure_reason.as_deref().unwrap_or("no reason given")
                );
                Err(CompileError::Failed {
                    job: job_name.to_string(),
                    status,
                    payload: desc.raw,
                })
            }
        }
    }

    /// Submit a job and block until it resolves.
    pub async fn compile(&self, job: &CompilationJob) -> Result<CompilationReport, CompileError> {
        self.submit(job).await?;
        let policy = self.policy_for(job);
        self.wait(&job.name, &policy).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{InputConfig, JobDescription, OutputConfig};
    use async_trait::async_trait;
    use modelship_core::{Framework, InputShape, TargetDevice};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    /// Replays a fixed status sequence; once exhausted, repeats the last entry.
    struct ScriptedApi {
        script: Mutex<VecDeque<JobDescription>>,
        last: Mutex<Option<JobDescription>>,
        submitted: Mutex<Vec<CompilationJob>>,
        queries: Mutex<u32>,
        reject: Option<String>,
        fail_queries: bool,
    }

    impl ScriptedApi {
        fn new(script: Vec<JobDescription>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                submitted: Mutex::new(Vec::new()),
                queries: Mutex::new(0),
                reject: None,
                fail_queries: false,
            }
        }

        fn queries(&self) -> u32 {
            *self.queries.lock()
        }

        fn submissions(&self) -> usize {
            self.submitted.lock().len()
        }
    }

    #[async_trait]
    impl CompilationApi for ScriptedApi {
        async fn create_compilation_job(&self, job: &CompilationJob) -> modelship_core::Result<String> {
            self.submitted.lock().push(job.clone());
            match &self.reject {
                Some(msg) => Err(modelship_core::Error::Remote {
                    code: "ResourceInUse".into(),
                    message: msg.clone(),
                }),
                None => Ok(format!("arn:aws:sagemaker:us-east-1:123:compilation-job/{}", job.name)),
            }
        }

        async fn describe_compilation_job(&self, _name: &str) -> modelship_core::Result<JobDescription> {
            *self.queries.lock() += 1;
            if self.fail_queries {
                return Err(modelship_core::Error::Http("connection reset".into()));
            }
            let next = self.script.lock().pop_front();
            let mut last = self.last.lock();
            if let Some(desc) = next {
                *last = Some(desc);
            }
            last.clone()
                .ok_or_else(|| modelship_core::Error::Http("script exhausted".into()))
        }
    }

    fn config() -> PlatformConfig {
        PlatformConfig {
            role_arn: Some("arn:aws:iam::123:role/Exec".into()),
            bucket: Some("bucket".into()),
            ..Default::default()
        }
    }

    fn job(name: &str) -> CompilationJob {
        CompilationJob::new(
            name,
            "arn:aws:iam::123:role/Exec",
            InputConfig {
                location: S3Uri::new("bucket", "in/model.tar.gz"),
                shape: r#"{"input0":[1,3,224,224]}"#.parse::<InputShape>().unwrap(),
                framework: Framework::PyTorch,
            },
            OutputConfig {
                location: S3Uri::new("bucket", "out"),
                target: TargetDevice::MlP3,
            },
        )
    }

    fn compiler(api: &Arc<ScriptedApi>) -> Compiler {
        Compiler::new(api.clone(), &config())
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_a_completes_after_two_queries() {
        let artifact: S3Uri = "s3://bucket/out/model.tar.gz".parse().unwrap();
        let api = Arc::new(ScriptedApi::new(vec![
            JobDescription::in_progress("job-A"),
            JobDescription::completed("job-A", artifact),
        ]));
        let started = Instant::now();

        let report = compiler(&api).compile(&job("job-A")).await.unwrap();

        assert_eq!(report.artifact.to_string(), "s3://bucket/out/model.tar.gz");
        assert_eq!(report.polls, 2);
        assert_eq!(api.queries(), 2);
        assert_eq!(api.submissions(), 1);
        // Exactly one interval slept.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(30) && elapsed < Duration::from_secs(60));

        let submitted = api.submitted.lock();
        assert_eq!(submitted[0].name, "job-A");
        assert_eq!(submitted[0].input.shape.to_wire(), r#"{"input0":[1,3,224,224]}"#);
        assert_eq!(submitted[0].output.target, TargetDevice::MlP3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_third_query_without_trailing_sleep() {
        let api = Arc::new(ScriptedApi::new(vec![
            JobDescription::in_progress("job-B"),
            JobDescription::in_progress("job-B"),
            JobDescription::completed("job-B", S3Uri::new("bucket", "out/b.tar.gz")),
        ]));
        let started = Instant::now();

        let report = compiler(&api).compile(&job("job-B")).await.unwrap();

        assert_eq!(report.polls, 3);
        assert_eq!(api.queries(), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_surfaces_exact_payload() {
        let payload = json!({
            "CompilationJobName": "job-C",
            "CompilationJobStatus": "FAILED",
            "FailureReason": "ClientError: InputConfiguration: Exactly one .pth file is allowed",
            "Extra": { "nested": [1, 2, 3] },
        });
        let api = Arc::new(ScriptedApi::new(vec![
            JobDescription::in_progress("job-C"),
            JobDescription::failed("job-C", payload.clone()),
        ]));

        let err = compiler(&api).compile(&job("job-C")).await.unwrap_err();

        match &err {
            CompileError::Failed { job, status, payload: got } => {
                assert_eq!(job, "job-C");
                assert_eq!(*status, JobStatus::Failed);
                assert_eq!(got, &payload);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(err.payload(), Some(&payload));
        assert_eq!(api.queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_status_not_requeried() {
        let done = JobDescription::completed("job-D", S3Uri::new("bucket", "out/d.tar.gz"));
        let api = Arc::new(ScriptedApi::new(vec![done.clone(), done.clone(), done]));
        let started = Instant::now();

        compiler(&api).compile(&job("job-D")).await.unwrap();

        assert_eq!(api.queries(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_submission_never_polls() {
        let mut scripted = ScriptedApi::new(vec![JobDescription::in_progress("job-E")]);
        scripted.reject = Some("job name already in use".into());
        let api = Arc::new(scripted);

        let err = compiler(&api).compile(&job("job-E")).await.unwrap_err();

        assert!(matches!(err, CompileError::Rejected { .. }));
        assert_eq!(err.job(), "job-E");
        assert_eq!(api.submissions(), 1);
        assert_eq!(api.queries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_job_is_a_failure() {
        let mut stopped = JobDescription::failed(
            "job-F",
            json!({ "CompilationJobStatus": "STOPPED", "FailureReason": "MaxRuntimeExceeded" }),
        );
        stopped.status = JobStatus::Stopped;
        let api = Arc::new(ScriptedApi::new(vec![stopped]));

        let err = compiler(&api).compile(&job("job-F")).await.unwrap_err();
        assert!(matches!(
            err,
            CompileError::Failed { status: JobStatus::Stopped, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_deadline() {
        let api = Arc::new(ScriptedApi::new(vec![JobDescription::in_progress("job-G")]));
        let config = PlatformConfig {
            timeout_margin_secs: 30,
            ..config()
        };
        let compiler = Compiler::new(api.clone(), &config);
        let job = job("job-G").with_max_runtime(Duration::from_secs(60));

        let err = compiler.compile(&job).await.unwrap_err();

        match err {
            CompileError::TimedOut { polls, waited, .. } => {
                assert_eq!(polls, 4);
                assert!(waited >= Duration::from_secs(90));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(api.queries(), 4);
    }

    #[test]
    fn test_policy_without_local_timeout() {
        let api = Arc::new(ScriptedApi::new(Vec::new()));
        let job = job("job-H");

        let bounded = compiler(&api).policy_for(&job);
        assert_eq!(bounded.interval, Duration::from_secs(30));
        assert_eq!(bounded.deadline, Some(Duration::from_secs(900 + 300)));

        let unbounded = compiler(&api).without_local_timeout().policy_for(&job);
        assert_eq!(unbounded.deadline, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_error_propagates() {
        let mut scripted = ScriptedApi::new(Vec::new());
        scripted.fail_queries = true;
        let api = Arc::new(scripted);

        let err = compiler(&api).compile(&job("job-I")).await.unwrap_err();
        assert!(matches!(err, CompileError::Query { .. }));
        assert_eq!(api.queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_without_artifact() {
        let mut desc = JobDescription::completed("job-J", S3Uri::new("bucket", "x"));
        desc.artifact = None;
        let api = Arc::new(ScriptedApi::new(vec![desc]));

        let err = compiler(&api).compile(&job("job-J")).await.unwrap_err();
        assert!(matches!(err, CompileError::MissingArtifact { .. }));
    }
}
