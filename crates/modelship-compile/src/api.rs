//! Control-plane seam for compilation jobs.

use async_trait::async_trait;
use modelship_core::Result;

use crate::job::{CompilationJob, JobDescription};

/// Remote compilation service.
#[async_trait]
pub trait CompilationApi: Send + Sync {
    /// Submit a job. Returns the job's resource identifier once accepted.
    async fn create_compilation_job(&self, job: &CompilationJob) -> Result<String>;

    /// Query a job's current status.
    async fn describe_compilation_job(&self, name: &str) -> Result<JobDescription>;
}
