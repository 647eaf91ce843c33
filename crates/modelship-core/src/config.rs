//! Platform configuration: region, execution role, plane endpoints, poll timing.
//!
//! Library code never reads process state. The binary calls [`PlatformConfig::load`]
//! once and passes the result down by reference.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_TIMEOUT_MARGIN_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Explicit client configuration (persisted to modelship.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_region")]
    pub region: String,
    /// Execution role the platform assumes to read artifacts and run jobs.
    #[serde(default)]
    pub role_arn: Option<String>,
    /// Default bucket for packaged and compiled artifacts.
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub control_endpoint: Option<String>,
    #[serde(default)]
    pub runtime_endpoint: Option<String>,
    #[serde(default)]
    pub storage_endpoint: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Added to a job's declared runtime budget to form the local deadline.
    #[serde(default = "default_timeout_margin")]
    pub timeout_margin_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_region() -> String {
    DEFAULT_REGION.into()
}
fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}
fn default_timeout_margin() -> u64 {
    DEFAULT_TIMEOUT_MARGIN_SECS
}
fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.into(),
            role_arn: None,
            bucket: None,
            control_endpoint: None,
            runtime_endpoint: None,
            storage_endpoint: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            timeout_margin_secs: DEFAULT_TIMEOUT_MARGIN_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            config_path: PathBuf::new(),
        }
    }
}

impl PlatformConfig {
    /// Load config from file, falling back to `MODELSHIP_*` env vars and defaults.
    pub fn load(config_path: &Path) -> Result<Self> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an explicit variable lookup.
    pub fn load_with<F>(config_path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: PlatformConfig = match std::fs::read_to_string(config_path) {
            Ok(s) => serde_json::from_str(&s)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", config_path.display());
                PlatformConfig::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.config_path = config_path.to_path_buf();

        if let Some(region) = lookup("MODELSHIP_REGION") {
            config.region = region;
        }
        fill(&mut config.role_arn, lookup("MODELSHIP_ROLE_ARN"));
        fill(&mut config.bucket, lookup("MODELSHIP_BUCKET"));
        fill(&mut config.control_endpoint, lookup("MODELSHIP_CONTROL_ENDPOINT"));
        fill(&mut config.runtime_endpoint, lookup("MODELSHIP_RUNTIME_ENDPOINT"));
        fill(&mut config.storage_endpoint, lookup("MODELSHIP_STORAGE_ENDPOINT"));

        Ok(config)
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved platform config to {}", self.config_path.display());
        Ok(())
    }

    /// Reject configurations that cannot possibly work before any remote call.
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(Error::Config("region is empty".into()));
        }
        if self.role_arn.as_deref().map_or(true, |r| r.trim().is_empty()) {
            return Err(Error::Config(
                "role_arn is not set (config file or MODELSHIP_ROLE_ARN)".into(),
            ));
        }
        if self.bucket.as_deref().map_or(true, |b| b.trim().is_empty()) {
            return Err(Error::Config(
                "bucket is not set (config file or MODELSHIP_BUCKET)".into(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("poll_interval_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn role_arn(&self) -> Result<&str> {
        self.role_arn
            .as_deref()
            .ok_or_else(|| Error::Config("role_arn is not set".into()))
    }

    pub fn bucket(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .ok_or_else(|| Error::Config("bucket is not set".into()))
    }

    /// Control-plane URL (job and endpoint management).
    pub fn control_endpoint(&self) -> String {
        self.control_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://api.sagemaker.{}.amazonaws.com", self.region))
    }

    /// Data-plane URL for endpoint invocation.
    pub fn runtime_endpoint(&self) -> String {
        self.runtime_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://runtime.sagemaker.{}.amazonaws.com", self.region))
    }

    /// Object-storage URL (path-style addressing).
    pub fn storage_endpoint(&self) -> String {
        self.storage_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.region))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout_margin(&self) -> Duration {
        Duration::from_secs(self.timeout_margin_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value.filter(|v| !v.is_empty());
    }
}
