//! Hosting resource types.

use std::collections::BTreeMap;
use std::fmt;

use modelship_core::S3Uri;
use serde::Serialize;

/// Traffic variant name used for single-model endpoints.
pub const DEFAULT_VARIANT: &str = "AllTraffic";

/// A model registration: serving image plus artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSpec {
    pub name: String,
    /// Serving container image reference.
    pub image: String,
    pub artifact: S3Uri,
    pub role_arn: String,
    /// Container environment, e.g. the inference entry point.
    pub environment: BTreeMap<String, String>,
}

/// Endpoint shape: where and how many instances serve the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointSpec {
    pub name: String,
    pub config_name: String,
    pub instance_type: String,
    pub instance_count: u32,
    /// Inference accelerator attached to each instance, e.g. `ml.eia2.medium`.
    pub accelerator: Option<String>,
}

impl EndpointSpec {
    /// One instance, endpoint config named after the endpoint.
    pub fn new(name: impl Into<String>, instance_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            config_name: format!("{}-config", name),
            name,
            instance_type: instance_type.into(),
            instance_count: 1,
            accelerator: None,
        }
    }

    pub fn with_accelerator(mut self, accelerator: impl Into<String>) -> Self {
        self.accelerator = Some(accelerator.into());
        self
    }

    pub fn with_instance_count(mut self, count: u32) -> Self {
        self.instance_count = count;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EndpointStatus {
    Creating,
    Updating,
    SystemUpdating,
    RollingBack,
    InService,
    OutOfService,
    Deleting,
    Failed,
}

impl EndpointStatus {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "Creating" => EndpointStatus::Creating,
            "Updating" => EndpointStatus::Updating,
            "SystemUpdating" => EndpointStatus::SystemUpdating,
            "RollingBack" => EndpointStatus::RollingBack,
            "InService" => EndpointStatus::InService,
            "OutOfService" => EndpointStatus::OutOfService,
            "Deleting" => EndpointStatus::Deleting,
            "Failed" => EndpointStatus::Failed,
            _ => return None,
        })
    }

    /// Still rolling out; keep waiting.
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            EndpointStatus::Creating
                | EndpointStatus::Updating
                | EndpointStatus::SystemUpdating
                | EndpointStatus::RollingBack
        )
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescription {
    pub name: String,
    pub status: EndpointStatus,
    pub failure_reason: Option<String>,
}

/// Names of everything a deploy created, for teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deployment {
    pub model: String,
    pub endpoint_config: String,
    pub endpoint: String,
}

/// Endpoint response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}
