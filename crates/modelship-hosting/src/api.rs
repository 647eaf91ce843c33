//! Control-plane and data-plane seams for hosting.

use async_trait::async_trait;
use modelship_core::Result;

use crate::types::{EndpointDescription, EndpointSpec, Invocation, ModelSpec};

/// Model and endpoint management.
#[async_trait]
pub trait HostingApi: Send + Sync {
    async fn create_model(&self, model: &ModelSpec) -> Result<String>;

    /// Create the endpoint configuration binding `model_name` to `endpoint`'s instances.
    async fn create_endpoint_config(&self, endpoint: &EndpointSpec, model_name: &str) -> Result<String>;

    async fn create_endpoint(&self, endpoint: &EndpointSpec) -> Result<String>;

    async fn describe_endpoint(&self, name: &str) -> Result<EndpointDescription>;

    async fn delete_endpoint(&self, name: &str) -> Result<()>;

    async fn delete_endpoint_config(&self, name: &str) -> Result<()>;

    async fn delete_model(&self, name: &str) -> Result<()>;
}

/// Endpoint invocation.
#[async_trait]
pub trait RuntimeApi: Send + Sync {
    async fn invoke(
        &self,
        endpoint: &str,
        content_type: &str,
        accept: Option<&str>,
        body: Vec<u8>,
    ) -> Result<Invocation>;
}
