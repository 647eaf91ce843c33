//! Deployer: model → endpoint config → endpoint, wait, invoke, teardown.

use std::sync::Arc;
use std::time::Duration;

use modelship_core::{poll_until, PlatformConfig, PollError, PollPolicy, Probe};
use tracing::{error, info, warn};

use crate::api::{HostingApi, RuntimeApi};
use crate::error::HostingError;
use crate::types::*;

/// How long an endpoint may take to come into service.
pub const DEFAULT_ROLLOUT_TIMEOUT: Duration = Duration::from_secs(3600);

pub struct Deployer {
    hosting: Arc<dyn HostingApi>,
    runtime: Arc<dyn RuntimeApi>,
    policy: PollPolicy,
}

impl Deployer {
    pub fn new(
        hosting: Arc<dyn HostingApi>,
        runtime: Arc<dyn RuntimeApi>,
        config: &PlatformConfig,
    ) -> Self {
        Self {
            hosting,
            runtime,
            policy: PollPolicy::unbounded(config.poll_interval()).with_deadline(DEFAULT_ROLLOUT_TIMEOUT),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Register the model, create its endpoint, and wait until it serves traffic.
    pub async fn deploy(
        &self,
        model: &ModelSpec,
        endpoint: &EndpointSpec,
    ) -> Result<Deployment, HostingError> {
        info!(
            "Registering model {} ({} with {})",
            model.name, model.image, model.artifact
        );
        self.hosting
            .create_model(model)
            .await
            .map_err(HostingError::remote("CreateModel", &model.name))?;

        match &endpoint.accelerator {
            Some(acc) => info!(
                "Creating endpoint config {}: {} x {} + {}",
                endpoint.config_name, endpoint.instance_count, endpoint.instance_type, acc
            ),
            None => info!(
                "Creating endpoint config {}: {} x {}",
                endpoint.config_name, endpoint.instance_count, endpoint.instance_type
            ),
        }
        self.hosting
            .create_endpoint_config(endpoint, &model.name)
            .await
            .map_err(HostingError::remote("CreateEndpointConfig", &endpoint.config_name))?;

        info!("Creating endpoint {}", endpoint.name);
        self.hosting
            .create_endpoint(endpoint)
            .await
            .map_err(HostingError::remote("CreateEndpoint", &endpoint.name))?;

        self.wait_in_service(&endpoint.name).await?;

        Ok(Deployment {
            model: model.name.clone(),
            endpoint_config: endpoint.config_name.clone(),
            endpoint: endpoint.name.clone(),
        })
    }

    /// Poll an endpoint until it is in service.
    pub async fn wait_in_service(&self, endpoint: &str) -> Result<(), HostingError> {
        let hosting = &self.hosting;

        let polled = poll_until(&self.policy, "describe_endpoint", || async move {
            let desc = hosting.describe_endpoint(endpoint).await?;
            Ok::<_, modelship_core::Error>(if desc.status.is_transitional() {
                Probe::Pending(desc.status.to_string())
            } else {
                Probe::Ready(desc)
            })
        })
        .await
        .map_err(|e| match e {
            PollError::Probe(source) => HostingError::Remote {
                operation: "DescribeEndpoint",
                resource: endpoint.to_string(),
                source,
            },
            PollError::TimedOut { polls, waited } => HostingError::TimedOut {
                endpoint: endpoint.to_string(),
                polls,
                waited,
            },
        })?;

        let desc = polled.value;
        if desc.status == EndpointStatus::InService {
            info!(
                "Endpoint {} in service after {}s",
                endpoint,
                polled.waited.as_secs()
            );
            return Ok(());
        }

        let reason = desc
            .failure_reason
            .unwrap_or_else(|| "no reason given".to_string());
        error!("Endpoint {} is {}: {}", endpoint, desc.status, reason);
        Err(HostingError::EndpointFailed {
            endpoint: endpoint.to_string(),
            status: desc.status,
            reason,
        })
    }

    /// Send one request to an endpoint.
    pub async fn invoke(
        &self,
        endpoint: &str,
        content_type: &str,
        accept: Option<&str>,
        body: Vec<u8>,
    ) -> Result<Invocation, HostingError> {
        info!(
            "Invoking {} with {} bytes of {}",
            endpoint,
            body.len(),
            content_type
        );
        let response = self
            .runtime
            .invoke(endpoint, content_type, accept, body)
            .await
            .map_err(HostingError::remote("InvokeEndpoint", endpoint))?;
        info!("{} answered with {} bytes", endpoint, response.body.len());
        Ok(response)
    }

    /// Delete endpoint, endpoint config and model. All three are attempted;
    /// the first failure is returned.
    pub async fn teardown(&self, deployment: &Deployment) -> Result<(), HostingError> {
        info!("Tearing down endpoint {}", deployment.endpoint);

        let results = [
            self.hosting
                .delete_endpoint(&deployment.endpoint)
                .await
                .map_err(HostingError::remote("DeleteEndpoint", &deployment.endpoint)),
            self.hosting
                .delete_endpoint_config(&deployment.endpoint_config)
                .await
                .map_err(HostingError::remote(
                    "DeleteEndpointConfig",
                    &deployment.endpoint_config,
                )),
            self.hosting
                .delete_model(&deployment.model)
                .await
                .map_err(HostingError::remote("DeleteModel", &deployment.model)),
        ];

        let mut first = None;
        for result in results {
            if let Err(e) = result {
                warn!("Teardown step failed: {}", e);
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
