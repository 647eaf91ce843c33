//! [`PlatformClient`]: one HTTP client shared by the control plane, the
//! runtime plane and object storage.

use async_trait::async_trait;
use modelship_compile::{CompilationApi, CompilationJob, JobDescription, JobStatus};
use modelship_core::{Error, PlatformConfig, Result, S3Uri};
use modelship_hosting::{
    EndpointDescription, EndpointSpec, EndpointStatus, HostingApi, Invocation, ModelSpec,
    RuntimeApi, DEFAULT_VARIANT,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::wire;

const TARGET_PREFIX: &str = "SageMaker";
const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// HTTP client for the hosted ML platform.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: Client,
    control: String,
    runtime: String,
    storage: String,
}

impl PlatformClient {
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Http(format!("building HTTP client: {}", e)))?;

        Ok(Self {
            http,
            control: config.control_endpoint(),
            runtime: config.runtime_endpoint(),
            storage: config.storage_endpoint(),
        })
    }

    /// The underlying HTTP client, for plain downloads.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Invoke a control-plane operation and decode its response.
    pub async fn call<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        let value = self.call_value(operation, request).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Malformed(format!("{} response: {}", operation, e)))
    }

    /// Invoke a control-plane operation and return the raw response document.
    pub async fn call_value<Req>(&self, operation: &str, request: &Req) -> Result<Value>
    where
        Req: Serialize + ?Sized + Sync,
    {
        debug!(operation, endpoint = %self.control, "Control-plane call");

        let response = self
            .http
            .post(&self.control)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, operation))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", operation, e)))?;

        let response = check(response, operation).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("{}: reading response: {}", operation, e)))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Malformed(format!("{} response: {}", operation, e)))
    }

    pub(crate) fn object_url(&self, uri: &S3Uri) -> Result<Url> {
        let mut url = parse_base(&self.storage)?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("storage endpoint cannot be a base: {}", self.storage)))?
            .pop_if_empty()
            .push(&uri.bucket)
            .extend(uri.key.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn invocation_url(&self, endpoint: &str) -> Result<Url> {
        let mut url = parse_base(&self.runtime)?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("runtime endpoint cannot be a base: {}", self.runtime)))?
            .pop_if_empty()
            .extend(["endpoints", endpoint, "invocations"]);
        Ok(url)
    }
}

fn parse_base(endpoint: &str) -> Result<Url> {
    Url::parse(endpoint).map_err(|e| Error::Config(format!("invalid endpoint {}: {}", endpoint, e)))
}

/// Turn a non-success response into [`Error::Remote`].
pub(crate) async fn check(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            debug!(context, error = %e, "Could not read error body");
            String::new()
        }
    };
    let doc: wire::ErrorDocument = serde_json::from_str(&body).unwrap_or_default();
    let code = doc
        .code()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_u16().to_string());
    let message = doc
        .message
        .clone()
        .unwrap_or_else(|| body.trim().to_string());
    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or_default().to_string()
    } else {
        message
    };

    warn!(context, %status, code = %code, "Remote call rejected");
    Err(Error::Remote { code, message })
}

fn job_status(status: &str) -> Result<JobStatus> {
    match status {
        "STARTING" | "INPROGRESS" | "STOPPING" => Ok(JobStatus::InProgress),
        "COMPLETED" => Ok(JobStatus::Completed),
        "FAILED" => Ok(JobStatus::Failed),
        "STOPPED" => Ok(JobStatus::Stopped),
        other => Err(Error::Malformed(format!("unknown compilation job status {:?}", other))),
    }
}

#[async_trait]
impl CompilationApi for PlatformClient {
    async fn create_compilation_job(&self, job: &CompilationJob) -> Result<String> {
        let request = wire::CreateCompilationJobRequest {
            compilation_job_name: &job.name,
            role_arn: &job.role_arn,
            input_config: wire::InputConfig {
                s3_uri: job.input.location.to_string(),
                data_input_config: job.input.shape.to_wire(),
                framework: job.input.framework.as_str(),
            },
            output_config: wire::OutputConfig {
                s3_output_location: job.output.location.to_string(),
                target_device: job.output.target.as_str(),
            },
            stopping_condition: wire::StoppingCondition {
                max_runtime_in_seconds: job.max_runtime.as_secs(),
            },
        };

        let response: wire::CreateCompilationJobResponse =
            self.call("CreateCompilationJob", &request).await?;
        Ok(response.compilation_job_arn)
    }

    async fn describe_compilation_job(&self, name: &str) -> Result<JobDescription> {
        let request = wire::DescribeCompilationJobRequest {
            compilation_job_name: name,
        };
        let raw = self.call_value("DescribeCompilationJob", &request).await?;
        let response: wire::DescribeCompilationJobResponse = serde_json::from_value(raw.clone())
            .map_err(|e| Error::Malformed(format!("DescribeCompilationJob response: {}", e)))?;

        let artifact = response
            .model_artifacts
            .map(|a| a.s3_model_artifacts.parse::<S3Uri>())
            .transpose()
            .map_err(|e| Error::Malformed(format!("model artifact location: {}", e)))?;

        Ok(JobDescription {
            name: response
                .compilation_job_name
                .unwrap_or_else(|| name.to_string()),
            status: job_status(&response.compilation_job_status)?,
            artifact,
            failure_reason: response.failure_reason,
            raw,
        })
    }
}

#[async_trait]
impl HostingApi for PlatformClient {
    async fn create_model(&self, model: &ModelSpec) -> Result<String> {
        let request = wire::CreateModelRequest {
            model_name: &model.name,
            execution_role_arn: &model.role_arn,
            primary_container: wire::ContainerDefinition {
                image: &model.image,
                model_data_url: model.artifact.to_string(),
                environment: (!model.environment.is_empty()).then_some(&model.environment),
            },
        };
        let response: wire::CreateModelResponse = self.call("CreateModel", &request).await?;
        Ok(response.model_arn)
    }

    async fn create_endpoint_config(&self, endpoint: &EndpointSpec, model_name: &str) -> Result<String> {
        let request = wire::CreateEndpointConfigRequest {
            endpoint_config_name: &endpoint.config_name,
            production_variants: vec![wire::ProductionVariant {
                variant_name: DEFAULT_VARIANT,
                model_name,
                initial_instance_count: endpoint.instance_count,
                instance_type: &endpoint.instance_type,
                initial_variant_weight: 1.0,
                accelerator_type: endpoint.accelerator.as_deref(),
            }],
        };
        let response: wire::CreateEndpointConfigResponse =
            self.call("CreateEndpointConfig", &request).await?;
        Ok(response.endpoint_config_arn)
    }

    async fn create_endpoint(&self, endpoint: &EndpointSpec) -> Result<String> {
        let request = wire::CreateEndpointRequest {
            endpoint_name: &endpoint.name,
            endpoint_config_name: &endpoint.config_name,
        };
        let response: wire::CreateEndpointResponse = self.call("CreateEndpoint", &request).await?;
        Ok(response.endpoint_arn)
    }

    async fn describe_endpoint(&self, name: &str) -> Result<EndpointDescription> {
        let response: wire::DescribeEndpointResponse = self
            .call("DescribeEndpoint", &wire::EndpointNameRequest { endpoint_name: name })
            .await?;

        let status = EndpointStatus::parse(&response.endpoint_status).ok_or_else(|| {
            Error::Malformed(format!("unknown endpoint status {:?}", response.endpoint_status))
        })?;

        Ok(EndpointDescription {
            name: response.endpoint_name,
            status,
            failure_reason: response.failure_reason,
        })
    }

    async fn delete_endpoint(&self, name: &str) -> Result<()> {
        let _: wire::Empty = self
            .call("DeleteEndpoint", &wire::EndpointNameRequest { endpoint_name: name })
            .await?;
        Ok(())
    }

    async fn delete_endpoint_config(&self, name: &str) -> Result<()> {
        let _: wire::Empty = self
            .call(
                "DeleteEndpointConfig",
                &wire::EndpointConfigNameRequest {
                    endpoint_config_name: name,
                },
            )
            .await?;
        Ok(())
    }

    async fn delete_model(&self, name: &str) -> Result<()> {
        let _: wire::Empty = self
            .call("DeleteModel", &wire::ModelNameRequest { model_name: name })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RuntimeApi for PlatformClient {
    async fn invoke(
        &self,
        endpoint: &str,
        content_type: &str,
        accept: Option<&str>,
        body: Vec<u8>,
    ) -> Result<Invocation> {
        let url = self.invocation_url(endpoint)?;
        debug!(endpoint, %url, bytes = body.len(), "Invoking endpoint");

        let mut request = self.http.post(url).header(CONTENT_TYPE, content_type).body(body);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }

        let context = format!("invoke {}", endpoint);
        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", context, e)))?;
        let response = check(response, &context).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("{}: reading response: {}", context, e)))?;

        Ok(Invocation {
            content_type,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(storage: &str, runtime: &str) -> PlatformClient {
        let config = PlatformConfig {
            storage_endpoint: Some(storage.into()),
            runtime_endpoint: Some(runtime.into()),
            ..Default::default()
        };
        PlatformClient::new(&config).unwrap()
    }

    #[test]
    fn test_job_status_mapping() {
        assert_eq!(job_status("STARTING").unwrap(), JobStatus::InProgress);
        assert_eq!(job_status("INPROGRESS").unwrap(), JobStatus::InProgress);
        assert_eq!(job_status("STOPPING").unwrap(), JobStatus::InProgress);
        assert_eq!(job_status("COMPLETED").unwrap(), JobStatus::Completed);
        assert_eq!(job_status("FAILED").unwrap(), JobStatus::Failed);
        assert_eq!(job_status("STOPPED").unwrap(), JobStatus::Stopped);
        assert!(matches!(job_status("PAUSED"), Err(Error::Malformed(_))));
    }

    #[tokio::test]
    async fn test_error_without_body_keeps_status_text() {
        let response = axum::http::Response::builder().status(503).body("").unwrap();
        let err = check(Response::from(response), "DescribeEndpoint").await.unwrap_err();
        match err {
            Error::Remote { code, message } => {
                assert_eq!(code, "503");
                assert_eq!(message, "Service Unavailable");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_object_url_is_path_style() {
        let c = client("http://127.0.0.1:9000/s3/", "http://localhost");
        let url = c
            .object_url(&"s3://bucket/models/resnet/model.tar.gz".parse().unwrap())
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/s3/bucket/models/resnet/model.tar.gz"
        );
    }

    #[test]
    fn test_invocation_url_escapes_name() {
        let c = client("http://localhost", "http://127.0.0.1:9000/runtime");
        let url = c.invocation_url("my endpoint").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/runtime/endpoints/my%20endpoint/invocations"
        );
    }
}
