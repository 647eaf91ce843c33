//! Control-plane request and response documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateCompilationJobRequest<'a> {
    pub compilation_job_name: &'a str,
    pub role_arn: &'a str,
    pub input_config: InputConfig,
    pub output_config: OutputConfig,
    pub stopping_condition: StoppingCondition,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InputConfig {
    pub s3_uri: String,
    /// JSON document of input shapes, sent as a string.
    pub data_input_config: String,
    pub framework: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutputConfig {
    pub s3_output_location: String,
    pub target_device: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoppingCondition {
    pub max_runtime_in_seconds: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateCompilationJobResponse {
    pub compilation_job_arn: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeCompilationJobRequest<'a> {
    pub compilation_job_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeCompilationJobResponse {
    #[serde(default)]
    pub compilation_job_name: Option<String>,
    pub compilation_job_status: String,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub model_artifacts: Option<ModelArtifacts>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelArtifacts {
    pub s3_model_artifacts: String,
}

// ---------------------------------------------------------------
// Hosting
// ---------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateModelRequest<'a> {
    pub model_name: &'a str,
    pub execution_role_arn: &'a str,
    pub primary_container: ContainerDefinition<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerDefinition<'a> {
    pub image: &'a str,
    pub model_data_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<&'a BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateModelResponse {
    pub model_arn: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEndpointConfigRequest<'a> {
    pub endpoint_config_name: &'a str,
    pub production_variants: Vec<ProductionVariant<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductionVariant<'a> {
    pub variant_name: &'a str,
    pub model_name: &'a str,
    pub initial_instance_count: u32,
    pub instance_type: &'a str,
    pub initial_variant_weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerator_type: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEndpointConfigResponse {
    pub endpoint_config_arn: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEndpointRequest<'a> {
    pub endpoint_name: &'a str,
    pub endpoint_config_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEndpointResponse {
    pub endpoint_arn: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointNameRequest<'a> {
    pub endpoint_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeEndpointResponse {
    pub endpoint_name: String,
    pub endpoint_status: String,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointConfigNameRequest<'a> {
    pub endpoint_config_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelNameRequest<'a> {
    pub model_name: &'a str,
}

/// Body of operations that answer with nothing useful.
#[derive(Debug, Deserialize)]
pub struct Empty {}

/// Control-plane error document.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorDocument {
    #[serde(rename = "__type", default)]
    pub error_type: Option<String>,
    #[serde(alias = "Message", default)]
    pub message: Option<String>,
}

impl ErrorDocument {
    /// Error code without the namespace prefix
    /// (`com.amazon.coral.validate#ValidationException` → `ValidationException`).
    pub fn code(&self) -> Option<&str> {
        self.error_type
            .as_deref()
            .map(|t| t.rsplit('#').next().unwrap_or(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compilation_request_shape() {
        let req = CreateCompilationJobRequest {
            compilation_job_name: "job-A",
            role_arn: "arn:aws:iam::123:role/Exec",
            input_config: InputConfig {
                s3_uri: "s3://bucket/in/model.tar.gz".into(),
                data_input_config: r#"{"input0":[1,3,224,224]}"#.into(),
                framework: "PYTORCH",
            },
            output_config: OutputConfig {
                s3_output_location: "s3://bucket/out".into(),
                target_device: "ml_p3",
            },
            stopping_condition: StoppingCondition {
                max_runtime_in_seconds: 900,
            },
        };

        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "CompilationJobName": "job-A",
                "RoleArn": "arn:aws:iam::123:role/Exec",
                "InputConfig": {
                    "S3Uri": "s3://bucket/in/model.tar.gz",
                    "DataInputConfig": "{\"input0\":[1,3,224,224]}",
                    "Framework": "PYTORCH",
                },
                "OutputConfig": {
                    "S3OutputLocation": "s3://bucket/out",
                    "TargetDevice": "ml_p3",
                },
                "StoppingCondition": { "MaxRuntimeInSeconds": 900 },
            })
        );
    }

    #[test]
    fn test_variant_omits_missing_accelerator() {
        let variant = ProductionVariant {
            variant_name: "AllTraffic",
            model_name: "m",
            initial_instance_count: 1,
            instance_type: "ml.c5.large",
            initial_variant_weight: 1.0,
            accelerator_type: None,
        };
        let value = serde_json::to_value(&variant).unwrap();
        assert!(value.get("AcceleratorType").is_none());
        assert_eq!(value["InstanceType"], "ml.c5.large");
    }

    #[test]
    fn test_error_document_code() {
        let doc: ErrorDocument = serde_json::from_value(json!({
            "__type": "com.amazon.coral.validate#ValidationException",
            "Message": "Could not find model",
        }))
        .unwrap();
        assert_eq!(doc.code(), Some("ValidationException"));
        assert_eq!(doc.message.as_deref(), Some("Could not find model"));
    }
}
