//! Shared value types: object-storage URIs, framework and target tags, input shapes.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Object-storage location, `s3://bucket/key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct S3Uri {
    pub bucket: String,
    /// Object key or prefix; empty for the bucket root.
    pub key: String,
}

impl S3Uri {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Append a path segment, treating the current key as a prefix.
    pub fn join(&self, suffix: &str) -> Self {
        let suffix = suffix.trim_start_matches('/');
        let key = if self.key.is_empty() {
            suffix.to_string()
        } else {
            format!("{}/{}", self.key.trim_end_matches('/'), suffix)
        };
        Self::new(self.bucket.clone(), key)
    }

    /// Last path segment of the key.
    pub fn file_name(&self) -> Option<&str> {
        self.key.rsplit('/').next().filter(|s| !s.is_empty())
    }
}

impl FromStr for S3Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("s3://")
            .ok_or_else(|| Error::InvalidArgument(format!("not an s3:// URI: {}", s)))?;
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(Error::InvalidArgument(format!("missing bucket in {}", s)));
        }
        Ok(Self::new(bucket, key))
    }
}

impl TryFrom<String> for S3Uri {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<S3Uri> for String {
    fn from(uri: S3Uri) -> Self {
        uri.to_string()
    }
}

impl fmt::Display for S3Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Source framework of a model submitted for compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Framework {
    TensorFlow,
    Keras,
    MxNet,
    Onnx,
    PyTorch,
    XgBoost,
    TfLite,
}

impl Framework {
    pub const ALL: [Framework; 7] = [
        Framework::TensorFlow,
        Framework::Keras,
        Framework::MxNet,
        Framework::Onnx,
        Framework::PyTorch,
        Framework::XgBoost,
        Framework::TfLite,
    ];

    /// Wire tag, as the control plane expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::TensorFlow => "TENSORFLOW",
            Framework::Keras => "KERAS",
            Framework::MxNet => "MXNET",
            Framework::Onnx => "ONNX",
            Framework::PyTorch => "PYTORCH",
            Framework::XgBoost => "XGBOOST",
            Framework::TfLite => "TFLITE",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Framework::ALL
            .into_iter()
            .find(|fw| fw.as_str() == upper)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown framework: {}", s)))
    }
}

/// Hardware target of a compilation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetDevice {
    #[serde(rename = "ml_c4")]
    MlC4,
    #[serde(rename = "ml_c5")]
    MlC5,
    #[serde(rename = "ml_m4")]
    MlM4,
    #[serde(rename = "ml_m5")]
    MlM5,
    #[serde(rename = "ml_p2")]
    MlP2,
    #[serde(rename = "ml_p3")]
    MlP3,
    #[serde(rename = "ml_g4dn")]
    MlG4dn,
    #[serde(rename = "ml_inf1")]
    MlInf1,
    #[serde(rename = "jetson_tx1")]
    JetsonTx1,
    #[serde(rename = "jetson_tx2")]
    JetsonTx2,
    #[serde(rename = "jetson_nano")]
    JetsonNano,
    #[serde(rename = "rasp3b")]
    Rasp3b,
    #[serde(rename = "deeplens")]
    Deeplens,
}

impl TargetDevice {
    pub const ALL: [TargetDevice; 13] = [
        TargetDevice::MlC4,
        TargetDevice::MlC5,
        TargetDevice::MlM4,
        TargetDevice::MlM5,
        TargetDevice::MlP2,
        TargetDevice::MlP3,
        TargetDevice::MlG4dn,
        TargetDevice::MlInf1,
        TargetDevice::JetsonTx1,
        TargetDevice::JetsonTx2,
        TargetDevice::JetsonNano,
        TargetDevice::Rasp3b,
        TargetDevice::Deeplens,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetDevice::MlC4 => "ml_c4",
            TargetDevice::MlC5 => "ml_c5",
            TargetDevice::MlM4 => "ml_m4",
            TargetDevice::MlM5 => "ml_m5",
            TargetDevice::MlP2 => "ml_p2",
            TargetDevice::MlP3 => "ml_p3",
            TargetDevice::MlG4dn => "ml_g4dn",
            TargetDevice::MlInf1 => "ml_inf1",
            TargetDevice::JetsonTx1 => "jetson_tx1",
            TargetDevice::JetsonTx2 => "jetson_tx2",
            TargetDevice::JetsonNano => "jetson_nano",
            TargetDevice::Rasp3b => "rasp3b",
            TargetDevice::Deeplens => "deeplens",
        }
    }

    /// Hosting instance type matching a cloud target. Edge devices have none.
    pub fn instance_type(&self) -> Option<&'static str> {
        match self {
            TargetDevice::MlC4 => Some("ml.c4.xlarge"),
            TargetDevice::MlC5 => Some("ml.c5.xlarge"),
            TargetDevice::MlM4 => Some("ml.m4.xlarge"),
            TargetDevice::MlM5 => Some("ml.m5.xlarge"),
            TargetDevice::MlP2 => Some("ml.p2.xlarge"),
            TargetDevice::MlP3 => Some("ml.p3.2xlarge"),
            TargetDevice::MlG4dn => Some("ml.g4dn.xlarge"),
            TargetDevice::MlInf1 => Some("ml.inf1.xlarge"),
            _ => None,
        }
    }
}

impl fmt::Display for TargetDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetDevice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        TargetDevice::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown target device: {}", s)))
    }
}

/// Input tensor shapes, e.g. `{"input0":[1,3,224,224]}`.
///
/// Named inputs keep the order they were declared in; positional
/// frameworks take the list form `[[1,3,224,224]]`. The control plane takes
/// either as a JSON document embedded in a string field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputShape {
    Named(Vec<(String, Vec<u64>)>),
    Positional(Vec<Vec<u64>>),
}

impl InputShape {
    pub fn single(name: impl Into<String>, dims: Vec<u64>) -> Self {
        InputShape::Named(vec![(name.into(), dims)])
    }

    /// The string form sent as `DataInputConfig`.
    pub fn to_wire(&self) -> String {
        // Strings and integer lists always serialize.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        match self {
            InputShape::Named(inputs) => inputs.len(),
            InputShape::Positional(inputs) => inputs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromStr for InputShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let shape: InputShape = serde_json::from_str(s)
            .map_err(|e| Error::InvalidArgument(format!("bad input shape {}: {}", s, e)))?;
        if shape.is_empty() {
            return Err(Error::InvalidArgument(format!("input shape declares no inputs: {}", s)));
        }
        Ok(shape)
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl Serialize for InputShape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            InputShape::Named(inputs) => {
                let mut map = serializer.serialize_map(Some(inputs.len()))?;
                for (name, dims) in inputs {
                    map.serialize_entry(name, dims)?;
                }
                map.end()
            }
            InputShape::Positional(inputs) => inputs.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for InputShape {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(InputShapeVisitor)
    }
}

struct InputShapeVisitor;

impl<'de> Visitor<'de> for InputShapeVisitor {
    type Value = InputShape;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of input names to dimensions, or a list of dimensions")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut inputs: Vec<(String, Vec<u64>)> = Vec::new();
        while let Some((name, dims)) = access.next_entry::<String, Vec<u64>>()? {
            if inputs.iter().any(|(n, _)| *n == name) {
                return Err(de::Error::custom(format!("duplicate input {:?}", name)));
            }
            inputs.push((name, dims));
        }
        Ok(InputShape::Named(inputs))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut inputs = Vec::new();
        while let Some(dims) = access.next_element::<Vec<u64>>()? {
            inputs.push(dims);
        }
        Ok(InputShape::Positional(inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_uri_parse_and_display() {
        let uri: S3Uri = "s3://bucket/out/model.tar.gz".parse().unwrap();
        assert_eq!(uri.bucket, "bucket");
        assert_eq!(uri.key, "out/model.tar.gz");
        assert_eq!(uri.file_name(), Some("model.tar.gz"));
        assert_eq!(uri.to_string(), "s3://bucket/out/model.tar.gz");

        let root: S3Uri = "s3://bucket".parse().unwrap();
        assert_eq!(root.key, "");
        assert_eq!(root.file_name(), None);
    }

    #[test]
    fn test_s3_uri_rejects_bad_input() {
        assert!("http://bucket/key".parse::<S3Uri>().is_err());
        assert!("s3:///key".parse::<S3Uri>().is_err());
    }

    #[test]
    fn test_s3_uri_join() {
        let prefix = S3Uri::new("bucket", "models/resnet/");
        assert_eq!(
            prefix.join("/model.tar.gz").to_string(),
            "s3://bucket/models/resnet/model.tar.gz"
        );
        assert_eq!(S3Uri::new("bucket", "").join("a").key, "a");
    }

    #[test]
    fn test_s3_uri_serde_as_string() {
        let uri = S3Uri::new("b", "k");
        let json = serde_json::to_string(&uri).unwrap();
        assert_eq!(json, "\"s3://b/k\"");
        let back: S3Uri = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uri);
        assert!(serde_json::from_str::<S3Uri>("\"nope\"").is_err());
    }

    #[test]
    fn test_framework_tags() {
        assert_eq!("pytorch".parse::<Framework>().unwrap(), Framework::PyTorch);
        assert_eq!("MXNet".parse::<Framework>().unwrap(), Framework::MxNet);
        assert!("caffe".parse::<Framework>().is_err());
        assert_eq!(
            serde_json::to_string(&Framework::TfLite).unwrap(),
            "\"TFLITE\""
        );
    }

    #[test]
    fn test_target_device_tags() {
        let target: TargetDevice = "ML_P3".parse().unwrap();
        assert_eq!(target, TargetDevice::MlP3);
        assert_eq!(target.instance_type(), Some("ml.p3.2xlarge"));
        assert_eq!(TargetDevice::JetsonNano.instance_type(), None);
        assert_eq!(
            serde_json::to_string(&TargetDevice::MlG4dn).unwrap(),
            "\"ml_g4dn\""
        );
        for t in TargetDevice::ALL {
            assert_eq!(t.as_str().parse::<TargetDevice>().unwrap(), t);
        }
    }

    #[test]
    fn test_input_shape_wire_form() {
        let shape: InputShape = r#"{"input0":[1,3,224,224]}"#.parse().unwrap();
        assert_eq!(shape, InputShape::single("input0", vec![1, 3, 224, 224]));
        assert_eq!(shape.to_wire(), r#"{"input0":[1,3,224,224]}"#);
        assert!("[1,3]".parse::<InputShape>().is_err());
        assert!("{}".parse::<InputShape>().is_err());
        assert!(r#"{"a":[1],"a":[2]}"#.parse::<InputShape>().is_err());
    }

    #[test]
    fn test_input_shape_keeps_declared_order() {
        let shape: InputShape = r#"{"input2":[1,3],"input10":[1,5]}"#.parse().unwrap();
        assert_eq!(shape.to_wire(), r#"{"input2":[1,3],"input10":[1,5]}"#);
        assert_eq!(
            shape,
            InputShape::Named(vec![
                ("input2".into(), vec![1, 3]),
                ("input10".into(), vec![1, 5]),
            ])
        );
    }

    #[test]
    fn test_input_shape_list_form() {
        let shape: InputShape = "[[1,3,224,224],[1,10]]".parse().unwrap();
        assert_eq!(shape, InputShape::Positional(vec![vec![1, 3, 224, 224], vec![1, 10]]));
        assert_eq!(shape.len(), 2);
        assert_eq!(shape.to_wire(), "[[1,3,224,224],[1,10]]");
        assert!("[]".parse::<InputShape>().is_err());
    }
}
