//! Per-framework archive layout rules.
//!
//! The compiler and the serving containers look for model files at fixed
//! places in the archive. Checking locally catches a mispackaged archive
//! before a job is spent on it.

use modelship_core::{Error, Framework, Result};

/// One required member: a description and a predicate over entry names.
struct Rule {
    describe: &'static str,
    matches: fn(&str) -> bool,
}

fn file_name(entry: &str) -> &str {
    entry.rsplit('/').next().unwrap_or(entry)
}

fn at_root(entry: &str) -> bool {
    !entry.trim_start_matches("./").contains('/')
}

fn rules(framework: Framework) -> Vec<Rule> {
    match framework {
        Framework::MxNet => vec![
            Rule {
                describe: "*-symbol.json at the archive root",
                matches: |e| at_root(e) && e.ends_with("-symbol.json"),
            },
            Rule {
                describe: "*.params at the archive root",
                matches: |e| at_root(e) && e.ends_with(".params"),
            },
        ],
        Framework::PyTorch => vec![Rule {
            describe: "*.pth or *.pt at the archive root",
            matches: |e| at_root(e) && (e.ends_with(".pth") || e.ends_with(".pt")),
        }],
        Framework::Onnx => vec![Rule {
            describe: "*.onnx at the archive root",
            matches: |e| at_root(e) && e.ends_with(".onnx"),
        }],
        Framework::TensorFlow => vec![Rule {
            describe: "saved_model.pb",
            matches: |e| file_name(e) == "saved_model.pb",
        }],
        Framework::Keras => vec![Rule {
            describe: "*.h5 at the archive root",
            matches: |e| at_root(e) && e.ends_with(".h5"),
        }],
        Framework::TfLite => vec![Rule {
            describe: "*.tflite at the archive root",
            matches: |e| at_root(e) && e.ends_with(".tflite"),
        }],
        Framework::XgBoost => vec![Rule {
            describe: "a model file",
            matches: |_| true,
        }],
    }
}

/// Verify an archive's entries satisfy the framework's layout.
pub fn check_layout(framework: Framework, entries: &[String]) -> Result<()> {
    let missing: Vec<&str> = rules(framework)
        .iter()
        .filter(|rule| !entries.iter().any(|e| (rule.matches)(e)))
        .map(|rule| rule.describe)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Archive(format!(
            "{} archive is missing {}",
            framework,
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mxnet_needs_symbol_and_params() {
        let ok = names(&["resnet50-symbol.json", "resnet50-0000.params"]);
        assert!(check_layout(Framework::MxNet, &ok).is_ok());

        let err = check_layout(Framework::MxNet, &names(&["resnet50-symbol.json"])).unwrap_err();
        assert!(err.to_string().contains("*.params"));
    }

    #[test]
    fn test_pytorch_weights_must_be_at_root() {
        assert!(check_layout(Framework::PyTorch, &names(&["model.pth"])).is_ok());
        assert!(check_layout(Framework::PyTorch, &names(&["./model.pt"])).is_ok());
        assert!(check_layout(Framework::PyTorch, &names(&["nested/model.pth"])).is_err());
    }

    #[test]
    fn test_tensorflow_saved_model_any_depth() {
        let entries = names(&["export/1/saved_model.pb", "export/1/variables/variables.index"]);
        assert!(check_layout(Framework::TensorFlow, &entries).is_ok());
        assert!(check_layout(Framework::TensorFlow, &names(&["model.h5"])).is_err());
    }

    #[test]
    fn test_xgboost_takes_anything_but_nothing() {
        assert!(check_layout(Framework::XgBoost, &names(&["xgboost-model"])).is_ok());
        assert!(check_layout(Framework::XgBoost, &[]).is_err());
    }
}
