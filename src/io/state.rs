//! Serializable model state.

use crate::model::Classifier;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shape record for one named parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Parameter name, e.g. `fc.weight`.
    pub name: String,
    /// Flat element count.
    pub len: usize,
}

/// A model's named tensors, flattened for JSON serialization.
///
/// Parameter order follows `named_parameters`; `data` concatenates every
/// parameter's elements in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    /// Per-parameter name and length, in enumeration order.
    pub parameters: Vec<ParameterInfo>,
    /// Concatenated parameter data.
    pub data: Vec<f32>,
}

impl ModelState {
    /// Capture the current parameter values of a classifier.
    pub fn snapshot<C: Classifier>(model: &C) -> Self {
        let mut parameters = Vec::new();
        let mut data = Vec::new();
        for (name, param) in model.named_parameters() {
            parameters.push(ParameterInfo { name, len: param.len() });
            data.extend(param.data().iter().copied());
        }
        Self { parameters, data }
    }

    /// Write the captured values back into a classifier.
    ///
    /// The classifier must enumerate the same parameter names and lengths in
    /// the same order the snapshot recorded.
    pub fn restore<C: Classifier>(&self, model: &mut C) -> Result<()> {
        let named = model.named_parameters();
        if named.len() != self.parameters.len() {
            return Err(Error::Serialization {
                message: format!(
                    "state has {} parameters, model has {}",
                    self.parameters.len(),
                    named.len()
                ),
            });
        }
        let mut offset = 0;
        for ((name, param), info) in named.iter().zip(self.parameters.iter()) {
            if *name != info.name || param.len() != info.len {
                return Err(Error::Serialization {
                    message: format!(
                        "state parameter '{}' ({} elements) does not match model parameter '{}' ({} elements)",
                        info.name,
                        info.len,
                        name,
                        param.len()
                    ),
                });
            }
            let slice = self.data.get(offset..offset + info.len).ok_or_else(|| {
                Error::Serialization {
                    message: format!("state data too short for parameter '{}'", info.name),
                }
            })?;
            param.set_data(ndarray::Array1::from(slice.to_vec()));
            offset += info.len;
        }
        Ok(())
    }

    /// Serialize to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(self, path)
    }

    /// Deserialize from a JSON file. A missing file is a checkpoint error.
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

/// Serialize any value to a JSON file.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let data = serde_json::to_string(value)
        .map_err(|e| Error::Serialization { message: format!("{}: {e}", path.display()) })?;
    std::fs::write(path, data).map_err(|e| Error::io(format!("writing {}", path.display()), e))
}

/// Deserialize a value from a JSON file, mapping a missing file to
/// [`Error::CheckpointNotFound`].
pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::CheckpointNotFound { path: path.to_path_buf() }
        } else {
            Error::io(format!("reading {}", path.display()), e)
        }
    })?;
    serde_json::from_str(&data)
        .map_err(|e| Error::Serialization { message: format!("{}: {e}", path.display()) })
}
