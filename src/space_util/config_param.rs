//! Expansion of action-conversion parameters written in a config file into per-key values.

use crate::space_util::SpaceError;
use crate::types::space::{Space, split_compound_key};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single value of a keyed config parameter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ConfigValue {
    Scalar(f64),
    List(Vec<f64>),
}

impl ConfigValue {
    pub fn values(&self) -> Vec<f64> {
        match self {
            ConfigValue::Scalar(value) => vec![*value],
            ConfigValue::List(values) => values.clone(),
        }
    }
}

/// An action-conversion parameter as it appears in a config file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ConfigParam {
    /// Broadcast to every action key.
    Scalar(f64),
    /// Only valid for an action space with a single key.
    List(Vec<f64>),
    /// Values per action key.
    Map(BTreeMap<String, ConfigValue>),
}

/// Length of a sample drawn from `space`.
fn sample_len(key: &str, space: &Space) -> Result<usize, SpaceError> {
    match space {
        Space::Box(bounds) => Ok(bounds.shape().first().copied().unwrap_or(1)),
        Space::Tuple(spaces) => Ok(spaces.len()),
        Space::Dict(spaces) => Ok(spaces.len()),
        Space::Discrete(_) => Ok(1),
        Space::MultiBinary(binary) => Ok(binary.n),
        Space::MultiDiscrete(multi) => Ok(multi.nvec.len()),
        Space::Repeated(_) => Err(SpaceError::ConfigMismatch {
            key: key.to_string(),
            detail: "repeated spaces have no fixed length".to_string(),
        }),
    }
}

/// Expands `parameter` into one list of values per key of the dictionary `action_space`.
///
/// A scalar is replicated to the length of every key's sample. A list applies only to a single
/// key space and must match its length. A map must cover every key with a value of matching
/// length; a compound key missing from the map is assembled from its components instead.
pub fn convert_config_param_to_space(
    action_space: &Space,
    parameter: &ConfigParam,
) -> Result<BTreeMap<String, Vec<f64>>, SpaceError> {
    let spaces = match action_space {
        Space::Dict(spaces) => spaces,
        other => {
            return Err(SpaceError::ConfigMismatch {
                key: String::new(),
                detail: format!("action space must be a dictionary, got {}", other.kind()),
            });
        }
    };

    let mut action_params: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    match parameter {
        ConfigParam::Scalar(value) => {
            for (key, space) in spaces {
                action_params.insert(key.clone(), vec![*value; sample_len(key, space)?]);
            }
        }
        ConfigParam::List(values) => {
            if spaces.len() != 1 {
                return Err(SpaceError::ConfigMismatch {
                    key: spaces.keys().cloned().collect::<Vec<_>>().join(", "),
                    detail: format!(
                        "list configs can only be applied to action spaces with a single key, found {}",
                        spaces.len()
                    ),
                });
            }
            for (key, space) in spaces {
                let len = sample_len(key, space)?;
                if len != values.len() {
                    return Err(SpaceError::ConfigMismatch {
                        key: key.clone(),
                        detail: format!(
                            "config length {} does not match action length of {}",
                            values.len(),
                            len
                        ),
                    });
                }
                action_params.insert(key.clone(), values.clone());
            }
        }
        ConfigParam::Map(map) => {
            for (key, space) in spaces {
                match map.get(key) {
                    Some(value) => {
                        let len = sample_len(key, space)?;
                        let values = value.values();
                        if values.len() != len {
                            return Err(SpaceError::ConfigMismatch {
                                key: key.clone(),
                                detail: format!(
                                    "config value length {} does not match action length of {}",
                                    values.len(),
                                    len
                                ),
                            });
                        }
                        action_params.insert(key.clone(), values);
                    }
                    None => {
                        let components = split_compound_key(key).ok_or_else(|| {
                            SpaceError::ConfigMismatch {
                                key: key.clone(),
                                detail: "action space key is missing from the config".to_string(),
                            }
                        })?;
                        let mut values = Vec::with_capacity(components.len());
                        for component in components {
                            match map.get(component).map(ConfigValue::values).as_deref() {
                                Some([value]) => values.push(*value),
                                Some(other) => {
                                    return Err(SpaceError::ConfigMismatch {
                                        key: component.to_string(),
                                        detail: format!(
                                            "component of compound key {} needs a single value, got {}",
                                            key,
                                            other.len()
                                        ),
                                    });
                                }
                                None => {
                                    return Err(SpaceError::ConfigMismatch {
                                        key: component.to_string(),
                                        detail: format!(
                                            "component of compound key {} is missing from the config",
                                            key
                                        ),
                                    });
                                }
                            }
                        }
                        action_params.insert(key.clone(), values);
                    }
                }
            }
        }
    }
    Ok(action_params)
}
