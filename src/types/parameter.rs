//! Episode parameters and their addressing.
//!
//! Providers hand out a flat [ParameterModel], a map from a [ParameterPath] (for instance
//! `group.param2`) to a [Parameter] that draws its value from the caller's [Randomness].

use crate::Randomness;
use crate::episode_parameter_providers::ProviderError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered path segments addressing one parameter.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParameterPath(pub Vec<String>);

impl ParameterPath {
    pub fn new<S: Into<String>, I: IntoIterator<Item = S>>(segments: I) -> Self {
        ParameterPath(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The last segment, usually the parameter's own name.
    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn child<S: Into<String>>(&self, segment: S) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        ParameterPath(segments)
    }
}

impl fmt::Display for ParameterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for ParameterPath {
    fn from(path: &str) -> Self {
        ParameterPath::new(path.split('.'))
    }
}

/// A drawn parameter value together with its units.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ValueWithUnits {
    pub value: f64,
    pub units: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Parameter {
    /// Always the same value.
    Constant {
        name: String,
        units: Option<String>,
        value: f64,
    },
    /// Uniform over `[low, high)`.
    Uniform {
        name: String,
        units: Option<String>,
        low: f64,
        high: f64,
    },
    /// One of `choices`, picked uniformly.
    Choice {
        name: String,
        units: Option<String>,
        choices: Vec<f64>,
    },
}

impl Parameter {
    pub fn constant<S: Into<String>>(name: S, units: Option<String>, value: f64) -> Self {
        Parameter::Constant {
            name: name.into(),
            units,
            value,
        }
    }

    pub fn uniform<S: Into<String>>(name: S, units: Option<String>, low: f64, high: f64) -> Self {
        Parameter::Uniform {
            name: name.into(),
            units,
            low,
            high,
        }
    }

    pub fn choice<S: Into<String>>(name: S, units: Option<String>, choices: Vec<f64>) -> Self {
        Parameter::Choice {
            name: name.into(),
            units,
            choices,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Parameter::Constant { name, .. }
            | Parameter::Uniform { name, .. }
            | Parameter::Choice { name, .. } => name,
        }
    }

    pub fn units(&self) -> Option<&str> {
        match self {
            Parameter::Constant { units, .. }
            | Parameter::Uniform { units, .. }
            | Parameter::Choice { units, .. } => units.as_deref(),
        }
    }

    /// Checks the parameter's configuration.
    pub fn validate(&self) -> Result<(), ProviderError> {
        match self {
            Parameter::Constant { name, value, .. } => {
                if !value.is_finite() {
                    return Err(ProviderError::InvalidConfig(format!(
                        "constant parameter {} must be finite, got {}",
                        name, value
                    )));
                }
            }
            Parameter::Uniform {
                name, low, high, ..
            } => {
                if !(high - low).is_finite() || low > high {
                    return Err(ProviderError::InvalidConfig(format!(
                        "uniform parameter {} needs low <= high and a finite width, got [{}, {}]",
                        name, low, high
                    )));
                }
            }
            Parameter::Choice { name, choices, .. } => {
                if choices.is_empty() || choices.iter().any(|c| !c.is_finite()) {
                    return Err(ProviderError::InvalidConfig(format!(
                        "choice parameter {} needs at least one finite choice, got {:?}",
                        name, choices
                    )));
                }
            }
        }
        Ok(())
    }

    /// Draws a value. Constants leave `rng` untouched.
    ///
    /// An empty choice list, which [Parameter::validate] rejects, yields `NaN`.
    pub fn get_value(&self, rng: &mut Randomness) -> ValueWithUnits {
        let value = match self {
            Parameter::Constant { value, .. } => *value,
            Parameter::Uniform { low, high, .. } => {
                if low < high {
                    rng.gen_range(*low..*high)
                } else {
                    *low
                }
            }
            Parameter::Choice { choices, .. } => {
                if choices.is_empty() {
                    f64::NAN
                } else {
                    choices[rng.gen_range(0..choices.len())]
                }
            }
        };
        ValueWithUnits {
            value,
            units: self.units().map(str::to_string),
        }
    }
}

/// The flat parameter set handed out by a provider.
pub type ParameterModel = BTreeMap<ParameterPath, Parameter>;

/// A tree of parameter groups, flattened into a [ParameterModel] by joining the group names.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum NestedParameters {
    Leaf(Parameter),
    Group(BTreeMap<String, NestedParameters>),
}

impl NestedParameters {
    pub fn group<K: Into<String>, I: IntoIterator<Item = (K, NestedParameters)>>(
        children: I,
    ) -> Self {
        NestedParameters::Group(children.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn flatten(&self) -> ParameterModel {
        let mut model = ParameterModel::new();
        self.flatten_into(ParameterPath::default(), &mut model);
        model
    }

    fn flatten_into(&self, prefix: ParameterPath, model: &mut ParameterModel) {
        match self {
            NestedParameters::Leaf(parameter) => {
                model.insert(prefix, parameter.clone());
            }
            NestedParameters::Group(children) => {
                for (key, child) in children {
                    child.flatten_into(prefix.child(key.clone()), model);
                }
            }
        }
    }
}

impl From<Parameter> for NestedParameters {
    fn from(parameter: Parameter) -> Self {
        NestedParameters::Leaf(parameter)
    }
}

/// Serializes a [ParameterModel] as a sequence of `(path, parameter)` pairs, for formats whose
/// maps only take string keys.
pub mod model_as_pairs {
    use super::{Parameter, ParameterModel, ParameterPath};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(model: &ParameterModel, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(model.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ParameterModel, D::Error> {
        let pairs: Vec<(ParameterPath, Parameter)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
