//! This module defines the space descriptions consumed by the transform engine: a closed
//! [Space] enum over dictionary, tuple, box, discrete, multi-binary, multi-discrete and repeated
//! spaces, together with the sampling and membership capabilities the engine relies on.

use crate::Randomness;
use crate::space_util::SpaceError;
use crate::types::sample::Sample;
use ndarray::{ArrayD, IxDyn};
use rand::Rng;
use rand_distr::{Distribution, Exp1, StandardNormal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Joins the components of a compound dictionary key, i.e. a key that addresses several
/// sub-controls at once.
pub const COMPOUND_KEY_DELIMITER: &str = "|";

/// Builds a compound dictionary key from its components.
pub fn compound_key<S: AsRef<str>>(components: &[S]) -> String {
    components
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<&str>>()
        .join(COMPOUND_KEY_DELIMITER)
}

/// Splits a compound dictionary key into its components. Returns `None` for a plain key.
pub fn split_compound_key(key: &str) -> Option<Vec<&str>> {
    if key.contains(COMPOUND_KEY_DELIMITER) {
        Some(key.split(COMPOUND_KEY_DELIMITER).collect())
    } else {
        None
    }
}

/// An enum representing the supported element types of a box space.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Bool,
}

/// Implements Display for DType to format the enum as a string.
impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Byte => write!(f, "Byte"),
            DType::Short => write!(f, "Short"),
            DType::Int => write!(f, "Int"),
            DType::Long => write!(f, "Long"),
            DType::Float => write!(f, "Float"),
            DType::Double => write!(f, "Double"),
            DType::Bool => write!(f, "Bool"),
        }
    }
}

impl DType {
    pub fn is_float(&self) -> bool {
        matches!(self, DType::Float | DType::Double)
    }

    /// The element type a rescaled box keeps: itself for float types, `Float` otherwise.
    pub fn float_type(&self) -> DType {
        if self.is_float() { *self } else { DType::Float }
    }

    /// Rounds `value` to what this element type can hold.
    pub fn cast(&self, value: f64) -> f64 {
        match self {
            DType::Float => value as f32 as f64,
            DType::Double => value,
            DType::Bool => {
                if value != 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            DType::Byte | DType::Short | DType::Int | DType::Long => value.trunc(),
        }
    }
}

/// The kind tag of a [Space] node, used for dispatch diagnostics.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceKind {
    Dict,
    Tuple,
    Box,
    Discrete,
    MultiBinary,
    MultiDiscrete,
    Repeated,
}

impl fmt::Display for SpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpaceKind::Dict => "Dict",
            SpaceKind::Tuple => "Tuple",
            SpaceKind::Box => "Box",
            SpaceKind::Discrete => "Discrete",
            SpaceKind::MultiBinary => "MultiBinary",
            SpaceKind::MultiDiscrete => "MultiDiscrete",
            SpaceKind::Repeated => "Repeated",
        };
        write!(f, "{}", name)
    }
}

/// A continuous (or integer-valued) space with elementwise lower and upper bounds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BoxSpace {
    pub low: ArrayD<f64>,
    pub high: ArrayD<f64>,
    pub dtype: DType,
}

impl BoxSpace {
    /// Creates a new box, checking that both bounds share a shape and that `low <= high`
    /// everywhere.
    pub fn new(low: ArrayD<f64>, high: ArrayD<f64>, dtype: DType) -> Result<Self, SpaceError> {
        if low.shape() != high.shape() {
            return Err(SpaceError::InvalidSpace(format!(
                "box bounds have different shapes: low {:?}, high {:?}",
                low.shape(),
                high.shape()
            )));
        }
        if low
            .iter()
            .zip(high.iter())
            .any(|(l, h)| l.is_nan() || h.is_nan() || l > h)
        {
            return Err(SpaceError::InvalidSpace(format!(
                "box lower bounds must not exceed upper bounds: low {}, high {}",
                low, high
            )));
        }
        if !dtype.is_float()
            && low
                .iter()
                .zip(high.iter())
                .any(|(l, h)| l.ceil() > h.floor())
        {
            return Err(SpaceError::InvalidSpace(format!(
                "{} box holds no integer between low {} and high {}",
                dtype, low, high
            )));
        }
        Ok(Self { low, high, dtype })
    }

    /// Creates a box of the given shape where every element shares the same bounds.
    pub fn uniform(shape: &[usize], low: f64, high: f64, dtype: DType) -> Result<Self, SpaceError> {
        Self::new(
            ArrayD::from_elem(IxDyn(shape), low),
            ArrayD::from_elem(IxDyn(shape), high),
            dtype,
        )
    }

    /// Creates a one dimensional box from per-element bounds.
    pub fn from_bounds(low: Vec<f64>, high: Vec<f64>, dtype: DType) -> Result<Self, SpaceError> {
        let low_len = low.len();
        let high_len = high.len();
        Self::new(
            ArrayD::from_shape_vec(IxDyn(&[low_len]), low)
                .map_err(|e| SpaceError::InvalidSpace(e.to_string()))?,
            ArrayD::from_shape_vec(IxDyn(&[high_len]), high)
                .map_err(|e| SpaceError::InvalidSpace(e.to_string()))?,
            dtype,
        )
    }

    pub fn shape(&self) -> &[usize] {
        self.low.shape()
    }

    /// Number of scalar elements in a sample of this box.
    pub fn size(&self) -> usize {
        self.low.len()
    }

    /// True when every element is bounded on both sides.
    pub fn is_bounded(&self) -> bool {
        self.low.iter().all(|l| l.is_finite()) && self.high.iter().all(|h| h.is_finite())
    }

    pub fn sample(&self, rng: &mut Randomness) -> Sample {
        let values: Vec<f64> = self
            .low
            .iter()
            .zip(self.high.iter())
            .map(|(&l, &h)| self.sample_element(l, h, rng))
            .collect();
        // shapes come from `low`, so the element count always matches
        let array = ArrayD::from_shape_vec(self.low.raw_dim(), values)
            .unwrap_or_else(|_| ArrayD::zeros(self.low.raw_dim()));
        Sample::Array(array)
    }

    fn sample_element(&self, low: f64, high: f64, rng: &mut Randomness) -> f64 {
        let (low, high) = if self.dtype.is_float() {
            (low, high)
        } else {
            (low.ceil(), high.floor())
        };
        let value = match (low.is_finite(), high.is_finite()) {
            (true, true) => {
                if self.dtype.is_float() && (high - low).is_finite() {
                    rng.gen_range(low..=high)
                } else if self.dtype.is_float() {
                    // the width overflows f64, so interpolate instead
                    let t: f64 = rng.gen_range(0.0..=1.0);
                    low * (1.0 - t) + high * t
                } else {
                    rng.gen_range(low as i64..=high as i64) as f64
                }
            }
            (true, false) => low + Distribution::<f64>::sample(&Exp1, rng),
            (false, true) => high - Distribution::<f64>::sample(&Exp1, rng),
            (false, false) => Distribution::<f64>::sample(&StandardNormal, rng),
        };
        let value = if self.dtype.is_float() { value } else { value.floor() };
        self.dtype.cast(value)
    }

    pub fn contains(&self, sample: &Sample) -> bool {
        let values: ArrayD<f64> = match sample {
            Sample::Array(array) => {
                if array.shape() != self.shape() {
                    return false;
                }
                array.clone()
            }
            Sample::Sequence(values) => {
                if self.shape() != [values.len()] {
                    return false;
                }
                ArrayD::from_shape_vec(IxDyn(&[values.len()]), values.clone())
                    .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[0])))
            }
            Sample::Float(value) => {
                if self.size() != 1 {
                    return false;
                }
                ArrayD::from_elem(IxDyn(&[]), *value)
            }
            _ => return false,
        };

        values
            .iter()
            .zip(self.low.iter().zip(self.high.iter()))
            .all(|(&v, (&l, &h))| {
                !v.is_nan() && v >= l && v <= h && (self.dtype.is_float() || v.fract() == 0.0)
            })
    }
}

/// A space of integers in `0..n`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DiscreteSpace {
    pub n: u64,
}

impl DiscreteSpace {
    pub fn new(n: u64) -> Result<Self, SpaceError> {
        if n == 0 {
            return Err(SpaceError::InvalidSpace(
                "discrete space must have at least one value".to_string(),
            ));
        }
        Ok(Self { n })
    }

    pub fn sample(&self, rng: &mut Randomness) -> Sample {
        Sample::Int(rng.gen_range(0..self.n) as i64)
    }

    pub fn contains(&self, sample: &Sample) -> bool {
        let value: f64 = match sample {
            Sample::Int(value) => *value as f64,
            Sample::Array(array) if array.len() == 1 && array.ndim() <= 1 => {
                match array.iter().next() {
                    Some(value) => *value,
                    None => return false,
                }
            }
            _ => return false,
        };
        value.fract() == 0.0 && value >= 0.0 && value < self.n as f64
    }
}

/// A fixed-length vector of binary values.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MultiBinarySpace {
    pub n: usize,
}

impl MultiBinarySpace {
    pub fn new(n: usize) -> Self {
        Self { n }
    }

    pub fn sample(&self, rng: &mut Randomness) -> Sample {
        let values: Vec<f64> = (0..self.n).map(|_| rng.gen_range(0..=1) as f64).collect();
        Sample::Array(ArrayD::from_shape_vec(IxDyn(&[self.n]), values).unwrap_or_else(|_| {
            ArrayD::zeros(IxDyn(&[self.n]))
        }))
    }

    pub fn contains(&self, sample: &Sample) -> bool {
        match sample.to_array() {
            Some(values) if values.len() == self.n && values.ndim() <= 1 => {
                values.iter().all(|&v| v == 0.0 || v == 1.0)
            }
            _ => false,
        }
    }
}

/// A fixed-length vector of discrete values, each with its own cardinality.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MultiDiscreteSpace {
    pub nvec: Vec<u64>,
}

impl MultiDiscreteSpace {
    pub fn new(nvec: Vec<u64>) -> Result<Self, SpaceError> {
        if nvec.iter().any(|&n| n == 0) {
            return Err(SpaceError::InvalidSpace(format!(
                "multi-discrete cardinalities must be positive: {:?}",
                nvec
            )));
        }
        Ok(Self { nvec })
    }

    pub fn sample(&self, rng: &mut Randomness) -> Sample {
        let values: Vec<f64> = self
            .nvec
            .iter()
            .map(|&n| rng.gen_range(0..n) as f64)
            .collect();
        let len = values.len();
        Sample::Array(
            ArrayD::from_shape_vec(IxDyn(&[len]), values)
                .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[len]))),
        )
    }

    pub fn contains(&self, sample: &Sample) -> bool {
        match sample.to_array() {
            Some(values) if values.len() == self.nvec.len() && values.ndim() <= 1 => values
                .iter()
                .zip(self.nvec.iter())
                .all(|(&v, &n)| v.fract() == 0.0 && v >= 0.0 && v < n as f64),
            _ => false,
        }
    }
}

/// A variable-length list of samples of a single child space.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RepeatedSpace {
    pub child: Box<Space>,
    pub max_len: usize,
}

/// A space description node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Space {
    Dict(BTreeMap<String, Space>),
    Tuple(Vec<Space>),
    Box(BoxSpace),
    Discrete(DiscreteSpace),
    MultiBinary(MultiBinarySpace),
    MultiDiscrete(MultiDiscreteSpace),
    Repeated(RepeatedSpace),
}

impl Space {
    pub fn dict<K: Into<String>, I: IntoIterator<Item = (K, Space)>>(spaces: I) -> Self {
        Space::Dict(spaces.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn tuple(spaces: Vec<Space>) -> Self {
        Space::Tuple(spaces)
    }

    pub fn discrete(n: u64) -> Result<Self, SpaceError> {
        Ok(Space::Discrete(DiscreteSpace::new(n)?))
    }

    pub fn multi_binary(n: usize) -> Self {
        Space::MultiBinary(MultiBinarySpace::new(n))
    }

    pub fn multi_discrete(nvec: Vec<u64>) -> Result<Self, SpaceError> {
        Ok(Space::MultiDiscrete(MultiDiscreteSpace::new(nvec)?))
    }

    pub fn repeated(child: Space, max_len: usize) -> Self {
        Space::Repeated(RepeatedSpace {
            child: Box::new(child),
            max_len,
        })
    }

    /// Shorthand for a one dimensional box.
    pub fn bounded(low: Vec<f64>, high: Vec<f64>, dtype: DType) -> Result<Self, SpaceError> {
        Ok(Space::Box(BoxSpace::from_bounds(low, high, dtype)?))
    }

    pub fn kind(&self) -> SpaceKind {
        match self {
            Space::Dict(_) => SpaceKind::Dict,
            Space::Tuple(_) => SpaceKind::Tuple,
            Space::Box(_) => SpaceKind::Box,
            Space::Discrete(_) => SpaceKind::Discrete,
            Space::MultiBinary(_) => SpaceKind::MultiBinary,
            Space::MultiDiscrete(_) => SpaceKind::MultiDiscrete,
            Space::Repeated(_) => SpaceKind::Repeated,
        }
    }

    pub fn as_box(&self) -> Option<&BoxSpace> {
        match self {
            Space::Box(space) => Some(space),
            _ => None,
        }
    }

    /// Draws one sample from this space.
    pub fn sample(&self, rng: &mut Randomness) -> Sample {
        match self {
            Space::Dict(spaces) => Sample::Dict(
                spaces
                    .iter()
                    .map(|(key, space)| (key.clone(), space.sample(rng)))
                    .collect(),
            ),
            Space::Tuple(spaces) => {
                Sample::Tuple(spaces.iter().map(|space| space.sample(rng)).collect())
            }
            Space::Box(space) => space.sample(rng),
            Space::Discrete(space) => space.sample(rng),
            Space::MultiBinary(space) => space.sample(rng),
            Space::MultiDiscrete(space) => space.sample(rng),
            Space::Repeated(space) => {
                let len = if space.max_len == 0 {
                    0
                } else {
                    rng.gen_range(1..=space.max_len)
                };
                Sample::List((0..len).map(|_| space.child.sample(rng)).collect())
            }
        }
    }

    /// Whether `sample` is a member of this space.
    pub fn contains(&self, sample: &Sample) -> bool {
        match (self, sample) {
            (Space::Dict(spaces), Sample::Dict(values)) => {
                spaces.len() == values.len()
                    && spaces.iter().all(|(key, space)| {
                        values
                            .get(key)
                            .map(|value| space.contains(value))
                            .unwrap_or(false)
                    })
            }
            (Space::Tuple(spaces), Sample::Tuple(values)) => {
                spaces.len() == values.len()
                    && spaces
                        .iter()
                        .zip(values.iter())
                        .all(|(space, value)| space.contains(value))
            }
            (Space::Box(space), _) => space.contains(sample),
            (Space::Discrete(space), _) => space.contains(sample),
            (Space::MultiBinary(space), _) => space.contains(sample),
            (Space::MultiDiscrete(space), _) => space.contains(sample),
            (Space::Repeated(space), Sample::List(values)) => {
                values.len() <= space.max_len && values.iter().all(|v| space.child.contains(v))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Space::Dict(spaces) => {
                write!(f, "Dict(")?;
                for (idx, (key, space)) in spaces.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, space)?;
                }
                write!(f, ")")
            }
            Space::Tuple(spaces) => {
                write!(f, "Tuple(")?;
                for (idx, space) in spaces.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", space)?;
                }
                write!(f, ")")
            }
            Space::Box(space) => write!(
                f,
                "Box({:?}, {})",
                space.shape(),
                space.dtype
            ),
            Space::Discrete(space) => write!(f, "Discrete({})", space.n),
            Space::MultiBinary(space) => write!(f, "MultiBinary({})", space.n),
            Space::MultiDiscrete(space) => write!(f, "MultiDiscrete({:?})", space.nvec),
            Space::Repeated(space) => write!(f, "Repeated({}, {})", space.child, space.max_len),
        }
    }
}
