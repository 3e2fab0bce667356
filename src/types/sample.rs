//! Sample instances of a [Space](crate::types::space::Space).
//!
//! A [Sample] mirrors the nesting of the space it was drawn from. Leaf samples carry their
//! numeric payload as an `ndarray` array, a plain list of numbers, or a scalar; the transform
//! engine keeps whichever representation the caller handed in.

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Sample {
    Dict(BTreeMap<String, Sample>),
    Tuple(Vec<Sample>),
    Array(ArrayD<f64>),
    Sequence(Vec<f64>),
    Float(f64),
    Int(i64),
    /// Elements of a repeated space.
    List(Vec<Sample>),
}

impl Sample {
    pub fn dict<K: Into<String>, I: IntoIterator<Item = (K, Sample)>>(samples: I) -> Self {
        Sample::Dict(samples.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// A one dimensional array sample.
    pub fn array(values: Vec<f64>) -> Self {
        let len = values.len();
        Sample::Array(
            ArrayD::from_shape_vec(IxDyn(&[len]), values)
                .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[len]))),
        )
    }

    /// Name of the variant, used in mismatch diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Sample::Dict(_) => "Dict",
            Sample::Tuple(_) => "Tuple",
            Sample::Array(_) => "Array",
            Sample::Sequence(_) => "Sequence",
            Sample::Float(_) => "Float",
            Sample::Int(_) => "Int",
            Sample::List(_) => "List",
        }
    }

    /// Element type of a numeric leaf, if it has one.
    pub fn dtype(&self) -> Option<&'static str> {
        match self {
            Sample::Array(_) | Sample::Float(_) => Some("float64"),
            Sample::Int(_) => Some("int64"),
            _ => None,
        }
    }

    /// Numeric view of a leaf sample. Containers return `None`.
    pub fn to_array(&self) -> Option<ArrayD<f64>> {
        match self {
            Sample::Array(array) => Some(array.clone()),
            Sample::Sequence(values) => {
                ArrayD::from_shape_vec(IxDyn(&[values.len()]), values.clone()).ok()
            }
            Sample::Float(value) => Some(ArrayD::from_elem(IxDyn(&[]), *value)),
            Sample::Int(value) => Some(ArrayD::from_elem(IxDyn(&[]), *value as f64)),
            _ => None,
        }
    }

    /// Wraps `values` in the same leaf representation as `self`.
    ///
    /// Scalars stay scalars only while `values` holds a single element.
    pub fn rebuild_like(&self, values: ArrayD<f64>) -> Sample {
        match self {
            Sample::Sequence(_) => Sample::Sequence(values.iter().copied().collect()),
            Sample::Float(_) if values.len() == 1 => {
                Sample::Float(values.iter().next().copied().unwrap_or_default())
            }
            Sample::Int(_) if values.len() == 1 => {
                Sample::Int(values.iter().next().copied().unwrap_or_default() as i64)
            }
            _ => Sample::Array(values),
        }
    }

    /// Number of entries in the first dimension of this sample.
    pub fn len(&self) -> usize {
        match self {
            Sample::Dict(values) => values.len(),
            Sample::Tuple(values) | Sample::List(values) => values.len(),
            Sample::Array(array) => match array.ndim() {
                0 => 1,
                _ => array.shape()[0],
            },
            Sample::Sequence(values) => values.len(),
            Sample::Float(_) | Sample::Int(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Applies `f` elementwise over two numeric arrays.
///
/// Arrays of equal shape or equal element count are zipped (the result takes `a`'s shape); a
/// single-element array is broadcast against the other. Returns `None` otherwise.
pub(crate) fn zip_with<F: Fn(f64, f64) -> f64>(
    a: &ArrayD<f64>,
    b: &ArrayD<f64>,
    f: F,
) -> Option<ArrayD<f64>> {
    if a.shape() == b.shape() {
        let mut out = a.clone();
        out.zip_mut_with(b, |x, &y| *x = f(*x, y));
        Some(out)
    } else if a.len() == b.len() {
        let values: Vec<f64> = a.iter().zip(b.iter()).map(|(&x, &y)| f(x, y)).collect();
        ArrayD::from_shape_vec(a.raw_dim(), values).ok()
    } else if b.len() == 1 {
        let y = *b.iter().next()?;
        Some(a.mapv(|x| f(x, y)))
    } else if a.len() == 1 {
        let x = *a.iter().next()?;
        Some(b.mapv(|y| f(x, y)))
    } else {
        None
    }
}
