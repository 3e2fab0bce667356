//! Conversion of continuous boxes into discrete action spaces and back.
//!
//! [turn_box_into_tuple_of_discretes] replaces every box of `N` elements with a tuple of `N`
//! [Discrete](crate::types::space::Space::Discrete) spaces. A discrete action drawn from the
//! converted space is mapped back into the original box either linearly
//! ([turn_discrete_action_back_to_cont]) or through a power curve that concentrates resolution
//! around zero ([turn_discrete_action_back_to_cont_powerspace]).

use crate::space_util::iterate::{
    SpaceLike, SpaceLikeRef, iterate_over_space_likes, sample_at, space_at,
};
use crate::space_util::{SpaceError, child_path};
use crate::sys_utils::config_loader::DEFAULT_CONFIG;
use crate::types::sample::Sample;
use crate::types::space::{BoxSpace, Space};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of discrete actions given to every box element when nothing else is configured.
pub const DEFAULT_ACTIONS_PER_LEAF: u64 = 10;

/// How many discrete actions each box element receives.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ActionsPerLeaf {
    /// The same count for every element.
    Scalar(u64),
    /// One count per element, consumed in traversal order across the whole space.
    List(Vec<u64>),
    /// Counts per dictionary key.
    Map(BTreeMap<String, ActionsPerLeaf>),
}

/// The count configured under `discretization.default_actions_per_leaf`, which falls back to
/// [DEFAULT_ACTIONS_PER_LEAF].
impl Default for ActionsPerLeaf {
    fn default() -> Self {
        ActionsPerLeaf::Scalar(DEFAULT_CONFIG.get_default_actions_per_leaf())
    }
}

/// Explicit cursor over an [ActionsPerLeaf].
enum LeafCounts<'a> {
    Repeat(u64),
    Sequence { values: &'a [u64], position: usize },
    Keyed(&'a BTreeMap<String, ActionsPerLeaf>),
}

impl<'a> LeafCounts<'a> {
    fn new(actions: &'a ActionsPerLeaf) -> Self {
        match actions {
            ActionsPerLeaf::Scalar(n) => LeafCounts::Repeat(*n),
            ActionsPerLeaf::List(values) => LeafCounts::Sequence {
                values,
                position: 0,
            },
            ActionsPerLeaf::Map(map) => LeafCounts::Keyed(map),
        }
    }

    fn next(&mut self, path: &str) -> Result<u64, SpaceError> {
        match self {
            LeafCounts::Repeat(n) => Ok(*n),
            LeafCounts::Sequence { values, position } => {
                let value = values.get(*position).copied().ok_or_else(|| {
                    SpaceError::Precondition(format!(
                        "ran out of action counts at {} after {} values",
                        path,
                        values.len()
                    ))
                })?;
                *position += 1;
                Ok(value)
            }
            LeafCounts::Keyed(_) => Err(SpaceError::Precondition(format!(
                "a map of action counts cannot be applied to the box at {}",
                path
            ))),
        }
    }
}

/// Replaces every box in `space` with a tuple of discrete spaces, one per box element.
///
/// A tuple whose only child became a tuple collapses into that child. Repeated spaces are left
/// untouched.
pub fn turn_box_into_tuple_of_discretes(
    space: &Space,
    actions: &ActionsPerLeaf,
) -> Result<Space, SpaceError> {
    discretize(space, &mut LeafCounts::new(actions), "")
}

fn discretize(space: &Space, counts: &mut LeafCounts<'_>, path: &str) -> Result<Space, SpaceError> {
    match space {
        Space::Dict(spaces) => {
            let keyed = match &*counts {
                LeafCounts::Keyed(map) => Some(*map),
                _ => None,
            };
            let mut converted = BTreeMap::new();
            for (key, child) in spaces {
                let key_path = child_path(path, key);
                let child = match keyed {
                    Some(map) => {
                        let actions = map.get(key).ok_or_else(|| {
                            SpaceError::Precondition(format!(
                                "no action counts were given for {}",
                                key_path
                            ))
                        })?;
                        discretize(child, &mut LeafCounts::new(actions), &key_path)?
                    }
                    None => discretize(child, counts, &key_path)?,
                };
                converted.insert(key.clone(), child);
            }
            Ok(Space::Dict(converted))
        }
        Space::Tuple(spaces) => {
            let mut converted = spaces
                .iter()
                .enumerate()
                .map(|(idx, child)| discretize(child, counts, &child_path(path, idx)))
                .collect::<Result<Vec<_>, _>>()?;
            if converted.len() == 1 && matches!(converted[0], Space::Tuple(_)) {
                Ok(converted.remove(0))
            } else {
                Ok(Space::Tuple(converted))
            }
        }
        Space::Box(bounds) => {
            let discretes = (0..bounds.size())
                .map(|_| counts.next(path).and_then(Space::discrete))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Space::Tuple(discretes))
        }
        other => Ok(other.clone()),
    }
}

/// Cardinality of every slot of a discretized leaf.
fn cardinalities(space: &Space) -> Option<Vec<u64>> {
    match space {
        Space::Discrete(discrete) => Some(vec![discrete.n]),
        Space::MultiDiscrete(multi) => Some(multi.nvec.clone()),
        Space::Tuple(children) => children
            .iter()
            .map(|child| match child {
                Space::Discrete(discrete) => Some(discrete.n),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn flatten_values(sample: &Sample) -> Result<Vec<f64>, SpaceError> {
    match sample {
        Sample::Tuple(values) => {
            let mut flat = Vec::new();
            for value in values {
                flat.extend(flatten_values(value)?);
            }
            Ok(flat)
        }
        other => other
            .to_array()
            .map(|values| values.iter().copied().collect())
            .ok_or_else(|| {
                SpaceError::Precondition(format!(
                    "expected numeric values but found a {} sample",
                    other.type_name()
                ))
            }),
    }
}

fn broadcast<T: Copy>(values: &[T], idx: usize, what: &str, len: usize) -> Result<T, SpaceError> {
    match values.len() {
        1 => Ok(values[0]),
        n if n == len => Ok(values[idx]),
        n => Err(SpaceError::Precondition(format!(
            "{} holds {} values but {} slots were given",
            what, n, len
        ))),
    }
}

/// One slot of a discrete action: the chosen index, its cardinality and the box bounds.
struct Slot {
    action: f64,
    n: u64,
    low: f64,
    high: f64,
}

fn slots(bounds: &BoxSpace, counts: &[u64], actions: &[f64]) -> Result<Vec<Slot>, SpaceError> {
    let lows: Vec<f64> = bounds.low.iter().copied().collect();
    let highs: Vec<f64> = bounds.high.iter().copied().collect();
    let len = actions.len();
    actions
        .iter()
        .enumerate()
        .map(|(idx, &action)| {
            Ok(Slot {
                action,
                n: broadcast(counts, idx, "discrete space", len)?,
                low: broadcast(&lows, idx, "box", len)?,
                high: broadcast(&highs, idx, "box", len)?,
            })
        })
        .collect()
}

fn box_shaped(bounds: &BoxSpace, values: Vec<f64>) -> Result<Sample, SpaceError> {
    if values.len() == bounds.size() {
        ArrayD::from_shape_vec(bounds.low.raw_dim(), values)
            .map(Sample::Array)
            .map_err(|e| SpaceError::Unreachable(e.to_string()))
    } else {
        Ok(Sample::array(values))
    }
}

/// Leaf function of [turn_discrete_action_back_to_cont].
///
/// Expects `(original space, discretized space, discrete sample)`. Each slot maps linearly as
/// `k / (n - 1) * (high - low) + low`; a slot with a single action maps to the box midpoint.
pub fn turn_orig_space_box_to_cont_sample(
    space_likes: &[SpaceLikeRef<'_>],
) -> Result<SpaceLike, SpaceError> {
    let original = space_at(space_likes, 0)?;
    let discrete = space_at(space_likes, 1)?;
    let sample = sample_at(space_likes, 2)?;
    let (bounds, counts) = match (original, cardinalities(discrete)) {
        (Space::Box(bounds), Some(counts)) => (bounds, counts),
        _ => return Ok(SpaceLike::Sample(sample.clone())),
    };

    let actions = flatten_values(sample)?;
    let values: Vec<f64> = slots(bounds, &counts, &actions)?
        .into_iter()
        .map(|slot| {
            if slot.n <= 1 {
                (slot.low + slot.high) / 2.0
            } else {
                slot.action / (slot.n - 1) as f64 * (slot.high - slot.low) + slot.low
            }
        })
        .collect();
    Ok(SpaceLike::Sample(box_shaped(bounds, values)?))
}

/// Leaf function of [turn_discrete_action_back_to_cont_powerspace].
///
/// Expects `(original space, discretized space, discrete sample, exponents)`. Slots with an odd
/// number of actions map to the midpoint of their bucket. Slots with an even number of actions
/// require bounds symmetric about zero and are spread evenly over `[-high^(1/p), high^(1/p)]`
/// before being raised back to the power `p`, keeping their sign.
pub fn turn_orig_space_box_to_cont_sample_powerspace(
    space_likes: &[SpaceLikeRef<'_>],
) -> Result<SpaceLike, SpaceError> {
    let original = space_at(space_likes, 0)?;
    let discrete = space_at(space_likes, 1)?;
    let sample = sample_at(space_likes, 2)?;
    let pow_n = sample_at(space_likes, 3)?;
    let (bounds, counts) = match (original, cardinalities(discrete)) {
        (Space::Box(bounds), Some(counts)) => (bounds, counts),
        _ => return Ok(SpaceLike::Sample(sample.clone())),
    };

    let actions = flatten_values(sample)?;
    let exponents = flatten_values(pow_n)?;
    let len = actions.len();
    let mut values: Vec<f64> = Vec::with_capacity(len);
    for (idx, slot) in slots(bounds, &counts, &actions)?.into_iter().enumerate() {
        let exponent = broadcast(&exponents, idx, "exponent", len)?;
        if slot.low > slot.high {
            return Err(SpaceError::Precondition(format!(
                "lower bound {} exceeds upper bound {}",
                slot.low, slot.high
            )));
        }
        if exponent <= 0.0 {
            return Err(SpaceError::Precondition(format!(
                "the power used to stretch the discrete space must be greater than zero, got {}",
                exponent
            )));
        }
        if slot.n % 2 == 1 {
            let step = (slot.high - slot.low) / slot.n as f64;
            values.push(slot.low + (slot.action + 0.5) * step);
            continue;
        }
        if -slot.low != slot.high {
            return Err(SpaceError::Precondition(format!(
                "an even number of actions needs bounds symmetric about zero, got [{}, {}]",
                slot.low, slot.high
            )));
        }
        let p_high = slot.high.powf(1.0 / exponent);
        let p_low = -p_high;
        let x = slot.action / (slot.n - 1) as f64 * (p_high - p_low) + p_low;
        values.push(x.abs().powf(exponent) * x.signum());
    }
    Ok(SpaceLike::Sample(box_shaped(bounds, values)?))
}

/// Maps a sample of a discretized space back into the continuous `original_space`.
pub fn turn_discrete_action_back_to_cont(
    original_space: &Space,
    discrete_only_space: &Space,
    space_sample: &Sample,
) -> Result<Sample, SpaceError> {
    iterate_over_space_likes(
        turn_orig_space_box_to_cont_sample,
        &[
            SpaceLikeRef::Space(original_space),
            SpaceLikeRef::Space(discrete_only_space),
            SpaceLikeRef::Sample(space_sample),
        ],
        false,
    )?
    .into_sample()
}

/// Power-curve variant of [turn_discrete_action_back_to_cont]. `pow_n` is a tree of exponents
/// aligned with `original_space`.
pub fn turn_discrete_action_back_to_cont_powerspace(
    original_space: &Space,
    discrete_only_space: &Space,
    space_sample: &Sample,
    pow_n: &Sample,
) -> Result<Sample, SpaceError> {
    iterate_over_space_likes(
        turn_orig_space_box_to_cont_sample_powerspace,
        &[
            SpaceLikeRef::Space(original_space),
            SpaceLikeRef::Space(discrete_only_space),
            SpaceLikeRef::Sample(space_sample),
            SpaceLikeRef::Sample(pow_n),
        ],
        false,
    )?
    .into_sample()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::space::DType;

    #[test]
    fn list_counts_are_consumed_across_keys() {
        let space = Space::dict([
            (
                "a",
                Space::bounded(vec![0.0, 0.0], vec![1.0, 1.0], DType::Float).unwrap(),
            ),
            (
                "b",
                Space::bounded(vec![0.0], vec![1.0], DType::Float).unwrap(),
            ),
        ]);
        let converted =
            turn_box_into_tuple_of_discretes(&space, &ActionsPerLeaf::List(vec![3, 5, 7]))
                .unwrap();
        assert_eq!(
            converted,
            Space::dict([
                (
                    "a",
                    Space::tuple(vec![
                        Space::discrete(3).unwrap(),
                        Space::discrete(5).unwrap()
                    ])
                ),
                ("b", Space::tuple(vec![Space::discrete(7).unwrap()])),
            ])
        );

        let err = turn_box_into_tuple_of_discretes(&space, &ActionsPerLeaf::List(vec![3, 5]))
            .unwrap_err();
        assert!(matches!(err, SpaceError::Precondition(_)));
    }

    #[test]
    fn default_counts_come_from_the_loaded_config() {
        let configured = DEFAULT_CONFIG.get_default_actions_per_leaf();
        assert_eq!(ActionsPerLeaf::default(), ActionsPerLeaf::Scalar(configured));

        let space = Space::bounded(vec![0.0, 0.0], vec![1.0, 1.0], DType::Float).unwrap();
        let converted = turn_box_into_tuple_of_discretes(&space, &ActionsPerLeaf::default()).unwrap();
        assert_eq!(
            converted,
            Space::tuple(vec![
                Space::discrete(configured).unwrap(),
                Space::discrete(configured).unwrap()
            ])
        );
    }

    #[test]
    fn single_tuple_child_collapses() {
        let space = Space::tuple(vec![
            Space::bounded(vec![0.0, 0.0], vec![1.0, 1.0], DType::Float).unwrap(),
        ]);
        let converted = turn_box_into_tuple_of_discretes(&space, &ActionsPerLeaf::Scalar(4)).unwrap();
        assert_eq!(
            converted,
            Space::tuple(vec![Space::discrete(4).unwrap(), Space::discrete(4).unwrap()])
        );
    }

    #[test]
    fn map_counts_follow_keys() {
        let space = Space::dict([
            (
                "a",
                Space::bounded(vec![0.0], vec![1.0], DType::Float).unwrap(),
            ),
            ("b", Space::discrete(2).unwrap()),
        ]);
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), ActionsPerLeaf::Scalar(9));
        map.insert("b".to_string(), ActionsPerLeaf::Scalar(1));
        let converted = turn_box_into_tuple_of_discretes(&space, &ActionsPerLeaf::Map(map)).unwrap();
        assert_eq!(
            converted,
            Space::dict([
                ("a", Space::tuple(vec![Space::discrete(9).unwrap()])),
                ("b", Space::discrete(2).unwrap()),
            ])
        );

        let mut missing = BTreeMap::new();
        missing.insert("a".to_string(), ActionsPerLeaf::Scalar(9));
        assert!(turn_box_into_tuple_of_discretes(&space, &ActionsPerLeaf::Map(missing)).is_err());
    }

    #[test]
    fn odd_power_slots_use_bucket_midpoints() {
        let original = Space::bounded(vec![-1.0], vec![1.0], DType::Float).unwrap();
        let discrete = Space::discrete(3).unwrap();
        let values: Vec<f64> = (0..3)
            .map(|k| {
                let out = turn_discrete_action_back_to_cont_powerspace(
                    &original,
                    &discrete,
                    &Sample::Int(k),
                    &Sample::Float(2.0),
                )
                .unwrap();
                out.to_array().unwrap().iter().copied().next().unwrap()
            })
            .collect();
        assert!((values[0] + 2.0 / 3.0).abs() < 1e-12);
        assert!(values[1].abs() < 1e-12);
        assert!((values[2] - 2.0 / 3.0).abs() < 1e-12);
    }
}
