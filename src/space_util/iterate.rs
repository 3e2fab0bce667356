//! The traversal primitive behind every space transform.
//!
//! [iterate_over_space_likes] walks one or more aligned trees of spaces and/or samples, rebuilding
//! their containers and handing every leaf position to a caller-supplied closure.

use crate::space_util::{SpaceError, child_path};
use crate::types::sample::Sample;
use crate::types::space::Space;
use std::collections::BTreeMap;

/// A borrowed space or sample node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpaceLikeRef<'a> {
    Space(&'a Space),
    Sample(&'a Sample),
}

/// An owned space or sample node, as produced by a traversal.
#[derive(Debug, Clone, PartialEq)]
pub enum SpaceLike {
    Space(Space),
    Sample(Sample),
}

impl<'a> From<&'a Space> for SpaceLikeRef<'a> {
    fn from(space: &'a Space) -> Self {
        SpaceLikeRef::Space(space)
    }
}

impl<'a> From<&'a Sample> for SpaceLikeRef<'a> {
    fn from(sample: &'a Sample) -> Self {
        SpaceLikeRef::Sample(sample)
    }
}

impl<'a> SpaceLikeRef<'a> {
    pub fn as_space(&self) -> Option<&'a Space> {
        match *self {
            SpaceLikeRef::Space(space) => Some(space),
            SpaceLikeRef::Sample(_) => None,
        }
    }

    pub fn as_sample(&self) -> Option<&'a Sample> {
        match *self {
            SpaceLikeRef::Sample(sample) => Some(sample),
            SpaceLikeRef::Space(_) => None,
        }
    }

    pub fn to_space_like(&self) -> SpaceLike {
        match *self {
            SpaceLikeRef::Space(space) => SpaceLike::Space(space.clone()),
            SpaceLikeRef::Sample(sample) => SpaceLike::Sample(sample.clone()),
        }
    }

    fn describe(&self) -> String {
        match *self {
            SpaceLikeRef::Space(space) => format!("{} space", space.kind()),
            SpaceLikeRef::Sample(sample) => format!("{} sample", sample.type_name()),
        }
    }

    fn dict_child(&self, key: &str, path: &str) -> Result<SpaceLikeRef<'a>, SpaceError> {
        let child = match *self {
            SpaceLikeRef::Space(Space::Dict(spaces)) => spaces.get(key).map(SpaceLikeRef::Space),
            SpaceLikeRef::Sample(Sample::Dict(samples)) => {
                samples.get(key).map(SpaceLikeRef::Sample)
            }
            _ => {
                return Err(SpaceError::Precondition(format!(
                    "expected a dictionary at {} but found a {}",
                    path,
                    self.describe()
                )));
            }
        };
        child.ok_or_else(|| SpaceError::Precondition(format!("key {} is missing at {}", key, path)))
    }

    fn tuple_children(&self, path: &str) -> Result<Vec<SpaceLikeRef<'a>>, SpaceError> {
        match *self {
            SpaceLikeRef::Space(Space::Tuple(spaces)) => {
                Ok(spaces.iter().map(SpaceLikeRef::Space).collect())
            }
            SpaceLikeRef::Sample(Sample::Tuple(samples)) => {
                Ok(samples.iter().map(SpaceLikeRef::Sample).collect())
            }
            _ => Err(SpaceError::Precondition(format!(
                "expected a tuple at {} but found a {}",
                path,
                self.describe()
            ))),
        }
    }
}

impl SpaceLike {
    pub fn as_view(&self) -> SpaceLikeRef<'_> {
        match self {
            SpaceLike::Space(space) => SpaceLikeRef::Space(space),
            SpaceLike::Sample(sample) => SpaceLikeRef::Sample(sample),
        }
    }

    pub fn into_space(self) -> Result<Space, SpaceError> {
        match self {
            SpaceLike::Space(space) => Ok(space),
            SpaceLike::Sample(sample) => Err(SpaceError::Unreachable(format!(
                "expected a space but a {} sample was produced",
                sample.type_name()
            ))),
        }
    }

    pub fn into_sample(self) -> Result<Sample, SpaceError> {
        match self {
            SpaceLike::Sample(sample) => Ok(sample),
            SpaceLike::Space(space) => Err(SpaceError::Unreachable(format!(
                "expected a sample but a {} space was produced",
                space.kind()
            ))),
        }
    }
}

/// Applies `func` to every leaf position of the aligned trees in `space_likes`.
///
/// Dispatch happens on the first tree:
/// * dictionaries recurse per key of the first tree,
/// * tuples recurse by position,
/// * a repeated space recurses into every element of the list held by the second tree (paired
///   with the child space only), or into the child space alone when no other tree is supplied,
/// * anything else is a leaf and is passed to `func` as is.
///
/// Rebuilt containers are spaces when `return_space` is set and samples otherwise.
pub fn iterate_over_space_likes<F>(
    mut func: F,
    space_likes: &[SpaceLikeRef<'_>],
    return_space: bool,
) -> Result<SpaceLike, SpaceError>
where
    F: FnMut(&[SpaceLikeRef<'_>]) -> Result<SpaceLike, SpaceError>,
{
    iterate(&mut func, space_likes, return_space, "")
}

fn iterate<F>(
    func: &mut F,
    space_likes: &[SpaceLikeRef<'_>],
    return_space: bool,
    path: &str,
) -> Result<SpaceLike, SpaceError>
where
    F: FnMut(&[SpaceLikeRef<'_>]) -> Result<SpaceLike, SpaceError>,
{
    let first = match space_likes.first() {
        Some(first) => *first,
        None => {
            return Err(SpaceError::Precondition(format!(
                "no space likes were supplied at {}",
                path
            )));
        }
    };

    match first {
        SpaceLikeRef::Space(Space::Dict(_)) | SpaceLikeRef::Sample(Sample::Dict(_)) => {
            let keys: Vec<&String> = match first {
                SpaceLikeRef::Space(Space::Dict(spaces)) => spaces.keys().collect(),
                SpaceLikeRef::Sample(Sample::Dict(samples)) => samples.keys().collect(),
                _ => return Err(SpaceError::Unreachable("dictionary dispatch".to_string())),
            };
            let mut rebuilt: BTreeMap<String, SpaceLike> = BTreeMap::new();
            for key in keys {
                let key_path = child_path(path, key);
                let children = space_likes
                    .iter()
                    .map(|space_like| space_like.dict_child(key, &key_path))
                    .collect::<Result<Vec<_>, _>>()?;
                rebuilt.insert(
                    key.clone(),
                    iterate(func, &children, return_space, &key_path)?,
                );
            }
            if return_space {
                let spaces = rebuilt
                    .into_iter()
                    .map(|(key, child)| Ok((key, child.into_space()?)))
                    .collect::<Result<BTreeMap<_, _>, SpaceError>>()?;
                Ok(SpaceLike::Space(Space::Dict(spaces)))
            } else {
                let samples = rebuilt
                    .into_iter()
                    .map(|(key, child)| Ok((key, child.into_sample()?)))
                    .collect::<Result<BTreeMap<_, _>, SpaceError>>()?;
                Ok(SpaceLike::Sample(Sample::Dict(samples)))
            }
        }
        SpaceLikeRef::Space(Space::Tuple(_)) | SpaceLikeRef::Sample(Sample::Tuple(_)) => {
            let columns = space_likes
                .iter()
                .map(|space_like| space_like.tuple_children(path))
                .collect::<Result<Vec<_>, _>>()?;
            let arity = columns[0].len();
            if let Some(column) = columns.iter().find(|column| column.len() != arity) {
                return Err(SpaceError::Precondition(format!(
                    "tuple lengths differ at {}: {} and {}",
                    path,
                    arity,
                    column.len()
                )));
            }
            let mut rebuilt: Vec<SpaceLike> = Vec::with_capacity(arity);
            for idx in 0..arity {
                let children: Vec<SpaceLikeRef<'_>> =
                    columns.iter().map(|column| column[idx]).collect();
                rebuilt.push(iterate(
                    func,
                    &children,
                    return_space,
                    &child_path(path, idx),
                )?);
            }
            if return_space {
                let spaces = rebuilt
                    .into_iter()
                    .map(SpaceLike::into_space)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SpaceLike::Space(Space::Tuple(spaces)))
            } else {
                let samples = rebuilt
                    .into_iter()
                    .map(SpaceLike::into_sample)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SpaceLike::Sample(Sample::Tuple(samples)))
            }
        }
        SpaceLikeRef::Space(Space::Repeated(repeated)) => {
            if space_likes.len() > 1 {
                let elements = match space_likes[1] {
                    SpaceLikeRef::Sample(Sample::List(elements)) => elements,
                    other => {
                        return Err(SpaceError::Precondition(format!(
                            "expected a list of samples at {} but found a {}",
                            path,
                            other.describe()
                        )));
                    }
                };
                let mut rebuilt: Vec<Sample> = Vec::with_capacity(elements.len());
                for (idx, element) in elements.iter().enumerate() {
                    let pair = [
                        SpaceLikeRef::Space(&repeated.child),
                        SpaceLikeRef::Sample(element),
                    ];
                    rebuilt.push(
                        iterate(func, &pair, return_space, &child_path(path, idx))?
                            .into_sample()?,
                    );
                }
                Ok(SpaceLike::Sample(Sample::List(rebuilt)))
            } else {
                let child = iterate(
                    func,
                    &[SpaceLikeRef::Space(&repeated.child)],
                    return_space,
                    path,
                )?
                .into_space()?;
                Ok(SpaceLike::Space(Space::repeated(child, repeated.max_len)))
            }
        }
        _ => func(space_likes),
    }
}

/// The space at position `idx` of a leaf call.
pub(crate) fn space_at<'a>(
    space_likes: &[SpaceLikeRef<'a>],
    idx: usize,
) -> Result<&'a Space, SpaceError> {
    space_likes
        .get(idx)
        .and_then(|space_like| space_like.as_space())
        .ok_or_else(|| SpaceError::Precondition(format!("expected a space at argument {}", idx)))
}

/// The sample at position `idx` of a leaf call.
pub(crate) fn sample_at<'a>(
    space_likes: &[SpaceLikeRef<'a>],
    idx: usize,
) -> Result<&'a Sample, SpaceError> {
    space_likes
        .get(idx)
        .and_then(|space_like| space_like.as_sample())
        .ok_or_else(|| SpaceError::Precondition(format!("expected a sample at argument {}", idx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::space::DType;

    #[test]
    fn leaves_receive_every_aligned_tree() {
        let space = Space::dict([
            ("a", Space::discrete(2).unwrap()),
            ("b", Space::tuple(vec![Space::discrete(3).unwrap()])),
        ]);
        let first = Sample::dict([("a", Sample::Int(1)), ("b", Sample::Tuple(vec![Sample::Int(2)]))]);
        let mut calls = 0;
        let out = iterate_over_space_likes(
            |likes| {
                calls += 1;
                assert_eq!(likes.len(), 2);
                Ok(likes[1].to_space_like())
            },
            &[SpaceLikeRef::from(&space), SpaceLikeRef::from(&first)],
            false,
        )
        .unwrap();
        assert_eq!(calls, 2);
        assert_eq!(out, SpaceLike::Sample(first));
    }

    #[test]
    fn repeated_space_is_rebuilt_around_its_child() {
        let child = Space::bounded(vec![0.0], vec![1.0], DType::Float).unwrap();
        let space = Space::repeated(child.clone(), 5);
        let out = iterate_over_space_likes(
            |likes| Ok(likes[0].to_space_like()),
            &[SpaceLikeRef::from(&space)],
            true,
        )
        .unwrap();
        assert_eq!(out, SpaceLike::Space(Space::repeated(child, 5)));
    }

    #[test]
    fn repeated_samples_pair_with_the_child_only() {
        let space = Space::repeated(Space::discrete(4).unwrap(), 3);
        let samples = Sample::List(vec![Sample::Int(0), Sample::Int(3)]);
        let other = Sample::Float(1.0);
        let out = iterate_over_space_likes(
            |likes| {
                assert_eq!(likes.len(), 2);
                Ok(likes[1].to_space_like())
            },
            &[
                SpaceLikeRef::from(&space),
                SpaceLikeRef::from(&samples),
                SpaceLikeRef::from(&other),
            ],
            false,
        )
        .unwrap();
        assert_eq!(out, SpaceLike::Sample(samples));
    }

    #[test]
    fn misaligned_trees_are_reported() {
        let space = Space::dict([("a", Space::discrete(2).unwrap())]);
        let sample = Sample::dict([("b", Sample::Int(1))]);
        let err = iterate_over_space_likes(
            |likes| Ok(likes[0].to_space_like()),
            &[SpaceLikeRef::from(&space), SpaceLikeRef::from(&sample)],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, SpaceError::Precondition(msg) if msg.contains("[a]")));
    }
}
