//! Structural sanity checks of a sample against its space.

use crate::space_util::{MismatchPolicy, SpaceError, child_path};
use crate::types::sample::Sample;
use crate::types::space::{Space, SpaceKind};

/// Shallow membership check: fails unless `space` contains `sample`.
pub fn sanity_check_space_sample(space: &Space, sample: &Sample) -> Result<(), SpaceError> {
    if !space.contains(sample) {
        return Err(SpaceError::StructuralMismatch {
            path: String::new(),
            expected_kind: space.kind(),
            actual_type: sample.type_name().to_string(),
            detail: format!("sample of {:?} does not meet space {} setup", sample, space),
        });
    }
    Ok(())
}

/// Recursively checks that `sample` conforms to `space`, naming the exact path that failed.
///
/// Sample dictionary keys unknown to the space are rejected.
pub fn deep_sanity_check_space_sample(space: &Space, sample: &Sample) -> Result<(), SpaceError> {
    deep_sanity_check_space_sample_with(space, sample, MismatchPolicy::Strict)
}

/// Same as [deep_sanity_check_space_sample], with `policy` deciding whether sample dictionary
/// keys unknown to the space are an error.
pub fn deep_sanity_check_space_sample_with(
    space: &Space,
    sample: &Sample,
    policy: MismatchPolicy,
) -> Result<(), SpaceError> {
    check(space, sample, "", policy)
}

fn mismatch(path: &str, space: &Space, sample: &Sample, detail: String) -> SpaceError {
    SpaceError::StructuralMismatch {
        path: path.to_string(),
        expected_kind: space.kind(),
        actual_type: sample.type_name().to_string(),
        detail,
    }
}

fn check(
    space: &Space,
    sample: &Sample,
    path: &str,
    policy: MismatchPolicy,
) -> Result<(), SpaceError> {
    match space {
        Space::Dict(spaces) => {
            let values = match sample {
                Sample::Dict(values) => values,
                other => {
                    return Err(mismatch(
                        path,
                        space,
                        other,
                        "expected a dictionary sample".to_string(),
                    ));
                }
            };
            for (key, child) in spaces {
                let key_path = child_path(path, key);
                match values.get(key) {
                    Some(value) => check(child, value, &key_path, policy)?,
                    None => {
                        return Err(SpaceError::StructuralMismatch {
                            path: key_path,
                            expected_kind: child.kind(),
                            actual_type: "missing".to_string(),
                            detail: format!("key {} is missing from the sample", key),
                        });
                    }
                }
            }
            if policy == MismatchPolicy::Strict {
                if let Some((key, value)) = values.iter().find(|(k, _)| !spaces.contains_key(*k)) {
                    return Err(SpaceError::StructuralMismatch {
                        path: child_path(path, key),
                        expected_kind: SpaceKind::Dict,
                        actual_type: value.type_name().to_string(),
                        detail: format!("key {} is not part of the dictionary space", key),
                    });
                }
            }
            Ok(())
        }
        Space::Tuple(spaces) => {
            let values = match sample {
                Sample::Tuple(values) => values,
                other => {
                    return Err(mismatch(
                        path,
                        space,
                        other,
                        "expected a tuple sample".to_string(),
                    ));
                }
            };
            if values.len() != spaces.len() {
                return Err(mismatch(
                    path,
                    space,
                    sample,
                    format!(
                        "tuple space has {} entries but the sample has {}",
                        spaces.len(),
                        values.len()
                    ),
                ));
            }
            for (idx, (child, value)) in spaces.iter().zip(values.iter()).enumerate() {
                check(child, value, &child_path(path, idx), policy)?;
            }
            Ok(())
        }
        Space::Discrete(discrete) => {
            if !matches!(sample, Sample::Int(_) | Sample::Array(_)) {
                return Err(mismatch(
                    path,
                    space,
                    sample,
                    "expected an integer or array sample".to_string(),
                ));
            }
            if !discrete.contains(sample) {
                return Err(mismatch(
                    path,
                    space,
                    sample,
                    format!(
                        "sample{} has value of {:?} however space{} has space definition of {} {}",
                        path, sample, path, space, discrete.n
                    ),
                ));
            }
            Ok(())
        }
        Space::Box(bounds) => {
            if !matches!(
                sample,
                Sample::Array(_) | Sample::Sequence(_) | Sample::Float(_)
            ) {
                return Err(mismatch(
                    path,
                    space,
                    sample,
                    "expected an array, sequence or float sample".to_string(),
                ));
            }
            if !bounds.contains(sample) {
                return Err(mismatch(
                    path,
                    space,
                    sample,
                    format!(
                        "sample{} has value of {:?} however space{} has space definition of {} {} {} space dtype is {}, sample dtype is {:?}",
                        path,
                        sample,
                        path,
                        space,
                        bounds.low,
                        bounds.high,
                        bounds.dtype,
                        sample.dtype()
                    ),
                ));
            }
            Ok(())
        }
        Space::MultiBinary(binary) => {
            if !matches!(
                sample,
                Sample::Array(_) | Sample::Sequence(_) | Sample::Int(_)
            ) {
                return Err(mismatch(
                    path,
                    space,
                    sample,
                    "expected an array, sequence or integer sample".to_string(),
                ));
            }
            if !binary.contains(sample) {
                return Err(mismatch(
                    path,
                    space,
                    sample,
                    format!(
                        "sample{} has value of {:?} however space{} has space definition of {} {}",
                        path, sample, path, space, binary.n
                    ),
                ));
            }
            Ok(())
        }
        Space::MultiDiscrete(multi) => {
            if !matches!(
                sample,
                Sample::Array(_) | Sample::Sequence(_) | Sample::Int(_)
            ) {
                return Err(mismatch(
                    path,
                    space,
                    sample,
                    "expected an array, sequence or integer sample".to_string(),
                ));
            }
            if !multi.contains(sample) {
                return Err(mismatch(
                    path,
                    space,
                    sample,
                    format!(
                        "sample{} has value of {:?} however space{} has space definition of {} {:?}",
                        path, sample, path, space, multi.nvec
                    ),
                ));
            }
            Ok(())
        }
        Space::Repeated(repeated) => {
            let values = match sample {
                Sample::List(values) => values,
                other => {
                    return Err(mismatch(
                        path,
                        space,
                        other,
                        "expected a list sample".to_string(),
                    ));
                }
            };
            if values.len() > repeated.max_len {
                return Err(mismatch(
                    path,
                    space,
                    sample,
                    format!(
                        "list holds {} elements but at most {} are allowed",
                        values.len(),
                        repeated.max_len
                    ),
                ));
            }
            for (idx, value) in values.iter().enumerate() {
                check(&repeated.child, value, &child_path(path, idx), policy)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::space::DType;

    fn unit_box() -> Space {
        Space::bounded(vec![0.0, 0.0], vec![1.0, 1.0], DType::Float).unwrap()
    }

    #[test]
    fn nested_failure_names_path() {
        let space = Space::dict([(
            "obs",
            Space::tuple(vec![Space::discrete(3).unwrap(), unit_box()]),
        )]);
        let sample = Sample::dict([(
            "obs",
            Sample::Tuple(vec![Sample::Int(1), Sample::Sequence(vec![0.5, 2.0])]),
        )]);
        match deep_sanity_check_space_sample(&space, &sample) {
            Err(SpaceError::StructuralMismatch {
                path, expected_kind, ..
            }) => {
                assert_eq!(path, "[obs][1]");
                assert_eq!(expected_kind, SpaceKind::Box);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn extra_keys_follow_policy() {
        let space = Space::dict([("a", unit_box())]);
        let sample = Sample::dict([
            ("a", Sample::Sequence(vec![0.1, 0.2])),
            ("b", Sample::Int(0)),
        ]);
        assert!(deep_sanity_check_space_sample(&space, &sample).is_err());
        assert!(
            deep_sanity_check_space_sample_with(&space, &sample, MismatchPolicy::Permissive)
                .is_ok()
        );
    }

    #[test]
    fn shallow_check_uses_contains() {
        let space = Space::discrete(2).unwrap();
        assert!(sanity_check_space_sample(&space, &Sample::Int(1)).is_ok());
        assert!(sanity_check_space_sample(&space, &Sample::Int(2)).is_err());
    }
}
