//! Whole-tree transforms of spaces and samples built on
//! [iterate_over_space_likes](crate::space_util::iterate::iterate_over_space_likes).

use crate::Randomness;
use crate::space_util::iterate::{
    SpaceLike, SpaceLikeRef, iterate_over_space_likes, sample_at, space_at,
};
use crate::space_util::{MismatchPolicy, SpaceError};
use crate::types::sample::{Sample, zip_with};
use crate::types::space::{BoxSpace, DType, Space};
use ndarray::ArrayD;

/// Applies `f(value, low, high)` to every element of a box sample and returns the result in the
/// sample's own representation. Single-element boxes broadcast their bounds.
pub(crate) fn map_box_elements<F>(
    bounds: &BoxSpace,
    sample: &Sample,
    f: F,
) -> Result<Sample, SpaceError>
where
    F: Fn(f64, f64, f64) -> f64,
{
    let values = sample.to_array().ok_or_else(|| {
        SpaceError::Precondition(format!(
            "expected a numeric sample for a box space but found a {}",
            sample.type_name()
        ))
    })?;
    let size = bounds.size();
    if values.len() != size && size != 1 {
        return Err(SpaceError::Precondition(format!(
            "sample holds {} values but the box has {}",
            values.len(),
            size
        )));
    }
    let lows: Vec<f64> = bounds.low.iter().copied().collect();
    let highs: Vec<f64> = bounds.high.iter().copied().collect();
    let mapped: Vec<f64> = values
        .iter()
        .enumerate()
        .map(|(idx, &value)| {
            let bound = if size == 1 { 0 } else { idx };
            f(value, lows[bound], highs[bound])
        })
        .collect();
    let mapped = ArrayD::from_shape_vec(values.raw_dim(), mapped)
        .map_err(|e| SpaceError::Unreachable(e.to_string()))?;
    Ok(sample.rebuild_like(mapped))
}

fn rescaled_box(
    bounds: &BoxSpace,
    dtype: DType,
    f: impl Fn(f64) -> f64,
) -> Result<BoxSpace, SpaceError> {
    BoxSpace::new(
        bounds.low.mapv(|v| dtype.cast(f(v))),
        bounds.high.mapv(|v| dtype.cast(f(v))),
        dtype,
    )
}

/// Multiplies the bounds of every box by `scale`, keeping the box's float element type.
///
/// A negative `scale` reverses the bounds and is rejected as an invalid space.
pub fn scale_space(space: &Space, scale: f64) -> Result<Space, SpaceError> {
    iterate_over_space_likes(
        |likes| {
            let space = space_at(likes, 0)?;
            Ok(SpaceLike::Space(match space {
                Space::Box(bounds) => {
                    Space::Box(rescaled_box(bounds, bounds.dtype.float_type(), |v| v * scale)?)
                }
                other => other.clone(),
            }))
        },
        &[SpaceLikeRef::Space(space)],
        true,
    )?
    .into_space()
}

/// Shifts every box so its bounds are centered on zero. Unbounded elements keep their bounds.
pub fn zero_mean_space(space: &Space) -> Result<Space, SpaceError> {
    iterate_over_space_likes(
        |likes| {
            let space = space_at(likes, 0)?;
            Ok(SpaceLike::Space(match space {
                Space::Box(bounds) => {
                    let means: ArrayD<f64> = zip_with(&bounds.low, &bounds.high, |l, h| {
                        let mean = (l + h) / 2.0;
                        if mean.is_finite() { mean } else { 0.0 }
                    })
                    .ok_or_else(|| {
                        SpaceError::Unreachable("box bounds differ in shape".to_string())
                    })?;
                    let dtype = bounds.dtype.float_type();
                    Space::Box(BoxSpace::new(
                        (&bounds.low - &means).mapv(|v| dtype.cast(v)),
                        (&bounds.high - &means).mapv(|v| dtype.cast(v)),
                        dtype,
                    )?)
                }
                other => other.clone(),
            }))
        },
        &[SpaceLikeRef::Space(space)],
        true,
    )?
    .into_space()
}

/// Leaf function of [normalize_space]: a box becomes a `Float` box of the same shape bounded by
/// `[out_min, out_max]`; anything else is copied.
pub fn space_box_min_maxer(
    space_likes: &[SpaceLikeRef<'_>],
    out_min: f64,
    out_max: f64,
) -> Result<SpaceLike, SpaceError> {
    let space = space_at(space_likes, 0)?;
    match space {
        Space::Box(bounds) => Ok(SpaceLike::Space(Space::Box(BoxSpace::uniform(
            bounds.shape(),
            out_min,
            out_max,
            DType::Float,
        )?))),
        other => Ok(SpaceLike::Space(other.clone())),
    }
}

/// Replaces every box in `space` with a box bounded by `[out_min, out_max]`.
pub fn normalize_space(space: &Space, out_min: f64, out_max: f64) -> Result<Space, SpaceError> {
    iterate_over_space_likes(
        |likes| space_box_min_maxer(likes, out_min, out_max),
        &[SpaceLikeRef::Space(space)],
        true,
    )?
    .into_space()
}

fn overwrite_box_leaves<F>(space: &Space, drawn: &Sample, fill: F) -> Result<Sample, SpaceError>
where
    F: Fn(&BoxSpace, &Sample) -> Result<Sample, SpaceError>,
{
    iterate_over_space_likes(
        |likes| {
            let space = space_at(likes, 0)?;
            let sample = sample_at(likes, 1)?;
            Ok(SpaceLike::Sample(match space {
                Space::Box(bounds) => fill(bounds, sample)?,
                _ => sample.clone(),
            }))
        },
        &[SpaceLikeRef::Space(space), SpaceLikeRef::Sample(drawn)],
        false,
    )?
    .into_sample()
}

/// Draws a sample from `space` and sets every box leaf to zeros.
pub fn zero_sample(space: &Space, rng: &mut Randomness) -> Result<Sample, SpaceError> {
    let drawn = space.sample(rng);
    overwrite_box_leaves(space, &drawn, |bounds, _| {
        Ok(Sample::Array(ArrayD::zeros(bounds.low.raw_dim())))
    })
}

/// Draws a sample from `space` and sets every box leaf to the midpoint of its bounds.
///
/// Elements with an infinite bound keep the drawn value.
pub fn mean_sample(space: &Space, rng: &mut Randomness) -> Result<Sample, SpaceError> {
    let drawn = space.sample(rng);
    overwrite_box_leaves(space, &drawn, |bounds, sample| {
        let mean = map_box_elements(bounds, sample, |value, low, high| {
            let mean = (low + high) / 2.0;
            if mean.is_finite() { mean } else { value }
        })?;
        Ok(Sample::Array(mean.to_array().unwrap_or_else(|| {
            ArrayD::zeros(bounds.low.raw_dim())
        })))
    })
}

/// Adds two samples of `space` elementwise at every box leaf. Other leaves return `s1`.
pub fn add_space_samples(space: &Space, s1: &Sample, s2: &Sample) -> Result<Sample, SpaceError> {
    add_space_samples_with(space, s1, s2, MismatchPolicy::Permissive)
}

/// Same as [add_space_samples]; under [MismatchPolicy::Strict] any leaf that is not a box is an
/// error instead of passing `s1` through.
pub fn add_space_samples_with(
    space: &Space,
    s1: &Sample,
    s2: &Sample,
    policy: MismatchPolicy,
) -> Result<Sample, SpaceError> {
    iterate_over_space_likes(
        |likes| {
            let space = space_at(likes, 0)?;
            let first = sample_at(likes, 1)?;
            // inside a repeated space only the first sample is forwarded
            let second = likes.get(2).and_then(|like| like.as_sample());
            match (space, second) {
                (Space::Box(_), Some(second)) => {
                    let lhs = first.to_array();
                    let rhs = second.to_array();
                    let summed = match (lhs, rhs) {
                        (Some(lhs), Some(rhs)) => zip_with(&lhs, &rhs, |a, b| a + b),
                        _ => None,
                    }
                    .ok_or_else(|| {
                        SpaceError::Precondition(format!(
                            "cannot add a {} sample to a {} sample",
                            second.type_name(),
                            first.type_name()
                        ))
                    })?;
                    Ok(SpaceLike::Sample(first.rebuild_like(summed)))
                }
                _ => match policy {
                    MismatchPolicy::Permissive => Ok(SpaceLike::Sample(first.clone())),
                    MismatchPolicy::Strict => Err(SpaceError::Precondition(format!(
                        "samples of a {} space cannot be added",
                        space.kind()
                    ))),
                },
            }
        },
        &[
            SpaceLikeRef::Space(space),
            SpaceLikeRef::Sample(s1),
            SpaceLikeRef::Sample(s2),
        ],
        false,
    )?
    .into_sample()
}

/// Clips `sample` into `space`.
///
/// Box leaves saturate at their bounds, or when `is_wrap` is set, wrap around once: a value above
/// `high` becomes `low + (value - high)` and a value below `low` becomes `high - (low - value)`.
pub fn clip_space_sample_to_space(
    sample: &Sample,
    space: &Space,
    is_wrap: bool,
) -> Result<Sample, SpaceError> {
    iterate_over_space_likes(
        |likes| {
            let space = space_at(likes, 0)?;
            let sample = sample_at(likes, 1)?;
            Ok(SpaceLike::Sample(match space {
                Space::Box(bounds) => map_box_elements(bounds, sample, |value, low, high| {
                    if is_wrap {
                        if value > high {
                            low + (value - high)
                        } else if value < low {
                            high - (low - value)
                        } else {
                            value
                        }
                    } else {
                        value.clamp(low, high)
                    }
                })?,
                _ => sample.clone(),
            }))
        },
        &[SpaceLikeRef::Space(space), SpaceLikeRef::Sample(sample)],
        false,
    )?
    .into_sample()
}
