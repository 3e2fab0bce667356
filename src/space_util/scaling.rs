//! Linear rescaling of box samples between their space's bounds and an output range.

use crate::space_util::SpaceError;
use crate::space_util::iterate::{
    SpaceLike, SpaceLikeRef, iterate_over_space_likes, sample_at, space_at,
};
use crate::space_util::transforms::map_box_elements;
use crate::types::sample::Sample;
use crate::types::space::Space;

/// Leaf function of [scale_sample_from_space].
///
/// Maps a sample of a bounded box from `[low, high]` to `[out_min, out_max]` at `f32` precision.
/// Unbounded boxes and every other leaf are copied.
pub fn box_scaler(
    space_likes: &[SpaceLikeRef<'_>],
    out_min: f64,
    out_max: f64,
) -> Result<SpaceLike, SpaceError> {
    let space = space_at(space_likes, 0)?;
    let sample = sample_at(space_likes, 1)?;
    match space {
        Space::Box(bounds) if bounds.is_bounded() => Ok(SpaceLike::Sample(map_box_elements(
            bounds,
            sample,
            |value, low, high| {
                ((out_max - out_min) * (value - low) / (high - low) + out_min) as f32 as f64
            },
        )?)),
        _ => Ok(SpaceLike::Sample(sample.clone())),
    }
}

/// Leaf function of [unscale_sample_from_space]; the inverse of [box_scaler].
pub fn box_unscaler(
    space_likes: &[SpaceLikeRef<'_>],
    out_min: f64,
    out_max: f64,
) -> Result<SpaceLike, SpaceError> {
    let space = space_at(space_likes, 0)?;
    let sample = sample_at(space_likes, 1)?;
    match space {
        Space::Box(bounds) if bounds.is_bounded() => Ok(SpaceLike::Sample(map_box_elements(
            bounds,
            sample,
            |value, low, high| (value - out_min) * (high - low) / (out_max - out_min) + low,
        )?)),
        _ => Ok(SpaceLike::Sample(sample.clone())),
    }
}

/// Rescales every bounded box leaf of `sample` into `[out_min, out_max]`.
pub fn scale_sample_from_space(
    space: &Space,
    sample: &Sample,
    out_min: f64,
    out_max: f64,
) -> Result<Sample, SpaceError> {
    iterate_over_space_likes(
        |likes| box_scaler(likes, out_min, out_max),
        &[SpaceLikeRef::Space(space), SpaceLikeRef::Sample(sample)],
        false,
    )?
    .into_sample()
}

/// Maps a sample previously scaled into `[out_min, out_max]` back into `space`.
pub fn unscale_sample_from_space(
    space: &Space,
    sample: &Sample,
    out_min: f64,
    out_max: f64,
) -> Result<Sample, SpaceError> {
    iterate_over_space_likes(
        |likes| box_unscaler(likes, out_min, out_max),
        &[SpaceLikeRef::Space(space), SpaceLikeRef::Sample(sample)],
        false,
    )?
    .into_sample()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::space::DType;

    #[test]
    fn scales_into_output_range() {
        let space = Space::bounded(vec![0.0, -10.0], vec![4.0, 10.0], DType::Float).unwrap();
        let scaled =
            scale_sample_from_space(&space, &Sample::Sequence(vec![1.0, 5.0]), -1.0, 1.0).unwrap();
        assert_eq!(scaled, Sample::Sequence(vec![-0.5, 0.5]));
    }

    #[test]
    fn unbounded_boxes_are_copied() {
        let space =
            Space::bounded(vec![f64::NEG_INFINITY], vec![f64::INFINITY], DType::Float).unwrap();
        let sample = Sample::Sequence(vec![123.0]);
        assert_eq!(
            scale_sample_from_space(&space, &sample, -1.0, 1.0).unwrap(),
            sample
        );
        assert_eq!(
            unscale_sample_from_space(&space, &sample, -1.0, 1.0).unwrap(),
            sample
        );
    }
}
