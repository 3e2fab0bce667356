//! # Space Utilities
//!
//! Structurally recursive operations over [Space](crate::types::space::Space) trees and the
//! [Sample](crate::types::sample::Sample) trees drawn from them. Every tree-to-tree transform in
//! this module is built on the single traversal primitive
//! [iterate_over_space_likes](iterate::iterate_over_space_likes); leaf behavior is supplied as a
//! closure.
//!
//! All functions are pure and synchronous. Violations are returned as [SpaceError] values and are
//! never recovered from internally.

use crate::types::space::SpaceKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config_param;
pub mod discretize;
pub mod iterate;
pub mod sanity;
pub mod scaling;
pub mod transforms;

pub use crate::sys_utils::misc_utils::deep_merge_dict;
pub use config_param::{ConfigParam, ConfigValue, convert_config_param_to_space};
pub use discretize::{
    ActionsPerLeaf, DEFAULT_ACTIONS_PER_LEAF, turn_box_into_tuple_of_discretes,
    turn_discrete_action_back_to_cont, turn_discrete_action_back_to_cont_powerspace,
};
pub use iterate::{SpaceLike, SpaceLikeRef, iterate_over_space_likes};
pub use sanity::{
    deep_sanity_check_space_sample, deep_sanity_check_space_sample_with,
    sanity_check_space_sample,
};
pub use scaling::{box_scaler, box_unscaler, scale_sample_from_space, unscale_sample_from_space};
pub use transforms::{
    add_space_samples, add_space_samples_with, clip_space_sample_to_space, mean_sample,
    normalize_space, scale_space, space_box_min_maxer, zero_mean_space, zero_sample,
};

/// Errors raised by the space utilities.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpaceError {
    /// A sample does not conform to its space at `path`.
    #[error("space{path} is a {expected_kind} space but sample{path} is a {actual_type}: {detail}")]
    StructuralMismatch {
        path: String,
        expected_kind: SpaceKind,
        actual_type: String,
        detail: String,
    },
    /// Misaligned trees, insufficient parameters or out-of-domain arguments.
    #[error("precondition violated: {0}")]
    Precondition(String),
    /// A configuration value does not fit the action space it is applied to.
    #[error("config mismatch for key {key}: {detail}")]
    ConfigMismatch { key: String, detail: String },
    #[error("invalid space: {0}")]
    InvalidSpace(String),
    /// An internal invariant was broken.
    #[error("unreachable: {0}")]
    Unreachable(String),
}

/// How a transform treats nodes it has no rule for.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MismatchPolicy {
    /// Unknown nodes are an error.
    #[default]
    Strict,
    /// Unknown nodes are passed through.
    Permissive,
}

/// Renders a child path segment, e.g. `[obs][2]`.
pub(crate) fn child_path<D: std::fmt::Display>(path: &str, segment: D) -> String {
    format!("{}[{}]", path, segment)
}
