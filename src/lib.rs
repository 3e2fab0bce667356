//! # RelayRL Environment Utilities
//! Environment-side building blocks for the RelayRL reinforcement learning framework: a structural
//! toolkit over observation/action spaces and the samples drawn from them, and episode parameter
//! providers that decide how each episode's environment is configured.
//!
//! The crate is organized into the following modules:
//!
//! - **Types** (`types::*`): The closed [Space](types::space::Space) model (Dict, Tuple, Box,
//!   Discrete, MultiBinary, MultiDiscrete, Repeated), the [Sample](types::sample::Sample) values
//!   drawn from it, and episode [parameters](types::parameter).
//! - **Space Utilities** (`space_util::*`): Deep sanity checks, the generic recursive transform
//!   primitive and every transform built on it (scaling, normalization, clipping, sample
//!   arithmetic, discretization and its inverse, config-to-space conversion).
//! - **Episode Parameter Providers** (`episode_parameter_providers::*`): The provider trait,
//!   checkpoint helpers, a simple provider and, with the `remote_providers` feature, an adapter
//!   hosting any provider inside a named actor.
//! - **Orchestration** (`orchestration::*`): The tokio runtime and the actor runtime behind
//!   remote providers.
//! - **System Utilities** (`sys_utils::*`): Configuration loading and small helpers.
//!
//! ## Randomness
//!
//! Every random draw in the crate goes through a caller-supplied [Randomness] generator, so runs
//! are reproducible from a seed and remote providers consume randomness exactly like local ones.

/// The random source used throughout the crate. Seedable and serializable.
pub type Randomness = rand_chacha::ChaCha8Rng;

/// **Core Data Types**: Spaces, samples and episode parameters.
pub mod types {
    pub mod parameter;
    pub mod sample;
    pub mod space;
}

/// **Space Utilities**: Structural checks and transforms over space and sample trees.
pub mod space_util;

/// **Episode Parameter Providers**: Per-episode parameter sources and their remote adapter.
pub mod episode_parameter_providers;

/// **Orchestration**: The shared tokio runtime and the actor runtime built on it.
pub mod orchestration {
    #[cfg(feature = "remote_providers")]
    pub mod actor;
    #[cfg(feature = "remote_providers")]
    pub mod tokio {
        pub mod utils;
    }
}

/// **System Utilities**: Configuration resolution and JSON helpers.
pub mod sys_utils {
    pub mod config_loader;
    pub(crate) mod misc_utils;
}
