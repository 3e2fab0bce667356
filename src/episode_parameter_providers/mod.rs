//! Episode parameter providers.
//!
//! A provider owns a fixed [ParameterModel] and hands out, once per episode, the parameters the
//! environment should be built with. Providers may evolve internal state from episode results
//! (curricula and the like) and persist exactly that state in checkpoints.
//!
//! [simple::SimpleParameterProvider] hands its parameters out unchanged. With the
//! `remote_providers` feature, [remote::RemoteEpisodeParameterProvider] hosts any
//! [ProviderFromConfig] type inside a named actor so several workers can share one instance.

pub mod simple;

#[cfg(feature = "remote_providers")]
pub mod remote;

use crate::Randomness;
#[cfg(feature = "remote_providers")]
use crate::orchestration::actor::ActorError;
use crate::types::parameter::{ParameterModel, ParameterPath, model_as_pairs};
use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_pickle::{DeOptions, SerOptions};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

pub type EpisodeId = u64;

/// Results reported back to a provider at the end of episodes.
pub type EpisodeResults = BTreeMap<String, serde_json::Value>;

pub type Metrics = BTreeMap<String, serde_json::Value>;

/// Errors raised by providers.
///
/// Serializable so that errors raised inside a hosted provider reach the caller unchanged.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProviderError {
    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),
    #[error("parameter set mismatch: {0}")]
    ParameterSetMismatch(String),
    #[error("checkpoint error: {0}")]
    Checkpoint(String),
    #[error("actor name {0} is already taken")]
    ActorNameTaken(String),
    #[error("actor {0} is unreachable")]
    ActorUnreachable(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("internal provider error: {0}")]
    Internal(String),
}

#[cfg(feature = "remote_providers")]
impl From<ActorError> for ProviderError {
    fn from(e: ActorError) -> Self {
        match e {
            ActorError::NameTaken(name) => ProviderError::ActorNameTaken(name),
            ActorError::Unreachable(name) => ProviderError::ActorUnreachable(name),
            ActorError::Serialization(detail) => ProviderError::Serialization(detail),
        }
    }
}

pub trait EpisodeParameterProvider: Send {
    /// The parameter set this provider was configured with.
    fn parameters(&self) -> &ParameterModel;

    /// Draws the parameters for the next episode. Called through [Self::get_params].
    fn do_get_params(
        &mut self,
        rng: &mut Randomness,
    ) -> Result<(ParameterModel, Option<EpisodeId>), ProviderError>;

    /// Parameters for the next episode, and its id when the provider tracks one.
    ///
    /// The result depends only on the provider's internal state and `rng`. A draw whose keys
    /// differ from [Self::parameters] fails with [ProviderError::ParameterSetMismatch].
    fn get_params(
        &mut self,
        rng: &mut Randomness,
    ) -> Result<(ParameterModel, Option<EpisodeId>), ProviderError> {
        let (params, episode_id) = self.do_get_params(rng)?;
        validate_parameter_keys(self.parameters(), &params)?;
        Ok((params, episode_id))
    }

    /// Feeds episode results back into the provider.
    fn update(&mut self, results: &EpisodeResults, rng: &mut Randomness)
    -> Result<(), ProviderError>;

    fn compute_metrics(&self) -> Result<Metrics, ProviderError> {
        Ok(Metrics::new())
    }

    fn save_checkpoint(&self, checkpoint_path: &Path) -> Result<(), ProviderError>;

    fn load_checkpoint(&mut self, checkpoint_path: &Path) -> Result<(), ProviderError>;
}

/// Providers that can be built from a parameter set and a provider-specific configuration.
pub trait ProviderFromConfig: EpisodeParameterProvider + Sized + 'static {
    type Config: DeserializeOwned;

    fn from_config(parameters: ParameterModel, config: Self::Config) -> Result<Self, ProviderError>;
}

/// The parameter set every provider is configured with.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EpisodeParameterProviderConfig {
    #[serde(with = "model_as_pairs")]
    pub parameters: ParameterModel,
}

impl EpisodeParameterProviderConfig {
    pub fn new(parameters: ParameterModel) -> Result<Self, ProviderError> {
        for parameter in parameters.values() {
            parameter.validate()?;
        }
        Ok(Self { parameters })
    }
}

/// Fails unless `actual` addresses exactly the parameters of `expected`.
pub fn validate_parameter_keys(
    expected: &ParameterModel,
    actual: &ParameterModel,
) -> Result<(), ProviderError> {
    let expected_keys: BTreeSet<&ParameterPath> = expected.keys().collect();
    let actual_keys: BTreeSet<&ParameterPath> = actual.keys().collect();
    if expected_keys == actual_keys {
        return Ok(());
    }
    let render = |keys: Vec<&&ParameterPath>| {
        keys.iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    Err(ProviderError::ParameterSetMismatch(format!(
        "missing [{}], unexpected [{}]",
        render(expected_keys.difference(&actual_keys).collect()),
        render(actual_keys.difference(&expected_keys).collect())
    )))
}

/// Pickles `state` to `checkpoint_path`.
pub fn write_checkpoint<T: Serialize>(checkpoint_path: &Path, state: &T) -> Result<(), ProviderError> {
    let file = File::create(checkpoint_path).map_err(|e| {
        ProviderError::Checkpoint(format!("cannot create {:?}: {}", checkpoint_path, e))
    })?;
    let mut writer = BufWriter::new(file);
    serde_pickle::to_writer(&mut writer, state, SerOptions::new())
        .map_err(|e| ProviderError::Checkpoint(e.to_string()))?;
    writer
        .flush()
        .map_err(|e| ProviderError::Checkpoint(e.to_string()))?;
    info!(
        "[EpisodeParameterProvider - write_checkpoint] Saved checkpoint to {:?}",
        checkpoint_path
    );
    Ok(())
}

/// Reads state pickled by [write_checkpoint].
pub fn read_checkpoint<T: DeserializeOwned>(checkpoint_path: &Path) -> Result<T, ProviderError> {
    let file = File::open(checkpoint_path).map_err(|e| {
        ProviderError::Checkpoint(format!("cannot open {:?}: {}", checkpoint_path, e))
    })?;
    let state: T = serde_pickle::from_reader(BufReader::new(file), DeOptions::new())
        .map_err(|e| ProviderError::Checkpoint(e.to_string()))?;
    info!(
        "[EpisodeParameterProvider - read_checkpoint] Loaded checkpoint from {:?}",
        checkpoint_path
    );
    Ok(state)
}
