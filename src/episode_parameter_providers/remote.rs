//! Hosts an episode parameter provider inside a named actor.
//!
//! Every worker holding a [RemoteEpisodeParameterProvider] for the same actor drives one shared
//! provider instance. The caller's random source travels with each request and the advanced
//! generator is written back, so a hosted provider consumes randomness exactly like a local one.

use crate::Randomness;
use crate::episode_parameter_providers::{
    EpisodeId, EpisodeParameterProvider, EpisodeParameterProviderConfig, EpisodeResults, Metrics,
    ProviderError, ProviderFromConfig,
};
use crate::orchestration::actor::{Actor, ActorHandle, spawn_actor};
use crate::sys_utils::config_loader::DEFAULT_CONFIG;
use crate::types::parameter::{ParameterModel, model_as_pairs};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug)]
pub enum ProviderRequest {
    GetParams {
        rng: Randomness,
    },
    Update {
        results: EpisodeResults,
        rng: Randomness,
    },
    ComputeMetrics,
    SaveCheckpoint {
        path: PathBuf,
    },
    LoadCheckpoint {
        path: PathBuf,
    },
}

#[derive(Serialize, Deserialize, Debug)]
pub enum ProviderResponse {
    Params {
        #[serde(with = "model_as_pairs")]
        params: ParameterModel,
        episode_id: Option<EpisodeId>,
        rng: Randomness,
    },
    Updated {
        rng: Randomness,
    },
    Metrics(Metrics),
    Done,
}

struct HostedProvider {
    inner: Box<dyn EpisodeParameterProvider>,
}

impl Actor for HostedProvider {
    type Request = ProviderRequest;
    type Response = ProviderResponse;
    type Error = ProviderError;

    fn handle(&mut self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match request {
            ProviderRequest::GetParams { mut rng } => {
                let (params, episode_id) = self.inner.get_params(&mut rng)?;
                Ok(ProviderResponse::Params {
                    params,
                    episode_id,
                    rng,
                })
            }
            ProviderRequest::Update { results, mut rng } => {
                self.inner.update(&results, &mut rng)?;
                Ok(ProviderResponse::Updated { rng })
            }
            ProviderRequest::ComputeMetrics => {
                Ok(ProviderResponse::Metrics(self.inner.compute_metrics()?))
            }
            ProviderRequest::SaveCheckpoint { path } => {
                self.inner.save_checkpoint(&path)?;
                Ok(ProviderResponse::Done)
            }
            ProviderRequest::LoadCheckpoint { path } => {
                self.inner.load_checkpoint(&path)?;
                Ok(ProviderResponse::Done)
            }
        }
    }
}

/// Adapter that forwards every provider call to a provider hosted in a named actor.
pub struct RemoteEpisodeParameterProvider {
    handle: ActorHandle<HostedProvider>,
    parameters: ParameterModel,
}

impl RemoteEpisodeParameterProvider {
    /// Spawns an actor named `actor_name` hosting a `P` built from `parameters` and
    /// `internal_config`, with the configured mailbox capacity.
    ///
    /// Construction errors of `P` are returned unchanged.
    pub fn spawn<P: ProviderFromConfig>(
        internal_config: serde_json::Value,
        parameters: ParameterModel,
        actor_name: &str,
    ) -> Result<Self, ProviderError> {
        let capacity: usize = DEFAULT_CONFIG.get_remote_provider_params().mailbox_capacity;
        Self::spawn_with_capacity::<P>(internal_config, parameters, actor_name, capacity)
    }

    pub fn spawn_with_capacity<P: ProviderFromConfig>(
        internal_config: serde_json::Value,
        parameters: ParameterModel,
        actor_name: &str,
        mailbox_capacity: usize,
    ) -> Result<Self, ProviderError> {
        // the parameter set crosses into the actor the same way requests do
        let encoded: String = serde_json::to_string(&EpisodeParameterProviderConfig {
            parameters: parameters.clone(),
        })
        .map_err(|e| ProviderError::Serialization(e.to_string()))?;

        let handle = spawn_actor(actor_name, mailbox_capacity, move || {
            let base: EpisodeParameterProviderConfig = serde_json::from_str(&encoded)
                .map_err(|e| ProviderError::Serialization(e.to_string()))?;
            let config: P::Config = serde_json::from_value(internal_config)
                .map_err(|e| ProviderError::InvalidConfig(e.to_string()))?;
            let provider: P = P::from_config(base.parameters, config)?;
            Ok(HostedProvider {
                inner: Box::new(provider),
            })
        })?;
        Ok(Self { handle, parameters })
    }

    pub fn actor_name(&self) -> &str {
        self.handle.name()
    }

    /// Stops the hosted provider and frees its actor name. Later calls fail with
    /// [ProviderError::ActorUnreachable].
    pub fn kill_actor(&mut self) -> Result<(), ProviderError> {
        Ok(self.handle.kill()?)
    }

    fn unexpected(&self, response: ProviderResponse) -> ProviderError {
        ProviderError::Internal(format!(
            "actor {} answered with {:?}",
            self.handle.name(),
            response
        ))
    }
}

impl EpisodeParameterProvider for RemoteEpisodeParameterProvider {
    fn parameters(&self) -> &ParameterModel {
        &self.parameters
    }

    fn do_get_params(
        &mut self,
        rng: &mut Randomness,
    ) -> Result<(ParameterModel, Option<EpisodeId>), ProviderError> {
        let request = ProviderRequest::GetParams { rng: rng.clone() };
        match self.handle.call(&request)? {
            ProviderResponse::Params {
                params,
                episode_id,
                rng: advanced,
            } => {
                *rng = advanced;
                debug!(
                    "[RemoteEpisodeParameterProvider - do_get_params] Received {} parameters from {}",
                    params.len(),
                    self.handle.name()
                );
                Ok((params, episode_id))
            }
            other => Err(self.unexpected(other)),
        }
    }

    fn update(
        &mut self,
        results: &EpisodeResults,
        rng: &mut Randomness,
    ) -> Result<(), ProviderError> {
        let request = ProviderRequest::Update {
            results: results.clone(),
            rng: rng.clone(),
        };
        match self.handle.call(&request)? {
            ProviderResponse::Updated { rng: advanced } => {
                *rng = advanced;
                Ok(())
            }
            other => Err(self.unexpected(other)),
        }
    }

    fn compute_metrics(&self) -> Result<Metrics, ProviderError> {
        match self.handle.call(&ProviderRequest::ComputeMetrics)? {
            ProviderResponse::Metrics(metrics) => Ok(metrics),
            other => Err(self.unexpected(other)),
        }
    }

    fn save_checkpoint(&self, checkpoint_path: &Path) -> Result<(), ProviderError> {
        let request = ProviderRequest::SaveCheckpoint {
            path: checkpoint_path.to_path_buf(),
        };
        match self.handle.call(&request)? {
            ProviderResponse::Done => Ok(()),
            other => Err(self.unexpected(other)),
        }
    }

    fn load_checkpoint(&mut self, checkpoint_path: &Path) -> Result<(), ProviderError> {
        let request = ProviderRequest::LoadCheckpoint {
            path: checkpoint_path.to_path_buf(),
        };
        match self.handle.call(&request)? {
            ProviderResponse::Done => Ok(()),
            other => Err(self.unexpected(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode_parameter_providers::simple::SimpleParameterProvider;
    use crate::types::parameter::{Parameter, ParameterPath};
    use rand::{RngCore, SeedableRng};
    use serde_json::json;

    fn parameters() -> ParameterModel {
        let mut parameters = ParameterModel::new();
        parameters.insert(
            ParameterPath::from("wind"),
            Parameter::uniform("wind", None, 0.0, 1.0),
        );
        parameters
    }

    #[test]
    fn rng_state_is_written_back() {
        let mut remote = RemoteEpisodeParameterProvider::spawn::<SimpleParameterProvider>(
            json!({}),
            parameters(),
            "remote_test_rng",
        )
        .unwrap();
        let mut rng = Randomness::seed_from_u64(3);
        let mut untouched = Randomness::seed_from_u64(3);
        let (params, _) = remote.get_params(&mut rng).unwrap();
        assert_eq!(params, parameters());
        assert_eq!(rng.next_u64(), untouched.next_u64());
        remote.kill_actor().unwrap();
    }

    #[test]
    fn bad_internal_config_is_rejected() {
        let result = RemoteEpisodeParameterProvider::spawn::<SimpleParameterProvider>(
            json!(42),
            parameters(),
            "remote_test_bad_config",
        );
        assert!(matches!(result, Err(ProviderError::InvalidConfig(_))));
    }

    #[test]
    fn requests_survive_json() {
        let request = ProviderRequest::GetParams {
            rng: Randomness::seed_from_u64(9),
        };
        let encoded = serde_json::to_string(&request).unwrap();
        let decoded: ProviderRequest = serde_json::from_str(&encoded).unwrap();
        match decoded {
            ProviderRequest::GetParams { rng } => assert_eq!(rng, Randomness::seed_from_u64(9)),
            other => panic!("unexpected request {:?}", other),
        }
    }
}
