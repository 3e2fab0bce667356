use crate::Randomness;
use crate::episode_parameter_providers::{
    EpisodeId, EpisodeParameterProvider, EpisodeParameterProviderConfig, EpisodeResults,
    ProviderError, ProviderFromConfig,
};
use crate::types::parameter::ParameterModel;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// [SimpleParameterProvider] takes no settings beyond its parameters.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SimpleParameterProviderConfig {}

/// Hands out its parameters unchanged, without episode ids or state.
#[derive(Debug, Clone)]
pub struct SimpleParameterProvider {
    config: EpisodeParameterProviderConfig,
}

impl SimpleParameterProvider {
    pub fn new(parameters: ParameterModel) -> Result<Self, ProviderError> {
        Ok(Self {
            config: EpisodeParameterProviderConfig::new(parameters)?,
        })
    }
}

impl ProviderFromConfig for SimpleParameterProvider {
    type Config = SimpleParameterProviderConfig;

    fn from_config(parameters: ParameterModel, _config: Self::Config) -> Result<Self, ProviderError> {
        Self::new(parameters)
    }
}

impl EpisodeParameterProvider for SimpleParameterProvider {
    fn parameters(&self) -> &ParameterModel {
        &self.config.parameters
    }

    fn do_get_params(
        &mut self,
        _rng: &mut Randomness,
    ) -> Result<(ParameterModel, Option<EpisodeId>), ProviderError> {
        Ok((self.config.parameters.clone(), None))
    }

    fn update(
        &mut self,
        _results: &EpisodeResults,
        _rng: &mut Randomness,
    ) -> Result<(), ProviderError> {
        Ok(())
    }

    fn save_checkpoint(&self, _checkpoint_path: &Path) -> Result<(), ProviderError> {
        Ok(())
    }

    fn load_checkpoint(&mut self, _checkpoint_path: &Path) -> Result<(), ProviderError> {
        Ok(())
    }
}
