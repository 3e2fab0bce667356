#![cfg(feature = "remote_providers")]

use rand::SeedableRng;
use relayrl_env_utils::Randomness;
use relayrl_env_utils::episode_parameter_providers::remote::RemoteEpisodeParameterProvider;
use relayrl_env_utils::episode_parameter_providers::simple::SimpleParameterProvider;
use relayrl_env_utils::episode_parameter_providers::{
    EpisodeId, EpisodeParameterProvider, EpisodeParameterProviderConfig, EpisodeResults, Metrics,
    ProviderError, ProviderFromConfig, read_checkpoint, write_checkpoint,
};
use relayrl_env_utils::types::parameter::{
    NestedParameters, Parameter, ParameterModel, ParameterPath, ValueWithUnits,
};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

#[derive(Deserialize)]
struct IncrementingConstantConfig {
    update_increment: u64,
}

/// Offsets every constant parameter by a value that grows by `update_increment` per update.
struct IncrementingConstant {
    config: EpisodeParameterProviderConfig,
    update_increment: u64,
    value: u64,
    episode_id: EpisodeId,
}

impl ProviderFromConfig for IncrementingConstant {
    type Config = IncrementingConstantConfig;

    fn from_config(parameters: ParameterModel, config: Self::Config) -> Result<Self, ProviderError> {
        if config.update_increment == 0 {
            return Err(ProviderError::InvalidConfig(
                "update_increment must be positive".to_string(),
            ));
        }
        if parameters
            .values()
            .any(|p| !matches!(p, Parameter::Constant { .. }))
        {
            return Err(ProviderError::InvalidConfig(
                "only constant parameters can be incremented".to_string(),
            ));
        }
        Ok(Self {
            config: EpisodeParameterProviderConfig::new(parameters)?,
            update_increment: config.update_increment,
            value: 0,
            episode_id: 0,
        })
    }
}

impl EpisodeParameterProvider for IncrementingConstant {
    fn parameters(&self) -> &ParameterModel {
        &self.config.parameters
    }

    fn do_get_params(
        &mut self,
        rng: &mut Randomness,
    ) -> Result<(ParameterModel, Option<EpisodeId>), ProviderError> {
        let episode_id = self.episode_id;
        self.episode_id += 1;
        let params: ParameterModel = self
            .config
            .parameters
            .iter()
            .map(|(path, seed)| {
                let name = path.leaf().unwrap_or_default().to_string();
                let value = seed.get_value(rng).value + self.value as f64;
                (
                    path.clone(),
                    Parameter::constant(name, seed.units().map(str::to_string), value),
                )
            })
            .collect();
        Ok((params, Some(episode_id)))
    }

    fn update(
        &mut self,
        _results: &EpisodeResults,
        _rng: &mut Randomness,
    ) -> Result<(), ProviderError> {
        self.value += self.update_increment;
        Ok(())
    }

    fn compute_metrics(&self) -> Result<Metrics, ProviderError> {
        Ok([("value".to_string(), json!(self.value))].into_iter().collect())
    }

    fn save_checkpoint(&self, checkpoint_path: &Path) -> Result<(), ProviderError> {
        write_checkpoint(checkpoint_path, &self.value)
    }

    fn load_checkpoint(&mut self, checkpoint_path: &Path) -> Result<(), ProviderError> {
        self.value = read_checkpoint(checkpoint_path)?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct ForgetfulConfig {}

/// Draws its parameter set without `group.param2`.
struct Forgetful {
    config: EpisodeParameterProviderConfig,
}

impl ProviderFromConfig for Forgetful {
    type Config = ForgetfulConfig;

    fn from_config(parameters: ParameterModel, _config: Self::Config) -> Result<Self, ProviderError> {
        Ok(Self {
            config: EpisodeParameterProviderConfig::new(parameters)?,
        })
    }
}

impl EpisodeParameterProvider for Forgetful {
    fn parameters(&self) -> &ParameterModel {
        &self.config.parameters
    }

    fn do_get_params(
        &mut self,
        _rng: &mut Randomness,
    ) -> Result<(ParameterModel, Option<EpisodeId>), ProviderError> {
        let mut params = self.config.parameters.clone();
        params.remove(&ParameterPath::from("group.param2"));
        Ok((params, None))
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

fn seed_parameters() -> ParameterModel {
    NestedParameters::group([
        ("param1", Parameter::constant("param1", None, 3.0).into()),
        (
            "group",
            NestedParameters::group([("param2", Parameter::constant("param2", None, 5.0).into())]),
        ),
    ])
    .flatten()
}

fn incrementing(is_remote: bool, actor_name: &str) -> Box<dyn EpisodeParameterProvider> {
    if is_remote {
        Box::new(
            RemoteEpisodeParameterProvider::spawn::<IncrementingConstant>(
                json!({"update_increment": 17}),
                seed_parameters(),
                actor_name,
            )
            .unwrap(),
        )
    } else {
        Box::new(
            IncrementingConstant::from_config(
                seed_parameters(),
                IncrementingConstantConfig {
                    update_increment: 17,
                },
            )
            .unwrap(),
        )
    }
}

fn simple(is_remote: bool, actor_name: &str) -> Box<dyn EpisodeParameterProvider> {
    if is_remote {
        Box::new(
            RemoteEpisodeParameterProvider::spawn::<SimpleParameterProvider>(
                json!({}),
                seed_parameters(),
                actor_name,
            )
            .unwrap(),
        )
    } else {
        Box::new(SimpleParameterProvider::new(seed_parameters()).unwrap())
    }
}

fn value_at(params: &ParameterModel, path: &str, rng: &mut Randomness) -> ValueWithUnits {
    params
        .get(&ParameterPath::from(path))
        .unwrap_or_else(|| panic!("missing parameter {}", path))
        .get_value(rng)
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn run_simple(is_remote: bool, actor_name: &str) {
    init_logging();
    let mut rng = Randomness::seed_from_u64(0);
    let mut provider = simple(is_remote, actor_name);
    for _ in 0..5 {
        for _ in 0..10 {
            let (params, episode_id) = provider.get_params(&mut rng).unwrap();
            assert_eq!(params.len(), 2);
            assert_eq!(episode_id, None);
            assert_eq!(value_at(&params, "param1", &mut rng).value, 3.0);
            assert_eq!(value_at(&params, "group.param2", &mut rng).value, 5.0);
        }
        assert!(provider.compute_metrics().unwrap().is_empty());
        provider.update(&EpisodeResults::new(), &mut rng).unwrap();
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkpoint.pkl");
    provider.save_checkpoint(&path).unwrap();
    provider.load_checkpoint(&path).unwrap();
}

fn run_extensive(is_remote: bool, actor_names: [&str; 2]) {
    init_logging();
    let mut rng = Randomness::seed_from_u64(0);
    let mut provider = incrementing(is_remote, actor_names[0]);

    let mut value = 0.0;
    let mut index: EpisodeId = 0;
    for _ in 0..5 {
        for _ in 0..10 {
            let (params, episode_id) = provider.get_params(&mut rng).unwrap();
            assert_eq!(params.len(), 2);
            assert_eq!(
                value_at(&params, "param1", &mut rng),
                ValueWithUnits {
                    value: 3.0 + value,
                    units: None
                }
            );
            assert_eq!(
                value_at(&params, "group.param2", &mut rng),
                ValueWithUnits {
                    value: 5.0 + value,
                    units: None
                }
            );
            assert_eq!(episode_id, Some(index));
            index += 1;
        }
        let metrics = provider.compute_metrics().unwrap();
        assert_eq!(metrics.get("value"), Some(&json!(value as u64)));
        provider.update(&EpisodeResults::new(), &mut rng).unwrap();
        value += 17.0;
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkpoint.pkl");
    provider.save_checkpoint(&path).unwrap();

    let mut rng1 = Randomness::seed_from_u64(1);
    let (params1, _) = provider.get_params(&mut rng1).unwrap();

    let mut rng2 = Randomness::seed_from_u64(1);
    let mut restored = incrementing(is_remote, actor_names[1]);
    restored.load_checkpoint(&path).unwrap();
    let (params2, _) = restored.get_params(&mut rng2).unwrap();

    assert_eq!(
        params1.keys().collect::<Vec<_>>(),
        params2.keys().collect::<Vec<_>>()
    );
    for (key, parameter) in &params1 {
        assert_eq!(parameter.get_value(&mut rng1), params2[key].get_value(&mut rng2));
    }

    provider.update(&EpisodeResults::new(), &mut rng1).unwrap();
    restored.update(&EpisodeResults::new(), &mut rng2).unwrap();

    let (params1, _) = provider.get_params(&mut rng1).unwrap();
    let (params2, _) = restored.get_params(&mut rng2).unwrap();
    assert_eq!(
        params1.keys().collect::<Vec<_>>(),
        params2.keys().collect::<Vec<_>>()
    );
    for (key, parameter) in &params1 {
        assert_eq!(parameter.get_value(&mut rng1), params2[key].get_value(&mut rng2));
    }
    assert_eq!(
        value_at(&params1, "param1", &mut rng1).value,
        3.0 + 6.0 * 17.0
    );
}

#[test]
fn simple_provider_local() {
    run_simple(false, "");
}

#[test]
fn simple_provider_remote() {
    run_simple(true, "epp_test_simple");
}

#[test]
fn incrementing_provider_local() {
    run_extensive(false, ["", ""]);
}

#[test]
fn incrementing_provider_remote() {
    run_extensive(true, ["epp_test_extensive", "epp_test_extensive2"]);
}

#[test]
fn remote_and_local_consume_randomness_alike() {
    let mut parameters = seed_parameters();
    parameters.insert(
        ParameterPath::from("group.wind"),
        Parameter::uniform("wind", Some("m/s".to_string()), -2.0, 2.0),
    );
    let mut local = SimpleParameterProvider::new(parameters.clone()).unwrap();
    let mut remote = RemoteEpisodeParameterProvider::spawn::<SimpleParameterProvider>(
        json!({}),
        parameters,
        "epp_test_equivalence",
    )
    .unwrap();

    let mut local_rng = Randomness::seed_from_u64(5);
    let mut remote_rng = Randomness::seed_from_u64(5);
    for _ in 0..10 {
        let (local_params, _) = local.get_params(&mut local_rng).unwrap();
        let (remote_params, _) = remote.get_params(&mut remote_rng).unwrap();
        assert_eq!(local_params, remote_params);
        assert_eq!(
            value_at(&local_params, "group.wind", &mut local_rng),
            value_at(&remote_params, "group.wind", &mut remote_rng)
        );
    }
    assert_eq!(local_rng, remote_rng);
    remote.kill_actor().unwrap();
}

#[test]
fn remote_floats_are_bit_exact() {
    let mut parameters = ParameterModel::new();
    parameters.insert(
        ParameterPath::from("mass"),
        Parameter::constant("mass", Some("kg".to_string()), 7.8959742378088e47),
    );
    parameters.insert(
        ParameterPath::from("drag"),
        Parameter::uniform("drag", None, 0.1, 0.30000000000000004),
    );
    let mut local = SimpleParameterProvider::new(parameters.clone()).unwrap();
    let mut remote = RemoteEpisodeParameterProvider::spawn::<SimpleParameterProvider>(
        json!({}),
        parameters,
        "epp_test_float_bits",
    )
    .unwrap();

    let mut local_rng = Randomness::seed_from_u64(11);
    let mut remote_rng = Randomness::seed_from_u64(11);
    let (local_params, _) = local.get_params(&mut local_rng).unwrap();
    let (remote_params, _) = remote.get_params(&mut remote_rng).unwrap();
    for path in ["mass", "drag"] {
        let local_value = value_at(&local_params, path, &mut local_rng).value;
        let remote_value = value_at(&remote_params, path, &mut remote_rng).value;
        assert_eq!(local_value.to_bits(), remote_value.to_bits(), "{} differs", path);
    }
    assert_eq!(
        value_at(&remote_params, "mass", &mut remote_rng).value.to_bits(),
        7.8959742378088e47_f64.to_bits()
    );
    remote.kill_actor().unwrap();
}

#[test]
fn drawn_key_sets_are_checked_locally_and_remotely() {
    let mut rng = Randomness::seed_from_u64(0);
    let mut local = Forgetful::from_config(seed_parameters(), ForgetfulConfig {}).unwrap();
    match local.get_params(&mut rng) {
        Err(ProviderError::ParameterSetMismatch(detail)) => assert!(detail.contains("group.param2")),
        other => panic!("unexpected result {:?}", other),
    }

    let mut remote = RemoteEpisodeParameterProvider::spawn::<Forgetful>(
        json!({}),
        seed_parameters(),
        "epp_test_key_mismatch",
    )
    .unwrap();
    assert_eq!(remote.parameters(), &seed_parameters());
    match remote.get_params(&mut rng) {
        Err(ProviderError::ParameterSetMismatch(detail)) => assert!(detail.contains("group.param2")),
        other => panic!("unexpected result {:?}", other),
    }
    remote.kill_actor().unwrap();
}

#[test]
fn invalid_internal_config_comes_back_unchanged() {
    let result = RemoteEpisodeParameterProvider::spawn::<IncrementingConstant>(
        json!({"update_increment": 0}),
        seed_parameters(),
        "epp_test_invalid",
    );
    match result {
        Err(ProviderError::InvalidConfig(detail)) => assert!(detail.contains("positive")),
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("an increment of zero must be rejected"),
    }

    let mut parameters = seed_parameters();
    parameters.insert(
        ParameterPath::from("wind"),
        Parameter::uniform("wind", None, 0.0, 1.0),
    );
    assert!(matches!(
        IncrementingConstant::from_config(
            parameters,
            IncrementingConstantConfig {
                update_increment: 1
            }
        ),
        Err(ProviderError::InvalidConfig(_))
    ));
}

#[test]
fn actor_names_are_exclusive() {
    let mut first = RemoteEpisodeParameterProvider::spawn::<SimpleParameterProvider>(
        json!({}),
        seed_parameters(),
        "epp_test_collision",
    )
    .unwrap();
    let second = RemoteEpisodeParameterProvider::spawn::<SimpleParameterProvider>(
        json!({}),
        seed_parameters(),
        "epp_test_collision",
    );
    assert!(matches!(second, Err(ProviderError::ActorNameTaken(_))));

    first.kill_actor().unwrap();
    let mut third = RemoteEpisodeParameterProvider::spawn::<SimpleParameterProvider>(
        json!({}),
        seed_parameters(),
        "epp_test_collision",
    )
    .unwrap();
    assert_eq!(third.actor_name(), "epp_test_collision");
    third.kill_actor().unwrap();
}

#[test]
fn killed_actors_are_unreachable() {
    let mut remote = RemoteEpisodeParameterProvider::spawn::<SimpleParameterProvider>(
        json!({}),
        seed_parameters(),
        "epp_test_killed",
    )
    .unwrap();
    remote.kill_actor().unwrap();
    remote.kill_actor().unwrap();
    let mut rng = Randomness::seed_from_u64(0);
    assert!(matches!(
        remote.get_params(&mut rng),
        Err(ProviderError::ActorUnreachable(_))
    ));
    assert!(matches!(
        remote.compute_metrics(),
        Err(ProviderError::ActorUnreachable(_))
    ));
}

#[test]
fn missing_checkpoint_is_reported() {
    let mut provider = incrementing(false, "");
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        provider.load_checkpoint(&dir.path().join("absent.pkl")),
        Err(ProviderError::Checkpoint(_))
    ));
}
