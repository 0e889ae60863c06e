//! Training configuration.
//!
//! [`TrainerConfig`] is an immutable record handed to the trainer at
//! construction. Every field has a default, so a JSON file only needs the
//! keys it overrides.

use serde::{Serialize, Deserialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::activations::Activation;
use crate::environment::RewardTable;
use crate::error::{QError, Result};
use crate::exploration::{DecayCadence, ExplorationPolicy};
use crate::layers::WeightInit;
use crate::loss::LossKind;
use crate::optimizer::{GradientClipper, OptimizerKind};

/// Epsilon-greedy schedule
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpsilonConfig {
    pub initial: f32,
    pub min: f32,
    pub decay_rate: f32,
    pub cadence: DecayCadence,
    pub policy: ExplorationPolicy,
}

impl Default for EpsilonConfig {
    fn default() -> Self {
        EpsilonConfig {
            initial: 1.0,
            min: 0.01,
            decay_rate: 0.995,
            cadence: DecayCadence::PerTrainCycle,
            policy: ExplorationPolicy::default(),
        }
    }
}

/// Shape and training hyperparameters of the built-in Q-network
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f32,
    pub optimizer: OptimizerKind,
    pub loss: LossKind,
    /// Activation of every hidden layer; the output layer is always linear
    pub hidden_activation: Activation,
    /// Initializer for every layer, chosen per activation when `None`
    pub weight_init: Option<WeightInit>,
    pub grad_clip: GradientClipper,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            hidden_layers: vec![128, 64],
            learning_rate: 1e-3,
            optimizer: OptimizerKind::default(),
            loss: LossKind::Mse,
            hidden_activation: Activation::Relu,
            weight_init: None,
            grad_clip: GradientClipper::None,
        }
    }
}

/// Everything the training loop needs to know
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub num_features: usize,
    pub num_actions: usize,

    pub capacity: usize,
    pub batch_size: usize,
    pub discount: f32,
    pub tau: f32,
    pub double_dqn: bool,

    pub epsilon: EpsilonConfig,

    pub train_every_n_episodes: usize,
    pub sync_every_k_train_steps: usize,
    pub checkpoint_every_k_episodes: usize,
    pub checkpoint_path: Option<PathBuf>,

    /// Episodes longer than this are cut off; the last stored transition keeps `done = false`
    pub max_steps_per_episode: Option<usize>,
    /// `false` runs greedy evaluation: nothing is stored, trained or decayed
    pub training: bool,
    /// Weights loaded at construction; a failed load is fatal
    pub resume_from: Option<PathBuf>,

    pub rewards: RewardTable,
    pub network: NetworkConfig,

    /// Seed for exploration, replay sampling and the built-in network's initial weights
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            num_features: 5,
            num_actions: 2,
            capacity: 20_000,
            batch_size: 32,
            discount: 0.99,
            tau: 0.005,
            double_dqn: true,
            epsilon: EpsilonConfig::default(),
            train_every_n_episodes: 2,
            sync_every_k_train_steps: 1,
            checkpoint_every_k_episodes: 100,
            checkpoint_path: None,
            max_steps_per_episode: Some(500),
            training: true,
            resume_from: None,
            rewards: RewardTable::default(),
            network: NetworkConfig::default(),
            seed: None,
        }
    }
}

fn invalid(name: &str, reason: String) -> QError {
    QError::InvalidParameter { name: name.to_string(), reason }
}

impl TrainerConfig {
    /// Check every range constraint, returning the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.num_features == 0 {
            return Err(invalid("num_features", "must be greater than 0".into()));
        }
        if self.num_actions == 0 {
            return Err(invalid("num_actions", "must be greater than 0".into()));
        }
        if self.capacity == 0 {
            return Err(invalid("capacity", "must be greater than 0".into()));
        }
        if self.batch_size == 0 || self.batch_size > self.capacity {
            return Err(invalid(
                "batch_size",
                format!("must be in [1, capacity = {}], got {}", self.capacity, self.batch_size),
            ));
        }
        if !(self.discount > 0.0 && self.discount < 1.0) {
            return Err(invalid("discount", format!("must be in (0, 1), got {}", self.discount)));
        }
        if !(self.tau > 0.0 && self.tau <= 1.0) {
            return Err(invalid("tau", format!("must be in (0, 1], got {}", self.tau)));
        }

        let eps = &self.epsilon;
        if !(eps.min >= 0.0 && eps.min <= eps.initial && eps.initial <= 1.0) {
            return Err(invalid(
                "epsilon",
                format!("need 0 <= min ({}) <= initial ({}) <= 1", eps.min, eps.initial),
            ));
        }
        if !(eps.decay_rate > 0.0 && eps.decay_rate <= 1.0) {
            return Err(invalid("epsilon.decay_rate", format!("must be in (0, 1], got {}", eps.decay_rate)));
        }
        if let ExplorationPolicy::Biased { action, probability } = eps.policy {
            if action >= self.num_actions {
                return Err(QError::InvalidAction { action, num_actions: self.num_actions });
            }
            if !(0.0..=1.0).contains(&probability) {
                return Err(invalid("epsilon.policy.probability", format!("must be in [0, 1], got {}", probability)));
            }
        }

        for (name, value) in [
            ("train_every_n_episodes", self.train_every_n_episodes),
            ("sync_every_k_train_steps", self.sync_every_k_train_steps),
            ("checkpoint_every_k_episodes", self.checkpoint_every_k_episodes),
        ] {
            if value == 0 {
                return Err(invalid(name, "must be greater than 0".into()));
            }
        }
        if self.max_steps_per_episode == Some(0) {
            return Err(invalid("max_steps_per_episode", "must be greater than 0 when set".into()));
        }
        if !self.training && self.resume_from.is_none() {
            return Err(invalid("resume_from", "evaluation (training = false) needs weights to load".into()));
        }
        if !self.rewards.is_finite() {
            return Err(invalid("rewards", "every reward must be finite".into()));
        }

        let net = &self.network;
        if net.hidden_layers.iter().any(|&units| units == 0) {
            return Err(invalid("network.hidden_layers", "every hidden layer needs at least one unit".into()));
        }
        if !(net.learning_rate > 0.0 && net.learning_rate.is_finite()) {
            return Err(invalid("network.learning_rate", format!("must be positive, got {}", net.learning_rate)));
        }
        match net.grad_clip {
            GradientClipper::ClipByGlobalNorm { max_norm } if !(max_norm > 0.0) => {
                return Err(invalid("network.grad_clip", format!("max_norm must be positive, got {}", max_norm)));
            }
            GradientClipper::ClipByValue { min, max } if !(min < max) => {
                return Err(invalid("network.grad_clip", format!("need min < max, got [{}, {}]", min, max)));
            }
            _ => {}
        }
        if let LossKind::Huber { delta } = net.loss {
            if !(delta > 0.0 && delta.is_finite()) {
                return Err(invalid("network.loss.delta", format!("must be positive, got {}", delta)));
            }
        }
        if let OptimizerKind::Adam { beta1, beta2, epsilon } = net.optimizer {
            if !((0.0..1.0).contains(&beta1) && (0.0..1.0).contains(&beta2)) {
                return Err(invalid(
                    "network.optimizer",
                    format!("betas must be in [0, 1), got ({}, {})", beta1, beta2),
                ));
            }
            if !(epsilon > 0.0) {
                return Err(invalid("network.optimizer.epsilon", format!("must be positive, got {}", epsilon)));
            }
        }
        if let Activation::LeakyRelu { alpha } = net.hidden_activation {
            if !alpha.is_finite() {
                return Err(invalid("network.hidden_activation", format!("alpha must be finite, got {}", alpha)));
            }
        }
        if let Some(WeightInit::Uniform { min, max }) = net.weight_init {
            if !(min <= max && min.is_finite() && max.is_finite()) {
                return Err(invalid("network.weight_init", format!("need finite min <= max, got [{}, {}]", min, max)));
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: TrainerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        TrainerConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = TrainerConfig::from_json_str(
            r#"{ "batch_size": 8, "double_dqn": false, "epsilon": { "cadence": "per_episode" } }"#,
        )
        .unwrap();
        assert_eq!(config.batch_size, 8);
        assert!(!config.double_dqn);
        assert_eq!(config.epsilon.cadence, DecayCadence::PerEpisode);
        assert_eq!(config.epsilon.decay_rate, 0.995);
        assert_eq!(config.capacity, 20_000);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = TrainerConfig {
            checkpoint_path: Some(PathBuf::from("weights.bin")),
            seed: Some(42),
            ..TrainerConfig::default()
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(TrainerConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let cases = [
            TrainerConfig { discount: 1.0, ..TrainerConfig::default() },
            TrainerConfig { discount: 0.0, ..TrainerConfig::default() },
            TrainerConfig { tau: 0.0, ..TrainerConfig::default() },
            TrainerConfig { tau: 1.5, ..TrainerConfig::default() },
            TrainerConfig { capacity: 0, ..TrainerConfig::default() },
            TrainerConfig { batch_size: 50, capacity: 10, ..TrainerConfig::default() },
            TrainerConfig { train_every_n_episodes: 0, ..TrainerConfig::default() },
            TrainerConfig { sync_every_k_train_steps: 0, ..TrainerConfig::default() },
            TrainerConfig { max_steps_per_episode: Some(0), ..TrainerConfig::default() },
            TrainerConfig { training: false, resume_from: None, ..TrainerConfig::default() },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(QError::InvalidParameter { .. })),
                "accepted {:?}",
                config
            );
        }
    }

    #[test]
    fn test_tau_one_is_allowed() {
        TrainerConfig { tau: 1.0, ..TrainerConfig::default() }.validate().unwrap();
    }

    #[test]
    fn test_biased_action_outside_space() {
        let mut config = TrainerConfig::default();
        config.epsilon.policy = ExplorationPolicy::Biased { action: 2, probability: 0.2 };
        assert!(matches!(config.validate(), Err(QError::InvalidAction { action: 2, num_actions: 2 })));
    }

    #[test]
    fn test_epsilon_ordering() {
        let mut config = TrainerConfig::default();
        config.epsilon.min = 0.5;
        config.epsilon.initial = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_network_hyperparameters() {
        let networks = [
            NetworkConfig { loss: LossKind::Huber { delta: 0.0 }, ..NetworkConfig::default() },
            NetworkConfig { loss: LossKind::Huber { delta: f32::INFINITY }, ..NetworkConfig::default() },
            NetworkConfig {
                optimizer: OptimizerKind::Adam { beta1: 1.0, beta2: 0.999, epsilon: 1e-8 },
                ..NetworkConfig::default()
            },
            NetworkConfig {
                optimizer: OptimizerKind::Adam { beta1: 0.9, beta2: -0.1, epsilon: 1e-8 },
                ..NetworkConfig::default()
            },
            NetworkConfig {
                optimizer: OptimizerKind::Adam { beta1: 0.9, beta2: 0.999, epsilon: 0.0 },
                ..NetworkConfig::default()
            },
            NetworkConfig { grad_clip: GradientClipper::ClipByGlobalNorm { max_norm: 0.0 }, ..NetworkConfig::default() },
            NetworkConfig { grad_clip: GradientClipper::ClipByValue { min: 1.0, max: -1.0 }, ..NetworkConfig::default() },
            NetworkConfig { hidden_activation: Activation::LeakyRelu { alpha: f32::NAN }, ..NetworkConfig::default() },
            NetworkConfig { weight_init: Some(WeightInit::Uniform { min: 0.5, max: -0.5 }), ..NetworkConfig::default() },
        ];
        for network in networks {
            let config = TrainerConfig { network, ..TrainerConfig::default() };
            assert!(
                matches!(config.validate(), Err(QError::InvalidParameter { .. })),
                "accepted {:?}",
                config.network
            );
        }
    }

    #[test]
    fn test_evaluation_needs_weights() {
        let config = TrainerConfig { training: false, ..TrainerConfig::default() };
        match config.validate() {
            Err(QError::InvalidParameter { name, .. }) => assert_eq!(name, "resume_from"),
            other => panic!("unexpected {:?}", other),
        }
        TrainerConfig { resume_from: Some(PathBuf::from("weights.bin")), ..config }.validate().unwrap();
    }

    #[test]
    fn test_network_variants_from_json() {
        let config = TrainerConfig::from_json_str(
            r#"{ "network": {
                "hidden_activation": { "leaky_relu": { "alpha": 0.1 } },
                "weight_init": { "uniform": { "min": -0.05, "max": 0.05 } },
                "grad_clip": { "kind": "clip_by_value", "min": -1.0, "max": 1.0 },
                "loss": { "kind": "huber", "delta": 1.0 }
            } }"#,
        )
        .unwrap();
        assert_eq!(config.network.hidden_activation, Activation::LeakyRelu { alpha: 0.1 });
        assert_eq!(config.network.weight_init, Some(WeightInit::Uniform { min: -0.05, max: 0.05 }));
        assert_eq!(config.network.grad_clip, GradientClipper::ClipByValue { min: -1.0, max: 1.0 });
        assert_eq!(config.network.hidden_layers, vec![128, 64]);

        let tanh = TrainerConfig::from_json_str(
            r#"{ "network": { "hidden_activation": "tanh", "weight_init": "zeros" } }"#,
        )
        .unwrap();
        assert_eq!(tanh.network.hidden_activation, Activation::Tanh);
        assert_eq!(tanh.network.weight_init, Some(WeightInit::Zeros));
    }
}
