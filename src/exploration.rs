use ndarray::ArrayView1;
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::approximator::FunctionApproximator;
use crate::config::EpsilonConfig;
use crate::error::{QError, Result};

/// How an exploratory action is drawn once the epsilon coin comes up "explore".
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExplorationPolicy {
    /// Every action equally likely
    Uniform,
    /// `action` with `probability`, the rest spread evenly over the other actions
    Biased { action: usize, probability: f32 },
}

impl Default for ExplorationPolicy {
    fn default() -> Self {
        ExplorationPolicy::Biased { action: 1, probability: 0.2 }
    }
}

impl ExplorationPolicy {
    pub fn sample<R: Rng + ?Sized>(&self, num_actions: usize, rng: &mut R) -> usize {
        match *self {
            ExplorationPolicy::Uniform => rng.gen_range(0..num_actions),
            ExplorationPolicy::Biased { action, probability } => {
                if num_actions == 1 || rng.gen::<f32>() < probability {
                    return action;
                }
                // Uniform over the other num_actions - 1 actions
                let other = rng.gen_range(0..num_actions - 1);
                if other >= action { other + 1 } else { other }
            }
        }
    }
}

/// When [`ExplorationScheduler::decay`] is called by the training loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecayCadence {
    /// After every finished episode
    PerEpisode,
    /// After every training cycle, whether or not a batch was available
    #[default]
    PerTrainCycle,
}

/// Index of the largest Q-value; ties go to the lowest index.
pub fn argmax(values: ArrayView1<f32>) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Epsilon-greedy action selection with multiplicative decay.
///
/// # Example
///
/// ```
/// use qtrainer::config::EpsilonConfig;
/// use qtrainer::exploration::ExplorationScheduler;
///
/// let mut scheduler = ExplorationScheduler::new(EpsilonConfig {
///     initial: 1.0,
///     min: 0.5,
///     decay_rate: 0.5,
///     ..EpsilonConfig::default()
/// });
/// scheduler.decay();
/// scheduler.decay();
/// assert_eq!(scheduler.epsilon(), 0.5);
/// ```
#[derive(Clone, Debug)]
pub struct ExplorationScheduler {
    epsilon: f32,
    config: EpsilonConfig,
}

impl ExplorationScheduler {
    pub fn new(config: EpsilonConfig) -> Self {
        ExplorationScheduler {
            epsilon: config.initial.max(config.min),
            config,
        }
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn cadence(&self) -> DecayCadence {
        self.config.cadence
    }

    /// `epsilon = max(epsilon * decay_rate, min)`
    pub fn decay(&mut self) -> f32 {
        self.epsilon = (self.epsilon * self.config.decay_rate).max(self.config.min);
        self.epsilon
    }

    /// Restore the initial epsilon.
    pub fn reset(&mut self) {
        self.epsilon = self.config.initial.max(self.config.min);
    }

    /// Explore with probability epsilon in training mode, otherwise act greedily.
    pub fn select_action<F, R>(
        &self,
        state: ArrayView1<f32>,
        training: bool,
        approximator: &F,
        rng: &mut R,
    ) -> Result<usize>
    where
        F: FunctionApproximator + ?Sized,
        R: Rng + ?Sized,
    {
        let num_actions = approximator.num_actions();
        if num_actions == 0 {
            return Err(QError::invalid_parameter("num_actions", "action space is empty"));
        }

        if training && rng.gen::<f32>() < self.epsilon {
            return Ok(self.config.policy.sample(num_actions, rng));
        }

        let q_values = approximator.predict_one(state)?;
        argmax(q_values.view())
            .ok_or_else(|| QError::Approximator("no Q-values to choose from".to_string()))
    }
}
