use ndarray::{Array1, Array2};
use rand::Rng;

use crate::error::{QError, Result};
use crate::replay_memory::ReplayMemory;

/// Aligned training arrays gathered from replay memory.
///
/// Rows of every array refer to the same sampled transition. `dones` holds
/// `1.0` for terminal transitions and `0.0` otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub states: Array2<f32>,
    pub actions: Vec<usize>,
    pub rewards: Array1<f32>,
    pub next_states: Array2<f32>,
    pub dones: Array1<f32>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.states.ncols()
    }

    /// Check that all arrays agree on `B` and `F` and every action is below `num_actions`.
    pub fn validate(&self, num_actions: usize) -> Result<()> {
        let b = self.len();
        if b == 0 {
            return Err(QError::invalid_parameter("batch", "batch is empty"));
        }
        let f = self.num_features();
        if self.states.dim() != (b, f)
            || self.next_states.dim() != (b, f)
            || self.rewards.len() != b
            || self.dones.len() != b
        {
            return Err(QError::dimension_mismatch(
                format!("states [{b}, {f}], next_states [{b}, {f}], rewards [{b}], dones [{b}]"),
                format!(
                    "states {:?}, next_states {:?}, rewards [{}], dones [{}]",
                    self.states.shape(),
                    self.next_states.shape(),
                    self.rewards.len(),
                    self.dones.len()
                ),
            ));
        }
        if let Some(&action) = self.actions.iter().find(|&&a| a >= num_actions) {
            return Err(QError::InvalidAction { action, num_actions });
        }
        Ok(())
    }
}

/// Draws replay indices and assembles them into a [`Batch`].
#[derive(Clone, Copy, Debug)]
pub struct BatchSampler {
    pub batch_size: usize,
    pub num_features: usize,
    pub num_actions: usize,
}

impl BatchSampler {
    pub fn new(batch_size: usize, num_features: usize, num_actions: usize) -> Self {
        BatchSampler { batch_size, num_features, num_actions }
    }

    /// Sample `batch_size` indices with replacement and gather them.
    pub fn sample<R: Rng + ?Sized>(&self, memory: &ReplayMemory, rng: &mut R) -> Result<Batch> {
        let indices = memory.sample(self.batch_size, rng)?;
        self.gather(memory, &indices)
    }

    /// Gather the transitions at `indices`, validating every shape and action
    /// before anything is handed to the approximator.
    pub fn gather(&self, memory: &ReplayMemory, indices: &[usize]) -> Result<Batch> {
        let b = indices.len();
        let f = self.num_features;
        let mut states = Array2::zeros((b, f));
        let mut next_states = Array2::zeros((b, f));
        let mut actions = Vec::with_capacity(b);
        let mut rewards = Array1::zeros(b);
        let mut dones = Array1::zeros(b);

        for (row, &index) in indices.iter().enumerate() {
            let transition = memory.get(index).ok_or_else(|| {
                QError::dimension_mismatch(format!("index < {}", memory.len()), index.to_string())
            })?;
            if transition.state.len() != f || transition.next_state.len() != f {
                return Err(QError::dimension_mismatch(
                    format!("{} features", f),
                    format!("state {} / next_state {}", transition.state.len(), transition.next_state.len()),
                ));
            }
            if transition.action >= self.num_actions {
                return Err(QError::InvalidAction {
                    action: transition.action,
                    num_actions: self.num_actions,
                });
            }

            states.row_mut(row).assign(&transition.state);
            next_states.row_mut(row).assign(&transition.next_state);
            actions.push(transition.action);
            rewards[row] = transition.reward;
            dones[row] = if transition.done { 1.0 } else { 0.0 };
        }

        let batch = Batch { states, actions, rewards, next_states, dones };
        batch.validate(self.num_actions)?;
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay_memory::Transition;
    use ndarray::array;

    fn memory_with(n: usize) -> ReplayMemory {
        let mut memory = ReplayMemory::new(16);
        for i in 0..n {
            memory.insert(Transition {
                state: array![i as f32, 0.0],
                action: i % 2,
                reward: i as f32 * 10.0,
                next_state: array![i as f32 + 1.0, 0.0],
                done: i == n - 1,
            });
        }
        memory
    }

    #[test]
    fn test_gather_keeps_rows_aligned() {
        let memory = memory_with(4);
        let sampler = BatchSampler::new(3, 2, 2);
        let batch = sampler.gather(&memory, &[3, 0, 3]).unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.states.column(0).to_vec(), vec![3.0, 0.0, 3.0]);
        assert_eq!(batch.next_states.column(0).to_vec(), vec![4.0, 1.0, 4.0]);
        assert_eq!(batch.actions, vec![1, 0, 1]);
        assert_eq!(batch.rewards.to_vec(), vec![30.0, 0.0, 30.0]);
        assert_eq!(batch.dones.to_vec(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_gather_rejects_feature_mismatch() {
        let memory = memory_with(2);
        let sampler = BatchSampler::new(1, 3, 2);
        assert!(matches!(
            sampler.gather(&memory, &[0]),
            Err(QError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_gather_rejects_out_of_range_action() {
        let memory = memory_with(2);
        let sampler = BatchSampler::new(1, 2, 1);
        assert!(matches!(
            sampler.gather(&memory, &[1]),
            Err(QError::InvalidAction { action: 1, num_actions: 1 })
        ));
    }

    #[test]
    fn test_sample_requires_enough_transitions() {
        let memory = memory_with(2);
        let sampler = BatchSampler::new(3, 2, 2);
        let mut rng = rand::thread_rng();
        assert!(matches!(
            sampler.sample(&memory, &mut rng),
            Err(QError::InsufficientMemory { requested: 3, available: 2 })
        ));
    }
}
