use ndarray::Array2;

use crate::approximator::FunctionApproximator;
use crate::batch::Batch;
use crate::error::{QError, Result};
use crate::exploration::argmax;

/// Builds Bellman regression targets for a batch.
///
/// For every row `b` the taken action's column becomes
/// `y = reward + (1 - done) * discount * bootstrap`, where `bootstrap` is
/// `max_a Q_online(next, a)` in plain mode and
/// `Q_target(next, argmax_a Q_online(next, a))` in Double-DQN mode. Every
/// other column is copied from the online network's current predictions so
/// the regression loss only moves the taken action.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetComputer {
    pub discount: f32,
    pub double_dqn: bool,
}

impl TargetComputer {
    pub fn new(discount: f32, double_dqn: bool) -> Self {
        TargetComputer { discount, double_dqn }
    }

    /// Returns a `[B, A]` target tensor. The target network is only queried in
    /// Double-DQN mode.
    pub fn compute<F, T>(&self, batch: &Batch, online: &F, target: &T) -> Result<Array2<f32>>
    where
        F: FunctionApproximator + ?Sized,
        T: FunctionApproximator + ?Sized,
    {
        let num_actions = online.num_actions();
        let b = batch.len();
        batch.validate(num_actions)?;

        let current_q = online.predict(batch.states.view())?;
        let next_q = online.predict(batch.next_states.view())?;
        check_shape("online Q(states)", &current_q, b, num_actions)?;
        check_shape("online Q(next_states)", &next_q, b, num_actions)?;

        let bootstrap: Vec<f32> = if self.double_dqn {
            let target_next_q = target.predict(batch.next_states.view())?;
            check_shape("target Q(next_states)", &target_next_q, b, num_actions)?;
            next_q
                .rows()
                .into_iter()
                .zip(target_next_q.rows())
                .map(|(online_row, target_row)| {
                    argmax(online_row)
                        .map(|best| target_row[best])
                        .ok_or_else(|| QError::Approximator("empty Q-value row".to_string()))
                })
                .collect::<Result<_>>()?
        } else {
            next_q
                .rows()
                .into_iter()
                .map(|row| row.iter().copied().fold(f32::NEG_INFINITY, f32::max))
                .collect()
        };

        let mut targets = current_q;
        for (row, &action) in batch.actions.iter().enumerate() {
            let not_done = 1.0 - batch.dones[row];
            // Terminal rows must not bootstrap, even if discount * bootstrap is not finite
            let future = if not_done == 0.0 { 0.0 } else { not_done * self.discount * bootstrap[row] };
            targets[[row, action]] = batch.rewards[row] + future;
        }
        Ok(targets)
    }
}

fn check_shape(what: &str, q: &Array2<f32>, rows: usize, cols: usize) -> Result<()> {
    if q.dim() != (rows, cols) {
        return Err(QError::dimension_mismatch(
            format!("{} [{}, {}]", what, rows, cols),
            format!("{:?}", q.shape()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::LookupQ;
    use ndarray::array;

    /// One transition from state key 0 to state key 1.
    fn single(action: usize, reward: f32, done: bool) -> Batch {
        Batch {
            states: array![[0.0]],
            actions: vec![action],
            rewards: array![reward],
            next_states: array![[1.0]],
            dones: array![if done { 1.0 } else { 0.0 }],
        }
    }

    #[test]
    fn test_bellman_target_plain() {
        let online = LookupQ::new(array![[3.0, 4.0], [0.5, 2.0]], 1);
        let computer = TargetComputer::new(0.9, false);
        let targets = computer.compute(&single(0, 1.0, false), &online, &online).unwrap();
        assert!((targets[[0, 0]] - 2.8).abs() < 1e-6);
        assert_eq!(targets[[0, 1]], 4.0);
    }

    #[test]
    fn test_terminal_target_is_reward() {
        let online = LookupQ::new(array![[3.0, 4.0], [50.0, f32::MAX]], 1);
        for discount in [0.1, 0.5, 0.99] {
            for double_dqn in [false, true] {
                let computer = TargetComputer::new(discount, double_dqn);
                let targets = computer.compute(&single(1, -10.0, true), &online, &online).unwrap();
                assert_eq!(targets[[0, 1]], -10.0);
            }
        }
    }

    #[test]
    fn test_double_dqn_uses_target_value() {
        let online = LookupQ::new(array![[0.0, 0.0], [0.1, 0.9]], 1);
        let target = LookupQ::new(array![[0.0, 0.0], [0.4, 0.2]], 1);
        // discount must stay below 1 in configuration, but the arithmetic allows it
        let computer = TargetComputer::new(1.0, true);
        let targets = computer.compute(&single(0, 1.0, false), &online, &target).unwrap();
        assert!((targets[[0, 0]] - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_only_taken_action_changes() {
        let online = LookupQ::new(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]], 1);
        let batch = Batch {
            states: array![[0.0], [1.0], [2.0], [0.0]],
            actions: vec![2, 0, 1, 1],
            rewards: array![1.0, 2.0, 3.0, 4.0],
            next_states: array![[1.0], [2.0], [0.0], [2.0]],
            dones: array![0.0, 1.0, 0.0, 0.0],
        };
        let current = online.predict(batch.states.view()).unwrap();
        let targets = TargetComputer::new(0.5, false).compute(&batch, &online, &online).unwrap();

        for row in 0..batch.len() {
            for col in 0..3 {
                if col != batch.actions[row] {
                    assert_eq!(targets[[row, col]], current[[row, col]]);
                }
            }
        }
        assert_eq!(targets[[0, 2]], 1.0 + 0.5 * 6.0);
        assert_eq!(targets[[1, 0]], 2.0);
    }

    #[test]
    fn test_rejects_invalid_action_before_predicting() {
        let mut online = LookupQ::new(array![[0.0, 0.0], [0.0, 0.0]], 1);
        online.fail_predict = true;
        let result = TargetComputer::new(0.9, false).compute(&single(5, 1.0, false), &online, &online);
        assert!(matches!(result, Err(QError::InvalidAction { action: 5, num_actions: 2 })));
    }

    #[test]
    fn test_approximator_failure_propagates() {
        let mut online = LookupQ::new(array![[0.0, 0.0], [0.0, 0.0]], 1);
        online.fail_predict = true;
        let result = TargetComputer::new(0.9, false).compute(&single(0, 1.0, false), &online, &online);
        assert!(matches!(result, Err(QError::Approximator(_))));
    }
}
