//! Target-network synchronization.
//!
//! The target approximator only changes through these functions, never
//! through a gradient step.

use serde::{Serialize, Deserialize};

use crate::approximator::FunctionApproximator;
use crate::error::{QError, Result};

/// Target parameters become an exact copy of the online parameters.
pub fn hard_update<F, T>(online: &F, target: &mut T) -> Result<()>
where
    F: FunctionApproximator + ?Sized,
    T: FunctionApproximator + ?Sized,
{
    target.set_weights(&online.get_weights())
}

/// `target <- tau * online + (1 - tau) * target` for every parameter.
///
/// `tau = 1` takes the exact copy path of [`hard_update`]; `tau = 0` leaves
/// the target untouched.
pub fn soft_update<F, T>(online: &F, target: &mut T, tau: f32) -> Result<()>
where
    F: FunctionApproximator + ?Sized,
    T: FunctionApproximator + ?Sized,
{
    if !(0.0..=1.0).contains(&tau) {
        return Err(QError::invalid_parameter("tau", format!("must be in [0, 1], got {}", tau)));
    }
    if tau == 1.0 {
        return hard_update(online, target);
    }

    let online_weights = online.get_weights();
    let mut target_weights = target.get_weights();
    if tau == 0.0 {
        return target_weights.check_compatible(&online_weights);
    }
    target_weights.blend_towards(&online_weights, tau)?;
    target.set_weights(&target_weights)
}

/// How the training loop refreshes the target network.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TargetSync {
    Hard,
    Soft { tau: f32 },
}

impl TargetSync {
    pub fn apply<F, T>(&self, online: &F, target: &mut T) -> Result<()>
    where
        F: FunctionApproximator + ?Sized,
        T: FunctionApproximator + ?Sized,
    {
        match *self {
            TargetSync::Hard => hard_update(online, target),
            TargetSync::Soft { tau } => soft_update(online, target, tau),
        }
    }
}
