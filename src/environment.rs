use ndarray::Array1;
use serde::{Serialize, Deserialize};

use crate::error::Result;

/// What happened during one environment tick, as reported by the game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RewardKind {
    PipePassed,
    CrystalCollected,
    PortalEntered,
    Died,
    Survived,
}

/// Result of a single `Environment::step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    pub done: bool,
    pub reward_kind: RewardKind,
}

impl StepOutcome {
    pub fn new(done: bool, reward_kind: RewardKind) -> Self {
        StepOutcome { done, reward_kind }
    }
}

/// The simulation the agent acts in.
///
/// `step` blocks for one simulation tick. Errors from any method abort the
/// current episode in the training loop.
pub trait Environment {
    fn reset(&mut self) -> Result<()>;

    /// Current feature vector (length F).
    fn observe(&mut self) -> Result<Array1<f32>>;

    fn step(&mut self, action: usize) -> Result<StepOutcome>;
}

/// Scalar reward for each [`RewardKind`], supplied via configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardTable {
    pub pipe_passed: f32,
    pub crystal_collected: f32,
    pub portal_entered: f32,
    pub died: f32,
    pub survived: f32,
}

impl RewardTable {
    pub fn reward(&self, kind: RewardKind) -> f32 {
        match kind {
            RewardKind::PipePassed => self.pipe_passed,
            RewardKind::CrystalCollected => self.crystal_collected,
            RewardKind::PortalEntered => self.portal_entered,
            RewardKind::Died => self.died,
            RewardKind::Survived => self.survived,
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.pipe_passed, self.crystal_collected, self.portal_entered, self.died, self.survived]
            .iter()
            .all(|r| r.is_finite())
    }
}

impl Default for RewardTable {
    fn default() -> Self {
        RewardTable {
            pipe_passed: 100.0,
            crystal_collected: 75.0,
            portal_entered: 50.0,
            died: -10.0,
            survived: 1.0,
        }
    }
}
