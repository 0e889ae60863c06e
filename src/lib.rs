//! # qtrainer - Deep Q-Learning training engine
//!
//! qtrainer trains a Q-value function approximator against an episodic
//! environment with experience replay, Bellman targets (optionally Double
//! DQN), a soft- or hard-synchronized target network and epsilon-greedy
//! exploration.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use qtrainer::config::TrainerConfig;
//! use qtrainer::environment::{Environment, RewardKind, StepOutcome};
//! use qtrainer::error::Result;
//! use qtrainer::trainer::Trainer;
//! use ndarray::Array1;
//!
//! struct Corridor { position: f32 }
//!
//! impl Environment for Corridor {
//!     fn reset(&mut self) -> Result<()> {
//!         self.position = 0.0;
//!         Ok(())
//!     }
//!
//!     fn observe(&mut self) -> Result<Array1<f32>> {
//!         Ok(Array1::from_elem(5, self.position))
//!     }
//!
//!     fn step(&mut self, action: usize) -> Result<StepOutcome> {
//!         self.position += if action == 1 { 0.1 } else { -0.1 };
//!         Ok(if self.position >= 1.0 {
//!             StepOutcome::new(true, RewardKind::PortalEntered)
//!         } else if self.position <= -1.0 {
//!             StepOutcome::new(true, RewardKind::Died)
//!         } else {
//!             StepOutcome::new(false, RewardKind::Survived)
//!         })
//!     }
//! }
//!
//! let mut trainer = Trainer::with_q_network(TrainerConfig::default(), Corridor { position: 0.0 })?;
//! for report in trainer.run(10)? {
//!     println!("episode {} reward {}", report.episode, report.total_reward);
//! }
//! # Ok::<(), qtrainer::error::QError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`replay_memory`] - Bounded FIFO transition store
//! - [`batch`] - Gathering sampled transitions into aligned arrays
//! - [`target`] - TD target computation
//! - [`approximator`] - The function-approximator seam and the built-in Q-network
//! - [`sync`] - Target-network hard and soft updates
//! - [`exploration`] - Epsilon-greedy action selection and decay
//! - [`environment`] - The environment seam and reward table
//! - [`trainer`] - The episode loop
//! - [`config`] - Training configuration
//! - [`metrics`] - Training metrics and tracking
//! - [`error`] - Error types and result handling
//! - [`network`], [`layers`], [`activations`], [`optimizer`], [`loss`] - Dense network backend

pub mod activations;
pub mod approximator;
pub mod batch;
pub mod config;
pub mod environment;
pub mod error;
pub mod exploration;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod replay_memory;
pub mod sync;
pub mod target;
pub mod trainer;

pub use approximator::{FunctionApproximator, QNetwork, Weights};
pub use config::TrainerConfig;
pub use environment::{Environment, RewardKind, StepOutcome};
pub use error::{QError, Result};
pub use trainer::{EpisodeOutcome, EpisodeReport, Trainer};

#[cfg(test)]
mod tests;
