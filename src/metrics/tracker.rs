use std::collections::VecDeque;
use std::path::Path;
use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::network::write_atomically;

/// Bounded training histories
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Loss of each train step
    pub losses: VecDeque<f32>,

    /// Total reward per episode
    pub episode_rewards: VecDeque<f32>,

    /// Steps per episode
    pub episode_lengths: VecDeque<usize>,

    /// Epsilon at the end of each episode
    pub epsilons: VecDeque<f32>,

    /// Pipes passed per episode
    pub pipes_passed: VecDeque<usize>,
}

impl TrainingMetrics {
    pub fn new(history_size: usize) -> Self {
        TrainingMetrics {
            losses: VecDeque::with_capacity(history_size),
            episode_rewards: VecDeque::with_capacity(history_size),
            episode_lengths: VecDeque::with_capacity(history_size),
            epsilons: VecDeque::with_capacity(history_size),
            pipes_passed: VecDeque::with_capacity(history_size),
        }
    }
}

fn push_bounded<T>(history: &mut VecDeque<T>, value: T, limit: usize) {
    if history.len() >= limit {
        history.pop_front();
    }
    history.push_back(value);
}

/// Tracks metrics during training
#[derive(Debug, Clone)]
pub struct MetricsTracker {
    metrics: TrainingMetrics,
    history_size: usize,

    episode_count: usize,
    total_steps: usize,
    train_steps: usize,
    aborted_episodes: usize,
}

impl MetricsTracker {
    pub fn new(history_size: usize) -> Self {
        let history_size = history_size.max(1);
        MetricsTracker {
            metrics: TrainingMetrics::new(history_size),
            history_size,
            episode_count: 0,
            total_steps: 0,
            train_steps: 0,
            aborted_episodes: 0,
        }
    }

    /// Record a training loss
    pub fn record_loss(&mut self, loss: f32) {
        push_bounded(&mut self.metrics.losses, loss, self.history_size);
        self.train_steps += 1;
    }

    /// Record a finished episode
    pub fn record_episode(&mut self, reward: f32, steps: usize, epsilon: f32, pipes_passed: usize) {
        push_bounded(&mut self.metrics.episode_rewards, reward, self.history_size);
        push_bounded(&mut self.metrics.episode_lengths, steps, self.history_size);
        push_bounded(&mut self.metrics.epsilons, epsilon, self.history_size);
        push_bounded(&mut self.metrics.pipes_passed, pipes_passed, self.history_size);
        self.episode_count += 1;
        self.total_steps += steps;
    }

    /// Count an episode that ended in an error. Its steps still count.
    pub fn record_abort(&mut self, steps: usize) {
        self.aborted_episodes += 1;
        self.total_steps += steps;
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    pub fn episode_count(&self) -> usize {
        self.episode_count
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn train_steps(&self) -> usize {
        self.train_steps
    }

    pub fn aborted_episodes(&self) -> usize {
        self.aborted_episodes
    }

    /// Get recent average loss
    pub fn avg_loss(&self, window: usize) -> Option<f32> {
        recent_mean(self.metrics.losses.iter().copied(), self.metrics.losses.len(), window)
    }

    /// Get recent average episode reward
    pub fn avg_episode_reward(&self, window: usize) -> Option<f32> {
        let rewards = &self.metrics.episode_rewards;
        recent_mean(rewards.iter().copied(), rewards.len(), window)
    }

    /// Most pipes passed in any remembered episode
    pub fn best_pipes_passed(&self) -> Option<usize> {
        self.metrics.pipes_passed.iter().copied().max()
    }

    pub fn clear(&mut self) {
        *self = MetricsTracker::new(self.history_size);
    }

    /// Save metrics to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(&self.metrics)?;
        write_atomically(path, serialized.as_bytes())
    }

    /// Load metrics from a JSON file
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let data = std::fs::read_to_string(path)?;
        self.metrics = serde_json::from_str(&data)?;
        Ok(())
    }
}

fn recent_mean<I>(values: I, len: usize, window: usize) -> Option<f32>
where
    I: DoubleEndedIterator<Item = f32>,
{
    let n = window.min(len);
    if n == 0 {
        return None;
    }
    let sum: f32 = values.rev().take(n).sum();
    Some(sum / n as f32)
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new(1000)
    }
}
