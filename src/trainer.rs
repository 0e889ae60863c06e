//! The episode-driven training loop.
//!
//! Each episode runs `Running -> Terminal -> finalize`. Finalizing logs the
//! episode and, in training mode, conditionally trains, syncs the target
//! network, decays epsilon and writes a checkpoint.
//!
//! Failure handling:
//! - an environment or approximator error aborts the current episode; the
//!   transitions already stored stay in replay memory and the next
//!   `run_episode` call starts a fresh episode
//! - too few stored transitions skips the training cycle
//! - an out-of-range action, malformed state or failed resume load is fatal
//!   and returned to the caller
//! - a failed checkpoint write is logged and training continues

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use crate::approximator::{train_step, FunctionApproximator, QNetwork};
use crate::batch::BatchSampler;
use crate::config::TrainerConfig;
use crate::environment::{Environment, RewardKind};
use crate::error::{QError, Result};
use crate::exploration::{DecayCadence, ExplorationScheduler};
use crate::metrics::MetricsTracker;
use crate::replay_memory::{ReplayMemory, Transition};
use crate::sync::TargetSync;
use crate::target::TargetComputer;

/// Where the loop currently is within an episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpisodePhase {
    /// Between episodes
    Idle,
    Running,
    /// `done` observed (or the episode ended early), finalization pending
    Terminal,
}

/// How an episode ended
#[derive(Clone, Debug, PartialEq)]
pub enum EpisodeOutcome {
    /// The environment reported `done`
    Completed,
    /// Hit `max_steps_per_episode` without `done`
    Truncated,
    /// An environment or approximator failure ended the episode
    Aborted(QError),
}

impl EpisodeOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, EpisodeOutcome::Aborted(_))
    }
}

/// Summary of one finalized episode.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeReport {
    /// 1-based episode number
    pub episode: usize,
    pub outcome: EpisodeOutcome,
    pub total_reward: f32,
    pub steps: usize,
    pub pipes_passed: usize,
    /// Epsilon after finalization
    pub epsilon: f32,
    pub memory_len: usize,
    /// Loss of the train step run during finalization, if any
    pub loss: Option<f32>,
    pub synced: bool,
    pub checkpointed: bool,
}

#[derive(Default)]
struct EpisodeStats {
    total_reward: f32,
    steps: usize,
    pipes_passed: usize,
}

/// Drives an [`Environment`] with an online approximator and its target copy.
pub struct Trainer<E, F> {
    config: TrainerConfig,
    env: E,
    online: F,
    target: F,
    memory: ReplayMemory,
    sampler: BatchSampler,
    target_computer: TargetComputer,
    sync: TargetSync,
    exploration: ExplorationScheduler,
    metrics: MetricsTracker,
    rng: StdRng,
    episode: usize,
    train_steps: usize,
    phase: EpisodePhase,
}

impl<E: Environment> Trainer<E, QNetwork> {
    /// Build a trainer around a fresh [`QNetwork`] shaped by `config.network`.
    ///
    /// With `config.seed` set, the initial weights are drawn from that seed too.
    pub fn with_q_network(config: TrainerConfig, env: E) -> Result<Self> {
        let mut init_rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let online =
            QNetwork::from_config_with_rng(config.num_features, config.num_actions, &config.network, &mut init_rng)?;
        Trainer::new(config, env, online)
    }
}

impl<E, F> Trainer<E, F>
where
    E: Environment,
    F: FunctionApproximator + Clone,
{
    /// Validate `config`, optionally resume weights, and clone `online` into
    /// the target network.
    pub fn new(config: TrainerConfig, env: E, mut online: F) -> Result<Self> {
        config.validate()?;
        if online.num_features() != config.num_features || online.num_actions() != config.num_actions {
            return Err(QError::dimension_mismatch(
                format!("approximator with F = {}, A = {}", config.num_features, config.num_actions),
                format!("F = {}, A = {}", online.num_features(), online.num_actions()),
            ));
        }

        if let Some(path) = &config.resume_from {
            if let Err(e) = online.load(path) {
                error!(path = %path.display(), error = %e, "failed to resume from checkpoint");
                return Err(e);
            }
            info!(path = %path.display(), "resumed weights");
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Trainer {
            memory: ReplayMemory::new(config.capacity),
            sampler: BatchSampler::new(config.batch_size, config.num_features, config.num_actions),
            target_computer: TargetComputer::new(config.discount, config.double_dqn),
            sync: TargetSync::Soft { tau: config.tau },
            exploration: ExplorationScheduler::new(config.epsilon),
            metrics: MetricsTracker::default(),
            target: online.clone(),
            online,
            env,
            rng,
            config,
            episode: 0,
            train_steps: 0,
            phase: EpisodePhase::Idle,
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn online(&self) -> &F {
        &self.online
    }

    pub fn online_mut(&mut self) -> &mut F {
        &mut self.online
    }

    pub fn target(&self) -> &F {
        &self.target
    }

    pub fn memory(&self) -> &ReplayMemory {
        &self.memory
    }

    pub fn exploration(&self) -> &ExplorationScheduler {
        &self.exploration
    }

    pub fn exploration_mut(&mut self) -> &mut ExplorationScheduler {
        &mut self.exploration
    }

    pub fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }

    /// Episodes finalized so far, aborted ones included
    pub fn episodes(&self) -> usize {
        self.episode
    }

    pub fn train_steps(&self) -> usize {
        self.train_steps
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    pub fn into_parts(self) -> (E, F, F) {
        (self.env, self.online, self.target)
    }

    /// Run `episodes` episodes, stopping at the first fatal error.
    pub fn run(&mut self, episodes: usize) -> Result<Vec<EpisodeReport>> {
        let mut reports = Vec::with_capacity(episodes);
        for _ in 0..episodes {
            reports.push(self.run_episode()?);
        }
        if let Some(avg) = self.metrics.avg_episode_reward(100) {
            info!(
                episodes = self.episode,
                train_steps = self.train_steps,
                avg_reward = avg,
                "training run finished"
            );
        }
        Ok(reports)
    }

    /// Play one episode to its end and finalize it.
    pub fn run_episode(&mut self) -> Result<EpisodeReport> {
        self.episode += 1;
        self.phase = EpisodePhase::Running;

        let mut stats = EpisodeStats::default();
        let outcome = match self.play(&mut stats) {
            Ok(outcome) => outcome,
            Err(e) if e.aborts_episode() => {
                warn!(episode = self.episode, steps = stats.steps, error = %e, "episode aborted");
                EpisodeOutcome::Aborted(e)
            }
            Err(e) => {
                error!(episode = self.episode, error = %e, "fatal error during episode");
                self.phase = EpisodePhase::Idle;
                return Err(e);
            }
        };

        self.phase = EpisodePhase::Terminal;
        let report = self.finalize(outcome, stats);
        self.phase = EpisodePhase::Idle;
        report
    }

    fn check_state(&self, state: &Array1<f32>) -> Result<()> {
        if state.len() != self.config.num_features {
            return Err(QError::dimension_mismatch(
                format!("state of {} features", self.config.num_features),
                format!("{} features", state.len()),
            ));
        }
        Ok(())
    }

    fn play(&mut self, stats: &mut EpisodeStats) -> Result<EpisodeOutcome> {
        let training = self.config.training;
        let num_actions = self.config.num_actions;

        self.env.reset()?;
        let mut state = self.env.observe()?;
        self.check_state(&state)?;

        loop {
            let action = self.exploration.select_action(state.view(), training, &self.online, &mut self.rng)?;
            if action >= num_actions {
                return Err(QError::InvalidAction { action, num_actions });
            }

            let step = self.env.step(action)?;
            let reward = self.config.rewards.reward(step.reward_kind);
            stats.steps += 1;
            stats.total_reward += reward;
            if step.reward_kind == RewardKind::PipePassed {
                stats.pipes_passed += 1;
            }

            let next_state = self.env.observe()?;
            self.check_state(&next_state)?;

            if training {
                self.memory.insert(Transition {
                    state,
                    action,
                    reward,
                    next_state: next_state.clone(),
                    done: step.done,
                });
            }

            if step.done {
                return Ok(EpisodeOutcome::Completed);
            }
            if self.config.max_steps_per_episode.map_or(false, |max| stats.steps >= max) {
                return Ok(EpisodeOutcome::Truncated);
            }
            state = next_state;
        }
    }

    fn finalize(&mut self, outcome: EpisodeOutcome, stats: EpisodeStats) -> Result<EpisodeReport> {
        let mut report = EpisodeReport {
            episode: self.episode,
            outcome,
            total_reward: stats.total_reward,
            steps: stats.steps,
            pipes_passed: stats.pipes_passed,
            epsilon: self.exploration.epsilon(),
            memory_len: self.memory.len(),
            loss: None,
            synced: false,
            checkpointed: false,
        };

        if self.config.training && !report.outcome.is_aborted() {
            if self.episode % self.config.train_every_n_episodes == 0 {
                match self.train_cycle(&mut report) {
                    Ok(()) => {}
                    Err(e) if e.aborts_episode() => {
                        warn!(episode = self.episode, error = %e, "training cycle failed");
                        report.outcome = EpisodeOutcome::Aborted(e);
                    }
                    Err(e) => {
                        error!(episode = self.episode, error = %e, "fatal error during training");
                        return Err(e);
                    }
                }
            }

            if !report.outcome.is_aborted() && self.exploration.cadence() == DecayCadence::PerEpisode {
                self.exploration.decay();
            }

            if !report.outcome.is_aborted() && self.episode % self.config.checkpoint_every_k_episodes == 0 {
                report.checkpointed = self.checkpoint();
            }
        }

        report.epsilon = self.exploration.epsilon();
        if report.outcome.is_aborted() {
            self.metrics.record_abort(report.steps);
        } else {
            self.metrics.record_episode(report.total_reward, report.steps, report.epsilon, report.pipes_passed);
        }

        info!(
            episode = report.episode,
            reward = report.total_reward,
            steps = report.steps,
            pipes = report.pipes_passed,
            epsilon = report.epsilon,
            memory = report.memory_len,
            outcome = ?report.outcome,
            "episode finished"
        );
        Ok(report)
    }

    /// Sample, compute targets, fit, maybe sync. Too few transitions skips the step.
    fn train_cycle(&mut self, report: &mut EpisodeReport) -> Result<()> {
        match self.sampler.sample(&self.memory, &mut self.rng) {
            Ok(batch) => {
                let targets = self.target_computer.compute(&batch, &self.online, &self.target)?;
                let loss = train_step(&mut self.online, &batch, &targets)?;
                self.train_steps += 1;
                self.metrics.record_loss(loss);
                report.loss = Some(loss);
                debug!(train_step = self.train_steps, loss, "train step");

                if self.train_steps % self.config.sync_every_k_train_steps == 0 {
                    self.sync.apply(&self.online, &mut self.target)?;
                    report.synced = true;
                    debug!(train_step = self.train_steps, sync = ?self.sync, "target network synced");
                }
            }
            Err(e) if e.is_recoverable() => {
                debug!(error = %e, "skipping training cycle");
            }
            Err(e) => return Err(e),
        }

        if self.exploration.cadence() == DecayCadence::PerTrainCycle {
            self.exploration.decay();
        }
        Ok(())
    }

    /// Save the online approximator. Returns whether a checkpoint was written.
    fn checkpoint(&self) -> bool {
        let Some(path) = &self.config.checkpoint_path else {
            return false;
        };
        match self.online.save(path) {
            Ok(()) => {
                info!(episode = self.episode, path = %path.display(), "checkpoint saved");
                true
            }
            Err(e) => {
                warn!(episode = self.episode, path = %path.display(), error = %e, "failed to save checkpoint");
                false
            }
        }
    }
}
