//! Episode loop tying the simulation, the encoder and the agent together.
//!
//! [`Trainer::tick`] performs exactly one environment step plus one training
//! step, so an external periodic driver can pace a run; [`Trainer::run`]
//! simply ticks until the requested number of episodes is done. A run can be
//! cancelled between episodes through a shared flag.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use serde::Serialize;

use crate::agent::Agent;
use crate::config::RewardConfig;
use crate::encoder;
use crate::error::TrainError;
use crate::game::{GridSimulation, Snapshot};
use crate::sequential::tensor::Tensor;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeReport {
    pub episode: usize,
    pub total_reward: f32,
    pub epsilon: f32,
    pub score: u32,
    pub steps: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Running,
    EpisodeFinished(EpisodeReport),
}

/// Reward for the step that produced `snapshot`; food is detected by the
/// score going up.
pub fn reward(rewards: &RewardConfig, score_before: u32, snapshot: &Snapshot) -> f32 {
    if snapshot.game_over {
        rewards.death
    } else if snapshot.score > score_before {
        rewards.food
    } else {
        rewards.step
    }
}

struct Checkpoint {
    path: PathBuf,
    every: usize,
}

pub struct Trainer<'a> {
    agent: &'a mut Agent,
    simulation: &'a mut GridSimulation,
    rewards: RewardConfig,
    max_steps: Option<usize>,

    state: Option<Tensor>,
    episode: usize,
    total_reward: f32,
    steps: usize,

    episode_log: Option<csv::Writer<File>>,
    checkpoint: Option<Checkpoint>,
}

impl<'a> Trainer<'a> {
    pub fn new(agent: &'a mut Agent, simulation: &'a mut GridSimulation, rewards: RewardConfig) -> Self {
        Self {
            agent,
            simulation,
            rewards,
            max_steps: None,
            state: None,
            episode: 0,
            total_reward: 0.0,
            steps: 0,
            episode_log: None,
            checkpoint: None,
        }
    }

    /// Ends an episode without a terminal transition after `max_steps` steps.
    pub fn with_max_steps(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Appends one CSV row per finished episode to `path` (truncated first).
    pub fn with_episode_log(mut self, path: &Path) -> Result<Self, TrainError> {
        self.episode_log = Some(csv::Writer::from_path(path)?);
        Ok(self)
    }

    pub fn with_checkpoints(mut self, path: PathBuf, every: usize) -> Self {
        self.checkpoint = Some(Checkpoint { path, every: every.max(1) });
        self
    }

    /// Episodes started so far.
    pub fn episode(&self) -> usize {
        self.episode
    }

    fn begin_episode(&mut self) -> Result<Tensor, TrainError> {
        let snapshot = self.simulation.reset()?;
        self.episode += 1;
        self.total_reward = 0.0;
        self.steps = 0;
        Ok(encoder::encode(&snapshot))
    }

    /// act -> step -> encode -> reward -> remember -> train.
    pub fn tick(&mut self) -> Result<TickOutcome, TrainError> {
        let state = match self.state.take() {
            Some(state) => state,
            None => self.begin_episode()?,
        };

        let score_before = self.simulation.score();
        let action = self.agent.act(&state);
        let snapshot = self.simulation.step(action)?;
        let next_state = encoder::encode(&snapshot);
        let reward = reward(&self.rewards, score_before, &snapshot);
        let done = snapshot.game_over;

        self.agent.remember(state, action, reward, next_state.clone(), done);
        self.agent.train_step();

        self.total_reward += reward;
        self.steps += 1;

        let truncated = self.max_steps.is_some_and(|max| self.steps >= max);
        if done || truncated {
            return Ok(TickOutcome::EpisodeFinished(self.finish_episode(&snapshot)));
        }

        self.state = Some(next_state);
        Ok(TickOutcome::Running)
    }

    fn finish_episode(&mut self, snapshot: &Snapshot) -> EpisodeReport {
        let report = EpisodeReport {
            episode: self.episode,
            total_reward: self.total_reward,
            epsilon: self.agent.epsilon(),
            score: snapshot.score,
            steps: self.steps,
        };

        info!(
            "Episode: {}, Total Reward: {:.3}, Epsilon: {:.4}, Score: {}, Steps: {}",
            report.episode, report.total_reward, report.epsilon, report.score, report.steps
        );

        if let Some(writer) = self.episode_log.as_mut() {
            if let Err(e) = writer.serialize(&report).and_then(|_| writer.flush().map_err(csv::Error::from)) {
                warn!("failed to write episode log: {}", e);
            }
        }

        if let Some(checkpoint) = &self.checkpoint {
            if report.episode % checkpoint.every == 0 {
                // a failed checkpoint never stops training
                if let Err(e) = self.agent.save_parameters(&checkpoint.path) {
                    warn!("checkpoint after episode {} failed: {}", report.episode, e);
                }
            }
        }

        report
    }

    pub fn run_episode(&mut self) -> Result<EpisodeReport, TrainError> {
        loop {
            if let TickOutcome::EpisodeFinished(report) = self.tick()? {
                return Ok(report);
            }
        }
    }

    /// Runs up to `episodes` episodes, checking `cancel` before each one.
    pub fn run(&mut self, episodes: usize, cancel: &AtomicBool) -> Result<Vec<EpisodeReport>, TrainError> {
        let mut reports = Vec::with_capacity(episodes);
        for _ in 0..episodes {
            if cancel.load(Ordering::Relaxed) {
                info!("training cancelled after {} episodes", reports.len());
                break;
            }
            reports.push(self.run_episode()?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, GameConfig};
    use crate::game::{BlockKind, Direction};
    use tempfile::TempDir;

    fn setup() -> (Agent, GridSimulation) {
        let agent = Agent::with_seed(&AgentConfig { batch_size: 4, ..AgentConfig::default() }, 3);
        let simulation = GridSimulation::with_seed(&GameConfig::new(6, 6), 3).unwrap();
        (agent, simulation)
    }

    fn snapshot(score: u32, game_over: bool) -> Snapshot {
        Snapshot {
            width: 5,
            height: 5,
            head: (2, 2),
            food: (0, 0),
            direction: Direction::Up,
            blocked_left: BlockKind::Empty,
            blocked_right: BlockKind::Empty,
            blocked_forward: BlockKind::Empty,
            score,
            game_over,
            snake: vec![(2, 2)],
        }
    }

    #[test]
    fn test_reward_cases() {
        let rewards = RewardConfig::default();
        assert_eq!(reward(&rewards, 0, &snapshot(0, true)), -10.0);
        assert_eq!(reward(&rewards, 0, &snapshot(1, false)), 10.0);
        assert_eq!(reward(&rewards, 1, &snapshot(1, false)), -0.1);
    }

    #[test]
    fn test_tick_stores_one_transition_per_step() {
        let (mut agent, mut simulation) = setup();
        let mut trainer = Trainer::new(&mut agent, &mut simulation, RewardConfig::default());

        let mut ticks = 0;
        loop {
            ticks += 1;
            if let TickOutcome::EpisodeFinished(report) = trainer.tick().unwrap() {
                assert_eq!(report.episode, 1);
                assert_eq!(report.steps, ticks);
                break;
            }
        }
        assert_eq!(trainer.episode(), 1);
        drop(trainer);

        assert_eq!(agent.memory().len(), ticks);
        assert!(agent.memory().iter().last().unwrap().done);
        assert!(simulation.is_game_over());
    }

    #[test]
    fn test_total_reward_matches_memory() {
        let (mut agent, mut simulation) = setup();
        let report = Trainer::new(&mut agent, &mut simulation, RewardConfig::default())
            .run_episode()
            .unwrap();

        let stored: f32 = agent.memory().iter().map(|t| t.reward).sum();
        assert!((stored - report.total_reward).abs() < 1e-4);
        assert_eq!(agent.memory().iter().last().unwrap().reward, -10.0);
    }

    #[test]
    fn test_run_counts_episodes_and_decays_epsilon() {
        let (mut agent, mut simulation) = setup();
        let reports = Trainer::new(&mut agent, &mut simulation, RewardConfig::default())
            .run(5, &AtomicBool::new(false))
            .unwrap();

        let episodes: Vec<usize> = reports.iter().map(|r| r.episode).collect();
        assert_eq!(episodes, vec![1, 2, 3, 4, 5]);
        assert!(agent.train_steps() > 0);
        assert!(agent.epsilon() < 1.0);
    }

    #[test]
    fn test_cancelled_run_stops_before_next_episode() {
        let (mut agent, mut simulation) = setup();
        let reports = Trainer::new(&mut agent, &mut simulation, RewardConfig::default())
            .run(5, &AtomicBool::new(true))
            .unwrap();

        assert!(reports.is_empty());
        assert!(agent.memory().is_empty());
    }

    #[test]
    fn test_max_steps_truncates_episode() {
        let (mut agent, mut simulation) = setup();
        let report = Trainer::new(&mut agent, &mut simulation, RewardConfig::default())
            .with_max_steps(Some(1))
            .run_episode()
            .unwrap();

        assert_eq!(report.steps, 1);
    }

    #[test]
    fn test_episode_log_and_checkpoints() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("episodes.csv");
        let model_path = dir.path().join("checkpoints/model.bin");
        let (mut agent, mut simulation) = setup();

        Trainer::new(&mut agent, &mut simulation, RewardConfig::default())
            .with_episode_log(&log_path)
            .unwrap()
            .with_checkpoints(model_path.clone(), 2)
            .run(3, &AtomicBool::new(false))
            .unwrap();

        let log = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines[0], "episode,total_reward,epsilon,score,steps");
        assert_eq!(lines.len(), 4);
        assert!(model_path.exists());
    }

    #[test]
    fn test_failed_checkpoint_does_not_abort() {
        let dir = TempDir::new().unwrap();
        // a directory where the model file should be
        let model_path = dir.path().join("taken");
        std::fs::create_dir(&model_path).unwrap();
        let (mut agent, mut simulation) = setup();

        let reports = Trainer::new(&mut agent, &mut simulation, RewardConfig::default())
            .with_checkpoints(model_path, 1)
            .run(2, &AtomicBool::new(false))
            .unwrap();

        assert_eq!(reports.len(), 2);
    }
}
