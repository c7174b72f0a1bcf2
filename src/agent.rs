pub mod replaybuffer;

use replaybuffer::{ReplayMemory, Transition};
use crate::config::AgentConfig;
use crate::encoder::STATE_SIZE;
use crate::error::AgentError;
use crate::game::Direction;
use crate::sequential::{
    tensor::Tensor,
    Sequential,
};
use log::{debug, info, warn};
use rand::prelude::*;
use rand::rngs::StdRng;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub const ACTION_SIZE: usize = Direction::ALL.len();

/// Epsilon-greedy DQN agent over the four absolute directions.
///
/// Bootstrapped targets come from the same network that is being trained;
/// there is no separate target network.
pub struct Agent {
    q_network: Sequential,
    memory: ReplayMemory,
    rng: StdRng,

    batch_size: usize,
    gamma: f32,
    epsilon: f32,
    epsilon_decay: f32,
    min_epsilon: f32,

    train_steps: u64,
}

impl Agent {
    /// Seeds from `config.seed` when present, otherwise from OS entropy.
    pub fn new(config: &AgentConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(config, rng)
    }

    pub fn with_seed(config: &AgentConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &AgentConfig, mut rng: StdRng) -> Self {
        let q_network = Sequential::q_network(STATE_SIZE, config.hidden_size, ACTION_SIZE, config.learning_rate, &mut rng);

        Self {
            q_network,
            memory: ReplayMemory::new(config.memory_capacity),
            rng,
            batch_size: config.batch_size,
            gamma: config.gamma,
            epsilon: config.epsilon,
            epsilon_decay: config.epsilon_decay,
            min_epsilon: config.epsilon_min,
            train_steps: 0,
        }
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// No bounds check; callers validate.
    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.epsilon = epsilon;
    }

    pub fn memory(&self) -> &ReplayMemory {
        &self.memory
    }

    /// Number of `train_step` calls that actually trained.
    pub fn train_steps(&self) -> u64 {
        self.train_steps
    }

    pub fn q_values(&mut self, state: &Tensor) -> Vec<f32> {
        self.q_network.predict(state).to_vec()
    }

    /// Greedy action; ties go to the lowest action index.
    pub fn best_action(&mut self, state: &Tensor) -> Direction {
        let q_values = self.q_values(state);
        Direction::from_index(argmax(&q_values)).unwrap_or(Direction::Up)
    }

    /// Random direction with probability epsilon, otherwise the greedy one.
    pub fn act(&mut self, state: &Tensor) -> Direction {
        if self.rng.random::<f32>() < self.epsilon {
            Direction::ALL[self.rng.random_range(0..ACTION_SIZE)]
        } else {
            self.best_action(state)
        }
    }

    pub fn remember(&mut self, state: Tensor, action: Direction, reward: f32, next_state: Tensor, done: bool) {
        self.memory.push(Transition { state, action, reward, next_state, done });
    }

    /// Fits the network on a sampled batch, one example at a time, then
    /// decays epsilon once. Returns false without touching anything while the
    /// memory holds fewer than `batch_size` transitions.
    pub fn train_step(&mut self) -> bool {
        let Some(batch) = self.memory.sample(self.batch_size, &mut self.rng) else {
            return false;
        };

        let mut total_loss = 0.0;
        for transition in &batch {
            let target = self.q_network.predict(&transition.state);
            let value = if transition.done {
                transition.reward
            } else {
                let next_q = self.q_network.predict(&transition.next_state);
                let max_next_q = next_q.read().iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
                transition.reward + self.gamma * max_next_q
            };
            target.write()[transition.action.index()] = value;

            total_loss += self.q_network.train_on_batch(&transition.state, &target);
        }

        if self.epsilon > self.min_epsilon {
            self.epsilon = (self.epsilon * self.epsilon_decay).max(self.min_epsilon);
        }
        self.train_steps += 1;
        debug!("train step {}: mean loss {:.5}, epsilon {:.4}", self.train_steps, total_loss / batch.len() as f32, self.epsilon);

        true
    }

    /// Writes the network (weights and optimiser state) with bincode,
    /// creating parent directories as needed.
    pub fn save_parameters(&self, path: &Path) -> Result<(), AgentError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = BufWriter::new(File::create(path)?);
        bincode::serialize_into(file, &self.q_network)?;
        info!("model saved to {}", path.display());
        Ok(())
    }

    /// Replaces the network with the one stored at `path`.
    ///
    /// A missing file is logged and reported as `Ok(false)`; the current
    /// parameters stay in place. Undecodable or mis-shaped models are errors
    /// and also leave the current parameters untouched.
    pub fn load_parameters(&mut self, path: &Path) -> Result<bool, AgentError> {
        if !path.exists() {
            warn!("model file not found: {}", path.display());
            return Ok(false);
        }

        let file = BufReader::new(File::open(path)?);
        let q_network: Sequential = bincode::deserialize_from(file)?;

        let (Some(found_inputs), Some(found_outputs)) = (q_network.input_size(), q_network.output_size()) else {
            return Err(AgentError::MissingLayer);
        };
        if found_inputs != STATE_SIZE || found_outputs != ACTION_SIZE {
            return Err(AgentError::ShapeMismatch {
                expected_inputs: STATE_SIZE,
                expected_outputs: ACTION_SIZE,
                found_inputs,
                found_outputs,
            });
        }

        self.q_network = q_network;
        info!("model loaded from {}", path.display());
        Ok(true)
    }
}

// first maximum wins
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &value) in values.iter().enumerate().skip(1) {
        if value > values[best] {
            best = i;
        }
    }
    best
}
