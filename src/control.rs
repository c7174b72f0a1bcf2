//! Text command surface for an outside dispatcher (chat, console, socket).
//!
//! Every numeric argument is validated here, so nothing invalid reaches the
//! agent or the simulation. Each command maps to one agent, trainer or
//! simulation call.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::agent::Agent;
use crate::config::Config;
use crate::error::{CommandError, ConfigError, TrainError};
use crate::game::{Direction, GridSimulation};
use crate::render;
use crate::training::Trainer;

pub const DEFAULT_EPISODES: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartGame,
    Step(Direction),
    Train { episodes: usize },
    SaveModel,
    LoadModel,
    GetEpsilon,
    SetEpsilon(f32),
}

fn parse_episodes(value: &str) -> Result<usize, CommandError> {
    let episodes: usize = value.parse().map_err(|_| CommandError::InvalidNumber {
        argument: "number of episodes",
        value: value.to_string(),
    })?;
    if episodes == 0 {
        return Err(CommandError::OutOfRange {
            argument: "number of episodes",
            value: value.to_string(),
            expected: "at least 1",
        });
    }
    Ok(episodes)
}

fn parse_epsilon(value: &str) -> Result<f32, CommandError> {
    let epsilon: f32 = value.parse().map_err(|_| CommandError::InvalidNumber {
        argument: "epsilon value",
        value: value.to_string(),
    })?;
    if !(0.0..=1.0).contains(&epsilon) {
        return Err(CommandError::OutOfRange {
            argument: "epsilon value",
            value: value.to_string(),
            expected: "between 0 and 1",
        });
    }
    Ok(epsilon)
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.trim().trim_start_matches('/').split_whitespace();
        let name = parts.next().unwrap_or("").to_ascii_lowercase();
        let argument = parts.next();

        match name.as_str() {
            "snakegame" | "start" => Ok(Command::StartGame),
            "step" | "move" => {
                let value = argument.ok_or(CommandError::MissingArgument("direction"))?;
                value.parse()
                    .map(Command::Step)
                    .map_err(|_| CommandError::Unknown(format!("direction '{}'", value)))
            }
            "trainsnake" | "train" => {
                let episodes = argument.map(parse_episodes).transpose()?.unwrap_or(DEFAULT_EPISODES);
                Ok(Command::Train { episodes })
            }
            "savemodel" | "save" => Ok(Command::SaveModel),
            "loadmodel" | "load" => Ok(Command::LoadModel),
            "getepsilon" => Ok(Command::GetEpsilon),
            "setepsilon" => {
                let value = argument.ok_or(CommandError::MissingArgument("epsilon"))?;
                Ok(Command::SetEpsilon(parse_epsilon(value)?))
            }
            _ => Err(CommandError::Unknown(name)),
        }
    }
}

/// Owns one agent and one simulation and executes commands against them.
pub struct Controller {
    agent: Agent,
    simulation: GridSimulation,
    config: Config,
    cancel: Arc<AtomicBool>,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let agent = Agent::new(&config.agent);
        let simulation = match config.agent.seed {
            Some(seed) => GridSimulation::with_seed(&config.game, seed),
            None => GridSimulation::new(&config.game),
        }
        .map_err(|e| ConfigError::invalid("game", e.to_string()))?;

        Ok(Self {
            agent,
            simulation,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn simulation(&self) -> &GridSimulation {
        &self.simulation
    }

    /// Setting the flag stops a running `Train` command before its next
    /// episode. The stopped run clears it again.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Parses and executes one line; every outcome becomes a reply.
    pub fn handle_line(&mut self, line: &str) -> String {
        match line.parse::<Command>() {
            Ok(command) => match self.execute(command) {
                Ok(reply) => reply,
                Err(e) => format!("Command failed: {}", e),
            },
            Err(e) => e.to_string(),
        }
    }

    pub fn execute(&mut self, command: Command) -> Result<String, TrainError> {
        let model_path = self.config.train.model_path.clone();

        let reply = match command {
            Command::StartGame => {
                let snapshot = self.simulation.reset()?;
                format!("Started Snake game.\n{}", render::draw(&snapshot))
            }
            Command::Step(direction) => {
                let snapshot = self.simulation.step(direction)?;
                render::draw(&snapshot)
            }
            Command::Train { episodes } => {
                info!("starting {} training episodes", episodes);

                let reports = {
                    let train = &self.config.train;
                    let mut trainer = Trainer::new(&mut self.agent, &mut self.simulation, self.config.rewards.clone())
                        .with_max_steps(train.max_steps);
                    if let Some(path) = &train.episode_log {
                        trainer = trainer.with_episode_log(path)?;
                    }
                    if let Some(every) = train.checkpoint_every {
                        trainer = trainer.with_checkpoints(model_path, every);
                    }
                    let reports = trainer.run(episodes, &self.cancel);
                    self.cancel.store(false, Ordering::Relaxed);
                    reports?
                };
                let best = reports.iter().map(|r| r.score).max().unwrap_or(0);
                format!(
                    "Finished {} of {} training episodes. Best score: {}. Epsilon: {:.4}",
                    reports.len(), episodes, best, self.agent.epsilon()
                )
            }
            Command::SaveModel => match self.agent.save_parameters(&model_path) {
                Ok(()) => format!("Model saved to {}.", model_path.display()),
                Err(e) => format!("Error saving model to {}: {}", model_path.display(), e),
            },
            Command::LoadModel => match self.agent.load_parameters(&model_path) {
                Ok(true) => format!("Model loaded from {}.", model_path.display()),
                Ok(false) => format!("Model file not found: {}. Keeping current parameters.", model_path.display()),
                Err(e) => format!("Error loading model from {}: {}. Keeping current parameters.", model_path.display(), e),
            },
            Command::GetEpsilon => format!("Current epsilon value: {}", self.agent.epsilon()),
            Command::SetEpsilon(epsilon) => {
                self.agent.set_epsilon(epsilon);
                format!("Epsilon value set to: {}", epsilon)
            }
        };

        Ok(reply)
    }
}
