use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Board dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub width: i32,
    pub height: i32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 13,
            height: 13,
        }
    }
}

impl GameConfig {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// Per-step rewards handed to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Reward for the step that ends the game
    pub death: f32,
    /// Reward for the step that eats food
    pub food: f32,
    /// Reward for any other step
    pub step: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            death: -10.0,
            food: 10.0,
            step: -0.1,
        }
    }
}

/// DQN hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub hidden_size: usize,
    pub learning_rate: f32,
    /// Discount factor for the one-step Bellman target
    pub gamma: f32,
    /// Initial exploration probability
    pub epsilon: f32,
    pub epsilon_min: f32,
    /// Multiplied into epsilon after every training step that ran
    pub epsilon_decay: f32,
    pub batch_size: usize,
    pub memory_capacity: usize,
    /// Fixes weight initialisation, exploration and sampling when set
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            hidden_size: 64,
            learning_rate: 0.001,
            gamma: 0.95,
            epsilon: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.9999,
            batch_size: 32,
            memory_capacity: 10_000,
            seed: None,
        }
    }
}

/// Training run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub episodes: usize,
    /// Where `savemodel`/`loadmodel` and checkpoints go
    pub model_path: PathBuf,
    /// Save the model every N finished episodes
    pub checkpoint_every: Option<usize>,
    /// CSV file receiving one row per finished episode
    pub episode_log: Option<PathBuf>,
    /// Truncate episodes that run longer than this many steps
    pub max_steps: Option<usize>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            episodes: 100,
            model_path: PathBuf::from("models/model.bin"),
            checkpoint_every: None,
            episode_log: None,
            max_steps: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub game: GameConfig,
    pub rewards: RewardConfig,
    pub agent: AgentConfig,
    pub train: TrainConfig,
}

impl Config {
    /// Reads a JSON config; absent keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let game = &self.game;
        let too_small = game.width.checked_mul(game.height).is_none_or(|cells| cells < 2);
        if game.width <= 0 || game.height <= 0 || too_small {
            return Err(ConfigError::invalid("game", format!("board {}x{} needs positive sides, at least 2 cells and an area that fits in i32", game.width, game.height)));
        }

        let agent = &self.agent;
        if agent.hidden_size == 0 {
            return Err(ConfigError::invalid("agent.hidden_size", "must be positive"));
        }
        if agent.batch_size == 0 {
            return Err(ConfigError::invalid("agent.batch_size", "must be positive"));
        }
        if agent.memory_capacity < agent.batch_size {
            return Err(ConfigError::invalid("agent.memory_capacity", "must be at least the batch size"));
        }
        if !(agent.learning_rate > 0.0 && agent.learning_rate.is_finite()) {
            return Err(ConfigError::invalid("agent.learning_rate", "must be a positive number"));
        }
        for (field, value) in [
            ("agent.gamma", agent.gamma),
            ("agent.epsilon", agent.epsilon),
            ("agent.epsilon_min", agent.epsilon_min),
            ("agent.epsilon_decay", agent.epsilon_decay),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::invalid(field, format!("{} is outside [0, 1]", value)));
            }
        }

        if self.train.checkpoint_every == Some(0) {
            return Err(ConfigError::invalid("train.checkpoint_every", "must be positive"));
        }
        if self.train.max_steps == Some(0) {
            return Err(ConfigError::invalid("train.max_steps", "must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_reference_values() {
        let config = Config::default();
        assert_eq!(config.game, GameConfig::new(13, 13));
        assert_eq!(config.agent.batch_size, 32);
        assert_eq!(config.agent.memory_capacity, 10_000);
        assert_eq!(config.agent.gamma, 0.95);
        assert_eq!(config.agent.epsilon_decay, 0.9999);
        assert_eq!(config.rewards.step, -0.1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "game": { "width": 5 }, "agent": { "seed": 7 } }"#).unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.game.width, 5);
        assert_eq!(config.game.height, 13);
        assert_eq!(config.agent.seed, Some(7));
        assert_eq!(config.agent.hidden_size, 64);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.agent.epsilon = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "agent.epsilon", .. })));

        let mut config = Config::default();
        config.game = GameConfig::new(1, 1);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.agent.memory_capacity = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overflowing_board() {
        let mut config = Config::default();
        config.game = GameConfig::new(50_000, 50_000);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "game", .. })));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "game": { "width": 70000, "height": 70000 } }"#).unwrap();
        assert!(matches!(Config::from_json_file(&path), Err(ConfigError::Invalid { field: "game", .. })));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::from_json_file(&path), Err(ConfigError::Json(_))));
    }
}
