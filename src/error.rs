//! Error types for the simulation, the agent, training and the command surface.

use thiserror::Error;

/// Failures of the grid simulation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// The board cannot hold a snake and a food cell.
    #[error("invalid board {width}x{height}: need positive sides and at least 2 cells")]
    InvalidBoard { width: i32, height: i32 },

    /// Food placement was requested while the snake covers every cell.
    #[error("no free cell left for food placement")]
    NoFreeCell,
}

/// Failures of agent persistence.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model encoding error: {0}")]
    Codec(#[from] bincode::Error),

    /// The stored network does not fit the configured state/action sizes.
    #[error("model expects {found_inputs} inputs and {found_outputs} outputs, agent needs {expected_inputs} and {expected_outputs}")]
    ShapeMismatch {
        expected_inputs: usize,
        expected_outputs: usize,
        found_inputs: usize,
        found_outputs: usize,
    },

    #[error("model contains no dense layer")]
    MissingLayer,
}

/// Invalid configuration values.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid { field, reason: reason.into() }
    }
}

/// Failures that end a training run.
#[derive(Error, Debug)]
pub enum TrainError {
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("episode log error: {0}")]
    EpisodeLog(#[from] csv::Error),
}

/// Rejected control-surface input. The `Display` text is shown to the user.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Please provide a value for {0}.")]
    MissingArgument(&'static str),

    #[error("Invalid {argument}: '{value}' is not a valid number.")]
    InvalidNumber { argument: &'static str, value: String },

    #[error("Invalid {argument}: {value} is out of range ({expected}).")]
    OutOfRange { argument: &'static str, value: String, expected: &'static str },
}
