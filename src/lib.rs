pub mod sequential;

pub use sequential::tensor::Tensor;
pub use sequential::layer::{
    Layer,
    Dense,
    ReLU,
};
pub use sequential::loss::{
    Loss,
    MeanSquaredError,
};
pub use sequential::optimizer::{
    Optimizer,
    Adam,
};
pub use sequential::Sequential;

pub mod agent;

pub use agent::{Agent, ACTION_SIZE};
pub use agent::replaybuffer::{ReplayMemory, Transition};

pub mod game;

pub use game::{BlockKind, Cell, Direction, GridSimulation, Snapshot};

pub mod encoder;
pub mod config;
pub mod error;
pub mod training;
pub mod render;
pub mod control;

pub use config::{AgentConfig, Config, GameConfig, RewardConfig, TrainConfig};
pub use error::{AgentError, CommandError, ConfigError, SimulationError, TrainError};
pub use training::{EpisodeReport, TickOutcome, Trainer};
pub use render::{Renderer, TextRenderer};
pub use control::{Command, Controller};
