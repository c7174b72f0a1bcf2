//! Snapshot to feature-vector encoding consumed by the agent.
//!
//! Layout: `[head_x, head_z, food_x, food_z, left, right, forward, heading]`
//! where the three neighbour entries are [`BlockKind::code`] values and the
//! heading is [`Direction::index`].

use crate::game::Snapshot;
use crate::sequential::tensor::Tensor;

#[cfg(doc)]
use crate::game::{BlockKind, Direction};

pub const STATE_SIZE: usize = 8;

pub fn features(snapshot: &Snapshot) -> [f32; STATE_SIZE] {
    [
        snapshot.head.0 as f32,
        snapshot.head.1 as f32,
        snapshot.food.0 as f32,
        snapshot.food.1 as f32,
        snapshot.blocked_left.code() as f32,
        snapshot.blocked_right.code() as f32,
        snapshot.blocked_forward.code() as f32,
        snapshot.direction.index() as f32,
    ]
}

/// Single-row `[1, STATE_SIZE]` tensor.
pub fn encode(snapshot: &Snapshot) -> Tensor {
    Tensor::from_vec(features(snapshot).to_vec(), vec![1, STATE_SIZE])
}
