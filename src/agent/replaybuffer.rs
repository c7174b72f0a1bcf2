use crate::game::Direction;
use crate::sequential::tensor::Tensor;

use rand::Rng;
use std::collections::VecDeque;

/// One (state, action, reward, next state, done) experience.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: Tensor,
    pub action: Direction,
    pub reward: f32,
    pub next_state: Tensor,
    pub done: bool,
}

/// Bounded FIFO of transitions; the oldest entry is evicted first.
pub struct ReplayMemory {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, transition: Transition) {
        self.buffer.push_back(transition);
        if self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }

    /// Draws `batch_size` transitions uniformly with replacement, so a batch
    /// may repeat an entry. `None` while fewer than `batch_size` are stored.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Option<Vec<Transition>> {
        if self.buffer.len() < batch_size {
            return None;
        }

        let batch = (0..batch_size)
            .map(|_| self.buffer[rng.random_range(0..self.buffer.len())].clone())
            .collect();

        Some(batch)
    }
}
