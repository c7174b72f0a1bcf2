mod direction;

pub use direction::Direction;

use std::collections::{HashSet, VecDeque};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use crate::config::GameConfig;
use crate::error::SimulationError;

/// (x, z) grid coordinate.
pub type Cell = (i32, i32);

/// What occupies a cell next to the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Empty,
    Body,
    Wall,
    Food,
}

impl BlockKind {
    pub fn code(self) -> i32 {
        match self {
            BlockKind::Empty => 0,
            BlockKind::Body => 1,
            BlockKind::Wall => 2,
            BlockKind::Food => 3,
        }
    }
}

/// Immutable view of the simulation after a reset or step.
///
/// `blocked_left`/`blocked_right` look along the absolute `Left`/`Right`
/// axes, not relative to the heading; `blocked_forward` follows the heading.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub width: i32,
    pub height: i32,
    pub head: Cell,
    pub food: Cell,
    pub direction: Direction,
    pub blocked_left: BlockKind,
    pub blocked_right: BlockKind,
    pub blocked_forward: BlockKind,
    pub score: u32,
    pub game_over: bool,
    /// Head first
    pub snake: Vec<Cell>,
}

pub struct GridSimulation {
    width: i32,
    height: i32,
    snake: VecDeque<Cell>, // head at the front
    food: Cell,
    direction: Direction,
    score: u32,
    game_over: bool,
    rng: StdRng,
}

impl GridSimulation {
    pub fn new(config: &GameConfig) -> Result<Self, SimulationError> {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Food placement becomes reproducible for a given seed.
    pub fn with_seed(config: &GameConfig, seed: u64) -> Result<Self, SimulationError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &GameConfig, rng: StdRng) -> Result<Self, SimulationError> {
        let (width, height) = (config.width, config.height);
        let cells = width.checked_mul(height).unwrap_or(0);
        if width <= 0 || height <= 0 || cells < 2 {
            return Err(SimulationError::InvalidBoard { width, height });
        }

        let mut instance = Self {
            width,
            height,
            snake: VecDeque::new(),
            food: (0, 0),
            direction: Direction::Up,
            score: 0,
            game_over: false,
            rng,
        };
        instance.reset()?;

        Ok(instance)
    }

    pub fn direction(&self) -> Direction {self.direction}
    pub fn score(&self) -> u32 {self.score}
    pub fn is_game_over(&self) -> bool {self.game_over}

    pub fn head(&self) -> Cell {
        self.snake[0]
    }

    fn tail(&self) -> Cell {
        self.snake[self.snake.len() - 1]
    }

    /// Single-cell snake at the board centre heading up, fresh food, score 0.
    pub fn reset(&mut self) -> Result<Snapshot, SimulationError> {
        let head = (self.width / 2, self.height / 2);

        self.snake.clear();
        self.snake.push_back(head);
        self.direction = Direction::Up;
        self.score = 0;
        self.game_over = false;
        self.generate_food()?;

        Ok(self.snapshot())
    }

    /// Advances one tick. A request to reverse the current heading is
    /// ignored and the snake keeps going straight. Stepping a finished game
    /// returns the terminal snapshot unchanged.
    pub fn step(&mut self, requested: Direction) -> Result<Snapshot, SimulationError> {
        if self.game_over {
            return Ok(self.snapshot());
        }

        if !requested.is_opposite(self.direction) {
            self.direction = requested;
        }

        // every segment moves into its predecessor's cell
        let new_head = self.direction.offset(self.head());
        self.snake.push_front(new_head);
        self.snake.pop_back();

        // the terminal state keeps the moved head, even when off the board
        if self.check_wall_collision(new_head) || self.check_self_collision(new_head) {
            self.game_over = true;
            return Ok(self.snapshot());
        }

        if new_head == self.food {
            let new_tail = self.direction.opposite().offset(self.tail());
            self.snake.push_back(new_tail);
            self.score += 1;
            self.generate_food()?;
        }

        Ok(self.snapshot())
    }

    pub fn snapshot(&self) -> Snapshot {
        let head = self.head();

        Snapshot {
            width: self.width,
            height: self.height,
            head,
            food: self.food,
            direction: self.direction,
            blocked_left: self.block_at(Direction::Left.offset(head)),
            blocked_right: self.block_at(Direction::Right.offset(head)),
            blocked_forward: self.block_at(self.direction.offset(head)),
            score: self.score,
            game_over: self.game_over,
            snake: self.snake.iter().copied().collect(),
        }
    }

    fn block_at(&self, cell: Cell) -> BlockKind {
        if self.check_wall_collision(cell) {
            BlockKind::Wall
        } else if self.check_self_collision(cell) {
            BlockKind::Body
        } else if cell == self.food {
            BlockKind::Food
        } else {
            BlockKind::Empty
        }
    }

    /// Picks a uniformly random cell the snake does not cover.
    ///
    /// Rejection sampling: it terminates because the free-cell count is
    /// checked first, so every draw has a positive chance of landing on a
    /// free cell. A full board is reported as `NoFreeCell` instead of
    /// looping forever.
    fn generate_food(&mut self) -> Result<(), SimulationError> {
        let occupied: HashSet<Cell> = self.snake.iter()
            .copied()
            .filter(|&cell| !self.check_wall_collision(cell))
            .collect();
        if occupied.len() >= (self.width * self.height) as usize {
            return Err(SimulationError::NoFreeCell);
        }

        loop {
            let cell = (self.rng.random_range(0..self.width), self.rng.random_range(0..self.height));
            if !occupied.contains(&cell) {
                self.food = cell;
                return Ok(());
            }
        }
    }

    // any segment behind the head
    fn check_self_collision(&self, cell: Cell) -> bool {
        self.snake.iter().skip(1).any(|&segment| segment == cell)
    }

    fn check_wall_collision(&self, cell: Cell) -> bool {
        cell.0 < 0 || cell.0 >= self.width || cell.1 < 0 || cell.1 >= self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(width: i32, height: i32) -> GridSimulation {
        GridSimulation::with_seed(&GameConfig::new(width, height), 42).unwrap()
    }

    #[test]
    fn test_reset_for_many_boards() {
        for (w, h) in [(5, 5), (13, 13), (2, 1), (4, 7), (10, 3)] {
            let mut game = game(w, h);
            game.score = 3;
            game.game_over = true;

            let snapshot = game.reset().unwrap();

            assert_eq!(snapshot.snake, vec![(w / 2, h / 2)]);
            assert_eq!(snapshot.head, (w / 2, h / 2));
            assert_ne!(snapshot.food, snapshot.head);
            assert!(snapshot.food.0 >= 0 && snapshot.food.0 < w);
            assert!(snapshot.food.1 >= 0 && snapshot.food.1 < h);
            assert_eq!(snapshot.direction, Direction::Up);
            assert_eq!(snapshot.score, 0);
            assert!(!snapshot.game_over);
        }
    }

    #[test]
    fn test_invalid_board() {
        let err = GridSimulation::new(&GameConfig::new(1, 1)).err();
        assert_eq!(err, Some(SimulationError::InvalidBoard { width: 1, height: 1 }));
        assert!(GridSimulation::new(&GameConfig::new(0, 5)).is_err());
        assert!(GridSimulation::new(&GameConfig::new(-3, -3)).is_err());
    }

    #[test]
    fn test_plain_step_moves_head() {
        let mut game = game(5, 5);
        game.food = (0, 4);

        let snapshot = game.step(Direction::Up).unwrap();

        assert_eq!(snapshot.head, (2, 1));
        assert_eq!(snapshot.snake.len(), 1);
        assert_eq!(snapshot.score, 0);
        assert!(!snapshot.game_over);
    }

    #[test]
    fn test_opposite_request_is_ignored() {
        let mut game = game(5, 5);
        game.food = (0, 4);

        let snapshot = game.step(Direction::Down).unwrap();

        assert_eq!(snapshot.direction, Direction::Up);
        assert_eq!(snapshot.head, (2, 1));
    }

    #[test]
    fn test_eating_grows_opposite_to_travel() {
        let mut game = game(5, 5);
        game.food = (2, 1);

        let snapshot = game.step(Direction::Up).unwrap();

        assert_eq!(snapshot.score, 1);
        assert_eq!(snapshot.snake, vec![(2, 1), (2, 2)]);
        assert!(!snapshot.snake.contains(&snapshot.food));
    }

    #[test]
    fn test_eating_with_longer_snake() {
        let mut game = game(7, 7);
        game.snake = VecDeque::from(vec![(3, 3), (3, 4), (3, 5)]);
        game.food = (3, 2);

        let snapshot = game.step(Direction::Up).unwrap();

        // shifted body is (3,2) (3,3) (3,4); new tail is (3,4) + down
        assert_eq!(snapshot.snake, vec![(3, 2), (3, 3), (3, 4), (3, 5)]);
        assert_eq!(snapshot.score, 1);
    }

    #[test]
    fn test_wall_collision() {
        let mut game = game(5, 5);
        game.snake = VecDeque::from(vec![(2, 0)]);
        game.food = (4, 4);

        let snapshot = game.step(Direction::Up).unwrap();

        assert!(snapshot.game_over);
        assert_eq!(snapshot.head, (2, -1));
        assert_eq!(snapshot.score, 0);
        assert_eq!(snapshot.food, (4, 4));
    }

    #[test]
    fn test_wall_collision_does_not_eat() {
        let mut game = game(5, 5);
        game.snake = VecDeque::from(vec![(4, 2)]);
        game.direction = Direction::Right;
        game.food = (0, 0);

        let snapshot = game.step(Direction::Right).unwrap();

        assert!(snapshot.game_over);
        assert_eq!(snapshot.food, (0, 0));
        assert_eq!(snapshot.snake.len(), 1);
    }

    #[test]
    fn test_self_collision() {
        let mut game = game(5, 5);
        game.snake = VecDeque::from(vec![(2, 2), (3, 2), (3, 3), (2, 3), (1, 3)]);
        game.direction = Direction::Left;
        game.food = (0, 0);

        let snapshot = game.step(Direction::Down).unwrap();

        assert!(snapshot.game_over);
        assert_eq!(snapshot.head, (2, 3));
    }

    #[test]
    fn test_following_the_tail_is_safe() {
        let mut game = game(5, 5);
        game.snake = VecDeque::from(vec![(2, 2), (2, 3), (3, 3), (3, 2)]);
        game.food = (0, 0);

        let snapshot = game.step(Direction::Right).unwrap();

        assert!(!snapshot.game_over);
        assert_eq!(snapshot.snake, vec![(3, 2), (2, 2), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_step_after_game_over_is_noop() {
        let mut game = game(5, 5);
        game.snake = VecDeque::from(vec![(2, 0)]);
        let terminal = game.step(Direction::Up).unwrap();

        let again = game.step(Direction::Left).unwrap();

        assert_eq!(terminal, again);
    }

    #[test]
    fn test_full_board_fails_loudly() {
        let mut game = game(2, 1);
        assert_eq!(game.food, (0, 0));

        let result = game.step(Direction::Left);

        assert_eq!(result, Err(SimulationError::NoFreeCell));
    }

    #[test]
    fn test_blocked_codes() {
        let mut game = game(5, 5);
        game.food = (1, 2);
        let snapshot = game.snapshot();
        assert_eq!(snapshot.blocked_left, BlockKind::Food);
        assert_eq!(snapshot.blocked_right, BlockKind::Empty);
        assert_eq!(snapshot.blocked_forward, BlockKind::Empty);

        game.snake = VecDeque::from(vec![(0, 0), (1, 0)]);
        game.direction = Direction::Left;
        let snapshot = game.snapshot();
        assert_eq!(snapshot.blocked_left, BlockKind::Wall);
        assert_eq!(snapshot.blocked_right, BlockKind::Body);
        assert_eq!(snapshot.blocked_forward, BlockKind::Wall);
    }

    #[test]
    fn test_food_never_lands_on_snake() {
        let mut game = game(4, 4);
        let mut moves = Direction::ALL.iter().cycle();
        for _ in 0..500 {
            let snapshot = game.step(*moves.next().unwrap()).unwrap();
            if snapshot.game_over {
                game.reset().unwrap();
                continue;
            }
            assert!(!snapshot.snake.contains(&snapshot.food));
        }
    }

    #[test]
    fn test_seeded_food_is_reproducible() {
        let config = GameConfig::new(13, 13);
        let mut a = GridSimulation::with_seed(&config, 9).unwrap();
        let mut b = GridSimulation::with_seed(&config, 9).unwrap();
        for _ in 0..20 {
            assert_eq!(a.reset().unwrap().food, b.reset().unwrap().food);
        }
    }
}
