//! Session controller: the glue a front-end drives.
//!
//! It owns the board, the brain, the random source and the state file path,
//! and keeps the brain's perception in step with the board after every action.

use log::{info, warn};
use rand::{rngs::StdRng, SeedableRng};
use std::fmt;
use std::path::PathBuf;

use crate::brain::{Brain, BrainConfig, TrainReport};
use crate::engine::{Direction, Grid};
use crate::nn::ConfigError;
use crate::persistence::PersistError;

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Where `save`/`load` read and write the state.
    pub state_path: PathBuf,
    /// Seed for tile spawns and weight init; `None` draws from entropy.
    pub seed: Option<u64>,
    pub brain: BrainConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { state_path: PathBuf::from("neurogame.sv"), seed: None, brain: BrainConfig::default() }
    }
}

/// Result of a move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveReport {
    Moved,
    /// The game is over; no direction is playable.
    Lost,
    /// This direction changes nothing; try another.
    Blocked,
}

/// How [`Game::boot`] obtained its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boot {
    Loaded,
    Fresh,
}

/// The network's current advice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hint {
    pub best: Direction,
    pub outputs: [f32; 4],
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.best.letter())?;
        for (i, dir) in Direction::ALL.into_iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{}{}", dir.letter(), self.outputs[dir.index()])?;
        }
        Ok(())
    }
}

pub struct Game {
    grid: Grid,
    brain: Brain,
    rng: StdRng,
    state_path: PathBuf,
}

impl Game {
    pub fn new(cfg: GameConfig) -> Result<Self, ConfigError> {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { grid: Grid::default(), brain: Brain::with_config(cfg.brain)?, rng, state_path: cfg.state_path })
    }

    /// Restore the saved session, or start over with fresh weights if that fails.
    pub fn boot(&mut self) -> Boot {
        match self.load() {
            Ok(()) => Boot::Loaded,
            Err(e) => {
                warn!("starting fresh: {e}");
                self.start_fresh();
                Boot::Fresh
            }
        }
    }

    /// Random weights and a new board.
    pub fn start_fresh(&mut self) {
        self.brain.initialize(&mut self.rng);
        self.start();
    }

    /// New board, same network.
    pub fn start(&mut self) {
        self.grid.reset(&mut self.rng);
        self.brain.perceive(&self.grid);
    }

    pub fn play(&mut self, dir: Direction) -> MoveReport {
        if !self.grid.commit(dir, &mut self.rng) {
            return if self.grid.is_lost() { MoveReport::Lost } else { MoveReport::Blocked };
        }
        // features cached by the previous perceive describe the board the human saw
        if !self.brain.record_choice(dir) {
            warn!("episode buffer full, move {dir:?} not recorded");
        }
        self.brain.perceive(&self.grid);
        MoveReport::Moved
    }

    /// Train on the recorded moves, then refresh the advice for the current board.
    pub fn learn(&mut self) -> TrainReport {
        let report = self.brain.train();
        self.brain.perceive(&self.grid);
        report
    }

    pub fn save(&self) -> Result<(), PersistError> {
        self.brain.save(&self.grid, &self.state_path)?;
        info!("saved in {}", self.state_path.display());
        Ok(())
    }

    /// Replace network and board from the state file; on error nothing changes.
    pub fn load(&mut self) -> Result<(), PersistError> {
        self.brain.load(&mut self.grid, &self.state_path)
    }

    pub fn hint(&self) -> Hint { Hint { best: self.brain.best_direction(), outputs: *self.brain.outputs() } }

    #[inline]
    pub fn grid(&self) -> &Grid { &self.grid }

    #[inline]
    pub fn brain(&self) -> &Brain { &self.brain }

    #[inline]
    pub fn state_path(&self) -> &std::path::Path { &self.state_path }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &tempfile::TempDir, seed: u64) -> GameConfig {
        GameConfig {
            state_path: dir.path().join("neurogame.sv"),
            seed: Some(seed),
            brain: BrainConfig { epochs: 5, ..BrainConfig::default() },
        }
    }

    fn first_legal(game: &Game) -> Direction {
        Direction::ALL.into_iter().find(|&d| game.grid().outcome(d).is_legal()).unwrap()
    }

    #[test]
    fn boot_without_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut game = Game::new(config(&dir, 1)).unwrap();
        assert_eq!(game.boot(), Boot::Fresh);
        assert_eq!(game.grid().count_empty(), 14);
        let hint = game.hint();
        assert!(hint.outputs.iter().all(|&o| o > 0.0 && o < 1.0));
    }

    #[test]
    fn play_records_pre_move_features() {
        let dir = tempfile::tempdir().unwrap();
        let mut game = Game::new(config(&dir, 2)).unwrap();
        game.boot();
        let before = *game.brain().features(Direction::Down);
        let d = first_legal(&game);
        assert_eq!(game.play(d), MoveReport::Moved);
        let episodes = game.brain().episodes();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].choice, d);
        assert_eq!(episodes[0].features[0], before);
    }

    #[test]
    fn blocked_and_lost_moves() {
        let dir = tempfile::tempdir().unwrap();
        let mut game = Game::new(config(&dir, 3)).unwrap();
        game.grid = Grid::from_cells([1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(game.play(Direction::Left), MoveReport::Blocked);
        game.grid = Grid::from_cells([1, 2, 1, 2, 2, 1, 2, 1, 1, 2, 1, 2, 2, 1, 2, 1]);
        assert_eq!(game.play(Direction::Down), MoveReport::Lost);
        assert!(game.brain().episodes().is_empty());
    }

    #[test]
    fn save_then_boot_restores_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut game = Game::new(config(&dir, 4)).unwrap();
        game.boot();
        for _ in 0..5 {
            if game.grid().is_lost() {
                break;
            }
            let d = first_legal(&game);
            game.play(d);
        }
        game.save().unwrap();

        let mut restored = Game::new(config(&dir, 99)).unwrap();
        assert_eq!(restored.boot(), Boot::Loaded);
        assert_eq!(restored.grid(), game.grid());
        assert_eq!(restored.hint(), game.hint());
    }

    #[test]
    fn learn_empties_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let mut game = Game::new(config(&dir, 5)).unwrap();
        game.boot();
        let d = first_legal(&game);
        game.play(d);
        let report = game.learn();
        assert_eq!(report.episodes, 1);
        assert_eq!(report.epochs, 5);
        assert!(game.brain().episodes().is_empty());
    }

    #[test]
    fn hint_line_format() {
        let hint = Hint { best: Direction::Left, outputs: [0.5, 0.75, 0.25, 0.5] };
        assert_eq!(hint.to_string(), "L: D0.5, L0.75, R0.25, U0.5");
    }
}
