//! Supervisor: turns board outcomes into features, scores every direction
//! with the shared [`Network`], and learns from the moves a human made.
//!
//! Training is contrastive. For every recorded episode where the network's
//! favourite direction differs from the human's choice, the favourite's output
//! is pulled down to the choice's output and then the choice's output is pulled
//! up to the old favourite's.

use log::{debug, info, trace};
use rand::Rng;
use std::path::Path;

use crate::engine::{Direction, Grid, CELLS};
use crate::nn::{ConfigError, Network};
use crate::persistence::{self, PersistError};

/// Width of one feature vector: 16 relative cell magnitudes plus the move score.
pub const FEATURES: usize = CELLS + 1;

pub type Features = [f32; FEATURES];

/// Tunables for the supervisor.
#[derive(Debug, Clone)]
pub struct BrainConfig {
    /// Stage widths; the first must be [`FEATURES`].
    pub topology: Vec<usize>,
    /// Maximum number of buffered episodes.
    pub capacity: usize,
    /// Passes over the buffer per training run.
    pub epochs: usize,
    /// Learning rate for epoch `i` is `(span - i) / span`.
    pub rate_decay_span: usize,
    /// Iteration budget for each network training call.
    pub iterations: usize,
    /// Stop threshold for each network training call.
    pub threshold: f32,
    /// Gap below which the two targets are nudged apart.
    pub tie_margin: f32,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            topology: vec![FEATURES, 40, 20, 8],
            capacity: 1000,
            epochs: 1000,
            rate_decay_span: 5000,
            iterations: 10,
            threshold: 1e-5,
            tie_margin: 1e-4,
        }
    }
}

impl BrainConfig {
    #[inline]
    pub fn learning_rate(&self, epoch: usize) -> f32 {
        (self.rate_decay_span as f32 - epoch as f32) / self.rate_decay_span as f32
    }
}

/// Features of all four directions at the moment a human moved, plus their choice.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub features: [Features; 4],
    pub choice: Direction,
}

/// Summary of one [`Brain::train`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainReport {
    pub epochs: usize,
    pub episodes: usize,
    pub corrections: usize,
}

/// Relative-magnitude encoding of one direction's outcome.
///
/// The largest candidate tile maps to 1.0 and each step below halves; empty
/// cells are 0. The last slot is `score / 256`, or the raw illegal sentinel.
pub fn encode(grid: &Grid, dir: Direction) -> Features {
    let outcome = grid.outcome(dir);
    let max = outcome.cells.iter().copied().max().unwrap_or(0) as i32;
    let mut features = [0f32; FEATURES];
    for (slot, &cell) in features.iter_mut().zip(outcome.cells.iter()) {
        if cell != 0 {
            *slot = 2f32.powi(cell as i32 - max);
        }
    }
    features[CELLS] = if outcome.score >= 0 { outcome.score as f32 / 256.0 } else { outcome.score as f32 };
    features
}

#[inline]
fn is_illegal(features: &Features) -> bool { features[CELLS] < 0.0 }

/// Index of the strictly greatest value; the first one wins ties.
fn argmax(values: &[f32; 4]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, &v) in values.iter().enumerate() {
        if best.map_or(true, |b| v > values[b]) {
            best = Some(idx);
        }
    }
    best
}

pub struct Brain {
    cfg: BrainConfig,
    net: Network,
    features: [Features; 4],
    outputs: [f32; 4],
    episodes: Vec<Episode>,
}

impl Brain {
    pub fn new() -> Result<Self, ConfigError> { Self::with_config(BrainConfig::default()) }

    pub fn with_config(cfg: BrainConfig) -> Result<Self, ConfigError> {
        let net = Network::new(&cfg.topology)?;
        let episodes = Vec::with_capacity(cfg.capacity);
        Ok(Self { cfg, net, features: [[0.0; FEATURES]; 4], outputs: [0.0; 4], episodes })
    }

    #[inline]
    pub fn config(&self) -> &BrainConfig { &self.cfg }

    #[inline]
    pub fn network(&self) -> &Network { &self.net }

    #[inline]
    pub fn network_mut(&mut self) -> &mut Network { &mut self.net }

    /// Fresh random weights.
    pub fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) { self.net.initialize(rng); }

    /// Encode and score all four directions of `grid`, caching the results.
    pub fn perceive(&mut self, grid: &Grid) {
        for dir in Direction::ALL {
            let features = encode(grid, dir);
            self.outputs[dir.index()] = self.net.infer(&features);
            self.features[dir.index()] = features;
        }
    }

    /// Cached network output for `dir` from the last [`Brain::perceive`].
    #[inline]
    pub fn output(&self, dir: Direction) -> f32 { self.outputs[dir.index()] }

    #[inline]
    pub fn outputs(&self) -> &[f32; 4] { &self.outputs }

    /// Cached features for `dir` from the last [`Brain::perceive`].
    #[inline]
    pub fn features(&self, dir: Direction) -> &Features { &self.features[dir.index()] }

    /// Direction with the greatest cached output; the earliest wins ties.
    pub fn best_direction(&self) -> Direction {
        argmax(&self.outputs).and_then(Direction::from_index).unwrap_or(Direction::Down)
    }

    /// Remember the last perceived features with the human's `choice`.
    ///
    /// Returns false, storing nothing, once the buffer is full.
    pub fn record_choice(&mut self, choice: Direction) -> bool {
        if self.episodes.len() >= self.cfg.capacity {
            return false;
        }
        self.episodes.push(Episode { features: self.features, choice });
        true
    }

    #[inline]
    pub fn episodes(&self) -> &[Episode] { &self.episodes }

    /// Run the contrastive correction over every buffered episode, then clear the buffer.
    ///
    /// Blocks for the whole run. The perceive cache is left stale; call
    /// [`Brain::perceive`] again before reading outputs.
    pub fn train(&mut self) -> TrainReport {
        let mut report = TrainReport { epochs: self.cfg.epochs, episodes: self.episodes.len(), corrections: 0 };
        info!("training on {} episodes for {} epochs", report.episodes, report.epochs);
        for epoch in 0..self.cfg.epochs {
            let alpha = self.cfg.learning_rate(epoch);
            let mut corrections = 0;
            for episode in &self.episodes {
                if correct(&mut self.net, &self.cfg, episode, alpha).is_some() {
                    corrections += 1;
                }
            }
            debug!("epoch {epoch}: alpha {alpha:.4}, {corrections} corrections");
            report.corrections += corrections;
        }
        self.episodes.clear();
        info!("training done: {} corrections", report.corrections);
        report
    }

    /// Write the network and `grid` to the state file at `path`.
    pub fn save<P: AsRef<Path>>(&self, grid: &Grid, path: P) -> Result<(), PersistError> {
        persistence::save_to_path(path, &self.net, grid)
    }

    /// Replace the network and `grid` from the state file at `path`, then
    /// perceive the restored board. Nothing changes on error.
    pub fn load<P: AsRef<Path>>(&mut self, grid: &mut Grid, path: P) -> Result<(), PersistError> {
        persistence::load_from_path(path, &mut self.net, grid)?;
        self.perceive(grid);
        Ok(())
    }
}

/// Targets and iteration counts of one applied correction.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Correction {
    favourite: usize,
    answer: usize,
    /// Where the favourite's output was pulled down to.
    lowered_to: f32,
    /// Where the chosen direction's output was pulled up to.
    raised_to: f32,
    down_iterations: usize,
    up_iterations: usize,
}

/// Apply one contrastive correction if the network disagrees with the episode.
///
/// Returns `None` when the network already agrees, or when the recorded choice
/// was an illegal move.
fn correct(net: &mut Network, cfg: &BrainConfig, episode: &Episode, alpha: f32) -> Option<Correction> {
    let mut outputs = [0f32; 4];
    for (out, features) in outputs.iter_mut().zip(episode.features.iter()) {
        *out = if is_illegal(features) { -1.0 } else { net.infer(features) };
    }
    let answer = episode.choice.index();
    let favourite = argmax(&outputs).filter(|&idx| outputs[idx] >= 0.0)?;
    if favourite == answer || outputs[answer] < 0.0 {
        return None;
    }

    let mut max_out = outputs[favourite];
    let mut answer_out = outputs[answer];
    // equal targets would give no gradient
    if (max_out - answer_out).abs() < cfg.tie_margin {
        if (max_out + answer_out) / 2.0 > 0.5 {
            answer_out -= cfg.tie_margin;
        } else {
            max_out += cfg.tie_margin;
        }
    }
    let down = net.train(&episode.features[favourite], answer_out, alpha, cfg.iterations, cfg.threshold);
    let up = net.train(&episode.features[answer], max_out, alpha, cfg.iterations, cfg.threshold);
    let c = Correction {
        favourite,
        answer,
        lowered_to: answer_out,
        raised_to: max_out,
        down_iterations: down,
        up_iterations: up,
    };
    trace!(
        "{} to {} in {}, {} to {} in {}",
        c.favourite, c.lowered_to, c.down_iterations, c.answer, c.raised_to, c.up_iterations
    );
    Some(c)
}
