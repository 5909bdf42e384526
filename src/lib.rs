//! neurogame: a 2048 engine whose move advice comes from a small neural net
//! trained on the moves a human actually makes.
//!
//! This crate provides:
//! - A `Grid` with precomputed per-direction outcomes and a one-ply lookahead score (`engine`)
//! - A fixed-topology feed-forward network with online backprop (`nn`)
//! - The supervisor that encodes outcomes, picks a direction and learns from recorded choices (`brain`)
//! - The binary state file holding weights and board (`persistence`)
//! - A session controller for front-ends (`game`)
//!
//! Quick start:
//! ```
//! use neurogame::brain::Brain;
//! use neurogame::engine::Grid;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut grid = Grid::default();
//! grid.reset(&mut rng);
//!
//! let mut brain = Brain::new().unwrap();
//! brain.initialize(&mut rng);
//! brain.perceive(&grid);
//!
//! let advice = brain.best_direction();
//! println!("network suggests {advice:?}");
//!
//! // the human plays the first legal direction instead
//! let choice = neurogame::engine::Direction::ALL
//!     .into_iter()
//!     .find(|&d| grid.outcome(d).is_legal())
//!     .unwrap();
//! assert!(brain.record_choice(choice));
//! assert!(grid.commit(choice, &mut rng));
//! brain.perceive(&grid);
//! assert_eq!(brain.episodes().len(), 1);
//! ```
//!
//! Everything is single-threaded; `Brain::train` blocks until all epochs finish.

pub mod brain;
pub mod engine;
pub mod game;
pub mod nn;
pub mod persistence;
