//! Fully connected feed-forward net with logistic units and online backprop.
//!
//! A [`Network`] is a fixed chain of [`Layer`]s ending in a single output unit.
//! Each layer owns the boundary it produces (activations and the matching
//! error vector). The next layer only borrows that boundary: read-only for the
//! activations during evaluation, and writable for the error vector while it
//! backpropagates.
//!
//! ```
//! use neurogame::nn::Network;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut net = Network::new(&[3, 4, 2]).unwrap();
//! // un-initialized weights are all zero
//! assert_eq!(net.infer(&[1.0, 2.0, 3.0]), 0.5);
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! net.initialize(&mut rng);
//! let iters = net.train(&[1.0, 0.0, 1.0], 0.8, 1.0, 5000, 1e-3);
//! assert!(iters < 5000);
//! ```

mod layer;
mod network;

pub use layer::Layer;
pub use network::Network;

/// Invalid topology, detected while building a layer or network.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("network needs at least 2 stages, got {0}")]
    TooFewStages(usize),
    #[error("stage {index} has width {width}, minimum is 2")]
    StageTooNarrow { index: usize, width: usize },
    #[error("layer input width {0} is below the minimum of 2")]
    InputTooNarrow(usize),
    #[error("activation buffer has width {activations} but error buffer has width {errors}")]
    BufferMismatch { activations: usize, errors: usize },
    #[error("layer has no outputs")]
    NoOutputs,
}

#[inline]
pub(crate) fn logistic(net: f32) -> f32 { 1.0 / (1.0 + (-net).exp()) }
