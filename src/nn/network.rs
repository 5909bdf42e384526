use rand::Rng;
use std::io::{self, Read, Write};

use super::{ConfigError, Layer};

/// A chain of layers mapping `topology[0]` inputs to one output in (0, 1).
#[derive(Debug, Clone)]
pub struct Network {
    topology: Vec<usize>,
    layers: Vec<Layer>,
}

impl Network {
    /// Build layers for stage widths `[s0, s1, ..., sK-1]`.
    ///
    /// Layer `i` maps width `s_i` to `s_{i+1}`; the last layer maps `s_{K-1}`
    /// to the single output. All weights start at zero.
    pub fn new(stages: &[usize]) -> Result<Self, ConfigError> {
        if stages.len() < 2 {
            return Err(ConfigError::TooFewStages(stages.len()));
        }
        if let Some((index, &width)) = stages.iter().enumerate().find(|&(_, &w)| w < 2) {
            return Err(ConfigError::StageTooNarrow { index, width });
        }
        let boundary = |width: usize| (vec![0.0f32; width], vec![0.0f32; width]);

        let mut layers = Vec::with_capacity(stages.len());
        let (output, sigma) = boundary(stages[1]);
        layers.push(Layer::first(stages[0], output, sigma)?);
        for &width in stages[2..].iter().chain(std::iter::once(&1)) {
            let (output, sigma) = boundary(width);
            let layer = Layer::chained(&layers[layers.len() - 1], output, sigma)?;
            layers.push(layer);
        }
        Ok(Network { topology: stages.to_vec(), layers })
    }

    pub fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for layer in &mut self.layers {
            layer.initialize(rng);
        }
    }

    #[inline]
    pub fn topology(&self) -> &[usize] { &self.topology }

    #[inline]
    pub fn input_width(&self) -> usize { self.topology[0] }

    #[inline]
    pub fn layers(&self) -> &[Layer] { &self.layers }

    #[cfg(test)]
    pub(crate) fn layers_mut(&mut self) -> &mut [Layer] { &mut self.layers }

    /// Output of the most recent forward pass.
    #[inline]
    pub fn output(&self) -> f32 { self.layers[self.layers.len() - 1].output()[0] }

    fn forward(&mut self) {
        self.layers[0].evaluate(None);
        for idx in 1..self.layers.len() {
            let (done, todo) = self.layers.split_at_mut(idx);
            todo[0].evaluate(Some(&done[idx - 1]));
        }
    }

    fn backward(&mut self, alpha: f32) {
        for idx in (1..self.layers.len()).rev() {
            let (done, todo) = self.layers.split_at_mut(idx);
            todo[0].backpropagate(alpha, Some(&mut done[idx - 1]));
        }
        self.layers[0].backpropagate(alpha, None);
    }

    /// Score `input`. Returns 0 without touching any buffer if the width is wrong.
    pub fn infer(&mut self, input: &[f32]) -> f32 {
        if !self.layers[0].set_input(input) {
            return 0.0;
        }
        self.forward();
        self.output()
    }

    /// Move the output for `input` towards `target`.
    ///
    /// Runs at most `max_iterations` forward/backward passes and stops early
    /// once `|output - target| <= threshold`. Returns the number of passes that
    /// updated weights, or 0 if the input width is wrong.
    pub fn train(&mut self, input: &[f32], target: f32, alpha: f32, max_iterations: usize, threshold: f32) -> usize {
        if !self.layers[0].set_input(input) {
            return 0;
        }
        for iteration in 0..max_iterations {
            self.forward();
            let error = self.output() - target;
            if error.abs() <= threshold {
                return iteration;
            }
            let last = self.layers.len() - 1;
            self.layers[last].sigma_mut()[0] = error;
            self.backward(alpha);
        }
        max_iterations
    }

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        for layer in &self.layers {
            layer.write_to(w)?;
        }
        Ok(())
    }

    /// Read every layer's weights in construction order.
    ///
    /// This is not atomic: if the stream fails partway, layers already read keep
    /// their new weights while later ones keep the old. Use
    /// [`crate::persistence::read_state`] for an all-or-nothing load.
    pub fn read_from<R: Read + ?Sized>(&mut self, r: &mut R) -> io::Result<()> {
        for layer in &mut self.layers {
            layer.read_from(r)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn input(seed: f32) -> Vec<f32> { (0..17).map(|i| ((i as f32) * 0.37 + seed).sin().abs()).collect() }

    #[test]
    fn topology_faults() {
        assert_eq!(Network::new(&[17]).unwrap_err(), ConfigError::TooFewStages(1));
        assert_eq!(Network::new(&[]).unwrap_err(), ConfigError::TooFewStages(0));
        assert_eq!(
            Network::new(&[17, 40, 1, 8]).unwrap_err(),
            ConfigError::StageTooNarrow { index: 2, width: 1 }
        );
    }

    #[test]
    fn layer_shapes() {
        let net = Network::new(&[17, 40, 20, 8]).unwrap();
        let shapes: Vec<(usize, usize)> = net.layers().iter().map(|l| (l.inputs(), l.outputs())).collect();
        assert_eq!(shapes, vec![(17, 40), (40, 20), (20, 8), (8, 1)]);
        assert!(net.layers()[0].owns_input());
        assert!(net.layers()[1..].iter().all(|l| !l.owns_input()));
    }

    #[test]
    fn zero_weights_give_one_half() {
        let mut net = Network::new(&[17, 40, 20, 8]).unwrap();
        assert_eq!(net.infer(&input(0.0)), 0.5);
        assert_eq!(net.infer(&input(3.0)), 0.5);
    }

    #[test]
    fn wrong_width_is_silent_noop() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut net = Network::new(&[17, 6, 4]).unwrap();
        net.initialize(&mut rng);
        let before = net.infer(&input(1.0));
        assert_eq!(net.infer(&[0.5; 16]), 0.0);
        assert_eq!(net.train(&[0.5; 18], 0.2, 1.0, 10, 1e-5), 0);
        assert_eq!(net.output(), before);
        assert_eq!(net.infer(&input(1.0)), before);
    }

    #[test]
    fn inference_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut net = Network::new(&[17, 40, 20, 8]).unwrap();
        net.initialize(&mut rng);
        let x = input(0.5);
        let a = net.infer(&x);
        let b = net.infer(&x);
        assert_eq!(a.to_bits(), b.to_bits());
        assert!(a > 0.0 && a < 1.0);
    }

    #[test]
    fn training_converges() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut net = Network::new(&[17, 8, 4]).unwrap();
        net.initialize(&mut rng);
        let x = input(2.0);
        let iters = net.train(&x, 0.9, 1.0, 20_000, 1e-3);
        assert!(iters < 20_000);
        assert!((net.infer(&x) - 0.9).abs() <= 1e-3);

        let iters = net.train(&x, 0.1, 1.0, 20_000, 1e-3);
        assert!(iters <= 20_000);
        assert!((net.infer(&x) - 0.1).abs() <= 1e-3);
    }

    #[test]
    fn training_respects_cap() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut net = Network::new(&[17, 8, 4]).unwrap();
        net.initialize(&mut rng);
        let x = input(4.0);
        let start = net.infer(&x);
        let target = if start > 0.5 { 0.05 } else { 0.95 };
        assert_eq!(net.train(&x, target, 0.01, 3, 1e-6), 3);
        assert_eq!(net.train(&x, target, 0.01, 0, 1e-6), 0);
    }

    #[test]
    fn training_reports_zero_when_already_there() {
        let mut net = Network::new(&[17, 4]).unwrap();
        assert_eq!(net.train(&input(1.0), 0.5, 1.0, 10, 1e-5), 0);
    }

    #[test]
    fn bytes_round_trip() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut net = Network::new(&[17, 40, 20, 8]).unwrap();
        net.initialize(&mut rng);
        let mut buf = Vec::new();
        net.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), (18 * 40 + 41 * 20 + 21 * 8 + 9) * 4);

        let mut copy = Network::new(&[17, 40, 20, 8]).unwrap();
        copy.read_from(&mut buf.as_slice()).unwrap();
        let x = input(0.7);
        assert_eq!(copy.infer(&x).to_bits(), net.infer(&x).to_bits());
    }

    #[test]
    fn short_stream_overwrites_leading_layers() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut src = Network::new(&[17, 4, 3]).unwrap();
        src.initialize(&mut rng);
        let mut buf = Vec::new();
        src.write_to(&mut buf).unwrap();
        buf.truncate(18 * 4 * 4 + 8);

        let mut dst = Network::new(&[17, 4, 3]).unwrap();
        let err = dst.read_from(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(dst.layers()[0].weights(), src.layers()[0].weights());
        assert!(dst.layers()[2].weights().iter().all(|&w| w == 0.0));
    }
}
