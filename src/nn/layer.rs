use rand::Rng;
use std::io::{self, Read, Write};

use super::{logistic, ConfigError};

#[derive(Debug, Clone)]
enum Inbound {
    /// First layer: owns the network input.
    Owned(Vec<f32>),
    /// Reads the activations of the layer before it.
    Upstream,
}

/// One affine + logistic stage.
///
/// Weights are stored row per output unit, `inputs + 1` values per row with the
/// bias last.
#[derive(Debug, Clone)]
pub struct Layer {
    inputs: usize,
    outputs: usize,
    weights: Vec<f32>,
    output: Vec<f32>,
    sigma: Vec<f32>,
    inbound: Inbound,
}

impl Layer {
    fn with_inbound(inputs: usize, output: Vec<f32>, sigma: Vec<f32>, inbound: Inbound) -> Result<Self, ConfigError> {
        if inputs < 2 {
            return Err(ConfigError::InputTooNarrow(inputs));
        }
        if output.len() != sigma.len() {
            return Err(ConfigError::BufferMismatch { activations: output.len(), errors: sigma.len() });
        }
        if output.is_empty() {
            return Err(ConfigError::NoOutputs);
        }
        let outputs = output.len();
        Ok(Layer { inputs, outputs, weights: vec![0.0; outputs * (inputs + 1)], output, sigma, inbound })
    }

    /// Build the first layer of a chain. It owns an input buffer of width `inputs`,
    /// filled through [`Layer::set_input`].
    ///
    /// `output` and `sigma` become this layer's boundary and must have equal width.
    pub fn first(inputs: usize, output: Vec<f32>, sigma: Vec<f32>) -> Result<Self, ConfigError> {
        Self::with_inbound(inputs, output, sigma, Inbound::Owned(vec![0.0; inputs]))
    }

    /// Build a layer fed by `upstream`'s boundary.
    pub fn chained(upstream: &Layer, output: Vec<f32>, sigma: Vec<f32>) -> Result<Self, ConfigError> {
        Self::with_inbound(upstream.outputs, output, sigma, Inbound::Upstream)
    }

    /// Uniform random weights (bias included) in [-0.5, 0.5).
    pub fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for w in self.weights.iter_mut() {
            *w = rng.gen::<f32>() - 0.5;
        }
    }

    /// Replace the owned input. Rejected on a chained layer or on a width mismatch.
    pub fn set_input(&mut self, input: &[f32]) -> bool {
        match &mut self.inbound {
            Inbound::Owned(buf) if buf.len() == input.len() => {
                buf.copy_from_slice(input);
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn owns_input(&self) -> bool { matches!(self.inbound, Inbound::Owned(_)) }

    fn resolve_input<'a>(inbound: &'a Inbound, upstream: Option<&'a [f32]>) -> Option<&'a [f32]> {
        match inbound {
            Inbound::Owned(buf) => Some(buf.as_slice()),
            Inbound::Upstream => upstream,
        }
    }

    /// Forward pass into the owned output buffer.
    ///
    /// `upstream` is the previous layer; it is ignored by a first layer.
    pub fn evaluate(&mut self, upstream: Option<&Layer>) {
        let Some(input) = Self::resolve_input(&self.inbound, upstream.map(|l| l.output.as_slice())) else {
            debug_assert!(false, "chained layer evaluated without its upstream");
            return;
        };
        debug_assert_eq!(input.len(), self.inputs);
        for (row, out) in self.weights.chunks_exact(self.inputs + 1).zip(self.output.iter_mut()) {
            let net = row[self.inputs] + row[..self.inputs].iter().zip(input).map(|(w, x)| w * x).sum::<f32>();
            *out = logistic(net);
        }
    }

    /// One gradient step using the error already stored in this layer's sigma.
    ///
    /// The upstream layer's sigma is overwritten with dError/dOut for its
    /// outputs, computed from the weights before this step's update. The bias
    /// column is not updated.
    pub fn backpropagate(&mut self, alpha: f32, upstream: Option<&mut Layer>) {
        let inputs = self.inputs;
        let (input, mut up_sigma) = match (&self.inbound, upstream) {
            (Inbound::Owned(buf), _) => (buf.as_slice(), None),
            (Inbound::Upstream, Some(up)) => (up.output.as_slice(), Some(up.sigma.as_mut_slice())),
            (Inbound::Upstream, None) => {
                debug_assert!(false, "chained layer trained without its upstream");
                return;
            }
        };
        if let Some(up) = up_sigma.as_deref_mut() {
            up.fill(0.0);
        }
        for ((row, &out), &sigma) in self.weights.chunks_exact_mut(inputs + 1).zip(&self.output).zip(&self.sigma) {
            let delta = sigma * out * (1.0 - out);
            for (i, w) in row[..inputs].iter_mut().enumerate() {
                if let Some(up) = up_sigma.as_deref_mut() {
                    up[i] += delta * *w;
                }
                *w -= alpha * delta * input[i];
            }
        }
    }

    #[inline]
    pub fn inputs(&self) -> usize { self.inputs }

    #[inline]
    pub fn outputs(&self) -> usize { self.outputs }

    #[inline]
    pub fn output(&self) -> &[f32] { &self.output }

    #[inline]
    pub fn sigma(&self) -> &[f32] { &self.sigma }

    #[inline]
    pub(crate) fn sigma_mut(&mut self) -> &mut [f32] { &mut self.sigma }

    #[inline]
    pub fn weights(&self) -> &[f32] { &self.weights }

    /// Weight from input `input` to output `output`; `input == inputs()` is the bias.
    #[inline]
    pub fn weight(&self, output: usize, input: usize) -> f32 { self.weights[output * (self.inputs + 1) + input] }

    #[cfg(test)]
    pub(crate) fn set_weight(&mut self, output: usize, input: usize, value: f32) {
        self.weights[output * (self.inputs + 1) + input] = value;
    }

    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        let mut buf = Vec::with_capacity(self.weights.len() * 4);
        for &v in &self.weights {
            buf.extend_from_slice(&v.to_be_bytes());
        }
        w.write_all(&buf)
    }

    /// Read weights in [`Layer::write_to`] order. Weights read before a failure stay overwritten.
    pub fn read_from<R: Read + ?Sized>(&mut self, r: &mut R) -> io::Result<()> {
        let mut bytes = [0u8; 4];
        for v in self.weights.iter_mut() {
            r.read_exact(&mut bytes)?;
            *v = f32::from_be_bytes(bytes);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn buffers(n: usize) -> (Vec<f32>, Vec<f32>) { (vec![0.0; n], vec![0.0; n]) }

    #[test]
    fn construction_faults() {
        let (o, s) = buffers(3);
        assert_eq!(Layer::first(1, o, s).unwrap_err(), ConfigError::InputTooNarrow(1));
        assert_eq!(
            Layer::first(4, vec![0.0; 3], vec![0.0; 2]).unwrap_err(),
            ConfigError::BufferMismatch { activations: 3, errors: 2 }
        );
        let (o, s) = buffers(1);
        let narrow = Layer::first(4, o, s).unwrap();
        let (o, s) = buffers(2);
        assert_eq!(Layer::chained(&narrow, o, s).unwrap_err(), ConfigError::InputTooNarrow(1));
    }

    #[test]
    fn set_input_only_on_owner() {
        let (o, s) = buffers(3);
        let mut first = Layer::first(2, o, s).unwrap();
        assert!(first.set_input(&[1.0, 2.0]));
        assert!(!first.set_input(&[1.0, 2.0, 3.0]));
        let (o, s) = buffers(2);
        let mut next = Layer::chained(&first, o, s).unwrap();
        assert!(!next.owns_input());
        assert!(!next.set_input(&[1.0, 2.0, 3.0]));
    }

    #[test]
    fn evaluate_matches_formula() {
        let (o, s) = buffers(2);
        let mut layer = Layer::first(2, o, s).unwrap();
        layer.set_weight(0, 0, 0.5);
        layer.set_weight(0, 1, -1.0);
        layer.set_weight(0, 2, 0.25);
        layer.set_weight(1, 2, -0.3);
        layer.set_input(&[2.0, 1.0]);
        layer.evaluate(None);
        assert!((layer.output()[0] - logistic(0.25)).abs() < 1e-7);
        assert!((layer.output()[1] - logistic(-0.3)).abs() < 1e-7);
    }

    #[test]
    fn outputs_stay_in_open_interval() {
        let mut rng = StdRng::seed_from_u64(4);
        let (o, s) = buffers(5);
        let mut layer = Layer::first(3, o, s).unwrap();
        layer.initialize(&mut rng);
        assert!(layer.weights().iter().all(|w| *w > -0.5 && *w < 0.5));
        layer.set_input(&[3.0, -2.0, 0.5]);
        layer.evaluate(None);
        assert!(layer.output().iter().all(|&o| o > 0.0 && o < 1.0));
    }

    #[test]
    fn backpropagate_uses_pre_update_weights() {
        let (o, s) = buffers(2);
        let mut up = Layer::first(2, o, s).unwrap();
        up.set_input(&[1.0, 1.0]);
        up.evaluate(None);
        let (o, s) = buffers(1);
        let mut down = Layer::chained(&up, o, s).unwrap();
        down.set_weight(0, 0, 0.4);
        down.set_weight(0, 1, -0.2);
        down.set_weight(0, 2, 0.1);
        down.evaluate(Some(&up));
        let out = down.output()[0];
        down.sigma_mut()[0] = 0.3;
        up.sigma_mut().fill(9.0);
        down.backpropagate(0.5, Some(&mut up));

        let delta = 0.3 * out * (1.0 - out);
        assert!((up.sigma()[0] - delta * 0.4).abs() < 1e-7);
        assert!((up.sigma()[1] + delta * 0.2).abs() < 1e-7);
        // input activations are logistic(0) = 0.5
        assert!((down.weight(0, 0) - (0.4 - 0.5 * delta * 0.5)).abs() < 1e-7);
        assert_eq!(down.weight(0, 2), 0.1);
    }

    #[test]
    fn bytes_round_trip() {
        let mut rng = StdRng::seed_from_u64(8);
        let (o, s) = buffers(3);
        let mut layer = Layer::first(4, o, s).unwrap();
        layer.initialize(&mut rng);
        let mut buf = Vec::new();
        layer.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 3 * 5 * 4);
        assert_eq!(&buf[16..20], &layer.weight(0, 4).to_be_bytes());
        let (o, s) = buffers(3);
        let mut copy = Layer::first(4, o, s).unwrap();
        copy.read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(copy.weights(), layer.weights());
    }
}
