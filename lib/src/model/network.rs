use rand::Rng;
use tracing::instrument;

use super::{Matrix, ModelConfig, ModelError, NetworkShape, TARGET_OFF, TARGET_ON};

pub fn sigmoid(x: f64) -> f64 {
  1.0 / (1.0 + (-x).exp())
}

/// Index of the largest value, the first one on ties.
pub(crate) fn first_max(values: &[f64]) -> usize {
  let mut best = 0;
  for (i, v) in values.iter().enumerate() {
    if *v > values[best] {
      best = i;
    }
  }
  best
}

/// What one training step observed, before the weights were updated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainStep {
  /// Half the sum of squared output errors.
  pub loss: f64,
  /// Whether the forward pass already picked the target class.
  pub correct: bool,
}

/// Fully connected input -> hidden -> output network with sigmoid
/// activations and no biases.
///
/// `w_ih` is `input_nodes x hidden_nodes`, `w_ho` is `hidden_nodes x output_nodes`,
/// both row-major over the source layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
  pub(super) config: ModelConfig,
  pub(super) w_ih: Matrix,
  pub(super) w_ho: Matrix,
}

impl Network {
  pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
    Self::with_rng(config, &mut rand::thread_rng())
  }

  /// Weights drawn from N(0, 1/input_nodes).
  pub fn with_rng<R: Rng + ?Sized>(config: ModelConfig, rng: &mut R) -> Result<Self, ModelError> {
    config.validate()?;
    let NetworkShape {
      input_nodes,
      hidden_nodes,
      output_nodes,
    } = config.shape;
    let std_dev = 1.0 / (input_nodes as f64).sqrt();
    let invalid = |e: rand_distr::NormalError| ModelError::InvalidConfig(format!("weight distribution: {}", e));
    let w_ih = Matrix::random_normal(input_nodes, hidden_nodes, std_dev, rng).map_err(invalid)?;
    let w_ho = Matrix::random_normal(hidden_nodes, output_nodes, std_dev, rng).map_err(invalid)?;
    Ok(Self { config, w_ih, w_ho })
  }

  /// Builds a network around explicit flattened weights.
  pub fn from_weights(config: ModelConfig, w_ih: Vec<f64>, w_ho: Vec<f64>) -> Result<Self, ModelError> {
    config.validate()?;
    let shape = config.shape;
    let mismatch = |expected, actual| ModelError::WeightCount { expected, actual };
    let (ih_len, ho_len) = (w_ih.len(), w_ho.len());
    let w_ih = Matrix::from_vec(shape.input_nodes, shape.hidden_nodes, w_ih)
      .ok_or_else(|| mismatch(shape.input_hidden_len(), ih_len))?;
    let w_ho = Matrix::from_vec(shape.hidden_nodes, shape.output_nodes, w_ho)
      .ok_or_else(|| mismatch(shape.hidden_output_len(), ho_len))?;
    Ok(Self { config, w_ih, w_ho })
  }

  pub fn config(&self) -> &ModelConfig {
    &self.config
  }

  pub fn shape(&self) -> NetworkShape {
    self.config.shape
  }

  pub fn input_hidden(&self) -> &Matrix {
    &self.w_ih
  }

  pub fn hidden_output(&self) -> &Matrix {
    &self.w_ho
  }

  fn check_input(&self, input: &[f64]) -> Result<(), ModelError> {
    let expected = self.config.shape.input_nodes;
    if input.len() != expected {
      return Err(ModelError::InputLength {
        expected,
        actual: input.len(),
      });
    }
    Ok(())
  }

  /// Sigmoid activations of `input` through `weights` (`input.len() x cols`).
  fn layer(weights: &Matrix, input: &[f64]) -> Vec<f64> {
    let mut sums = vec![0.0; weights.cols()];
    for (x, row) in input.iter().zip((0..weights.rows()).map(|r| weights.row(r))) {
      for (sum, w) in sums.iter_mut().zip(row) {
        *sum += w * x;
      }
    }
    sums.into_iter().map(sigmoid).collect()
  }

  /// Returns the hidden and output activations.
  fn forward(&self, input: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let hidden = Self::layer(&self.w_ih, input);
    let output = Self::layer(&self.w_ho, &hidden);
    (hidden, output)
  }

  /// Output activations for `input`.
  pub fn query(&self, input: &[f64]) -> Result<Vec<f64>, ModelError> {
    self.check_input(input)?;
    Ok(self.forward(input).1)
  }

  /// Class with the highest output activation; the lowest index wins ties.
  pub fn predict(&self, input: &[f64]) -> Result<usize, ModelError> {
    Ok(first_max(&self.query(input)?))
  }

  /// One step of stochastic gradient descent towards `label`, applied in place.
  #[instrument(level = "trace", skip(self, input))]
  pub fn train(&mut self, input: &[f64], label: usize) -> Result<TrainStep, ModelError> {
    self.check_input(input)?;
    let classes = self.config.shape.output_nodes;
    if label >= classes {
      return Err(ModelError::LabelOutOfRange { label, classes });
    }
    let lr = self.config.learning_rate;
    let (hidden, output) = self.forward(input);

    let output_errors: Vec<f64> = output
      .iter()
      .enumerate()
      .map(|(k, y)| (if k == label { TARGET_ON } else { TARGET_OFF }) - y)
      .collect();

    // propagated through the weights as they were for the forward pass
    let hidden_errors: Vec<f64> = (0..self.w_ho.rows())
      .map(|j| {
        self
          .w_ho
          .row(j)
          .iter()
          .zip(&output_errors)
          .map(|(w, e)| w * e)
          .sum::<f64>()
      })
      .collect();

    for (j, a) in hidden.iter().enumerate() {
      let row = self.w_ho.row_mut(j);
      for (k, w) in row.iter_mut().enumerate() {
        *w += lr * output_errors[k] * output[k] * (1.0 - output[k]) * a;
      }
    }

    for (i, x) in input.iter().enumerate() {
      let row = self.w_ih.row_mut(i);
      for (j, w) in row.iter_mut().enumerate() {
        *w += lr * hidden_errors[j] * hidden[j] * (1.0 - hidden[j]) * x;
      }
    }

    Ok(TrainStep {
      loss: 0.5 * output_errors.iter().map(|e| e * e).sum::<f64>(),
      correct: first_max(&output) == label,
    })
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;
  use rand::{rngs::StdRng, SeedableRng};

  use super::*;

  fn small_config() -> ModelConfig {
    ModelConfig {
      shape: NetworkShape {
        input_nodes: 4,
        hidden_nodes: 3,
        output_nodes: 2,
      },
      learning_rate: 0.5,
    }
  }

  /// Small fixed weights of both signs.
  fn patterned() -> Network {
    let w_ih = (0..12).map(|n| 0.1 * (((n * 7) % 11) as f64 - 5.0) / 5.0).collect();
    let w_ho = (0..6).map(|n| 0.1 * (((n * 5) % 7) as f64 - 3.0) / 3.0).collect();
    Network::from_weights(small_config(), w_ih, w_ho).unwrap()
  }

  fn zeroed() -> Network {
    Network::from_weights(small_config(), vec![0.0; 12], vec![0.0; 6]).unwrap()
  }

  #[test]
  fn sigmoid_midpoint_and_range() {
    assert_eq!(sigmoid(0.0), 0.5);
    assert!(sigmoid(40.0) <= 1.0 && sigmoid(40.0) > 0.99);
    assert!(sigmoid(-40.0) >= 0.0 && sigmoid(-40.0) < 0.01);
  }

  #[test]
  fn zero_weights_predict_first_class() {
    let network = zeroed();
    for input in [[0.0; 4], [1.0, 0.0, 0.0, 0.0], [0.3, 0.9, 0.1, 1.0]] {
      assert_eq!(network.query(&input).unwrap(), vec![0.5, 0.5]);
      assert_eq!(network.predict(&input).unwrap(), 0);
    }
  }

  #[test]
  fn first_step_from_zero_moves_only_output_weights() {
    let mut network = zeroed();
    let step = network.train(&[1.0, 0.0, 0.0, 0.0], 1).unwrap();
    assert!(!step.correct);

    let w_ho = network.hidden_output();
    for j in 0..3 {
      assert!(w_ho.get(j, 1) > 0.0, "w_ho[{}, 1] = {}", j, w_ho.get(j, 1));
      assert!(w_ho.get(j, 0) < 0.0, "w_ho[{}, 0] = {}", j, w_ho.get(j, 0));
    }
    assert!(network.input_hidden().as_slice().iter().all(|w| *w == 0.0));
  }

  #[test]
  fn first_step_matches_hand_computed_update() {
    let mut network = zeroed();
    network.train(&[1.0, 0.0, 0.0, 0.0], 1).unwrap();
    // lr * e * y * (1 - y) * a with y = a = 0.5
    let up = 0.5 * (0.99 - 0.5) * 0.5 * 0.5 * 0.5;
    let down = 0.5 * (0.01 - 0.5) * 0.5 * 0.5 * 0.5;
    assert_eq!(network.hidden_output().row(0), &[down, up]);
    assert_eq!(network.predict(&[0.0, 1.0, 0.0, 0.0]).unwrap(), 1);
  }

  #[test]
  fn training_raises_target_activation() {
    let mut network = patterned();
    let input = [0.9, 0.1, 0.6, 0.3];
    for label in [0, 1, 1, 0, 1, 0] {
      let before = network.query(&input).unwrap()[label];
      network.train(&input, label).unwrap();
      let after = network.query(&input).unwrap()[label];
      assert!(after > before, "label {}: {} -> {}", label, before, after);
    }
  }

  #[test]
  fn repeated_training_learns_a_separable_pair() {
    let mut network = patterned();
    let samples = [([1.0, 1.0, 0.0, 0.0], 0), ([0.0, 0.0, 1.0, 1.0], 1)];
    for _ in 0..500 {
      for (input, label) in &samples {
        network.train(input, *label).unwrap();
      }
    }
    for (input, label) in &samples {
      assert_eq!(network.predict(input).unwrap(), *label);
    }
  }

  #[test]
  fn wrong_input_length_is_rejected() {
    let mut network = zeroed();
    assert!(matches!(
      network.predict(&[1.0; 5]),
      Err(ModelError::InputLength { expected: 4, actual: 5 })
    ));
    assert!(matches!(
      network.train(&[1.0; 3], 0),
      Err(ModelError::InputLength { expected: 4, actual: 3 })
    ));
    assert_eq!(network, zeroed());
  }

  #[test]
  fn label_out_of_range_is_rejected() {
    let mut network = zeroed();
    assert!(matches!(
      network.train(&[0.0; 4], 2),
      Err(ModelError::LabelOutOfRange { label: 2, classes: 2 })
    ));
    assert_eq!(network, zeroed());
  }

  #[test]
  fn invalid_configs_are_rejected() {
    let mut config = small_config();
    config.learning_rate = 0.0;
    assert!(matches!(Network::new(config), Err(ModelError::InvalidConfig(_))));
    let mut config = small_config();
    config.shape.hidden_nodes = 0;
    assert!(matches!(Network::new(config), Err(ModelError::InvalidConfig(_))));
    assert!(matches!(
      Network::from_weights(small_config(), vec![0.0; 11], vec![0.0; 6]),
      Err(ModelError::WeightCount { expected: 12, actual: 11 })
    ));
  }

  #[test]
  fn seeded_construction_is_deterministic() {
    let a = Network::with_rng(small_config(), &mut StdRng::seed_from_u64(9)).unwrap();
    let b = Network::with_rng(small_config(), &mut StdRng::seed_from_u64(9)).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn first_max_prefers_lowest_index() {
    assert_eq!(first_max(&[0.2, 0.7, 0.7, 0.1]), 1);
    assert_eq!(first_max(&[0.5, 0.5]), 0);
    assert_eq!(first_max(&[0.1, 0.2, 0.9]), 2);
  }

  proptest! {
    #[test]
    fn predict_is_pure(seed in any::<u64>(), input in proptest::collection::vec(0.0..=1.0f64, 4)) {
      let network = Network::with_rng(small_config(), &mut StdRng::seed_from_u64(seed)).unwrap();
      let snapshot = network.clone();
      let first = network.predict(&input).unwrap();
      prop_assert_eq!(first, network.predict(&input).unwrap());
      prop_assert!(first < 2);
      prop_assert_eq!(network, snapshot);
    }
  }
}
