pub const INPUT_NODES: usize = 784;
pub const OUTPUT_NODES: usize = 10;

/// Value assigned to the target class in the training target vector.
pub const TARGET_ON: f64 = 0.99;
/// Value assigned to every other class.
pub const TARGET_OFF: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkShape {
  pub input_nodes: usize,
  pub hidden_nodes: usize,
  pub output_nodes: usize,
}

impl NetworkShape {
  /// 28x28 inputs, ten digit classes.
  pub fn digits(hidden_nodes: usize) -> Self {
    Self {
      input_nodes: INPUT_NODES,
      hidden_nodes,
      output_nodes: OUTPUT_NODES,
    }
  }

  pub fn input_hidden_len(&self) -> usize {
    self.input_nodes * self.hidden_nodes
  }

  pub fn hidden_output_len(&self) -> usize {
    self.hidden_nodes * self.output_nodes
  }
}

/// Fixed at startup and passed by value into the network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
  pub shape: NetworkShape,
  pub learning_rate: f64,
}

impl ModelConfig {
  pub fn validate(&self) -> Result<(), super::ModelError> {
    let NetworkShape {
      input_nodes,
      hidden_nodes,
      output_nodes,
    } = self.shape;
    if input_nodes == 0 || hidden_nodes == 0 || output_nodes == 0 {
      return Err(super::ModelError::InvalidConfig(format!(
        "node counts must be positive, got {}x{}x{}",
        input_nodes, hidden_nodes, output_nodes
      )));
    }
    if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
      return Err(super::ModelError::InvalidConfig(format!(
        "learning rate must be positive, got {}",
        self.learning_rate
      )));
    }
    Ok(())
  }
}
