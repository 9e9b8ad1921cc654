pub mod matrix;
pub mod network;
pub mod persist;
pub mod training;
pub mod types;

pub use matrix::*;
pub use network::*;
pub use persist::*;
pub use training::*;
pub use types::*;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
  #[error("invalid model configuration: {0}")]
  InvalidConfig(String),
  #[error("expected {expected} inputs, got {actual}")]
  InputLength { expected: usize, actual: usize },
  #[error("label {label} out of range for {classes} classes")]
  LabelOutOfRange { label: usize, classes: usize },
  #[error("expected {expected} weights, got {actual}")]
  WeightCount { expected: usize, actual: usize },
}
