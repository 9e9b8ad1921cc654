pub mod dataset;
pub mod model;
pub mod subcommands;
pub mod utils;

use std::{io, path::PathBuf};

pub use dataset::{DataPaths, Dataset, DatasetError, Sample};
pub use model::{
  LoadOutcome, ModelConfig, ModelError, Network, NetworkShape, PersistError, TrainError, TrainParams,
};

/// Failures surfaced by the subcommands.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error(transparent)]
  Dataset(#[from] DatasetError),
  #[error(transparent)]
  Model(#[from] ModelError),
  #[error(transparent)]
  Persist(#[from] PersistError),
  #[error(transparent)]
  Train(#[from] TrainError),
  #[error(transparent)]
  Client(#[from] subcommands::ClientError),
  #[error("no samples could be read from {}", .0.display())]
  EmptyDataset(PathBuf),
  #[error("no trained model at {}", .0.display())]
  ModelMissing(PathBuf),
  #[error("IO error: {0}")]
  Io(#[from] io::Error),
}
