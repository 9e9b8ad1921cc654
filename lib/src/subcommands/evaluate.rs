use std::path::PathBuf;

use tracing::info;

use crate::{
  dataset::{DataPaths, Dataset},
  model::{evaluate, Evaluation, LoadOutcome, ModelConfig, Network},
  Error,
};

/// Accuracy of a saved model on a labelled IDX pair.
pub struct Evaluate {
  config: ModelConfig,
  model_path: PathBuf,
  data: DataPaths,
}

impl Evaluate {
  pub fn new(config: ModelConfig, model_path: PathBuf, data: DataPaths) -> Self {
    Self {
      config,
      model_path,
      data,
    }
  }

  pub fn run(self) -> Result<Evaluation, Error> {
    let mut network = Network::new(self.config)?;
    if network.load(&self.model_path)? == LoadOutcome::Missing {
      return Err(Error::ModelMissing(self.model_path));
    }
    let dataset = Dataset::load(&self.data);
    if dataset.is_empty() {
      return Err(Error::EmptyDataset(self.data.images));
    }
    let evaluation = evaluate(&network, &dataset)?;
    info!(
      "Accuracy {:.2}% ({}/{})",
      evaluation.accuracy() * 100.0,
      evaluation.correct,
      evaluation.total
    );
    Ok(evaluation)
  }
}
