use tracing::info;

use crate::{
  dataset::{DataPaths, Dataset},
  model::{run_training, LoadOutcome, ModelConfig, Network, TrainParams},
  Error,
};

/// Trains on an IDX pair, continuing from the weight file unless `fresh`.
pub struct Train {
  config: ModelConfig,
  data: DataPaths,
  params: TrainParams,
  fresh: bool,
}

impl Train {
  pub fn new(config: ModelConfig, data: DataPaths, params: TrainParams, fresh: bool) -> Self {
    Self {
      config,
      data,
      params,
      fresh,
    }
  }

  pub fn run(self) -> Result<Network, Error> {
    let mut network = Network::new(self.config)?;
    if !self.fresh {
      match network.load(&self.params.model_path)? {
        LoadOutcome::Loaded => info!("Continuing from {:?}", self.params.model_path),
        LoadOutcome::Missing => info!("No weights at {:?}, starting from scratch", self.params.model_path),
      }
    }

    let dataset = Dataset::load(&self.data);
    info!("Training on {} samples", dataset.len());
    let report = run_training(&mut network, &dataset, &self.params)?;
    info!(
      "Trained {} epochs in {:.2}s, final weights at {:?}",
      report.epochs,
      report.elapsed.as_secs_f32(),
      self.params.model_path
    );
    Ok(network)
  }
}
