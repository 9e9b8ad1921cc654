use std::path::PathBuf;

use tracing::{info, warn};

use super::Server;
use crate::{
  dataset::{DataPaths, Dataset},
  model::{run_training, LoadOutcome, ModelConfig, Network, TrainParams},
  Error,
};

/// Loads the saved model, or trains one first if there is none, then serves it.
pub struct Run {
  config: ModelConfig,
  data: DataPaths,
  params: TrainParams,
  port: u16,
  static_dir: PathBuf,
}

impl Run {
  pub fn new(
    config: ModelConfig,
    data: DataPaths,
    params: TrainParams,
    port: u16,
    static_dir: PathBuf,
  ) -> Self {
    Self {
      config,
      data,
      params,
      port,
      static_dir,
    }
  }

  /// The network to serve. Training only happens when no weight file exists.
  pub fn prepare(&self) -> Result<Network, Error> {
    let mut network = Network::new(self.config)?;
    match network.load(&self.params.model_path)? {
      LoadOutcome::Loaded => {
        info!("Loaded pre-trained model {:?}, skipping training", self.params.model_path);
      }
      LoadOutcome::Missing => {
        warn!("No pre-trained model at {:?}", self.params.model_path);
        info!("Reading dataset {:?}", self.data.images);
        let dataset = Dataset::load(&self.data);
        if dataset.is_empty() {
          return Err(Error::EmptyDataset(self.data.images.clone()));
        }
        info!("Training from scratch on {} samples", dataset.len());
        run_training(&mut network, &dataset, &self.params)?;
      }
    }
    Ok(network)
  }

  pub async fn run(self) -> Result<(), Error> {
    let network = self.prepare()?;
    Server::new(self.port, network, self.static_dir).run().await?;
    Ok(())
  }
}
