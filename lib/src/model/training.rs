use std::{
  path::PathBuf,
  time::{Duration, Instant},
};

use tracing::{info, instrument};

use super::{ModelError, Network, PersistError};
use crate::dataset::Dataset;

pub struct TrainParams {
  pub epochs: usize,
  /// Rewritten after every completed epoch.
  pub model_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum TrainError {
  #[error("training dataset is empty")]
  EmptyDataset,
  #[error(transparent)]
  Model(#[from] ModelError),
  #[error(transparent)]
  Persist(#[from] PersistError),
  #[error("training stopped during epoch {epoch}")]
  Interrupted { epoch: usize },
}

/// Position of the next training step: zero based epoch and sample index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
  pub epoch: usize,
  pub sample: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
  pub epochs: usize,
  pub steps: usize,
  pub elapsed: Duration,
  /// Running averages over the last steps, as logged.
  pub loss: f32,
  pub accuracy: f32,
}

/// Runs `params.epochs` passes over `dataset` in stored order, one
/// [`Network::train`] call per sample, saving after each pass.
///
/// An empty dataset is rejected before the network or the weight file is touched.
pub fn run_training(
  network: &mut Network,
  dataset: &Dataset,
  params: &TrainParams,
) -> Result<TrainReport, TrainError> {
  run_training_until(network, dataset, params, |_| false)
}

/// [`run_training`] that asks `stop` before every step. A stopped run keeps
/// the weight file of the last completed epoch and returns
/// [`TrainError::Interrupted`].
#[instrument(level = "debug", skip_all, fields(epochs = params.epochs, samples = dataset.len()))]
pub fn run_training_until<F>(
  network: &mut Network,
  dataset: &Dataset,
  params: &TrainParams,
  mut stop: F,
) -> Result<TrainReport, TrainError>
where
  F: FnMut(Progress) -> bool,
{
  if dataset.is_empty() {
    return Err(TrainError::EmptyDataset);
  }

  let total = dataset.len();
  let log_interval = (total / 10).max(1);
  let (mut loss_avg, mut acc_avg) = (ExponentialAverage::new(1.0), ExponentialAverage::new(0.0));
  let start = Instant::now();
  let mut steps = 0;

  for epoch in 0..params.epochs {
    info!("Epoch {}/{}", epoch + 1, params.epochs);
    let epoch_start = Instant::now();

    for (i, sample) in dataset.iter().enumerate() {
      if stop(Progress { epoch, sample: i }) {
        info!("Stopped at sample {} of epoch {}", i, epoch + 1);
        return Err(TrainError::Interrupted { epoch: epoch + 1 });
      }
      let step = network.train(&sample.pixels, sample.label as usize)?;
      loss_avg.update(step.loss as f32);
      acc_avg.update(if step.correct { 1.0 } else { 0.0 });
      steps += 1;

      if (i + 1) % log_interval == 0 {
        info!(
          "Progress {:.0}% ({}/{}) loss {:.4} acc {:.3}",
          (i + 1) as f32 / total as f32 * 100.0,
          i + 1,
          total,
          loss_avg.value,
          acc_avg.value
        );
      }
    }

    network.save(&params.model_path)?;
    info!(
      "Epoch {} took {:.2}s, weights saved to {:?}",
      epoch + 1,
      epoch_start.elapsed().as_secs_f32(),
      params.model_path
    );
  }

  if steps > 0 {
    info!("Finished in {steps} iterations");
    info!(
      "Took {:.2}s, {:.2}µs / iter",
      start.elapsed().as_secs_f32(),
      start.elapsed().as_micros() / steps as u128
    );
  }

  Ok(TrainReport {
    epochs: params.epochs,
    steps,
    elapsed: start.elapsed(),
    loss: loss_avg.value,
    accuracy: acc_avg.value,
  })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
  pub correct: usize,
  pub total: usize,
}

impl Evaluation {
  pub fn accuracy(&self) -> f64 {
    if self.total == 0 {
      0.0
    } else {
      self.correct as f64 / self.total as f64
    }
  }
}

/// Counts how many samples `network` classifies correctly.
pub fn evaluate(network: &Network, dataset: &Dataset) -> Result<Evaluation, ModelError> {
  let mut correct = 0;
  for sample in dataset {
    if network.predict(&sample.pixels)? == sample.label as usize {
      correct += 1;
    }
  }
  Ok(Evaluation {
    correct,
    total: dataset.len(),
  })
}

/// Bias corrected exponential moving average.
pub struct ExponentialAverage {
  beta: f32,
  moment: f32,
  pub value: f32,
  t: i32,
}

impl ExponentialAverage {
  pub fn new(initial: f32) -> Self {
    ExponentialAverage {
      beta: 0.999,
      moment: 0.,
      value: initial,
      t: 0,
    }
  }

  pub fn update(&mut self, value: f32) {
    self.t += 1;
    self.moment = self.beta * self.moment + (1. - self.beta) * value;
    // bias correction
    self.value = self.moment / (1. - f32::powi(self.beta, self.t));
  }
}
