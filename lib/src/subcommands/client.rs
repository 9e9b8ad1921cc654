use std::path::Path;

use tracing::info;

use super::packet;
use crate::{
  dataset::{normalize_pixel, DataPaths, Dataset},
  Error,
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),
  #[error("server answered {status}: {body}")]
  Rejected { status: u16, body: String },
  #[error("unexpected response: {0:?}")]
  Response(String),
  #[error("no sample {index} in a dataset of {len}")]
  NoSample { index: usize, len: usize },
}

/// Sends one image to a running server and reads back the digit.
pub struct Client {
  url: String,
  pixels: Vec<f64>,
}

impl Client {
  pub fn new(pixels: Vec<f64>, url: String) -> Self {
    Self { url, pixels }
  }

  /// Image stored as raw intensity bytes, one per pixel.
  pub fn from_raw_file(input_path: &Path, url: String) -> Result<Self, Error> {
    let bytes = std::fs::read(input_path)?;
    Ok(Self::new(bytes.into_iter().map(normalize_pixel).collect(), url))
  }

  /// Image `index` of an IDX pair, together with its label.
  pub fn from_dataset(paths: &DataPaths, index: usize, url: String) -> Result<(Self, u8), Error> {
    let dataset = Dataset::try_load(paths)?;
    let sample = dataset.get(index).ok_or(ClientError::NoSample {
      index,
      len: dataset.len(),
    })?;
    Ok((Self::new(sample.pixels.clone(), url), sample.label))
  }

  pub async fn run(self) -> Result<usize, ClientError> {
    let client = reqwest::Client::new();
    let endpoint = format!("{}/predict", self.url.trim_end_matches('/'));

    let response = client
      .post(&endpoint)
      .body(packet::pack(&self.pixels))
      .send()
      .await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
      return Err(ClientError::Rejected {
        status: status.as_u16(),
        body,
      });
    }
    let digit = body
      .trim()
      .parse::<usize>()
      .map_err(|_| ClientError::Response(body.clone()))?;
    info!("{} classified the image as {}", endpoint, digit);
    Ok(digit)
  }
}
