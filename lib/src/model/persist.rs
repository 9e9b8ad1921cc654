//! Plain text weight files.
//!
//! Two whitespace separated runs of numbers: the input->hidden matrix, a
//! newline, then the hidden->output matrix, each flattened row-major
//! (`[input * hidden_nodes + hidden]`, `[hidden * output_nodes + output]`).
//! There is no shape header, so a file only fits networks of the shape that wrote it.

use std::{
  fs::File,
  io::{self, BufReader, BufWriter, Read, Write},
  path::{Path, PathBuf},
};

use itertools::Itertools;
use tracing::{debug, instrument};

use super::{Matrix, Network};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
  #[error("cannot access weight file {}: {source}", .path.display())]
  File { path: PathBuf, source: io::Error },
  #[error("IO error: {0}")]
  Io(#[from] io::Error),
  #[error("weight {index} is not a number: {token:?}")]
  Parse { index: usize, token: String },
  #[error("weight file holds {found} values, expected {expected}")]
  TooFewWeights { expected: usize, found: usize },
  #[error("weight file holds more than the expected {expected} values")]
  TooManyWeights { expected: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
  Loaded,
  /// No file at the path; the weights were left as they were.
  Missing,
}

pub fn write_weights<W: Write>(mut writer: W, w_ih: &Matrix, w_ho: &Matrix) -> io::Result<()> {
  writeln!(writer, "{}", w_ih.as_slice().iter().format(" "))?;
  writeln!(writer, "{}", w_ho.as_slice().iter().format(" "))?;
  writer.flush()
}

/// Reads exactly `ih_len + ho_len` numbers and splits them into the two matrices.
pub fn read_weights<R: Read>(
  mut reader: R,
  ih_len: usize,
  ho_len: usize,
) -> Result<(Vec<f64>, Vec<f64>), PersistError> {
  let mut content = String::new();
  reader.read_to_string(&mut content)?;

  let expected = ih_len + ho_len;
  let mut values = Vec::with_capacity(expected);
  for (index, token) in content.split_whitespace().enumerate() {
    if index == expected {
      return Err(PersistError::TooManyWeights { expected });
    }
    let value = token.parse::<f64>().map_err(|_| PersistError::Parse {
      index,
      token: token.to_string(),
    })?;
    values.push(value);
  }
  if values.len() < expected {
    return Err(PersistError::TooFewWeights {
      expected,
      found: values.len(),
    });
  }
  let w_ho = values.split_off(ih_len);
  Ok((values, w_ho))
}

impl Network {
  /// Writes both matrices to `path`, replacing any existing file.
  #[instrument(level = "debug", skip(self))]
  pub fn save(&self, path: &Path) -> Result<(), PersistError> {
    let file = File::create(path).map_err(|source| PersistError::File {
      path: path.to_path_buf(),
      source,
    })?;
    write_weights(BufWriter::new(file), &self.w_ih, &self.w_ho)?;
    debug!("weights saved");
    Ok(())
  }

  /// Replaces the weights with the ones stored at `path`. On any error the
  /// current weights are kept.
  #[instrument(level = "debug", skip(self))]
  pub fn load(&mut self, path: &Path) -> Result<LoadOutcome, PersistError> {
    let file = match File::open(path) {
      Ok(file) => file,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LoadOutcome::Missing),
      Err(source) => {
        return Err(PersistError::File {
          path: path.to_path_buf(),
          source,
        })
      }
    };
    let (w_ih, w_ho) = read_weights(BufReader::new(file), self.w_ih.len(), self.w_ho.len())?;
    self.w_ih.copy_from_slice(&w_ih);
    self.w_ho.copy_from_slice(&w_ho);
    debug!("weights loaded");
    Ok(LoadOutcome::Loaded)
  }
}
