use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError};

/// Dense row-major matrix over one flat buffer. Entry `(r, c)` lives at
/// `r * cols + c`. The size is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
  rows: usize,
  cols: usize,
  data: Vec<f64>,
}

impl Matrix {
  /// Every entry drawn from N(0, std_dev^2).
  pub fn random_normal<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    std_dev: f64,
    rng: &mut R,
  ) -> Result<Self, NormalError> {
    let normal = Normal::new(0.0, std_dev)?;
    Ok(Self {
      rows,
      cols,
      data: normal.sample_iter(rng).take(rows * cols).collect(),
    })
  }

  /// `None` unless `data.len() == rows * cols`.
  pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Option<Self> {
    (data.len() == rows * cols).then_some(Self { rows, cols, data })
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn get(&self, row: usize, col: usize) -> f64 {
    self.data[row * self.cols + col]
  }

  pub fn row(&self, row: usize) -> &[f64] {
    &self.data[row * self.cols..(row + 1) * self.cols]
  }

  pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
    &mut self.data[row * self.cols..(row + 1) * self.cols]
  }

  pub fn as_slice(&self) -> &[f64] {
    &self.data
  }

  /// Replaces the contents. Panics if the length differs.
  pub fn copy_from_slice(&mut self, values: &[f64]) {
    self.data.copy_from_slice(values)
  }
}
