//! Body of a prediction request: one raw intensity byte per pixel.

use crate::dataset::normalize_pixel;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("payload size mismatch: expected {expected} bytes, got {actual}")]
pub struct PacketError {
  pub expected: usize,
  pub actual: usize,
}

pub fn pack(pixels: &[f64]) -> Vec<u8> {
  pixels
    .iter()
    .map(|p| (p.clamp(0.0, 1.0) * 255.0).round() as u8)
    .collect()
}

/// Checks the payload length and scales every byte into [0.0, 1.0].
pub fn unpack(body: &[u8], expected: usize) -> Result<Vec<f64>, PacketError> {
  if body.len() != expected {
    return Err(PacketError {
      expected,
      actual: body.len(),
    });
  }
  Ok(body.iter().copied().map(normalize_pixel).collect())
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  #[test]
  fn wrong_length_is_rejected() {
    assert_eq!(
      unpack(&[0; 783], 784),
      Err(PacketError {
        expected: 784,
        actual: 783
      })
    );
    assert!(unpack(&[], 784).is_err());
  }

  proptest! {
    #[test]
    fn bytes_survive_normalization(body in proptest::collection::vec(any::<u8>(), 16)) {
      let pixels = unpack(&body, 16).unwrap();
      prop_assert!(pixels.iter().all(|p| (0.0..=1.0).contains(p)));
      prop_assert_eq!(pack(&pixels), body);
    }
  }
}
