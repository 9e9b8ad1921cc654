//! Decoding of the IDX image/label containers into normalized samples.
//!
//! Both containers start with a 4 byte magic number followed by big-endian
//! u32 header words. Labels: `count`, then `count` single bytes.
//! Images: `count`, `rows`, `cols`, then `count * rows * cols` bytes, row-major.

use std::{
  fs::File,
  io::{self, BufReader, Read},
  path::{Path, PathBuf},
};

use byteorder::{NativeEndian, ReadBytesExt};
use tracing::{debug, error, instrument};

pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
pub const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
pub const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
pub const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
  #[error("cannot open {}: {source}", .path.display())]
  Open { path: PathBuf, source: io::Error },
  #[error("{what} is truncated")]
  Truncated { what: &'static str },
  #[error("IO error: {0}")]
  Io(#[from] io::Error),
  #[error("image count {images} does not match label count {labels}")]
  CountMismatch { images: usize, labels: usize },
  #[error("unusable image dimensions {rows}x{cols} for {count} images")]
  BadDimensions { count: usize, rows: usize, cols: usize },
}

/// Byte-swaps a 32 bit word. Applying it twice gives back the input.
pub fn swap_endian(val: u32) -> u32 {
  val.swap_bytes()
}

/// Header words are stored big-endian; `raw` is the word as read in host order.
fn from_big_endian(raw: u32) -> u32 {
  if cfg!(target_endian = "little") {
    swap_endian(raw)
  } else {
    raw
  }
}

/// Scales an 8 bit intensity into [0.0, 1.0].
pub fn normalize_pixel(byte: u8) -> f64 {
  byte as f64 / 255.0
}

fn truncated(what: &'static str) -> impl Fn(io::Error) -> DatasetError {
  move |e| match e.kind() {
    io::ErrorKind::UnexpectedEof => DatasetError::Truncated { what },
    _ => DatasetError::Io(e),
  }
}

/// Reads the magic number and `fields` header words, converted to host order.
/// The magic is returned first.
pub fn read_idx_header<R: Read>(reader: &mut R, fields: usize) -> Result<Vec<u32>, DatasetError> {
  (0..=fields)
    .map(|_| {
      reader
        .read_u32::<NativeEndian>()
        .map(from_big_endian)
        .map_err(truncated("header"))
    })
    .collect()
}

/// Fills `buffer` with exactly `len` bytes. The buffer grows with the data
/// actually read, so a bogus header length cannot force a large allocation.
fn read_exactly<R: Read>(
  reader: &mut R,
  len: usize,
  buffer: &mut Vec<u8>,
  what: &'static str,
) -> Result<(), DatasetError> {
  buffer.clear();
  reader.by_ref().take(len as u64).read_to_end(buffer)?;
  if buffer.len() < len {
    return Err(DatasetError::Truncated { what });
  }
  Ok(())
}

pub fn decode_labels<R: Read>(mut reader: R) -> Result<Vec<u8>, DatasetError> {
  let header = read_idx_header(&mut reader, 1)?;
  let count = header[1] as usize;
  let mut labels = Vec::new();
  read_exactly(&mut reader, count, &mut labels, "label data")?;
  Ok(labels)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Images {
  pub rows: usize,
  pub cols: usize,
  pub pixels: Vec<Vec<f64>>,
}

pub fn decode_images<R: Read>(mut reader: R) -> Result<Images, DatasetError> {
  let header = read_idx_header(&mut reader, 3)?;
  let (count, rows, cols) = (header[1] as usize, header[2] as usize, header[3] as usize);
  let size = rows
    .checked_mul(cols)
    .filter(|&size| size > 0 || count == 0)
    .ok_or(DatasetError::BadDimensions { count, rows, cols })?;
  let mut buffer = Vec::new();
  let mut pixels = Vec::new();
  for _ in 0..count {
    read_exactly(&mut reader, size, &mut buffer, "image data")?;
    pixels.push(buffer.iter().copied().map(normalize_pixel).collect());
  }
  Ok(Images { rows, cols, pixels })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
  pub pixels: Vec<f64>,
  pub label: u8,
}

/// Paths of one image/label container pair.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPaths {
  pub images: PathBuf,
  pub labels: PathBuf,
}

impl DataPaths {
  pub fn training(dir: &Path) -> Self {
    Self {
      images: dir.join(TRAIN_IMAGES),
      labels: dir.join(TRAIN_LABELS),
    }
  }

  pub fn test(dir: &Path) -> Self {
    Self {
      images: dir.join(TEST_IMAGES),
      labels: dir.join(TEST_LABELS),
    }
  }
}

/// Samples decoded from one container pair. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
  rows: usize,
  cols: usize,
  samples: Vec<Sample>,
}

impl Dataset {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn from_parts(images: Images, labels: Vec<u8>) -> Result<Self, DatasetError> {
    if images.pixels.len() != labels.len() {
      return Err(DatasetError::CountMismatch {
        images: images.pixels.len(),
        labels: labels.len(),
      });
    }
    let samples = images
      .pixels
      .into_iter()
      .zip(labels)
      .map(|(pixels, label)| Sample { pixels, label })
      .collect();
    Ok(Self {
      rows: images.rows,
      cols: images.cols,
      samples,
    })
  }

  pub fn try_load(paths: &DataPaths) -> Result<Self, DatasetError> {
    let labels = decode_labels(open(&paths.labels)?)?;
    let images = decode_images(open(&paths.images)?)?;
    Self::from_parts(images, labels)
  }

  /// Like [`Dataset::try_load`], but any failure is logged and turns into an
  /// empty dataset. Callers must check [`Dataset::is_empty`].
  #[instrument(level = "debug")]
  pub fn load(paths: &DataPaths) -> Self {
    match Self::try_load(paths) {
      Ok(dataset) => {
        debug!(samples = dataset.len(), rows = dataset.rows, cols = dataset.cols, "dataset decoded");
        dataset
      }
      Err(e) => {
        error!("Failed to load dataset: {}", e);
        Self::empty()
      }
    }
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  pub fn pixel_count(&self) -> usize {
    self.rows * self.cols
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
    self.samples.iter()
  }

  pub fn get(&self, index: usize) -> Option<&Sample> {
    self.samples.get(index)
  }
}

impl<'a> IntoIterator for &'a Dataset {
  type Item = &'a Sample;
  type IntoIter = std::slice::Iter<'a, Sample>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

fn open(path: &Path) -> Result<BufReader<File>, DatasetError> {
  File::open(path)
    .map(BufReader::new)
    .map_err(|source| DatasetError::Open {
      path: path.to_path_buf(),
      source,
    })
}


#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::fixtures::*;
  use super::*;

  #[test]
  fn header_words_of_training_images_swap_to_documented_counts() {
    let mut header = Vec::new();
    for word in [2051u32, 60000, 28, 28] {
      header.extend(word.to_be_bytes());
    }
    let words: Vec<u32> = header
      .chunks(4)
      .map(|c| swap_endian(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
      .collect();
    assert_eq!(words, vec![2051, 60000, 28, 28]);
  }

  #[test]
  fn read_header_converts_to_host_order() {
    let bytes = image_bytes(28, 28, &[]);
    let header = read_idx_header(&mut bytes.as_slice(), 3).unwrap();
    assert_eq!(header, vec![2051, 0, 28, 28]);
  }

  #[test]
  fn decodes_pair_in_file_order() {
    let images = vec![vec![0, 255, 51, 102], vec![255, 255, 0, 0], vec![1, 2, 3, 4]];
    let labels = decode_labels(label_bytes(&[7, 0, 9]).as_slice()).unwrap();
    let decoded = decode_images(image_bytes(2, 2, &images).as_slice()).unwrap();
    let dataset = Dataset::from_parts(decoded, labels).unwrap();

    assert_eq!(dataset.len(), 3);
    assert_eq!((dataset.rows(), dataset.cols()), (2, 2));
    assert_eq!(dataset.get(0).unwrap().pixels, vec![0.0, 1.0, 0.2, 0.4]);
    assert_eq!(dataset.iter().map(|s| s.label).collect::<Vec<_>>(), vec![7, 0, 9]);
  }

  #[test]
  fn truncated_images_are_rejected() {
    let mut bytes = image_bytes(2, 2, &[vec![1, 2, 3, 4], vec![5, 6, 7, 8]]);
    bytes.truncate(bytes.len() - 1);
    assert!(matches!(
      decode_images(bytes.as_slice()),
      Err(DatasetError::Truncated { what: "image data" })
    ));
    assert!(matches!(
      decode_labels(&[0u8, 0, 8][..]),
      Err(DatasetError::Truncated { what: "header" })
    ));
  }

  #[test]
  fn count_mismatch_is_an_error() {
    let images = decode_images(image_bytes(1, 1, &[vec![3]]).as_slice()).unwrap();
    assert!(matches!(
      Dataset::from_parts(images, vec![1, 2]),
      Err(DatasetError::CountMismatch { images: 1, labels: 2 })
    ));
  }

  #[test]
  fn missing_files_give_empty_dataset() {
    let dir = scratch_dir("missing-files");
    let dataset = Dataset::load(&DataPaths::training(&dir));
    assert!(dataset.is_empty());
    assert!(matches!(
      Dataset::try_load(&DataPaths::test(&dir)),
      Err(DatasetError::Open { .. })
    ));
  }

  #[test]
  fn loads_from_disk() {
    let dir = scratch_dir("loads-from-disk");
    let paths = write_pair(&dir, 1, 3, &[vec![0, 128, 255], vec![9, 9, 9]], &[4, 2]);
    let dataset = Dataset::load(&paths);
    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.pixel_count(), 3);
    assert_eq!(dataset.get(1).unwrap().label, 2);
  }

  #[test]
  fn oversized_headers_do_not_allocate_up_front() {
    let mut huge_images = 2051u32.to_be_bytes().to_vec();
    for word in [1, u32::MAX, u32::MAX] {
      huge_images.extend(word.to_be_bytes());
    }
    assert!(decode_images(huge_images.as_slice()).is_err());

    let mut huge_labels = 2049u32.to_be_bytes().to_vec();
    huge_labels.extend(u32::MAX.to_be_bytes());
    huge_labels.extend([3, 4]);
    assert!(matches!(
      decode_labels(huge_labels.as_slice()),
      Err(DatasetError::Truncated { what: "label data" })
    ));

    let dir = scratch_dir("oversized-header");
    let paths = write_pair(&dir, 1, 1, &[vec![7]], &[3]);
    std::fs::write(&paths.images, &huge_images).unwrap();
    assert!(Dataset::load(&paths).is_empty());
  }

  #[test]
  fn empty_images_with_a_count_are_rejected() {
    let mut bytes = 2051u32.to_be_bytes().to_vec();
    for word in [u32::MAX, 0, 28] {
      bytes.extend(word.to_be_bytes());
    }
    assert!(matches!(
      decode_images(bytes.as_slice()),
      Err(DatasetError::BadDimensions { rows: 0, cols: 28, .. })
    ));
    let empty = decode_images(image_bytes(0, 28, &[]).as_slice()).unwrap();
    assert!(empty.pixels.is_empty());
  }

  proptest! {
    #[test]
    fn swap_is_an_involution(x in any::<u32>()) {
      prop_assert_eq!(swap_endian(swap_endian(x)), x);
    }

    #[test]
    fn decoded_pixels_are_unit_range(
      rows in 1u32..5,
      cols in 1u32..5,
      seed in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
      let size = (rows * cols) as usize;
      let images: Vec<Vec<u8>> = seed.chunks(size).filter(|c| c.len() == size).map(|c| c.to_vec()).collect();
      let labels: Vec<u8> = (0..images.len()).map(|i| (i % 10) as u8).collect();
      let dataset = Dataset::from_parts(
        decode_images(image_bytes(rows, cols, &images).as_slice()).unwrap(),
        decode_labels(label_bytes(&labels).as_slice()).unwrap(),
      ).unwrap();

      prop_assert_eq!(dataset.len(), labels.len());
      for sample in &dataset {
        prop_assert_eq!(sample.pixels.len(), size);
        prop_assert!(sample.pixels.iter().all(|p| (0.0..=1.0).contains(p)));
      }
    }
  }
}
