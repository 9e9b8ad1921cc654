use std::{error::Error, path::PathBuf, str::FromStr};

use serde::Deserialize;

pub const DEFAULT_EPOCHS: usize = 10;
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;
pub const DEFAULT_HIDDEN_NODES: usize = 200;
pub const DEFAULT_MODEL_PATH: &str = "/app/data/model.weights";
pub const DEFAULT_DATA_DIR: &str = "/app/data";
pub const DEFAULT_STATIC_DIR: &str = "/app/static";
pub const DEFAULT_PORT: u16 = 8080;

/// Process wide settings. Also defines the config file format (every field can be omitted).
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
  /// Passes over the training set
  pub epochs: Option<usize>,
  pub learning_rate: Option<f64>,
  pub hidden_nodes: Option<usize>,
  /// Weight file read at startup and rewritten after every epoch
  pub model_path: Option<PathBuf>,
  /// Directory holding the IDX image/label files
  pub data_dir: Option<PathBuf>,
  /// Directory holding index.html
  pub static_dir: Option<PathBuf>,
  pub port: Option<u16>,
}

/// [`AppConfig`] with every default filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
  pub epochs: usize,
  pub learning_rate: f64,
  pub hidden_nodes: usize,
  pub model_path: PathBuf,
  pub data_dir: PathBuf,
  pub static_dir: PathBuf,
  pub port: u16,
}

fn parse_var<T: FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>, Box<dyn Error>> {
  match raw {
    None => Ok(None),
    Some(raw) => raw
      .trim()
      .parse()
      .map(Some)
      .map_err(|_| format!("invalid value for {}: {:?}", name, raw).into()),
  }
}

impl AppConfig {
  // merge configs where the second overwrites the first
  pub fn merge(self, other: Self) -> Self {
    Self {
      epochs: other.epochs.or(self.epochs),
      learning_rate: other.learning_rate.or(self.learning_rate),
      hidden_nodes: other.hidden_nodes.or(self.hidden_nodes),
      model_path: other.model_path.or(self.model_path),
      data_dir: other.data_dir.or(self.data_dir),
      static_dir: other.static_dir.or(self.static_dir),
      port: other.port.or(self.port),
    }
  }

  pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(text)
  }

  pub fn from_file(path: &std::path::Path) -> Result<Self, Box<dyn Error>> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("cannot read config {:?}: {}", path, e))?;
    Ok(Self::from_yaml(&text)?)
  }

  /// Reads EPOCHS, LEARNING_RATE, HIDDEN_NODES, MODEL_PATH, DATA_DIR, STATIC_DIR and PORT.
  pub fn from_vars<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, Box<dyn Error>> {
    Ok(Self {
      epochs: parse_var("EPOCHS", lookup("EPOCHS"))?,
      learning_rate: parse_var("LEARNING_RATE", lookup("LEARNING_RATE"))?,
      hidden_nodes: parse_var("HIDDEN_NODES", lookup("HIDDEN_NODES"))?,
      model_path: lookup("MODEL_PATH").map(PathBuf::from),
      data_dir: lookup("DATA_DIR").map(PathBuf::from),
      static_dir: lookup("STATIC_DIR").map(PathBuf::from),
      port: parse_var("PORT", lookup("PORT"))?,
    })
  }

  pub fn from_env() -> Result<Self, Box<dyn Error>> {
    Self::from_vars(|name| std::env::var(name).ok())
  }

  pub fn resolve(self) -> Settings {
    Settings {
      epochs: self.epochs.unwrap_or(DEFAULT_EPOCHS),
      learning_rate: self.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE),
      hidden_nodes: self.hidden_nodes.unwrap_or(DEFAULT_HIDDEN_NODES),
      model_path: self.model_path.unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
      data_dir: self.data_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
      static_dir: self.static_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
      port: self.port.unwrap_or(DEFAULT_PORT),
    }
  }
}
