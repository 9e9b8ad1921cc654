mod app_config;

use app_config::{AppConfig, Settings};
use clap::{ArgGroup, Args, Parser, Subcommand};
use digitnet::{subcommands, utils, DataPaths, LoadOutcome, ModelConfig, Network, NetworkShape, TrainParams};
use std::{error::Error, path::PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(version, about = "Handwritten digit classifier")]
struct Cli {
  /// YAML config file; environment variables and flags override it
  #[arg(short, long, value_name = "PATH", global = true)]
  config: Option<PathBuf>,
  #[command(flatten)]
  overrides: Overrides,
  #[command(subcommand)]
  command: Command,
}

#[derive(Args)]
struct Overrides {
  #[arg(long, value_name = "INT", global = true)]
  epochs: Option<usize>,
  #[arg(long, value_name = "FLOAT", global = true)]
  learning_rate: Option<f64>,
  #[arg(long, value_name = "INT", global = true)]
  hidden_nodes: Option<usize>,
  #[arg(long, value_name = "PATH", global = true)]
  model_path: Option<PathBuf>,
  #[arg(long, value_name = "PATH", global = true)]
  data_dir: Option<PathBuf>,
  #[arg(long, value_name = "PATH", global = true)]
  static_dir: Option<PathBuf>,
  #[arg(short, long, global = true)]
  port: Option<u16>,
}

impl From<Overrides> for AppConfig {
  fn from(o: Overrides) -> Self {
    Self {
      epochs: o.epochs,
      learning_rate: o.learning_rate,
      hidden_nodes: o.hidden_nodes,
      model_path: o.model_path,
      data_dir: o.data_dir,
      static_dir: o.static_dir,
      port: o.port,
    }
  }
}

#[derive(Subcommand)]
enum Command {
  /// Load the saved model, training one first if there is none, then serve it
  Run,
  /// Train on the training set, saving after every epoch
  Train {
    /// Ignore existing weights and start from random ones
    #[arg(long)]
    fresh: bool,
  },
  /// Serve a saved model
  Serve,
  /// Accuracy of the saved model on the test set
  Evaluate,
  /// Ask a running server to classify one image
  #[command(group(ArgGroup::new("image").required(true).args(["input_file", "index"])))]
  Predict {
    /// Raw image, one intensity byte per pixel
    #[arg(long, value_name = "PATH")]
    input_file: Option<PathBuf>,
    /// Index of an image in the test set
    #[arg(long, value_name = "INT")]
    index: Option<usize>,
    /// Base URL of the server
    #[arg(long, default_value = "http://localhost:8080")]
    url: String,
  },
}

fn load_settings(cli_config: Option<PathBuf>, overrides: Overrides) -> Result<Settings, Box<dyn Error>> {
  let file = match cli_config {
    Some(path) => AppConfig::from_file(&path)?,
    None => AppConfig::default(),
  };
  Ok(file.merge(AppConfig::from_env()?).merge(overrides.into()).resolve())
}

fn train_params(settings: &Settings) -> TrainParams {
  TrainParams {
    epochs: settings.epochs,
    model_path: settings.model_path.clone(),
  }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
  utils::init_logging()?;
  let args = Cli::parse();
  let settings = load_settings(args.config, args.overrides)?;
  info!("{:?}", settings);

  let model_config = ModelConfig {
    shape: NetworkShape::digits(settings.hidden_nodes),
    learning_rate: settings.learning_rate,
  };

  match args.command {
    Command::Run => {
      let app = subcommands::Run::new(
        model_config,
        DataPaths::training(&settings.data_dir),
        train_params(&settings),
        settings.port,
        settings.static_dir.clone(),
      );
      app.run().await?;
    }
    Command::Train { fresh } => {
      let app = subcommands::Train::new(
        model_config,
        DataPaths::training(&settings.data_dir),
        train_params(&settings),
        fresh,
      );
      app.run()?;
    }
    Command::Serve => {
      let mut network = Network::new(model_config)?;
      if network.load(&settings.model_path)? == LoadOutcome::Missing {
        return Err(digitnet::Error::ModelMissing(settings.model_path).into());
      }
      subcommands::Server::new(settings.port, network, settings.static_dir).run().await?;
    }
    Command::Evaluate => {
      let app = subcommands::Evaluate::new(
        model_config,
        settings.model_path.clone(),
        DataPaths::test(&settings.data_dir),
      );
      let evaluation = app.run()?;
      println!("{}/{} correct ({:.2}%)", evaluation.correct, evaluation.total, evaluation.accuracy() * 100.0);
    }
    Command::Predict {
      input_file,
      index,
      url,
    } => {
      let app = match input_file {
        Some(path) => subcommands::Client::from_raw_file(&path, url)?,
        None => {
          // clap guarantees --index when there is no --input-file
          let index = index.unwrap_or_default();
          let (client, label) = subcommands::Client::from_dataset(&DataPaths::test(&settings.data_dir), index, url)?;
          info!("Test image {} is labelled {}", index, label);
          client
        }
      };
      println!("{}", app.run().await?);
    }
  }
  Ok(())
}
