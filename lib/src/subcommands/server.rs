use std::{io, path::PathBuf, sync::Arc};

use axum::{
  body::Bytes,
  extract::State,
  http::StatusCode,
  response::Html,
  routing::{get, post},
  Router,
};
use tracing::{debug, info, warn};

use super::packet;
use crate::model::Network;

/// Read-only snapshot of the model shared by all requests.
#[derive(Clone)]
struct ServerState {
  model: Arc<Network>,
  static_dir: Arc<PathBuf>,
}

/// Inference endpoint: `GET /` serves `index.html` from the static
/// directory, `POST /predict` answers with the predicted digit.
pub struct Server {
  port: u16,
  state: ServerState,
}

impl Server {
  pub fn new(port: u16, model: Network, static_dir: PathBuf) -> Self {
    Self {
      port,
      state: ServerState {
        model: Arc::new(model),
        static_dir: Arc::new(static_dir),
      },
    }
  }

  pub fn router(&self) -> Router {
    Router::new()
      .route("/", get(Self::handle_index))
      .route("/predict", post(Self::handle_predict))
      .with_state(self.state.clone())
  }

  pub async fn run(self) -> io::Result<()> {
    let server_addr = format!("0.0.0.0:{}", self.port);

    let app = self.router();
    let tcp_listener = tokio::net::TcpListener::bind(&server_addr).await?;
    info!("Serving on http://{}", server_addr);
    axum::serve(tcp_listener, app).await
  }

  async fn handle_index(State(state): State<ServerState>) -> Result<Html<String>, (StatusCode, String)> {
    let path = state.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
      Ok(page) => Ok(Html(page)),
      Err(e) => {
        warn!("Cannot read {:?}: {}", path, e);
        Err((StatusCode::NOT_FOUND, "index.html not found".to_string()))
      }
    }
  }

  async fn handle_predict(State(state): State<ServerState>, body: Bytes) -> (StatusCode, String) {
    let expected = state.model.shape().input_nodes;
    let pixels = match packet::unpack(&body, expected) {
      Ok(pixels) => pixels,
      Err(e) => return (StatusCode::BAD_REQUEST, format!("error: {}", e)),
    };
    match state.model.predict(&pixels) {
      Ok(digit) => {
        debug!("predicted {}", digit);
        (StatusCode::OK, digit.to_string())
      }
      Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {}", e)),
    }
  }
}
