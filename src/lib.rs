//! Web front end for a pre-trained forest-fire burned-area regressor.
//!
//! `GET /` serves the input form, `POST /predict` parses the twelve
//! measurements, runs the loaded model and re-renders the page with the
//! result. `POST /api/predict` does the same for JSON clients.

pub mod config;
pub mod error;
pub mod model;
pub mod page;
pub mod server;
pub mod types;

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::StartupError;
use crate::model::ModelHandle;

/// Load, check and warm up the model. Any failure here is fatal.
pub fn init_model(cfg: &ServerConfig) -> Result<ModelHandle, StartupError> {
    let model = ModelHandle::load(&cfg.model_path, cfg.meta_path.as_deref())?;
    info!("loaded {} from {}", model.describe(), cfg.model_path.display());

    let (missing, unexpected) = model.schema_diff();
    if !missing.is_empty() || !unexpected.is_empty() {
        warn!(
            ?missing,
            ?unexpected,
            "model features {:?} do not match form fields {:?}; predictions will fail",
            model.feature_names(),
            server::field_names()
        );
    }

    let y0 = model.warmup()?;
    info!("warmup forward ok (prediction at zeros = {:.3})", y0);
    Ok(model)
}
