use axum::{
    body::Body,
    extract::{
        rejection::{FormRejection, JsonRejection},
        State,
    },
    http::{Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::json;
use std::{any::Any, time::Duration};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::error::{PredictError, ValidationError, GENERIC_FAILURE};
use crate::model::ModelHandle;
use crate::page::{self, PageView};
use crate::types::{PredictionInput, PredictionOut, FIELDS};

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub model: ModelHandle,
}

impl AppState {
    pub fn new(model: ModelHandle) -> Self {
        Self { model }
    }
}

pub fn router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict_form))
        .route("/api/predict", post(predict_json))
        .route("/health", get(health))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(trace_layer)
        .with_state(state)
}

// ---------- Handlers ----------

pub async fn index() -> Html<String> {
    page::render(&PageView::Empty)
}

pub async fn health() -> &'static str {
    "OK"
}

/// Form submission from the landing page. Always answers with the page.
pub async fn predict_form(
    State(state): State<AppState>,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Response {
    // An undecodable body carries no fields; the schema pass reports all of them.
    let pairs = match form {
        Ok(Form(pairs)) => pairs,
        Err(rejection) => {
            warn!(%rejection, "could not decode form body");
            Vec::new()
        }
    };

    match predict(&state.model, PredictionInput::from_pairs(pairs)) {
        Ok(y) => (StatusCode::OK, page::render(&PageView::Prediction(y))).into_response(),
        Err(e) => (e.status(), page::render(&PageView::Error(e.user_message()))).into_response(),
    }
}

/// Same prediction as [`predict_form`], for JSON clients.
pub async fn predict_json(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<PredictionOut>, (StatusCode, Json<serde_json::Value>)> {
    let Json(value) = payload.map_err(|rejection| {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": rejection.body_text() })))
    })?;
    let obj = value.as_object().ok_or_else(|| {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": "expected a JSON object" })))
    })?;

    let prediction = predict(&state.model, PredictionInput::from_json(obj)).map_err(|e| {
        let body = match &e {
            PredictError::Validation(v) => json!({
                "error": v.message(),
                "missing": v.missing,
                "invalid": v.invalid.iter().map(|f| f.name).collect::<Vec<_>>(),
            }),
            PredictError::Model(_) => json!({ "error": e.user_message() }),
        };
        (e.status(), Json(body))
    })?;

    Ok(Json(PredictionOut { prediction }))
}

fn predict(model: &ModelHandle, parsed: Result<PredictionInput, ValidationError>) -> Result<f64, PredictError> {
    let record = parsed.map_err(|e| {
        warn!(missing = ?e.missing, invalid = e.invalid.len(), "rejected submission: {}", e);
        e
    })?;

    let y = model.predict(&record).map_err(|e| {
        error!(error = %e, ?record, "prediction failed");
        e
    })?;

    tracing::debug!(?record, prediction = y, "prediction ok");
    Ok(y)
}

/// Turns a handler panic into a generic 500 page.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(%detail, "request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        page::render(&PageView::Error(GENERIC_FAILURE.to_string())),
    )
        .into_response()
}

/// Names of the expected fields, in order. Used by the startup log.
pub fn field_names() -> Vec<&'static str> {
    FIELDS.iter().map(|f| f.name).collect()
}
