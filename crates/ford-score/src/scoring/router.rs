use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::record::InputRecord;
use super::tiers::RiskLevelReference;
use super::variables::VariableDefinition;
use super::ScoringEngine;

/// Request body for a prediction. `fill_defaults` mirrors an intake form that pre-populates
/// every field; without it every variable must be supplied.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionRequest {
    pub inputs: InputRecord,
    #[serde(default)]
    pub fill_defaults: bool,
}

#[derive(Debug, Serialize)]
pub struct VariableGroupView<'a> {
    pub group: &'a str,
    pub variables: Vec<&'a VariableDefinition>,
}

#[derive(Debug, Serialize)]
pub struct VariableCatalogView<'a> {
    pub model_name: &'a str,
    pub groups: Vec<VariableGroupView<'a>>,
}

#[derive(Debug, Serialize)]
pub struct RiskLevelsView<'a> {
    pub model_name: &'a str,
    pub levels: Vec<RiskLevelReference>,
}

/// Router builder exposing variable metadata, the risk reference table, and predictions.
pub fn scoring_router(engine: Arc<ScoringEngine>) -> Router {
    Router::new()
        .route("/api/v1/ford/variables", get(variables_handler))
        .route("/api/v1/ford/risk-levels", get(risk_levels_handler))
        .route("/api/v1/ford/predictions", post(prediction_handler))
        .with_state(engine)
}

pub(crate) async fn variables_handler(State(engine): State<Arc<ScoringEngine>>) -> Response {
    let table = engine.table();
    let groups = table
        .variables_by_group()
        .into_iter()
        .map(|(group, variables)| VariableGroupView {
            group,
            variables,
        })
        .collect();

    let view = VariableCatalogView {
        model_name: table.model_name(),
        groups,
    };
    (StatusCode::OK, Json(view)).into_response()
}

pub(crate) async fn risk_levels_handler(State(engine): State<Arc<ScoringEngine>>) -> Response {
    let table = engine.table();
    let view = RiskLevelsView {
        model_name: table.model_name(),
        levels: table.tiers().reference(),
    };
    (StatusCode::OK, Json(view)).into_response()
}

pub(crate) async fn prediction_handler(
    State(engine): State<Arc<ScoringEngine>>,
    Json(request): Json<PredictionRequest>,
) -> Response {
    let outcome = if request.fill_defaults {
        engine.compute_with_defaults(&request.inputs)
    } else {
        engine.compute_prediction(&request.inputs)
    };

    match outcome {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(error) => {
            warn!(variable = error.variable(), %error, "rejected prediction input");
            let payload = json!({
                "error": error.to_string(),
                "variable": error.variable(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
    }
}
