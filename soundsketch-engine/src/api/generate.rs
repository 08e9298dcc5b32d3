//! Generation endpoint
//!
//! POST /generate runs the whole pipeline for a prompt and commits the
//! result as the current scene, unless a newer generation started in the
//! meantime: the epoch counter makes the later request win and the
//! superseded one report a conflict instead of clobbering fresher state.

use crate::api::LayerView;
use crate::error::{ApiError, ApiResult};
use crate::models::{CacheStatus, PromptAnalysis};
use crate::AppState;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub prompt: String,
    pub cache_status: CacheStatus,
    pub analysis: PromptAnalysis,
    pub mix_scale: f64,
    pub layers: Vec<LayerView>,
}

/// POST /generate
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let prompt = request.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".into()));
    }

    let my_epoch = state.epoch.fetch_add(1, Ordering::SeqCst) + 1;
    tracing::info!(epoch = my_epoch, prompt = %prompt, "generation started");

    let outcome = state.generator.generate(&prompt).await;

    if outcome.layers.is_empty() {
        state
            .record_error(format!("generation produced no layers for: {prompt}"))
            .await;
    }

    let analysis = outcome.analysis.clone();
    let cache_status = outcome.cache_status;

    // The commit checks the epoch under the scene lock, so if another
    // generation started while this one ran, its results win and this
    // one's are discarded. Cache writes already made by this run are
    // harmless.
    let Some(scene) = state
        .commit_generation(my_epoch, prompt.clone(), outcome)
        .await
    else {
        return Err(ApiError::Conflict(
            "generation superseded by a newer request".into(),
        ));
    };

    let layers = scene
        .layers
        .iter()
        .map(|layer| LayerView::project(&scene, layer))
        .collect();

    Ok(Json(GenerateResponse {
        prompt,
        cache_status,
        analysis,
        mix_scale: scene.mix_scale,
        layers,
    }))
}

/// Build generation routes
pub fn generate_routes() -> Router<AppState> {
    Router::new().route("/generate", post(generate))
}
