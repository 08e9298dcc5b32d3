//! Scene endpoints
//!
//! Everything that inspects or mutates the current scene: the scene view,
//! manual layer add, swap, delete, per-layer patches (gain/mute/playback
//! state reports), the global mix scale, LLM mix refinement and backdrop
//! image generation.

use crate::api::LayerView;
use crate::error::{ApiError, ApiResult};
use crate::models::{LayerState, PromptAnalysis, Provenance};
use crate::providers::{LayerSummary, TagQuery};
use crate::scene::Scene;
use crate::services::SwapOutcome;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct SceneView {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<PromptAnalysis>,
    pub mix_scale: f64,
    pub layers: Vec<LayerView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop_url: Option<String>,
}

impl SceneView {
    fn project(scene: &Scene) -> Self {
        Self {
            prompt: scene.prompt.clone(),
            analysis: scene.analysis.clone(),
            mix_scale: scene.mix_scale,
            layers: scene
                .layers
                .iter()
                .map(|layer| LayerView::project(scene, layer))
                .collect(),
            backdrop_url: scene.backdrop_url.clone(),
        }
    }
}

/// Analysis context for operations that run outside a generation. Falls
/// back to a neutral analysis when no generation happened yet.
fn analysis_context(scene: &Scene) -> PromptAnalysis {
    scene.analysis.clone().unwrap_or_else(|| PromptAnalysis {
        tags: Vec::new(),
        gain_scale: scene.mix_scale,
        base_gains: HashMap::new(),
        confidence: 0.0,
        provenance: Provenance::Rules,
        reasoning: None,
        tags_to_avoid: Vec::new(),
    })
}

/// GET /scene
pub async fn get_scene(State(state): State<AppState>) -> Json<SceneView> {
    let scene = state.scene.read().await;
    Json(SceneView::project(&scene))
}

#[derive(Debug, Deserialize)]
pub struct AddLayerRequest {
    pub tag: String,
}

/// POST /scene/layers
///
/// Manual layer add: live search with whitelist fallback, normal
/// selection, synthetic id so the same tag can appear more than once.
/// Zero usable results is a user-visible error, never a silent skip.
pub async fn add_layer(
    State(state): State<AppState>,
    Json(request): Json<AddLayerRequest>,
) -> ApiResult<(StatusCode, Json<LayerView>)> {
    let tag = request.tag.trim().to_lowercase();
    if tag.is_empty() {
        return Err(ApiError::BadRequest("tag must not be empty".into()));
    }

    let (prompt, analysis) = {
        let scene = state.scene.read().await;
        (scene.prompt.clone(), analysis_context(&scene))
    };

    let query = TagQuery::with_exclusions(tag.clone(), analysis.tags_to_avoid.clone());
    let response = state.fetcher.fetch_tag_with_fallback(&query).await;

    let id = Uuid::new_v4().to_string();
    let built = state
        .builder
        .build(&tag, response.results, &prompt, &analysis, Some(id))
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no usable recording found for '{tag}'")))?;

    let mut scene = state.scene.write().await;
    scene.set_alternates(&tag, built.alternates);
    scene.add_layer(built.layer.clone());
    let view = LayerView::project(&scene, &built.layer);

    Ok((StatusCode::CREATED, Json(view)))
}

#[derive(Debug, Serialize)]
pub struct SwapResponse {
    pub swapped: bool,
    /// When true, playback should resume once the new recording is ready.
    pub resume_playing: bool,
    pub layer: LayerView,
}

/// POST /scene/layers/{id}/swap
///
/// At most one swap per layer may be in flight; a concurrent second
/// request conflicts. A swap with no usable alternative reports
/// `swapped: false` and leaves the layer untouched.
pub async fn swap_layer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SwapResponse>> {
    let (tag, current_id, prompt, analysis) = {
        let mut scene = state.scene.write().await;
        let layer = scene
            .layer(&id)
            .ok_or_else(|| ApiError::NotFound(format!("no layer '{id}'")))?;
        let tag = layer.tag.clone();
        let current_id = layer.item.as_ref().map(|rec| rec.id);
        if !scene.begin_swap(&id) {
            return Err(ApiError::Conflict(format!(
                "a swap for layer '{id}' is already in flight"
            )));
        }
        (tag, current_id, scene.prompt.clone(), analysis_context(&scene))
    };

    let outcome = state.swap.resolve(&tag, current_id, &prompt, &analysis).await;

    let mut scene = state.scene.write().await;
    scene.end_swap(&id);

    // The layer may have been deleted while the swap ran
    let Some(layer) = scene.layer_mut(&id) else {
        return Err(ApiError::NotFound(format!("layer '{id}' no longer exists")));
    };

    match outcome {
        SwapOutcome::Swapped {
            recording,
            alternates,
        } => {
            let resume_playing = layer.replace_item(recording);
            let layer = layer.clone();
            scene.set_alternates(&tag, alternates);
            let view = LayerView::project(&scene, &layer);
            Ok(Json(SwapResponse {
                swapped: true,
                resume_playing,
                layer: view,
            }))
        }
        SwapOutcome::NoAlternative => {
            let layer = layer.clone();
            let view = LayerView::project(&scene, &layer);
            Ok(Json(SwapResponse {
                swapped: false,
                resume_playing: false,
                layer: view,
            }))
        }
    }
}

/// DELETE /scene/layers/{id}
pub async fn delete_layer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let mut scene = state.scene.write().await;
    if scene.remove_layer(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("no layer '{id}'")))
    }
}

#[derive(Debug, Deserialize)]
pub struct LayerPatch {
    /// Per-layer gain override in [0, 1]
    pub gain: Option<f64>,
    pub muted: Option<bool>,
    /// Playback state report from the playback collaborator
    pub state: Option<LayerState>,
}

/// PATCH /scene/layers/{id}
pub async fn patch_layer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<LayerPatch>,
) -> ApiResult<Json<LayerView>> {
    let mut scene = state.scene.write().await;
    if scene.layer(&id).is_none() {
        return Err(ApiError::NotFound(format!("no layer '{id}'")));
    }

    if let Some(gain) = patch.gain {
        if !(0.0..=1.0).contains(&gain) {
            return Err(ApiError::BadRequest("gain must be in [0, 1]".into()));
        }
        scene.set_volume_override(&id, gain);
    }
    if let Some(muted) = patch.muted {
        scene.set_muted(&id, muted);
    }
    if let Some(new_state) = patch.state {
        // scene.layer() above guarantees presence; re-borrow mutably
        if let Some(layer) = scene.layer_mut(&id) {
            match new_state {
                LayerState::Ready => layer.mark_ready(false),
                LayerState::Playing => layer.mark_ready(true),
                LayerState::Error => layer.mark_error(),
                LayerState::Loading => layer.state = LayerState::Loading,
                LayerState::Idle => layer.state = LayerState::Idle,
            }
        }
    }

    let layer = scene
        .layer(&id)
        .cloned()
        .ok_or_else(|| ApiError::Internal("layer vanished mid-patch".into()))?;
    Ok(Json(LayerView::project(&scene, &layer)))
}

#[derive(Debug, Deserialize)]
pub struct MixPatch {
    /// Global mix scale in [0.3, 2.0]
    pub scale: f64,
}

#[derive(Debug, Serialize)]
pub struct MixResponse {
    pub mix_scale: f64,
    pub layers: Vec<LayerView>,
}

/// PATCH /scene/mix
pub async fn patch_mix(
    State(state): State<AppState>,
    Json(patch): Json<MixPatch>,
) -> ApiResult<Json<MixResponse>> {
    let mut scene = state.scene.write().await;
    scene.mix_scale = patch.scale.clamp(0.3, 2.0);
    Ok(Json(MixResponse {
        mix_scale: scene.mix_scale,
        layers: scene
            .layers
            .iter()
            .map(|layer| LayerView::project(&scene, layer))
            .collect(),
    }))
}

/// POST /scene/mix/refine
///
/// Ask the LLM for per-tag gain suggestions against the current prompt
/// and apply them to the scene.
pub async fn refine_mix(State(state): State<AppState>) -> ApiResult<Json<SceneView>> {
    let Some(llm) = &state.llm else {
        return Err(ApiError::BadRequest("no language model configured".into()));
    };

    let (prompt, summaries) = {
        let scene = state.scene.read().await;
        if scene.layers.is_empty() {
            return Err(ApiError::BadRequest("scene has no layers to refine".into()));
        }
        let summaries: Vec<LayerSummary> = scene
            .layers
            .iter()
            .map(|layer| LayerSummary {
                tag: layer.tag.clone(),
                gain: layer.gain,
                audio_name: layer.item.as_ref().map(|rec| rec.name.clone()),
            })
            .collect();
        (scene.prompt.clone(), summaries)
    };

    let timeout = Duration::from_secs(state.config.llm.timeout_secs);
    let refinement = soundsketch_common::bounded(timeout, llm.refine_mix(&prompt, &summaries))
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "mix refinement failed");
            ApiError::Internal(format!("mix refinement failed: {e}"))
        })?;

    let mut scene = state.scene.write().await;
    for suggestion in &refinement.suggestions {
        for layer in scene
            .layers
            .iter_mut()
            .filter(|l| l.tag == suggestion.tag)
        {
            layer.gain = suggestion.new_gain.clamp(0.0, 1.0);
        }
    }
    if let Some(scale) = refinement.overall_gain_scale {
        scene.mix_scale = scale.clamp(0.3, 2.0);
    }
    tracing::info!(
        suggestions = refinement.suggestions.len(),
        "mix refinement applied"
    );

    Ok(Json(SceneView::project(&scene)))
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

/// POST /scene/image
///
/// Generate a backdrop image for the current prompt. Cosmetic: failures
/// surface as errors but never touch the layer state.
pub async fn generate_image(State(state): State<AppState>) -> ApiResult<Json<ImageResponse>> {
    let Some(llm) = &state.llm else {
        return Err(ApiError::BadRequest("no language model configured".into()));
    };

    let prompt = {
        let scene = state.scene.read().await;
        if scene.prompt.is_empty() {
            return Err(ApiError::BadRequest("no prompt to illustrate".into()));
        }
        scene.prompt.clone()
    };

    let image = llm.generate_image(&prompt).await.map_err(|e| {
        tracing::warn!(error = %e, "backdrop generation failed");
        ApiError::Internal(format!("image generation failed: {e}"))
    })?;

    let mut scene = state.scene.write().await;
    scene.backdrop_url = Some(image.url.clone());

    Ok(Json(ImageResponse {
        url: image.url,
        revised_prompt: image.revised_prompt,
    }))
}

/// Build scene routes
pub fn scene_routes() -> Router<AppState> {
    Router::new()
        .route("/scene", get(get_scene))
        .route("/scene/layers", post(add_layer))
        .route("/scene/layers/:id/swap", post(swap_layer))
        .route("/scene/layers/:id", delete(delete_layer).patch(patch_layer))
        .route("/scene/mix", patch(patch_mix))
        .route("/scene/mix/refine", post(refine_mix))
        .route("/scene/image", post(generate_image))
}
