//! HTTP API handlers

pub mod generate;
pub mod health;
pub mod scene;

pub use generate::generate_routes;
pub use health::health_routes;
pub use scene::scene_routes;

use crate::models::{Layer, Recording};
use serde::Serialize;

/// Wire representation of one layer, as returned by every endpoint that
/// shows scene content. `gain` is the audible (effective) gain.
#[derive(Debug, Serialize)]
pub struct LayerView {
    pub id: String,
    pub tag: String,
    pub state: crate::models::LayerState,
    pub gain: f64,
    pub muted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording: Option<RecordingView>,
}

#[derive(Debug, Serialize)]
pub struct RecordingView {
    pub id: u64,
    pub name: String,
    pub username: String,
    pub license: String,
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    pub page_link: String,
}

impl RecordingView {
    fn from_recording(rec: &Recording) -> Self {
        Self {
            id: rec.id,
            name: rec.name.clone(),
            username: rec.username.clone(),
            license: rec.license.clone(),
            duration: rec.duration,
            preview_url: rec.previews.best_url().map(String::from),
            page_link: rec.page_link(),
        }
    }
}

impl LayerView {
    /// Project a layer through the scene's overrides and mix scale.
    pub fn project(scene: &crate::scene::Scene, layer: &Layer) -> Self {
        Self {
            id: layer.id.clone(),
            tag: layer.tag.clone(),
            state: layer.state,
            gain: scene.effective_gain(layer),
            muted: scene.muted.contains(&layer.id),
            recording: layer.item.as_ref().map(RecordingView::from_recording),
        }
    }
}
