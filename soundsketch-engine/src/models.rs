//! Core data model
//!
//! Types shared across the pipeline: candidate recordings as returned by
//! the search collaborator, playable layers, prompt analysis results, and
//! the per-layer playback state machine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Preview URL slots of a recording, as named on the wire.
///
/// A recording is usable iff at least one slot holds a non-empty URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Previews {
    #[serde(rename = "preview-hq-mp3", default, skip_serializing_if = "Option::is_none")]
    pub hq_mp3: Option<String>,
    #[serde(rename = "preview-lq-mp3", default, skip_serializing_if = "Option::is_none")]
    pub lq_mp3: Option<String>,
    #[serde(rename = "preview-hq-ogg", default, skip_serializing_if = "Option::is_none")]
    pub hq_ogg: Option<String>,
    #[serde(rename = "preview-lq-ogg", default, skip_serializing_if = "Option::is_none")]
    pub lq_ogg: Option<String>,
}

impl Previews {
    /// Best playable URL, preferring high quality mp3. Empty strings count
    /// as absent; some search results carry populated keys with "" values.
    pub fn best_url(&self) -> Option<&str> {
        [&self.hq_mp3, &self.lq_mp3, &self.hq_ogg, &self.lq_ogg]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|url| !url.is_empty())
    }
}

/// One candidate recording from the search collaborator (read-only once
/// fetched).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Duration in seconds
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub previews: Previews,
    #[serde(default)]
    pub avg_rating: f64,
    #[serde(default)]
    pub num_ratings: u64,
    #[serde(default)]
    pub num_downloads: u64,
}

impl Recording {
    /// Usability invariant: at least one populated preview slot.
    pub fn has_usable_preview(&self) -> bool {
        self.previews.best_url().is_some()
    }

    /// Public page URL for this recording.
    pub fn page_link(&self) -> String {
        format!("https://freesound.org/s/{}/", self.id)
    }
}

/// Search collaborator response for one query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub results: Vec<Recording>,
}

impl SearchResponse {
    /// Wrap a single recording, used by the whitelist fallback path.
    pub fn single(recording: Recording) -> Self {
        Self {
            count: 1,
            results: vec![recording],
        }
    }
}

/// Which resolver tier produced the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Language-model analysis succeeded
    Llm,
    /// No language model configured, rules used directly
    Rules,
    /// Language model configured but failed or timed out, rules used
    Fallback,
}

/// Result of resolving a prompt into tags and gains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptAnalysis {
    pub tags: Vec<String>,
    /// Global intensity multiplier, clamped to [0.3, 2.0]
    pub gain_scale: f64,
    /// Per-tag base gain in [0, 1]
    pub base_gains: HashMap<String, f64>,
    /// Resolver confidence in [0, 1]
    pub confidence: f64,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags_to_avoid: Vec<String>,
}

/// Cache lookup outcome, reported once per generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
    Stale,
}

/// Per-layer playback state, driven by the playback collaborator's reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerState {
    /// Created, no recording attached yet
    Idle,
    /// Recording attached, audio element loading
    Loading,
    Ready,
    Playing,
    /// Load failed or timed out
    Error,
}

/// One playable layer of the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    /// Stable identifier: the tag for generation-time layers, synthetic for
    /// backfill and manually added layers
    pub id: String,
    pub tag: String,
    /// Selected recording, absent while loading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Recording>,
    /// Intrinsic gain in [0, 1], before the global mix scale
    pub gain: f64,
    /// Public page URL of the selected recording
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub state: LayerState,
}

impl Layer {
    pub fn new(id: impl Into<String>, tag: impl Into<String>, recording: Recording, gain: f64) -> Self {
        let link = recording.page_link();
        Self {
            id: id.into(),
            tag: tag.into(),
            item: Some(recording),
            gain,
            link: Some(link),
            state: LayerState::Loading,
        }
    }

    /// Replace the selected recording in place. Id, tag, gain and list
    /// position are preserved; the layer re-enters Loading and resumes
    /// playing afterwards if it was playing before.
    pub fn replace_item(&mut self, recording: Recording) -> bool {
        let was_playing = self.state == LayerState::Playing;
        self.link = Some(recording.page_link());
        self.item = Some(recording);
        self.state = LayerState::Loading;
        was_playing
    }

    /// Playback collaborator reported the element is ready.
    pub fn mark_ready(&mut self, resume_playing: bool) {
        self.state = if resume_playing {
            LayerState::Playing
        } else {
            LayerState::Ready
        };
    }

    /// Playback collaborator reported a load error or load timeout.
    pub fn mark_error(&mut self) {
        self.state = LayerState::Error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn recording(id: u64, preview: Option<&str>) -> Recording {
        Recording {
            id,
            name: format!("recording {id}"),
            duration: 60.0,
            license: "CC0".to_string(),
            username: "fieldrec".to_string(),
            tags: vec!["ambience".to_string()],
            previews: Previews {
                hq_mp3: preview.map(String::from),
                ..Default::default()
            },
            avg_rating: 4.0,
            num_ratings: 12,
            num_downloads: 500,
        }
    }

    #[test]
    fn empty_preview_slots_are_unusable() {
        let rec = recording(1, None);
        assert!(!rec.has_usable_preview());

        let rec = recording(2, Some(""));
        assert!(!rec.has_usable_preview());

        let rec = recording(3, Some("https://cdn.example/p.mp3"));
        assert!(rec.has_usable_preview());
    }

    #[test]
    fn best_url_prefers_hq_mp3() {
        let previews = Previews {
            hq_mp3: Some("hq.mp3".to_string()),
            lq_mp3: Some("lq.mp3".to_string()),
            hq_ogg: Some("hq.ogg".to_string()),
            lq_ogg: None,
        };
        assert_eq!(previews.best_url(), Some("hq.mp3"));

        let previews = Previews {
            hq_mp3: Some(String::new()),
            lq_mp3: None,
            hq_ogg: Some("hq.ogg".to_string()),
            lq_ogg: None,
        };
        assert_eq!(previews.best_url(), Some("hq.ogg"));
    }

    #[test]
    fn swap_preserves_identity_and_play_intent() {
        let mut layer = Layer::new("rain", "rain", recording(10, Some("a.mp3")), 0.5);
        layer.mark_ready(false);
        layer.state = LayerState::Playing;

        let was_playing = layer.replace_item(recording(11, Some("b.mp3")));
        assert!(was_playing);
        assert_eq!(layer.id, "rain");
        assert_eq!(layer.tag, "rain");
        assert_eq!(layer.state, LayerState::Loading);
        assert_eq!(layer.item.as_ref().unwrap().id, 11);
        assert_eq!(layer.link.as_deref(), Some("https://freesound.org/s/11/"));

        layer.mark_ready(was_playing);
        assert_eq!(layer.state, LayerState::Playing);
    }

    #[test]
    fn wire_preview_names_round_trip() {
        let json = r#"{
            "id": 42,
            "name": "soft rain on tent",
            "duration": 95.2,
            "previews": {"preview-hq-mp3": "https://cdn.example/42-hq.mp3"},
            "avg_rating": 4.4,
            "num_downloads": 1234
        }"#;
        let rec: Recording = serde_json::from_str(json).unwrap();
        assert_eq!(rec.previews.best_url(), Some("https://cdn.example/42-hq.mp3"));
        assert_eq!(rec.page_link(), "https://freesound.org/s/42/");
    }
}
