//! Scene state
//!
//! One generation's session: the prompt, its analysis, the layer list and
//! everything that used to live in ad-hoc globals in looser designs: the
//! per-tag alternates pools, the per-layer in-flight swap guard, the mix
//! scale and per-layer volume/mute overrides. A new generation replaces
//! the whole scene.

use crate::models::{Layer, PromptAnalysis, Recording};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Clamp a gain product into [0, 1].
fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[derive(Debug, Default, Serialize)]
pub struct Scene {
    pub prompt: String,
    pub analysis: Option<PromptAnalysis>,
    pub layers: Vec<Layer>,
    /// Usable, non-selected candidates per tag, kept for swaps.
    #[serde(skip)]
    pub alternates: HashMap<String, Vec<Recording>>,
    /// Layer ids with a swap currently in flight.
    #[serde(skip)]
    swapping: HashSet<String>,
    /// Global intensity multiplier applied on top of per-layer gains.
    pub mix_scale: f64,
    /// Per-layer gain overrides, keyed by layer id. Absent means the
    /// layer's intrinsic gain applies.
    pub volume_overrides: HashMap<String, f64>,
    /// Layer ids currently muted.
    pub muted: HashSet<String>,
    /// Backdrop image URL, when one was generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop_url: Option<String>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            mix_scale: 1.0,
            ..Default::default()
        }
    }

    /// Install a freshly generated scene, discarding all previous state
    /// including overrides and in-flight swap guards.
    pub fn install(
        &mut self,
        prompt: String,
        analysis: PromptAnalysis,
        layers: Vec<Layer>,
        alternates: HashMap<String, Vec<Recording>>,
    ) {
        self.prompt = prompt;
        self.mix_scale = analysis.gain_scale;
        self.analysis = Some(analysis);
        self.layers = layers;
        self.alternates = alternates;
        self.swapping.clear();
        self.volume_overrides.clear();
        self.muted.clear();
        self.backdrop_url = None;
    }

    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    /// Append a layer (manual add or backfill). Position is append-only;
    /// generation-time ordering is established before `install`.
    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Remove a layer and every piece of per-layer state keyed on its id.
    /// Returns false when the id is unknown.
    pub fn remove_layer(&mut self, id: &str) -> bool {
        let before = self.layers.len();
        self.layers.retain(|l| l.id != id);
        if self.layers.len() == before {
            return false;
        }
        self.swapping.remove(id);
        self.volume_overrides.remove(id);
        self.muted.remove(id);
        true
    }

    /// Claim the swap guard for a layer. At most one swap per layer may be
    /// in flight; a second claim while the first is pending fails.
    pub fn begin_swap(&mut self, id: &str) -> bool {
        if self.layer(id).is_none() {
            return false;
        }
        self.swapping.insert(id.to_string())
    }

    pub fn end_swap(&mut self, id: &str) {
        self.swapping.remove(id);
    }

    pub fn is_swapping(&self, id: &str) -> bool {
        self.swapping.contains(id)
    }

    pub fn set_volume_override(&mut self, id: &str, gain: f64) {
        self.volume_overrides.insert(id.to_string(), clamp01(gain));
    }

    pub fn set_muted(&mut self, id: &str, muted: bool) {
        if muted {
            self.muted.insert(id.to_string());
        } else {
            self.muted.remove(id);
        }
    }

    /// Audible gain for a layer: override (or intrinsic gain) times the
    /// mix scale, clamped to [0, 1]; zero while muted.
    pub fn effective_gain(&self, layer: &Layer) -> f64 {
        if self.muted.contains(&layer.id) {
            return 0.0;
        }
        let base = self
            .volume_overrides
            .get(&layer.id)
            .copied()
            .unwrap_or(layer.gain);
        clamp01(base * self.mix_scale)
    }

    /// Take the alternates pool for a tag, leaving it empty.
    pub fn take_alternates(&mut self, tag: &str) -> Vec<Recording> {
        self.alternates.remove(tag).unwrap_or_default()
    }

    pub fn set_alternates(&mut self, tag: &str, alternates: Vec<Recording>) {
        self.alternates.insert(tag.to_string(), alternates);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Previews, Provenance};

    fn rec(id: u64) -> Recording {
        Recording {
            id,
            name: format!("r{id}"),
            duration: 60.0,
            license: String::new(),
            username: String::new(),
            tags: vec![],
            previews: Previews {
                hq_mp3: Some("a.mp3".to_string()),
                ..Default::default()
            },
            avg_rating: 4.0,
            num_ratings: 1,
            num_downloads: 10,
        }
    }

    fn analysis(scale: f64) -> PromptAnalysis {
        PromptAnalysis {
            tags: vec!["rain".to_string()],
            gain_scale: scale,
            base_gains: HashMap::new(),
            confidence: 0.8,
            provenance: Provenance::Rules,
            reasoning: None,
            tags_to_avoid: Vec::new(),
        }
    }

    fn scene_with_layer(scale: f64) -> Scene {
        let mut scene = Scene::new();
        scene.install(
            "rain".to_string(),
            analysis(scale),
            vec![Layer::new("rain", "rain", rec(1), 0.5)],
            HashMap::new(),
        );
        scene
    }

    #[test]
    fn effective_gain_applies_scale_and_clamps() {
        let scene = scene_with_layer(1.2);
        let layer = scene.layer("rain").unwrap().clone();
        assert!((scene.effective_gain(&layer) - 0.6).abs() < 1e-9);

        let scene = scene_with_layer(2.0);
        let mut layer = scene.layer("rain").unwrap().clone();
        layer.gain = 0.9;
        assert_eq!(scene.effective_gain(&layer), 1.0);
    }

    #[test]
    fn overrides_and_mute_take_precedence() {
        let mut scene = scene_with_layer(1.0);
        scene.set_volume_override("rain", 0.2);
        let layer = scene.layer("rain").unwrap().clone();
        assert!((scene.effective_gain(&layer) - 0.2).abs() < 1e-9);

        scene.set_muted("rain", true);
        assert_eq!(scene.effective_gain(&layer), 0.0);

        scene.set_muted("rain", false);
        assert!((scene.effective_gain(&layer) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn swap_guard_admits_one_swap_per_layer() {
        let mut scene = scene_with_layer(1.0);
        assert!(scene.begin_swap("rain"));
        assert!(!scene.begin_swap("rain"));
        scene.end_swap("rain");
        assert!(scene.begin_swap("rain"));
        assert!(!scene.begin_swap("no-such-layer"));
    }

    #[test]
    fn install_resets_all_per_layer_state() {
        let mut scene = scene_with_layer(1.0);
        scene.set_volume_override("rain", 0.1);
        scene.set_muted("rain", true);
        assert!(scene.begin_swap("rain"));

        scene.install(
            "wind".to_string(),
            analysis(0.7),
            vec![Layer::new("wind", "wind", rec(2), 0.45)],
            HashMap::new(),
        );

        assert_eq!(scene.prompt, "wind");
        assert_eq!(scene.mix_scale, 0.7);
        assert!(scene.volume_overrides.is_empty());
        assert!(scene.muted.is_empty());
        assert!(!scene.is_swapping("rain"));
    }

    #[test]
    fn remove_layer_clears_keyed_state() {
        let mut scene = scene_with_layer(1.0);
        scene.set_volume_override("rain", 0.3);
        scene.set_muted("rain", true);

        assert!(scene.remove_layer("rain"));
        assert!(!scene.remove_layer("rain"));
        assert!(scene.volume_overrides.is_empty());
        assert!(scene.muted.is_empty());
    }

    #[test]
    fn take_alternates_drains_the_pool() {
        let mut scene = scene_with_layer(1.0);
        scene.set_alternates("rain", vec![rec(5), rec(6)]);
        let taken = scene.take_alternates("rain");
        assert_eq!(taken.len(), 2);
        assert!(scene.take_alternates("rain").is_empty());
    }
}
