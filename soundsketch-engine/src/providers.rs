//! Collaborator seams
//!
//! The pipeline talks to two external collaborators: the sound-search
//! provider and the language model. Both are consumed through traits so
//! the pipeline stays collaborator-agnostic and tests can substitute
//! scripted implementations.

use crate::models::{Recording, SearchResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Failure reported by a collaborator. Timeouts are not represented here;
/// callers wrap every provider call in `soundsketch_common::bounded`, which
/// keeps deadline expiry distinguishable from these.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Empty response: {0}")]
    Empty(String),
}

/// One tag's search query: the tag itself plus negative-tag exclusions
/// merged from the fixed filter and the analysis `tags_to_avoid`.
#[derive(Debug, Clone)]
pub struct TagQuery {
    pub tag: String,
    pub exclude_tags: Vec<String>,
}

impl TagQuery {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            exclude_tags: Vec::new(),
        }
    }

    pub fn with_exclusions(tag: impl Into<String>, exclude_tags: Vec<String>) -> Self {
        Self {
            tag: tag.into(),
            exclude_tags,
        }
    }
}

/// Sound-search collaborator: keyword+filter text search and single-id
/// lookup.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search_tag(&self, query: &TagQuery) -> Result<SearchResponse, ProviderError>;

    async fn lookup(&self, id: u64) -> Result<Recording, ProviderError>;
}

/// Structured result of the LLM tag-analysis call, as returned on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmAnalysis {
    pub tags: Vec<String>,
    #[serde(rename = "gainScale", default)]
    pub gain_scale: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(rename = "tagsToAvoid", default)]
    pub tags_to_avoid: Vec<String>,
    #[serde(rename = "tagGains", default)]
    pub tag_gains: HashMap<String, f64>,
}

/// Compact candidate description sent to the relevance-scoring call.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    pub id: u64,
    pub name: String,
    pub tags: Vec<String>,
    pub username: String,
}

impl From<&Recording> for CandidateSummary {
    fn from(rec: &Recording) -> Self {
        Self {
            id: rec.id,
            name: rec.name.clone(),
            tags: rec.tags.clone(),
            username: rec.username.clone(),
        }
    }
}

/// One relevance ranking from the LLM, clamped to [0, 1] by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceScore {
    #[serde(rename = "audioId")]
    pub audio_id: String,
    #[serde(rename = "relevanceScore")]
    pub relevance_score: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Current layer description for the mix-refinement call.
#[derive(Debug, Clone, Serialize)]
pub struct LayerSummary {
    pub tag: String,
    pub gain: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_name: Option<String>,
}

/// Mix-refinement suggestions from the LLM.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MixRefinement {
    #[serde(default)]
    pub suggestions: Vec<GainSuggestion>,
    #[serde(rename = "overallGainScale", default)]
    pub overall_gain_scale: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GainSuggestion {
    pub tag: String,
    #[serde(rename = "newGain")]
    pub new_gain: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Generated scene backdrop (cosmetic side feature).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

/// Language-model collaborator, with the four call shapes the pipeline
/// uses.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Prompt text → structured tag/gain analysis.
    async fn analyze_prompt(&self, prompt: &str) -> Result<LlmAnalysis, ProviderError>;

    /// Prompt + candidate summaries (caller caps at 5) → relevance scores.
    async fn score_candidates(
        &self,
        prompt: &str,
        candidates: &[CandidateSummary],
    ) -> Result<Vec<RelevanceScore>, ProviderError>;

    /// Failure context → replacement single-word tags likely to have
    /// recordings available.
    async fn fallback_tags(
        &self,
        prompt: &str,
        failed_tags: &[String],
        count: usize,
    ) -> Result<Vec<String>, ProviderError>;

    /// Current mix → per-tag gain suggestions.
    async fn refine_mix(
        &self,
        prompt: &str,
        layers: &[LayerSummary],
    ) -> Result<MixRefinement, ProviderError>;

    /// Scene backdrop image (cosmetic).
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, ProviderError>;
}
