//! Shared test fixtures: canned collaborators and app-state construction.

use async_trait::async_trait;
use soundsketch_common::config::TomlConfig;
use soundsketch_engine::models::{Previews, Recording, SearchResponse};
use soundsketch_engine::providers::{
    CandidateSummary, GeneratedImage, LanguageModel, LayerSummary, LlmAnalysis, MixRefinement,
    ProviderError, RelevanceScore, SearchProvider, TagQuery,
};
use soundsketch_engine::AppState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn recording(id: u64, name: &str, rating: f64) -> Recording {
    Recording {
        id,
        name: name.to_string(),
        duration: 60.0,
        license: "CC0".to_string(),
        username: "fieldrec".to_string(),
        tags: vec!["ambience".to_string()],
        previews: Previews {
            hq_mp3: Some(format!("https://cdn.example/{id}.mp3")),
            ..Default::default()
        },
        avg_rating: rating,
        num_ratings: 10,
        num_downloads: 1000,
    }
}

/// Search collaborator with canned per-tag results and per-id lookups.
/// Counts calls so tests can assert on traffic.
#[derive(Default)]
pub struct CannedSearch {
    pub by_tag: HashMap<String, Vec<Recording>>,
    pub by_id: HashMap<u64, Recording>,
    /// When set, every text search fails with a network error.
    pub fail_search: bool,
    pub search_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
}

impl CannedSearch {
    pub fn with_results(by_tag: HashMap<String, Vec<Recording>>) -> Self {
        Self {
            by_tag,
            ..Default::default()
        }
    }

    pub fn failing_with_lookups(by_id: HashMap<u64, Recording>) -> Self {
        Self {
            by_id,
            fail_search: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl SearchProvider for CannedSearch {
    async fn search_tag(&self, query: &TagQuery) -> Result<SearchResponse, ProviderError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_search {
            return Err(ProviderError::Network("canned outage".into()));
        }
        let results = self.by_tag.get(&query.tag).cloned().unwrap_or_default();
        Ok(SearchResponse {
            count: results.len() as u64,
            results,
        })
    }

    async fn lookup(&self, id: u64) -> Result<Recording, ProviderError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| ProviderError::Api(404, format!("no sound {id}")))
    }
}

/// Language model with scripted responses and call counting.
#[derive(Default)]
pub struct ScriptedLlm {
    pub analysis: Option<LlmAnalysis>,
    pub rankings: Vec<(u64, f64)>,
    pub suggestions: Vec<String>,
    pub refinement: Option<MixRefinement>,
    pub fallback_calls: AtomicUsize,
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn analyze_prompt(&self, _prompt: &str) -> Result<LlmAnalysis, ProviderError> {
        self.analysis
            .clone()
            .ok_or_else(|| ProviderError::Empty("no scripted analysis".into()))
    }

    async fn score_candidates(
        &self,
        _prompt: &str,
        _candidates: &[CandidateSummary],
    ) -> Result<Vec<RelevanceScore>, ProviderError> {
        Ok(self
            .rankings
            .iter()
            .map(|(id, score)| RelevanceScore {
                audio_id: id.to_string(),
                relevance_score: *score,
                reasoning: None,
            })
            .collect())
    }

    async fn fallback_tags(
        &self,
        _prompt: &str,
        _failed: &[String],
        count: usize,
    ) -> Result<Vec<String>, ProviderError> {
        self.fallback_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.suggestions.iter().take(count).cloned().collect())
    }

    async fn refine_mix(
        &self,
        _prompt: &str,
        _layers: &[LayerSummary],
    ) -> Result<MixRefinement, ProviderError> {
        self.refinement
            .clone()
            .ok_or_else(|| ProviderError::Empty("no scripted refinement".into()))
    }

    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, ProviderError> {
        Ok(GeneratedImage {
            url: "https://images.example/backdrop.png".to_string(),
            revised_prompt: Some(prompt.to_string()),
        })
    }
}

/// App state over an in-memory database with injected collaborators.
pub async fn test_app_state(
    search: Arc<dyn SearchProvider>,
    llm: Option<Arc<dyn LanguageModel>>,
) -> AppState {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    soundsketch_engine::db::init_tables(&pool).await.unwrap();
    AppState::with_providers(pool, TomlConfig::default(), search, llm)
}
