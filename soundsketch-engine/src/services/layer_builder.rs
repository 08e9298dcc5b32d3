//! Layer construction
//!
//! Scores a tag's candidates, walks the ranking for the first usable
//! preview, optionally lets the LLM re-rank the top five, and produces
//! the Layer plus the alternates pool the swap path draws from later.

use crate::models::{Layer, PromptAnalysis, Recording};
use crate::providers::{CandidateSummary, LanguageModel};
use crate::services::{rules, scoring};
use std::sync::Arc;
use std::time::Duration;

/// Candidates sent to the relevance-scoring call, at most.
const RERANK_POOL: usize = 5;

/// Relevance above which the LLM's pick overrides the score ranking.
const OVERRIDE_THRESHOLD: f64 = 0.7;

/// Re-ranking is advisory; give it a short leash.
const RERANK_TIMEOUT: Duration = Duration::from_secs(15);

/// A constructed layer plus the usable candidates that were not picked.
#[derive(Debug)]
pub struct BuiltLayer {
    pub layer: Layer,
    pub alternates: Vec<Recording>,
}

pub struct LayerBuilder {
    llm: Option<Arc<dyn LanguageModel>>,
}

impl LayerBuilder {
    pub fn new(llm: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { llm }
    }

    /// Build a layer for one tag, or None when no candidate has a usable
    /// preview. `layer_id` overrides the default tag-derived identifier
    /// for backfill and manually added layers.
    pub async fn build(
        &self,
        tag: &str,
        candidates: Vec<Recording>,
        prompt: &str,
        analysis: &PromptAnalysis,
        layer_id: Option<String>,
    ) -> Option<BuiltLayer> {
        if candidates.is_empty() {
            tracing::info!(tag = %tag, "no search results for tag");
            return None;
        }

        let candidate_count = candidates.len();
        let ranked = scoring::rank(candidates);

        let usable: Vec<&Recording> = ranked
            .iter()
            .map(|(_, rec)| rec)
            .filter(|rec| rec.has_usable_preview())
            .collect();
        let Some(&rule_pick) = usable.first() else {
            tracing::info!(tag = %tag, "no usable preview among candidates");
            return None;
        };

        let mut selected_id = rule_pick.id;

        if self.llm.is_some() && candidate_count > 2 {
            if let Some(id) = self.rerank(prompt, &ranked).await {
                let overridden = ranked
                    .iter()
                    .map(|(_, rec)| rec)
                    .find(|rec| rec.id == id)
                    .filter(|rec| rec.has_usable_preview());
                if let Some(rec) = overridden {
                    tracing::info!(tag = %tag, id = rec.id, "LLM relevance override");
                    selected_id = rec.id;
                }
            }
        }

        let mut selected: Option<Recording> = None;
        let mut alternates = Vec::new();
        for (_, rec) in ranked {
            if rec.id == selected_id && selected.is_none() {
                selected = Some(rec);
            } else if rec.has_usable_preview() {
                alternates.push(rec);
            }
        }
        let selected = selected?;

        let gain = analysis
            .base_gains
            .get(tag)
            .copied()
            .unwrap_or_else(|| rules::gain_for_tag(tag));

        let id = layer_id.unwrap_or_else(|| tag.to_string());
        let layer = Layer::new(id, tag, selected, gain);

        Some(BuiltLayer { layer, alternates })
    }

    /// Ask the LLM to re-rank the top candidates. Returns the id of the
    /// highest-relevance candidate when it clears the override threshold;
    /// ties are broken first-encountered. Any failure is swallowed and the
    /// rule-based selection stands.
    async fn rerank(&self, prompt: &str, ranked: &[(f64, Recording)]) -> Option<u64> {
        let llm = self.llm.as_ref()?;

        let summaries: Vec<CandidateSummary> = ranked
            .iter()
            .take(RERANK_POOL)
            .map(|(_, rec)| CandidateSummary::from(rec))
            .collect();

        let scores = match soundsketch_common::bounded(
            RERANK_TIMEOUT,
            llm.score_candidates(prompt, &summaries),
        )
        .await
        {
            Ok(scores) => scores,
            Err(e) => {
                tracing::warn!(error = %e, "LLM relevance scoring failed, keeping rule selection");
                return None;
            }
        };

        let mut best: Option<(u64, f64)> = None;
        for score in &scores {
            let Ok(id) = score.audio_id.parse::<u64>() else {
                continue;
            };
            // strictly greater: first-encountered wins ties
            if best.map(|(_, s)| score.relevance_score > s).unwrap_or(true) {
                best = Some((id, score.relevance_score));
            }
        }

        match best {
            Some((id, relevance)) if relevance > OVERRIDE_THRESHOLD => Some(id),
            _ => None,
        }
    }
}
