//! Shortfall backfill
//!
//! When too few tags produced a usable layer, ask the LLM for replacement
//! tags and retry with a tighter search deadline. Best-effort and strictly
//! bounded: at most two rounds, stopping early when a round adds nothing
//! or no LLM is available. Speed over precision here: first usable
//! candidate in result order, no re-ranking, no whitelist fallback.

use crate::models::{Layer, PromptAnalysis};
use crate::providers::{LanguageModel, TagQuery};
use crate::services::candidate_fetcher::CandidateFetcher;
use crate::services::rules;
use futures::future::join_all;
use soundsketch_common::bounded;
use std::sync::Arc;
use std::time::Duration;

const MAX_ROUNDS: usize = 2;

/// Minimum usable layers we aim for: at least 3, or 80% of the resolved
/// tag count, whichever is larger.
pub fn target_count(tag_count: usize) -> usize {
    3.max((tag_count as f64 * 0.8).ceil() as usize)
}

pub struct ShortfallBackfill {
    fetcher: Arc<CandidateFetcher>,
    llm: Option<Arc<dyn LanguageModel>>,
    search_timeout: Duration,
    llm_timeout: Duration,
}

impl ShortfallBackfill {
    pub fn new(
        fetcher: Arc<CandidateFetcher>,
        llm: Option<Arc<dyn LanguageModel>>,
        search_timeout: Duration,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            llm,
            search_timeout,
            llm_timeout,
        }
    }

    /// Run bounded backfill rounds. Returns the layers to append.
    pub async fn run(
        &self,
        prompt: &str,
        analysis: &PromptAnalysis,
        existing: &[Layer],
    ) -> Vec<Layer> {
        let target = target_count(analysis.tags.len());
        let mut added: Vec<Layer> = Vec::new();

        let Some(llm) = &self.llm else {
            tracing::info!("no LLM available, skipping backfill");
            return added;
        };

        let failed_tags: Vec<String> = analysis
            .tags
            .iter()
            .filter(|tag| !existing.iter().any(|l| l.tag == **tag))
            .cloned()
            .collect();

        for round in 0..MAX_ROUNDS {
            let current = existing.len() + added.len();
            if current >= target {
                break;
            }
            let wanted = target - current;

            tracing::info!(round, current, target, "backfill round starting");

            let suggestions = match bounded(
                self.llm_timeout,
                llm.fallback_tags(prompt, &failed_tags, wanted),
            )
            .await
            {
                Ok(tags) => tags,
                Err(e) => {
                    tracing::warn!(error = %e, "fallback tag generation failed, stopping backfill");
                    break;
                }
            };

            // Skip tags that already have a layer under any id
            let covered: Vec<&str> = existing
                .iter()
                .chain(added.iter())
                .map(|l| l.tag.as_str())
                .collect();
            let fresh: Vec<String> = suggestions
                .into_iter()
                .filter(|tag| !covered.contains(&tag.as_str()))
                .collect();

            let fetches = fresh.iter().map(|tag| {
                let query = TagQuery::with_exclusions(tag.clone(), analysis.tags_to_avoid.clone());
                async move {
                    let results = self
                        .fetcher
                        .fetch_tag_search_only(&query, self.search_timeout)
                        .await;
                    (tag.clone(), results)
                }
            });

            let mut round_added = 0;
            for (tag, results) in join_all(fetches).await {
                let Some(recording) = results.into_iter().find(|r| r.has_usable_preview()) else {
                    tracing::info!(tag = %tag, "backfill tag found nothing usable");
                    continue;
                };
                let gain = analysis
                    .base_gains
                    .get(&tag)
                    .copied()
                    .unwrap_or_else(|| rules::gain_for_tag(&tag));
                let layer = Layer::new(format!("fallback-{tag}"), tag.clone(), recording, gain);
                tracing::info!(tag = %tag, id = %layer.id, "backfill layer added");
                added.push(layer);
                round_added += 1;
            }

            if round_added == 0 {
                tracing::info!(round, "backfill round added nothing, stopping");
                break;
            }
        }

        added
    }
}
