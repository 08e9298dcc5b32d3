//! Generation pipeline
//!
//! End-to-end orchestration of one prompt: resolve tags, fetch candidates
//! concurrently, build one layer per tag (tag order preserved), then run
//! the bounded shortfall backfill. The result is a complete scene payload
//! the caller commits, or discards if the generation was superseded.

use crate::models::{CacheStatus, Layer, PromptAnalysis, Recording};
use crate::services::backfill::ShortfallBackfill;
use crate::services::candidate_fetcher::CandidateFetcher;
use crate::services::layer_builder::LayerBuilder;
use crate::services::tag_resolver::TagResolver;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything one generation produced.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub analysis: PromptAnalysis,
    pub cache_status: CacheStatus,
    pub layers: Vec<Layer>,
    pub alternates: HashMap<String, Vec<Recording>>,
}

pub struct Generator {
    resolver: TagResolver,
    fetcher: Arc<CandidateFetcher>,
    builder: Arc<LayerBuilder>,
    backfill: ShortfallBackfill,
}

impl Generator {
    pub fn new(
        resolver: TagResolver,
        fetcher: Arc<CandidateFetcher>,
        builder: Arc<LayerBuilder>,
        backfill: ShortfallBackfill,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            builder,
            backfill,
        }
    }

    pub async fn generate(&self, prompt: &str) -> GenerationOutcome {
        let analysis = self.resolver.resolve(prompt).await;
        tracing::info!(
            tags = ?analysis.tags,
            provenance = ?analysis.provenance,
            "prompt resolved"
        );

        let outcome = self
            .fetcher
            .fetch_for_prompt(prompt, &analysis.tags, &analysis.tags_to_avoid)
            .await;
        tracing::info!(cache_status = ?outcome.cache_status, "candidates fetched");

        // One build per tag, concurrently; join_all preserves tag order so
        // the layer list follows the resolver's ordering.
        let mut by_tag = outcome.by_tag;
        let builds = analysis.tags.iter().map(|tag| {
            let candidates = by_tag
                .remove(tag)
                .map(|response| response.results)
                .unwrap_or_default();
            let analysis = &analysis;
            async move {
                self.builder
                    .build(tag, candidates, prompt, analysis, None)
                    .await
            }
        });

        let mut layers = Vec::new();
        let mut alternates = HashMap::new();
        for built in join_all(builds).await.into_iter().flatten() {
            alternates.insert(built.layer.tag.clone(), built.alternates);
            layers.push(built.layer);
        }

        let backfilled = self.backfill.run(prompt, &analysis, &layers).await;
        layers.extend(backfilled);

        tracing::info!(layers = layers.len(), "generation complete");

        GenerationOutcome {
            analysis,
            cache_status: outcome.cache_status,
            layers,
            alternates,
        }
    }
}
