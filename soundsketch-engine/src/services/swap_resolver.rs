//! Layer swap
//!
//! Re-queries the layer's tag fresh (with whitelist fallback), excludes
//! the recording currently on display, and runs the normal selection
//! pipeline over what remains. A swap with no usable alternative is a
//! reported no-op, never a silent success.

use crate::models::{PromptAnalysis, Recording};
use crate::providers::TagQuery;
use crate::services::candidate_fetcher::CandidateFetcher;
use crate::services::layer_builder::LayerBuilder;
use std::sync::Arc;

/// What a swap attempt produced.
#[derive(Debug)]
pub enum SwapOutcome {
    /// A different usable recording was found, plus the refreshed
    /// alternates pool for the tag.
    Swapped {
        recording: Recording,
        alternates: Vec<Recording>,
    },
    /// No usable alternative exists; the layer keeps its recording.
    NoAlternative,
}

pub struct SwapResolver {
    fetcher: Arc<CandidateFetcher>,
    builder: Arc<LayerBuilder>,
}

impl SwapResolver {
    pub fn new(fetcher: Arc<CandidateFetcher>, builder: Arc<LayerBuilder>) -> Self {
        Self { fetcher, builder }
    }

    /// Find a replacement recording for one layer's tag.
    pub async fn resolve(
        &self,
        tag: &str,
        current_id: Option<u64>,
        prompt: &str,
        analysis: &PromptAnalysis,
    ) -> SwapOutcome {
        let query = TagQuery::with_exclusions(tag.to_string(), analysis.tags_to_avoid.clone());
        let response = self.fetcher.fetch_tag_with_fallback(&query).await;

        // A swap must change the recording whenever possible
        let candidates: Vec<Recording> = response
            .results
            .into_iter()
            .filter(|rec| Some(rec.id) != current_id)
            .collect();

        match self
            .builder
            .build(tag, candidates, prompt, analysis, None)
            .await
        {
            Some(built) => {
                let Some(recording) = built.layer.item else {
                    return SwapOutcome::NoAlternative;
                };
                tracing::info!(tag = %tag, id = recording.id, "swap selected replacement");
                SwapOutcome::Swapped {
                    recording,
                    alternates: built.alternates,
                }
            }
            None => {
                tracing::info!(tag = %tag, "swap found no usable alternative");
                SwapOutcome::NoAlternative
            }
        }
    }
}
