//! Prompt-to-tags resolution
//!
//! The orchestrating tier: try the language model under a deadline, and
//! degrade to the deterministic rules on any failure. `resolve` never
//! errors; the worst outcome is a rules-derived analysis with fallback
//! provenance.

use crate::models::{PromptAnalysis, Provenance};
use crate::providers::LanguageModel;
use crate::services::rules;
use soundsketch_common::bounded;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Base gain used when the LLM names a tag but gives no gain for it.
pub const DEFAULT_BASE_GAIN: f64 = 0.4;

/// Rules never hallucinate, but they only know a fixed vocabulary.
const RULES_CONFIDENCE: f64 = 0.8;

pub struct TagResolver {
    llm: Option<Arc<dyn LanguageModel>>,
    llm_timeout: Duration,
}

impl TagResolver {
    pub fn new(llm: Option<Arc<dyn LanguageModel>>, llm_timeout: Duration) -> Self {
        Self { llm, llm_timeout }
    }

    /// Resolve a prompt into tags, per-tag base gains and a global scale.
    /// Always succeeds: the rules tier absorbs every LLM failure mode.
    pub async fn resolve(&self, prompt: &str) -> PromptAnalysis {
        if let Some(llm) = &self.llm {
            match bounded(self.llm_timeout, llm.analyze_prompt(prompt)).await {
                Ok(analysis) => {
                    // The client already validated, but clamp again here:
                    // the resolver owns the invariants, not the transport.
                    let tags: Vec<String> = analysis
                        .tags
                        .iter()
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect();

                    if tags.is_empty() {
                        tracing::warn!("LLM returned zero valid tags, falling back to rules");
                        return self.from_rules(prompt, Provenance::Fallback);
                    }

                    let base_gains: HashMap<String, f64> = tags
                        .iter()
                        .map(|tag| {
                            let gain = analysis
                                .tag_gains
                                .get(tag)
                                .copied()
                                .unwrap_or(DEFAULT_BASE_GAIN);
                            (tag.clone(), gain.clamp(0.0, 1.0))
                        })
                        .collect();

                    let gain_scale = analysis.gain_scale.unwrap_or(1.0).clamp(0.3, 2.0);
                    let confidence = analysis.confidence.unwrap_or(0.5).clamp(0.0, 1.0);

                    tracing::info!(
                        tags = ?tags,
                        gain_scale,
                        confidence,
                        "LLM analysis accepted"
                    );

                    return PromptAnalysis {
                        tags,
                        gain_scale,
                        base_gains,
                        confidence,
                        provenance: Provenance::Llm,
                        reasoning: analysis.reasoning,
                        tags_to_avoid: analysis.tags_to_avoid,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        timed_out = e.is_timeout(),
                        error = %e,
                        "LLM analysis failed, falling back to rules"
                    );
                    return self.from_rules(prompt, Provenance::Fallback);
                }
            }
        }

        self.from_rules(prompt, Provenance::Rules)
    }

    fn from_rules(&self, prompt: &str, provenance: Provenance) -> PromptAnalysis {
        let rules_result = rules::map_prompt_to_tags(prompt);
        let base_gains: HashMap<String, f64> = rules_result
            .tags
            .iter()
            .map(|tag| (tag.clone(), rules::gain_for_tag(tag)))
            .collect();

        let reasoning = match provenance {
            Provenance::Fallback => "LLM failed or timed out, using keyword rules",
            _ => "Using keyword rules",
        };

        PromptAnalysis {
            tags: rules_result.tags,
            gain_scale: rules_result.gain_scale,
            base_gains,
            confidence: RULES_CONFIDENCE,
            provenance,
            reasoning: Some(reasoning.to_string()),
            tags_to_avoid: Vec::new(),
        }
    }
}
