//! Pipeline services
//!
//! The tag-resolution and candidate-selection pipeline, stage by stage:
//! rules and LLM tag resolution, per-tag candidate fetch with whitelist
//! fallback, scoring and layer construction, shortfall backfill, swaps,
//! and the generation orchestrator tying them together.

pub mod backfill;
pub mod candidate_fetcher;
pub mod freesound_client;
pub mod generator;
pub mod layer_builder;
pub mod llm_client;
pub mod rules;
pub mod scoring;
pub mod swap_resolver;
pub mod tag_resolver;
pub mod whitelist;

pub use backfill::ShortfallBackfill;
pub use candidate_fetcher::CandidateFetcher;
pub use freesound_client::FreesoundClient;
pub use generator::{GenerationOutcome, Generator};
pub use layer_builder::LayerBuilder;
pub use llm_client::LlmClient;
pub use swap_resolver::{SwapOutcome, SwapResolver};
pub use tag_resolver::TagResolver;
pub use whitelist::WhitelistCatalog;
