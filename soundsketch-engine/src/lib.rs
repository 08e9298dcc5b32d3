//! soundsketch-engine library interface
//!
//! Exposes the pipeline and the HTTP surface for integration testing.

pub mod api;
pub mod cache;
pub mod db;
pub mod error;
pub mod models;
pub mod providers;
pub mod scene;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use crate::cache::SearchCache;
use crate::providers::{LanguageModel, SearchProvider};
use crate::scene::Scene;
use crate::services::{
    CandidateFetcher, FreesoundClient, GenerationOutcome, Generator, LayerBuilder, LlmClient,
    ShortfallBackfill, SwapResolver, TagResolver, WhitelistCatalog,
};
use axum::Router;
use chrono::{DateTime, Utc};
use soundsketch_common::config::TomlConfig;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, RwLockWriteGuard};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool backing the result cache
    pub db: SqlitePool,
    pub config: Arc<TomlConfig>,
    /// Current scene; replaced wholesale by each committed generation
    pub scene: Arc<RwLock<Scene>>,
    /// Generation epoch: a generation only commits if the epoch it started
    /// under is still current when it finishes
    pub epoch: Arc<AtomicU64>,
    pub generator: Arc<Generator>,
    pub fetcher: Arc<CandidateFetcher>,
    pub builder: Arc<LayerBuilder>,
    pub swap: Arc<SwapResolver>,
    pub llm: Option<Arc<dyn LanguageModel>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// Wire up real collaborators from configuration. The search provider
    /// is required; a missing or disabled LLM degrades to the rules tier.
    pub fn new(db: SqlitePool, config: TomlConfig) -> soundsketch_common::Result<Self> {
        let search = FreesoundClient::new(&config.search)
            .map_err(|e| soundsketch_common::Error::Config(e.to_string()))?;

        let llm: Option<Arc<dyn LanguageModel>> = match LlmClient::new(&config.llm) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::info!(reason = %e, "language model unavailable, rules tier only");
                None
            }
        };

        Ok(Self::with_providers(db, config, Arc::new(search), llm))
    }

    /// Wire up with explicit collaborators. Tests inject mocks here.
    pub fn with_providers(
        db: SqlitePool,
        config: TomlConfig,
        search: Arc<dyn SearchProvider>,
        llm: Option<Arc<dyn LanguageModel>>,
    ) -> Self {
        let ttl = Duration::from_secs(config.cache.ttl_hours * 3600);
        let search_timeout = Duration::from_secs(config.search.timeout_secs);
        let backfill_timeout = Duration::from_secs(config.search.backfill_timeout_secs);
        let llm_timeout = Duration::from_secs(config.llm.timeout_secs);

        let cache = SearchCache::new(db.clone(), ttl);
        let whitelist = Arc::new(WhitelistCatalog::new());
        let fetcher = Arc::new(CandidateFetcher::new(
            cache,
            search,
            whitelist,
            search_timeout,
        ));
        let builder = Arc::new(LayerBuilder::new(llm.clone()));
        let backfill = ShortfallBackfill::new(
            Arc::clone(&fetcher),
            llm.clone(),
            backfill_timeout,
            llm_timeout,
        );
        let resolver = TagResolver::new(llm.clone(), llm_timeout);
        let generator = Arc::new(Generator::new(
            resolver,
            Arc::clone(&fetcher),
            Arc::clone(&builder),
            backfill,
        ));
        let swap = Arc::new(SwapResolver::new(
            Arc::clone(&fetcher),
            Arc::clone(&builder),
        ));

        Self {
            db,
            config: Arc::new(config),
            scene: Arc::new(RwLock::new(Scene::new())),
            epoch: Arc::new(AtomicU64::new(0)),
            generator,
            fetcher,
            builder,
            swap,
            llm,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Commit one generation's result as the current scene, unless a newer
    /// generation has started in the meantime.
    ///
    /// The epoch is checked under the scene write lock, so a stale result
    /// can never land after a fresher one has already been installed.
    /// Returns the scene guard on success so the caller can project the
    /// committed state, or `None` when the generation was superseded.
    pub async fn commit_generation(
        &self,
        epoch: u64,
        prompt: String,
        outcome: GenerationOutcome,
    ) -> Option<RwLockWriteGuard<'_, Scene>> {
        let mut scene = self.scene.write().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::info!(epoch, "generation superseded, discarding result");
            return None;
        }
        scene.install(prompt, outcome.analysis, outcome.layers, outcome.alternates);
        Some(scene)
    }

    /// Record a failure for the health endpoint's diagnostics.
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::generate_routes())
        .merge(api::scene_routes())
        .merge(api::health_routes())
        .with_state(state)
}
