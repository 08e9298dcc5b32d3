//! Per-tag candidate fetching
//!
//! One generation's tags are fetched concurrently and cached together
//! under a single prompt-derived key, so the cache reports one HIT, MISS
//! or STALE per generation rather than one per tag. A tag whose live
//! search fails or comes back empty falls back to the curated whitelist;
//! a tag with neither simply yields zero candidates. Failures never cross
//! tag boundaries.

use crate::cache::{self, SearchCache};
use crate::models::{CacheStatus, Recording, SearchResponse};
use crate::providers::{SearchProvider, TagQuery};
use crate::services::whitelist::WhitelistCatalog;
use futures::future::join_all;
use soundsketch_common::bounded;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Result of fetching all tags for one generation.
#[derive(Debug)]
pub struct FetchOutcome {
    pub cache_status: CacheStatus,
    pub by_tag: HashMap<String, SearchResponse>,
}

pub struct CandidateFetcher {
    cache: SearchCache,
    search: Arc<dyn SearchProvider>,
    whitelist: Arc<WhitelistCatalog>,
    search_timeout: Duration,
}

impl CandidateFetcher {
    pub fn new(
        cache: SearchCache,
        search: Arc<dyn SearchProvider>,
        whitelist: Arc<WhitelistCatalog>,
        search_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            search,
            whitelist,
            search_timeout,
        }
    }

    /// Fetch candidates for every tag of one generation, cache-checked
    /// under the prompt key.
    pub async fn fetch_for_prompt(
        &self,
        prompt: &str,
        tags: &[String],
        exclude_tags: &[String],
    ) -> FetchOutcome {
        let key = cache::prompt_key(prompt);
        let mut status = CacheStatus::Miss;

        match self.cache.get(&key).await {
            Ok(Some(entry)) => {
                if self.cache.is_fresh(&entry) {
                    match serde_json::from_value::<HashMap<String, SearchResponse>>(
                        entry.payload.clone(),
                    ) {
                        Ok(cached) if tags.iter().all(|t| cached.contains_key(t)) => {
                            tracing::info!(key = %key, "cache hit");
                            let by_tag = cached
                                .into_iter()
                                .filter(|(tag, _)| tags.contains(tag))
                                .collect();
                            return FetchOutcome {
                                cache_status: CacheStatus::Hit,
                                by_tag,
                            };
                        }
                        Ok(_) => {
                            // Same prompt resolved to a different tag set
                            // (LLM nondeterminism); refetch the whole bundle.
                            tracing::info!(key = %key, "cache entry lacks resolved tags, refetching");
                        }
                        Err(e) => {
                            tracing::warn!(key = %key, error = %e, "cache payload unreadable");
                        }
                    }
                } else {
                    tracing::info!(key = %key, "cache entry stale");
                    status = CacheStatus::Stale;
                }
            }
            Ok(None) => {
                tracing::info!(key = %key, "cache miss");
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed, treating as miss");
            }
        }

        // Opportunistic maintenance after the read, so an expired bundle
        // for this prompt is still observed and reported stale before it
        // is dropped. Best-effort, the cache is never a correctness
        // dependency.
        if let Err(e) = self.cache.evict_expired().await {
            tracing::warn!(error = %e, "cache eviction failed");
        }
        if let Err(e) = self.cache.purge_obsolete().await {
            tracing::warn!(error = %e, "obsolete-prefix purge failed");
        }

        // Fan out per tag; per-tag failures are isolated.
        let fetches = tags.iter().map(|tag| {
            let query = TagQuery::with_exclusions(tag.clone(), exclude_tags.to_vec());
            async move { (tag.clone(), self.fetch_tag_with_fallback(&query).await) }
        });
        let by_tag: HashMap<String, SearchResponse> = join_all(fetches).await.into_iter().collect();

        // Store the full bundle unconditionally, empty tags included, so
        // repeat requests for the same prompt are fast.
        match serde_json::to_value(&by_tag) {
            Ok(payload) => {
                if let Err(e) = self.cache.set(&key, &payload).await {
                    tracing::warn!(key = %key, error = %e, "cache write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "cache payload serialization failed"),
        }

        FetchOutcome {
            cache_status: status,
            by_tag,
        }
    }

    /// One tag: bounded live search, then whitelist fallback.
    pub async fn fetch_tag_with_fallback(&self, query: &TagQuery) -> SearchResponse {
        match bounded(self.search_timeout, self.search.search_tag(query)).await {
            Ok(response) if !response.results.is_empty() => return response,
            Ok(_) => {
                tracing::info!(tag = %query.tag, "search returned no results");
            }
            Err(e) => {
                tracing::warn!(
                    tag = %query.tag,
                    timed_out = e.is_timeout(),
                    error = %e,
                    "search failed"
                );
            }
        }
        self.whitelist_fallback(&query.tag).await
    }

    /// One tag: bounded live search only, no fallback. Used by backfill,
    /// which wants breadth over persistence.
    pub async fn fetch_tag_search_only(
        &self,
        query: &TagQuery,
        timeout: Duration,
    ) -> Vec<Recording> {
        match bounded(timeout, self.search.search_tag(query)).await {
            Ok(response) => response.results,
            Err(e) => {
                tracing::warn!(
                    tag = %query.tag,
                    timed_out = e.is_timeout(),
                    error = %e,
                    "backfill search failed"
                );
                Vec::new()
            }
        }
    }

    /// Whitelist fallback: next curated id in rotation, served from the
    /// per-id cache when possible.
    async fn whitelist_fallback(&self, tag: &str) -> SearchResponse {
        let Some(id) = self.whitelist.pick(tag) else {
            tracing::info!(tag = %tag, "no whitelist entry, tag yields zero candidates");
            return SearchResponse::default();
        };

        let key = cache::whitelist_key(id);
        if let Ok(Some(entry)) = self.cache.get(&key).await {
            if self.cache.is_fresh(&entry) {
                if let Ok(recording) = serde_json::from_value::<Recording>(entry.payload.clone()) {
                    tracing::info!(tag = %tag, id, "whitelist recording served from cache");
                    return SearchResponse::single(recording);
                }
            }
        }

        match bounded(self.search_timeout, self.search.lookup(id)).await {
            Ok(recording) => {
                if let Ok(payload) = serde_json::to_value(&recording) {
                    if let Err(e) = self.cache.set(&key, &payload).await {
                        tracing::warn!(key = %key, error = %e, "whitelist cache write failed");
                    }
                }
                tracing::info!(tag = %tag, id, "whitelist recording fetched");
                SearchResponse::single(recording)
            }
            Err(e) => {
                tracing::warn!(tag = %tag, id, error = %e, "whitelist lookup failed");
                SearchResponse::default()
            }
        }
    }
}
