//! Result cache
//!
//! Keyed JSON payloads in SQLite with creation timestamps. Entries older
//! than the configured TTL are stale; entries written under a superseded
//! key-format version are purged wholesale. The cache is a pure
//! optimization: every write is best-effort at the call sites, and a
//! failed read is treated as a miss.
//!
//! Key formats are load-bearing for interop and must not drift:
//! - per-generation bundle: `<version>:prompt|<lowercased trimmed prompt>`
//! - individually cached whitelist recording: `<version>:wl:<id>`

use chrono::{DateTime, Utc};
use soundsketch_common::Result;
use sqlx::SqlitePool;
use std::time::Duration;

/// Current key-format version prefix.
pub const CACHE_VERSION: &str = "v2";

/// Superseded key-format prefixes, purged on sight.
pub const OBSOLETE_PREFIXES: &[&str] = &["v1:"];

const WHITELIST_PREFIX: &str = "wl:";

/// Cache key for a whole generation's tag → search-response bundle.
///
/// Keyed on the normalized prompt, not on the resolved tags: all tags of
/// one prompt live together so hit/miss is reported once per generation.
pub fn prompt_key(prompt: &str) -> String {
    format!("{}:prompt|{}", CACHE_VERSION, prompt.trim().to_lowercase())
}

/// Cache key for one whitelist recording fetched by id.
pub fn whitelist_key(id: u64) -> String {
    format!("{}:{}{}", CACHE_VERSION, WHITELIST_PREFIX, id)
}

/// A stored entry: creation instant plus opaque JSON payload.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl CacheEntry {
    pub fn age(&self) -> Duration {
        let millis = Utc::now()
            .signed_duration_since(self.created_at)
            .num_milliseconds()
            .max(0);
        Duration::from_millis(millis as u64)
    }
}

/// SQLite-backed key-value cache with TTL staleness.
#[derive(Clone)]
pub struct SearchCache {
    pool: SqlitePool,
    ttl: Duration,
}

impl SearchCache {
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a key. Absent and present-but-stale are both returned so the
    /// caller can report MISS vs STALE; stale payloads are never used for
    /// building layers.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT created_at, payload FROM search_cache WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((millis, payload)) => {
                let created_at = DateTime::<Utc>::from_timestamp_millis(millis)
                    .unwrap_or_else(Utc::now);
                let payload = serde_json::from_str(&payload).map_err(|e| {
                    soundsketch_common::Error::Internal(format!(
                        "corrupt cache payload for {key}: {e}"
                    ))
                })?;
                Ok(Some(CacheEntry {
                    created_at,
                    payload,
                }))
            }
            None => Ok(None),
        }
    }

    /// True if the entry is still within the TTL.
    pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
        entry.age() <= self.ttl
    }

    /// Store a payload, stamping the current time. Overwrites any previous
    /// entry under the same key.
    pub async fn set(&self, key: &str, payload: &serde_json::Value) -> Result<()> {
        sqlx::query(
            "INSERT INTO search_cache (key, created_at, payload) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET created_at = excluded.created_at, \
             payload = excluded.payload",
        )
        .bind(key)
        .bind(Utc::now().timestamp_millis())
        .bind(payload.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete entries older than the TTL. Returns the number evicted.
    pub async fn evict_expired(&self) -> Result<u64> {
        let cutoff = Utc::now().timestamp_millis() - self.ttl.as_millis() as i64;
        let result = sqlx::query("DELETE FROM search_cache WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete every entry under a key prefix.
    pub async fn purge_prefix(&self, prefix: &str) -> Result<u64> {
        // LIKE escape is unnecessary: version prefixes contain no wildcards
        let result = sqlx::query("DELETE FROM search_cache WHERE key LIKE ? || '%'")
            .bind(prefix)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Purge every superseded key-format version.
    pub async fn purge_obsolete(&self) -> Result<u64> {
        let mut purged = 0;
        for prefix in OBSOLETE_PREFIXES {
            purged += self.purge_prefix(prefix).await?;
        }
        Ok(purged)
    }

    /// Drop everything.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM search_cache")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
