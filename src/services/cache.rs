// Semantic result cache.
//
// Maps normalized natural-language questions to previously computed results.
// Lookup is an approximate match: token-set Jaccard similarity against every
// non-expired entry, linear scan. Fine for small-to-moderate cache sizes;
// there is no index and no eviction.

use std::collections::HashSet;
use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::models::CachedQuery;
use crate::storage::SqliteStorage;

/// Canonicalize question text: collapse whitespace runs, trim, lower-case.
/// Idempotent.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Extract the set of alphanumeric words from a string. Everything except
/// lowercase letters, digits and whitespace is stripped before splitting.
fn tokenize(text: &str) -> HashSet<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

/// Jaccard index over token sets: |intersection| / |union|.
///
/// Two empty token sets count as an exact match (1.0); exactly one empty
/// set scores 0.0.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f64 / union as f64
}

/// Convert a configured percentage (0-100) into a fraction clamped to [0, 1]
pub fn threshold_fraction(percent: u32) -> f64 {
    (percent as f64 / 100.0).clamp(0.0, 1.0)
}

/// Cache API over the durable store. Entries are created on cache misses,
/// read-only afterwards except for hit-count increments, and never deleted.
#[derive(Clone)]
pub struct SemanticCache {
    storage: Arc<SqliteStorage>,
}

impl SemanticCache {
    pub fn new(storage: Arc<SqliteStorage>) -> Self {
        Self { storage }
    }

    /// Best non-expired entry scoring at or above `threshold`, with its
    /// score. Ties keep the first-encountered entry.
    pub async fn find(
        &self,
        normalized_question: &str,
        threshold: f64,
    ) -> Result<Option<(CachedQuery, f64)>, AppError> {
        let entries = self.storage.list_cached_queries().await?;

        let mut best: Option<(CachedQuery, f64)> = None;
        for entry in entries {
            if entry.is_expired() {
                continue;
            }
            let score = jaccard_similarity(normalized_question, &entry.normalized_question);
            if score >= threshold && best.as_ref().map_or(true, |(_, b)| score > *b) {
                best = Some((entry, score));
            }
        }
        Ok(best)
    }

    /// Persist a new entry unconditionally. Near-duplicate questions produce
    /// new entries rather than updating old ones.
    pub async fn store(
        &self,
        normalized_question: &str,
        query_text: &str,
        result: &serde_json::Value,
        ttl_seconds: Option<i64>,
    ) -> Result<CachedQuery, AppError> {
        let entry = CachedQuery::new(
            normalized_question,
            query_text,
            result.to_string(),
            ttl_seconds,
        );
        self.storage.insert_cached_query(&entry).await?;
        tracing::debug!("Cached result for question: {}", normalized_question);
        Ok(entry)
    }

    /// Increment the served-hit counter for an entry
    pub async fn record_hit(&self, entry: &CachedQuery) -> Result<(), AppError> {
        self.storage.increment_cache_hit(&entry.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_collapses_and_lowercases() {
        assert_eq!(normalize("  Show   ALL\tusers \n"), "show all users");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("  How   Many ORDERS?  ");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_similarity_symmetry_and_identity() {
        let a = "show me all users";
        let b = "list the active accounts";
        assert_eq!(jaccard_similarity(a, b), jaccard_similarity(b, a));
        assert_eq!(jaccard_similarity(a, a), 1.0);
    }

    #[test]
    fn test_similarity_bounds() {
        let pairs = [
            ("show me all users", "show all users"),
            ("count orders", "delete everything"),
            ("a b c", "c d e"),
        ];
        for (a, b) in pairs {
            let score = jaccard_similarity(a, b);
            assert!((0.0..=1.0).contains(&score), "score {} out of bounds", score);
        }
    }

    #[test]
    fn test_similarity_empty_token_sets() {
        assert_eq!(jaccard_similarity("", ""), 1.0);
        assert_eq!(jaccard_similarity("!!!", "???"), 1.0); // both tokenize to nothing
        assert_eq!(jaccard_similarity("users", ""), 0.0);
        assert_eq!(jaccard_similarity("", "users"), 0.0);
    }

    #[test]
    fn test_similarity_punctuation_stripped() {
        assert_eq!(jaccard_similarity("show users!", "show users"), 1.0);
    }

    #[test]
    fn test_show_me_all_users_scores_three_quarters() {
        // {show, me, all, users} vs {show, all, users}: intersection 3, union 4
        let score = jaccard_similarity("show me all users", "show all users");
        assert!((score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_fraction_clamped() {
        assert_eq!(threshold_fraction(90), 0.9);
        assert_eq!(threshold_fraction(0), 0.0);
        assert_eq!(threshold_fraction(150), 1.0);
    }

    async fn cache_fixture(dir: &tempfile::TempDir) -> SemanticCache {
        let storage = SqliteStorage::new(dir.path().join("test.db")).await.unwrap();
        SemanticCache::new(Arc::new(storage))
    }

    #[tokio::test]
    async fn test_store_then_exact_find_round_trip() {
        let dir = tempdir().unwrap();
        let cache = cache_fixture(&dir).await;

        let result = serde_json::json!({"columns": ["id"], "rows": [[1]]});
        let stored = cache
            .store("show all users", "SELECT * FROM users", &result, Some(86400))
            .await
            .unwrap();

        let (found, score) = cache.find("show all users", 1.0).await.unwrap().unwrap();
        assert_eq!(found.id, stored.id);
        assert_eq!(score, 1.0);
        assert_eq!(found.result_json, result.to_string());
    }

    #[tokio::test]
    async fn test_find_respects_threshold() {
        let dir = tempdir().unwrap();
        let cache = cache_fixture(&dir).await;

        let result = serde_json::json!({"columns": [], "rows": []});
        cache
            .store("show all users", "SELECT * FROM users", &result, None)
            .await
            .unwrap();

        // Score 0.75: below 0.9, at or above 0.7
        assert!(cache.find("show me all users", 0.9).await.unwrap().is_none());
        let hit = cache.find("show me all users", 0.7).await.unwrap().unwrap();
        assert!((hit.1 - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_find_skips_expired_entries() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(SqliteStorage::new(dir.path().join("test.db")).await.unwrap());
        let cache = SemanticCache::new(storage.clone());

        // Entry whose TTL elapsed before the lookup
        let mut expired = CachedQuery::new("show all users", "SELECT 1", "{}", Some(60));
        expired.created_at = chrono::Utc::now() - chrono::Duration::seconds(120);
        storage.insert_cached_query(&expired).await.unwrap();

        assert!(cache.find("show all users", 1.0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_hit_increments_counter() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(SqliteStorage::new(dir.path().join("test.db")).await.unwrap());
        let cache = SemanticCache::new(storage.clone());

        let result = serde_json::json!({"columns": [], "rows": []});
        let entry = cache.store("count orders", "SELECT COUNT(*)", &result, None).await.unwrap();
        assert_eq!(entry.hit_count, 0);

        cache.record_hit(&entry).await.unwrap();
        cache.record_hit(&entry).await.unwrap();

        let entries = storage.list_cached_queries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hit_count, 2);
    }

    #[tokio::test]
    async fn test_near_duplicates_create_new_entries() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(SqliteStorage::new(dir.path().join("test.db")).await.unwrap());
        let cache = SemanticCache::new(storage.clone());

        let result = serde_json::json!({"columns": [], "rows": []});
        cache.store("show all users", "SELECT 1", &result, None).await.unwrap();
        cache.store("show me all users", "SELECT 1", &result, None).await.unwrap();

        assert_eq!(storage.list_cached_queries().await.unwrap().len(), 2);
    }
}
