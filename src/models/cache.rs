use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One memoized question -> result mapping.
///
/// The payload is immutable after creation; only `hit_count` changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedQuery {
    pub id: String,
    /// Canonicalized question text used as the similarity basis
    pub normalized_question: String,
    /// The generated query or filter that produced the result, kept for audit
    pub query_text: String,
    /// Serialized columns + rows
    pub result_json: String,
    pub created_at: DateTime<Utc>,
    /// None or 0 means the entry never expires
    pub ttl_seconds: Option<i64>,
    pub hit_count: i64,
}

impl CachedQuery {
    pub fn new(
        normalized_question: impl Into<String>,
        query_text: impl Into<String>,
        result_json: impl Into<String>,
        ttl_seconds: Option<i64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            normalized_question: normalized_question.into(),
            query_text: query_text.into(),
            result_json: result_json.into(),
            created_at: Utc::now(),
            ttl_seconds,
            hit_count: 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.ttl_seconds {
            None | Some(0) => false,
            Some(ttl) => now > self.created_at + Duration::seconds(ttl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundaries() {
        let entry = CachedQuery::new("q", "SELECT 1", "{}", Some(60));
        let created = entry.created_at;

        // Included one second before the deadline, excluded one second after
        assert!(!entry.is_expired_at(created + Duration::seconds(59)));
        assert!(entry.is_expired_at(created + Duration::seconds(61)));
    }

    #[test]
    fn test_zero_and_missing_ttl_never_expire() {
        let never = CachedQuery::new("q", "SELECT 1", "{}", None);
        assert!(!never.is_expired_at(never.created_at + Duration::days(10_000)));

        let zero = CachedQuery::new("q", "SELECT 1", "{}", Some(0));
        assert!(!zero.is_expired_at(zero.created_at + Duration::days(10_000)));
    }
}
