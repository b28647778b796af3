//! Time-bounded key-value caching.
//!
//! Per-record state machine:
//!
//! ```text
//! absent ──set──► live ──time passes──► expired ──sweep/invalidate──► absent
//! ```
//!
//! A record is readable only while `now < expires_at`; once expired it is
//! logically dead even before it is physically swept. [`TtlCache::get`]
//! returns `None` for both "never set" and "expired" without distinguishing
//! them to callers, which prevents probing for the existence of stale keys.
//!
//! Reads and writes on different keys need no coordination, and
//! [`TtlCache::sweep_expired`] may run concurrently with any other
//! operation: a record observed by a `get` just before the sweep deletes it
//! may be returned once more (last-value-wins), but a torn value can never
//! be observed — the lock guarantees record-level atomicity.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::CacheConfig;
use crate::types::{EncryptedEnvelope, Keypair, SessionRecord};

/// A cached value with its validity window.
#[derive(Debug, Clone)]
pub struct CacheRecord<T> {
    /// The cached value.
    pub value: T,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
    /// When the record stops being readable.
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheRecord<T> {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

fn expiry_for(created_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    created_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A generic expiring key-value store with per-record expiry and sweep.
#[derive(Debug)]
pub struct TtlCache<T> {
    name: &'static str,
    default_ttl: Duration,
    records: RwLock<HashMap<String, CacheRecord<T>>>,
}

impl<T: Clone> TtlCache<T> {
    /// Create an empty cache. `name` labels the partition in logs.
    #[must_use]
    pub fn new(name: &'static str, default_ttl: Duration) -> Self {
        Self { name, default_ttl, records: RwLock::new(HashMap::new()) }
    }

    /// The TTL applied by [`Self::set`].
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Insert or overwrite a record with the partition's default TTL.
    pub async fn set(&self, key: impl Into<String>, value: T) {
        self.set_with_ttl(key, value, self.default_ttl).await;
    }

    /// Insert or overwrite a record with an explicit TTL, resetting its
    /// creation and expiry times. A zero TTL makes the record immediately
    /// unreadable.
    pub async fn set_with_ttl(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let created_at = Utc::now();
        let record = CacheRecord { value, created_at, expires_at: expiry_for(created_at, ttl) };
        self.records.write().await.insert(key.into(), record);
    }

    /// Read a live record, or `None` for both absent and expired records.
    ///
    /// Expired records encountered here are opportunistically deleted.
    pub async fn get(&self, key: &str) -> Option<T> {
        let now = Utc::now();
        {
            let records = self.records.read().await;
            match records.get(key) {
                Some(record) if !record.is_expired_at(now) => return Some(record.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // The record was expired under the read lock; drop it unless a
        // concurrent set already replaced it with a live one.
        let mut records = self.records.write().await;
        if records.get(key).is_some_and(|record| record.is_expired_at(now)) {
            records.remove(key);
        }
        None
    }

    /// Delete every record whose expiry has passed, returning the count.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_key, record| !record.is_expired_at(now));
        let swept = before - records.len();
        if swept > 0 {
            debug!(partition = self.name, swept, "swept expired cache records");
        }
        swept
    }

    /// Delete a record regardless of its expiry. Idempotent.
    pub async fn invalidate(&self, key: &str) {
        self.records.write().await.remove(key);
    }

    /// Drop every record.
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }

    /// Number of physically present records, including expired ones that
    /// have not been swept yet.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the cache holds no records at all.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// The core's three cache partitions, each with an independent default TTL.
///
/// - **keypairs**, keyed by subject id
/// - **wrapped secrets**, keyed by subject + service
/// - **sessions**, keyed by session id
#[derive(Debug)]
pub struct CacheStore {
    keypairs: TtlCache<Keypair>,
    wrapped_secrets: TtlCache<EncryptedEnvelope>,
    sessions: TtlCache<SessionRecord>,
}

impl CacheStore {
    /// Create the partitions with the configured TTLs.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            keypairs: TtlCache::new("keypairs", config.keypair_ttl),
            wrapped_secrets: TtlCache::new("wrapped_secrets", config.wrapped_secret_ttl),
            sessions: TtlCache::new("sessions", config.session_ttl),
        }
    }

    /// Subject keypair partition.
    #[must_use]
    pub fn keypairs(&self) -> &TtlCache<Keypair> {
        &self.keypairs
    }

    /// Wrapped secret partition.
    #[must_use]
    pub fn wrapped_secrets(&self) -> &TtlCache<EncryptedEnvelope> {
        &self.wrapped_secrets
    }

    /// Ephemeral session partition.
    #[must_use]
    pub fn sessions(&self) -> &TtlCache<SessionRecord> {
        &self.sessions
    }

    /// Composite key for the wrapped-secret partition.
    #[must_use]
    pub fn wrapped_secret_key(subject_id: &str, service: &str) -> String {
        format!("{subject_id}/{service}")
    }

    /// Sweep every partition, returning the total number of records
    /// deleted.
    pub async fn sweep_expired(&self) -> usize {
        self.keypairs.sweep_expired().await
            + self.wrapped_secrets.sweep_expired().await
            + self.sessions.sweep_expired().await
    }

    /// Drop everything — the logout/teardown path. The store is immediately
    /// reusable afterwards.
    pub async fn clear_all(&self) {
        self.keypairs.clear().await;
        self.wrapped_secrets.clear().await;
        self.sessions.clear().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_set_then_get_returns_value() {
        let cache: TtlCache<u32> = TtlCache::new("test", Duration::from_secs(60));
        cache.set("a", 7).await;
        assert_eq!(cache.get("a").await, Some(7));
    }

    #[tokio::test]
    async fn test_absent_key_returns_none() {
        let cache: TtlCache<u32> = TtlCache::new("test", Duration::from_secs(60));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_zero_ttl_record_is_immediately_unreadable() {
        let cache: TtlCache<u32> = TtlCache::new("test", Duration::from_secs(60));
        cache.set_with_ttl("a", 7, Duration::ZERO).await;
        assert_eq!(cache.get("a").await, None, "a zero-TTL record must never be readable");
    }

    #[tokio::test]
    async fn test_expired_record_indistinguishable_from_absent() {
        let cache: TtlCache<u32> = TtlCache::new("test", Duration::from_secs(60));
        cache.set_with_ttl("expired", 1, Duration::ZERO).await;
        assert_eq!(cache.get("expired").await, cache.get("never-set").await);
    }

    #[tokio::test]
    async fn test_get_opportunistically_drops_expired_record() {
        let cache: TtlCache<u32> = TtlCache::new("test", Duration::from_secs(60));
        cache.set_with_ttl("a", 7, Duration::ZERO).await;
        assert_eq!(cache.len().await, 1, "expired record still physically present");
        let _ = cache.get("a").await;
        assert_eq!(cache.len().await, 0, "get must drop the expired record it touched");
    }

    #[tokio::test]
    async fn test_set_overwrites_and_resets_expiry() {
        let cache: TtlCache<u32> = TtlCache::new("test", Duration::from_secs(60));
        cache.set_with_ttl("a", 1, Duration::ZERO).await;
        cache.set_with_ttl("a", 2, Duration::from_secs(60)).await;
        assert_eq!(cache.get("a").await, Some(2), "overwrite must revive the key");
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_expired_records() {
        let cache: TtlCache<u32> = TtlCache::new("test", Duration::from_secs(60));
        cache.set_with_ttl("dead1", 1, Duration::ZERO).await;
        cache.set_with_ttl("dead2", 2, Duration::ZERO).await;
        cache.set("live", 3).await;

        assert_eq!(cache.sweep_expired().await, 2);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("live").await, Some(3));
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let cache: TtlCache<u32> = TtlCache::new("test", Duration::from_secs(60));
        cache.set("a", 7).await;
        cache.invalidate("a").await;
        cache.invalidate("a").await;
        assert_eq!(cache.get("a").await, None);
    }

    #[tokio::test]
    async fn test_concurrent_sweep_and_writes() {
        let cache: Arc<TtlCache<u32>> = Arc::new(TtlCache::new("test", Duration::from_secs(60)));

        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for i in 0..100u32 {
                    cache.set(format!("k{i}"), i).await;
                }
            })
        };
        let sweeper = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    let _ = cache.sweep_expired().await;
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        sweeper.await.unwrap();
        assert_eq!(cache.len().await, 100, "sweep must never delete live records");
    }

    #[tokio::test]
    async fn test_store_partitions_and_teardown() {
        let store = CacheStore::new(&CacheConfig::default());
        store.sessions().set("s1", SessionRecord::new("subject-1")).await;
        store
            .wrapped_secrets()
            .set(
                CacheStore::wrapped_secret_key("subject-1", "vault"),
                EncryptedEnvelope {
                    kem_ciphertext: vec![1],
                    aead_ciphertext: vec![2],
                    nonce: [0u8; 12],
                    algorithm_id: "x25519-aes-256-gcm".to_string(),
                },
            )
            .await;

        assert_eq!(store.sessions().len().await, 1);
        assert_eq!(store.wrapped_secrets().len().await, 1);

        store.clear_all().await;
        assert!(store.sessions().is_empty().await);
        assert!(store.wrapped_secrets().is_empty().await);
        assert!(store.keypairs().is_empty().await);
    }

    #[tokio::test]
    async fn test_default_ttls_are_per_partition() {
        let store = CacheStore::new(&CacheConfig::default());
        assert_eq!(store.keypairs().default_ttl(), Duration::from_secs(24 * 60 * 60));
        assert_eq!(store.wrapped_secrets().default_ttl(), Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(store.sessions().default_ttl(), Duration::from_secs(60 * 60));
    }
}
