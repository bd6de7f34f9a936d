use std::future::Future;
use std::sync::Mutex;

use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use super::{KeyEntry, KeyFailure, KeyStatus};

pub const MAX_KEYS: usize = 10;
pub const RETRY_DELAY_MS: u64 = 1000;
pub const KEY_COOLDOWN_MS: i64 = 300_000;
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;
pub const HEALTH_CHECK_INTERVAL_MS: u64 = 60_000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyPoolError {
    #[error("Key already present in pool")]
    DuplicateKey,

    #[error("Key pool is full (capacity {MAX_KEYS})")]
    CapacityReached,

    #[error("No such key: {0}")]
    UnknownKey(String),
}

/// The secret handed out for one call, together with the entry id to
/// report the outcome against.
#[derive(Clone)]
pub struct LeasedKey {
    pub id: String,
    pub secret: SecretString,
}

struct PoolInner {
    entries: Vec<KeyEntry>,
    current_index: usize,
}

/// Ordered pool of API credentials with rotation, cooldown and
/// disable-on-auth-failure. All mutation goes through the pool; entries
/// never leak their secrets into logs or traces.
pub struct KeyPool {
    inner: Mutex<PoolInner>,
}

impl Default for KeyPool {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyPool {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                entries: Vec::new(),
                current_index: 0,
            }),
        }
    }

    pub fn from_secrets(
        secrets: impl IntoIterator<Item = (SecretString, String)>,
    ) -> Result<Self, KeyPoolError> {
        let pool = Self::new();
        for (secret, name) in secrets {
            pool.add(secret, name)?;
        }
        Ok(pool)
    }

    /// Add a credential. Rejects duplicates and additions beyond
    /// capacity; returns the new entry's id.
    pub fn add(&self, secret: SecretString, name: impl Into<String>) -> Result<String, KeyPoolError> {
        let mut inner = self.lock();
        if inner.entries.len() >= MAX_KEYS {
            return Err(KeyPoolError::CapacityReached);
        }
        if inner
            .entries
            .iter()
            .any(|e| e.secret.expose_secret() == secret.expose_secret())
        {
            return Err(KeyPoolError::DuplicateKey);
        }
        let entry = KeyEntry::new(secret, name);
        let id = entry.id.clone();
        log::debug!("key '{}' ({}) added to pool", entry.name, entry.masked_secret());
        inner.entries.push(entry);
        Ok(id)
    }

    /// The first usable key at or after the rotation index, wrapping
    /// around. Entries whose cooldown has lapsed become active again on
    /// observation.
    pub fn get_current(&self) -> Option<LeasedKey> {
        let now = Utc::now();
        let mut inner = self.lock();
        let len = inner.entries.len();
        if len == 0 {
            return None;
        }

        let start = inner.current_index % len;
        for offset in 0..len {
            let idx = (start + offset) % len;
            let entry = &mut inner.entries[idx];

            if entry.status == KeyStatus::Cooldown && entry.cooldown_expired(now) {
                entry.status = KeyStatus::Active;
                entry.cooldown_until = None;
                entry.consecutive_failures = 0;
            }

            if entry.status == KeyStatus::Active && entry.cooldown_expired(now) {
                inner.current_index = idx;
                let entry = &inner.entries[idx];
                return Some(LeasedKey {
                    id: entry.id.clone(),
                    secret: entry.secret.clone(),
                });
            }
        }
        None
    }

    pub fn report_success(&self, id: &str) {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.iter_mut().find(|e| e.id == id) {
            entry.consecutive_failures = 0;
            entry.last_used = Some(Utc::now());
        }
    }

    /// Apply a failure to a key and advance rotation past it.
    pub fn report_failure(&self, id: &str, kind: KeyFailure) {
        let mut inner = self.lock();
        let Some(pos) = inner.entries.iter().position(|e| e.id == id) else {
            return;
        };

        {
            let entry = &mut inner.entries[pos];
            match kind {
                KeyFailure::Authentication => {
                    log::warn!("key '{}' ({}) disabled: authentication failed", entry.name, entry.masked_secret());
                    entry.status = KeyStatus::Disabled;
                }
                KeyFailure::Quota => {
                    log::warn!("key '{}' ({}) cooling down: quota exceeded", entry.name, entry.masked_secret());
                    entry.cooldown_until = Some(Utc::now() + Duration::milliseconds(KEY_COOLDOWN_MS));
                    entry.status = KeyStatus::Cooldown;
                }
                KeyFailure::Other => {
                    entry.consecutive_failures += 1;
                    if entry.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        log::warn!(
                            "key '{}' ({}) cooling down after {} consecutive failures",
                            entry.name,
                            entry.masked_secret(),
                            entry.consecutive_failures
                        );
                        entry.status = KeyStatus::Cooldown;
                        entry.cooldown_until =
                            Some(Utc::now() + Duration::milliseconds(KEY_COOLDOWN_MS));
                    }
                }
            }
        }

        let len = inner.entries.len();
        inner.current_index = (pos + 1) % len;
    }

    /// Everything back to active with counters cleared.
    pub fn reset(&self) {
        let mut inner = self.lock();
        for entry in &mut inner.entries {
            entry.status = KeyStatus::Active;
            entry.consecutive_failures = 0;
            entry.cooldown_until = None;
        }
        inner.current_index = 0;
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently eligible for `get_current`.
    pub fn active_count(&self) -> usize {
        let now = Utc::now();
        self.lock()
            .entries
            .iter()
            .filter(|e| match e.status {
                KeyStatus::Active => e.cooldown_expired(now),
                KeyStatus::Cooldown => e.cooldown_expired(now),
                KeyStatus::Disabled => false,
            })
            .count()
    }

    /// Masked view of the pool for diagnostics and UI surfaces.
    pub fn entries(&self) -> Vec<KeyEntry> {
        self.lock().entries.clone()
    }

    /// Probe every key with a minimal call and update statuses from the
    /// outcomes. The probe runs outside the pool lock.
    pub async fn validate<F, Fut>(&self, probe: F)
    where
        F: Fn(SecretString) -> Fut,
        Fut: Future<Output = Result<(), KeyFailure>>,
    {
        let leases: Vec<LeasedKey> = {
            let inner = self.lock();
            inner
                .entries
                .iter()
                .map(|e| LeasedKey {
                    id: e.id.clone(),
                    secret: e.secret.clone(),
                })
                .collect()
        };

        for lease in leases {
            match probe(lease.secret.clone()).await {
                Ok(()) => {
                    let mut inner = self.lock();
                    if let Some(entry) = inner.entries.iter_mut().find(|e| e.id == lease.id) {
                        entry.status = KeyStatus::Active;
                        entry.consecutive_failures = 0;
                        entry.cooldown_until = None;
                    }
                }
                Err(kind) => self.report_failure(&lease.id, kind),
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn pool_with(n: usize) -> (KeyPool, Vec<String>) {
        let pool = KeyPool::new();
        let ids = (0..n)
            .map(|i| {
                pool.add(secret(&format!("key-secret-{i:04}")), format!("key{i}"))
                    .unwrap()
            })
            .collect();
        (pool, ids)
    }

    #[test]
    fn test_add_rejects_duplicates_and_overflow() {
        let (pool, _) = pool_with(1);
        assert_eq!(
            pool.add(secret("key-secret-0000"), "again"),
            Err(KeyPoolError::DuplicateKey)
        );

        for i in 1..MAX_KEYS {
            pool.add(secret(&format!("other-{i:04}")), format!("k{i}"))
                .unwrap();
        }
        assert_eq!(
            pool.add(secret("one-too-many"), "overflow"),
            Err(KeyPoolError::CapacityReached)
        );
    }

    #[test]
    fn test_rotation_after_failure() {
        let (pool, ids) = pool_with(3);
        let first = pool.get_current().unwrap();
        assert_eq!(first.id, ids[0]);

        pool.report_failure(&ids[0], KeyFailure::Other);
        let second = pool.get_current().unwrap();
        assert_eq!(second.id, ids[1]);
    }

    #[test]
    fn test_auth_failure_disables_key() {
        let (pool, ids) = pool_with(2);
        pool.report_failure(&ids[0], KeyFailure::Authentication);

        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.get_current().unwrap().id, ids[1]);

        // Disabled keys stay disabled even when rotation wraps.
        pool.report_failure(&ids[1], KeyFailure::Other);
        assert_eq!(pool.get_current().unwrap().id, ids[1]);
    }

    #[test]
    fn test_consecutive_failures_cool_key_down() {
        let (pool, ids) = pool_with(2);
        for _ in 0..MAX_CONSECUTIVE_FAILURES {
            pool.report_failure(&ids[0], KeyFailure::Other);
        }

        let current = pool.get_current().unwrap();
        assert_ne!(current.id, ids[0]);

        let entries = pool.entries();
        let cooled = entries.iter().find(|e| e.id == ids[0]).unwrap();
        assert_eq!(cooled.status, KeyStatus::Cooldown);
        assert!(cooled.cooldown_until.is_some());
    }

    #[test]
    fn test_quota_failure_sets_cooldown() {
        let (pool, ids) = pool_with(1);
        pool.report_failure(&ids[0], KeyFailure::Quota);

        assert!(pool.get_current().is_none());
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_success_clears_failure_counter() {
        let (pool, ids) = pool_with(1);
        pool.report_failure(&ids[0], KeyFailure::Other);
        pool.report_failure(&ids[0], KeyFailure::Other);
        pool.report_success(&ids[0]);

        let entries = pool.entries();
        assert_eq!(entries[0].consecutive_failures, 0);
        assert!(entries[0].last_used.is_some());

        // The cleared counter means three more failures are needed.
        pool.report_failure(&ids[0], KeyFailure::Other);
        assert_eq!(pool.entries()[0].status, KeyStatus::Active);
    }

    #[test]
    fn test_reset_restores_all_keys() {
        let (pool, ids) = pool_with(3);
        pool.report_failure(&ids[0], KeyFailure::Authentication);
        pool.report_failure(&ids[1], KeyFailure::Quota);

        pool.reset();
        assert_eq!(pool.active_count(), 3);
        assert_eq!(pool.get_current().unwrap().id, ids[0]);
    }

    #[test]
    fn test_validate_probes_every_key() {
        let (pool, ids) = pool_with(3);

        tokio_test::block_on(pool.validate(|secret| async move {
            if secret.expose_secret().ends_with("0001") {
                Err(KeyFailure::Authentication)
            } else {
                Ok(())
            }
        }));

        assert_eq!(pool.active_count(), 2);
        let entries = pool.entries();
        let bad = entries.iter().find(|e| e.id == ids[1]).unwrap();
        assert_eq!(bad.status, KeyStatus::Disabled);
    }

    #[test]
    fn test_entries_only_expose_masked_secrets() {
        let (pool, _) = pool_with(1);
        let entry = &pool.entries()[0];
        assert_eq!(entry.masked_secret(), "key-…0000");
    }
}
