//! Nonce replay tracking.
//!
//! Timestamp freshness alone lets a captured request be replayed any number of
//! times inside the lifetime window. A [`NonceStore`] closes that gap by
//! remembering every accepted `(KeyID, Nonce)` pair until the signature it
//! belonged to would have expired anyway.
//!
//! Tracking is opt-in: pass a store to
//! [`Verifier::with_nonce_store`](crate::verifier::Verifier::with_nonce_store).

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::error::AuthError;

/// Trait for recording consumed nonces.
///
/// Implementations must make the check and the insert a single atomic step so
/// two concurrent requests carrying the same nonce cannot both pass.
pub trait NonceStore: Send + Sync {
    /// Record `nonce` for `key_id`, valid until the unix time `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NonceReused`] if the pair was already recorded and
    /// has not expired at `now`, or [`AuthError::Internal`] if the store cannot
    /// take another entry.
    fn check_and_insert(
        &self,
        key_id: &str,
        nonce: i64,
        now: i64,
        expires_at: i64,
    ) -> Result<(), AuthError>;
}

/// In-memory nonce store backed by a [`DashMap`].
///
/// Entries expire at the unix time they were recorded with. Expired entries
/// are overwritten on reuse and dropped by [`InMemoryNonceStore::purge_expired`],
/// which also runs automatically when the store reaches its capacity. A store
/// still full after purging refuses new nonces with [`AuthError::Internal`].
#[derive(Debug)]
pub struct InMemoryNonceStore {
    seen: DashMap<(String, i64), i64>,
    capacity: usize,
}

impl InMemoryNonceStore {
    /// Create a store that purges expired entries once it holds `capacity`
    /// nonces.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Drop every entry that has expired at `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: i64) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, expires_at| *expires_at > now);
        let removed = before.saturating_sub(self.seen.len());
        if removed > 0 {
            debug!(removed, "purged expired nonces");
        }
        removed
    }

    /// Number of tracked nonces, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the store tracks no nonces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl NonceStore for InMemoryNonceStore {
    fn check_and_insert(
        &self,
        key_id: &str,
        nonce: i64,
        now: i64,
        expires_at: i64,
    ) -> Result<(), AuthError> {
        let full = self.seen.len() >= self.capacity && {
            self.purge_expired(now);
            self.seen.len() >= self.capacity
        };

        match self.seen.entry((key_id.to_owned(), nonce)) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > now {
                    warn!(key_id, nonce, "rejecting replayed nonce");
                    return Err(AuthError::NonceReused {
                        key_id: key_id.to_owned(),
                        nonce,
                    });
                }
                entry.insert(expires_at);
            }
            Entry::Vacant(_) if full => {
                warn!(
                    capacity = self.capacity,
                    "nonce store is full of unexpired entries"
                );
                return Err(AuthError::Internal(format!(
                    "nonce store full ({} unexpired entries)",
                    self.capacity
                )));
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
            }
        }

        Ok(())
    }
}
