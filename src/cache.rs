//! # In-process TTL Caches
//!
//! Process-local state with a bounded lifetime: the ephemeral encryption
//! keys advertised to wallets by the verification leg, the documents that
//! leg resolves per session, and the sliding window of seen DPoP `jti`
//! values. Entries expire lazily on access; a deployment can additionally
//! call `purge_expired` from a background sweeper.
//!
//! A multi-instance deployment either pins sessions to an instance or
//! implements [`crate::provider::Caches`] over a shared store.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use josekit::jwk::alg::ec::{EcCurve, EcKeyPair};

use crate::document::CompleteDocument;
use crate::jose::jwk::PublicKeyJwk;
use crate::state::Expire;

/// A concurrent map whose entries expire after a fixed time-to-live.
#[derive(Debug)]
pub struct TtlMap<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (DateTime<Utc>, V)>>,
}

impl<V: Clone> TtlMap<V> {
    /// Create a map whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    /// Insert an entry, resetting its time-to-live.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.into(), (Utc::now() + self.ttl, value));
    }

    /// Insert an entry only if no live entry exists for the key. Returns
    /// `false` if a live entry was already present.
    pub fn insert_if_absent(&self, key: impl Into<String>, value: V) -> bool {
        let key = key.into();
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.get(&key).is_some_and(|(expires_at, _)| *expires_at > now) {
            return false;
        }
        entries.insert(key, (now + self.ttl, value));
        true
    }

    /// Look up a live entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.get(key).is_some_and(|(expires_at, _)| *expires_at <= now) {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|(_, value)| value.clone())
    }

    /// Remove an entry, returning it if it was still live.
    pub fn remove(&self, key: &str) -> Option<V> {
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key).filter(|(expires_at, _)| *expires_at > now).map(|(_, value)| value)
    }

    /// Drop all expired entries. Intended for a periodic background
    /// sweeper.
    pub fn purge_expired(&self) {
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, (expires_at, _)| *expires_at > now);
    }
}

/// Ephemeral ECDH P-256 keys, keyed by the 32-byte
/// `ephemeral_encryption_key_id` carried on an authorization context.
///
/// Keys are created by the verification leg when building a request object
/// and consumed when the wallet's encrypted response arrives. They are
/// never written to persistent storage.
#[derive(Debug)]
pub struct EphemeralKeys {
    keys: TtlMap<EcKeyPair>,
}

impl EphemeralKeys {
    /// Create an empty key store with the standard time-to-live.
    #[must_use]
    pub fn new() -> Self {
        Self { keys: TtlMap::new(Expire::EphemeralKey.duration()) }
    }

    /// Return the public JWK for `kid`, generating a new key pair if none
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails.
    pub fn get_or_create(&self, kid: &str) -> Result<PublicKeyJwk> {
        let key_pair = match self.keys.get(kid) {
            Some(key_pair) => key_pair,
            None => {
                let key_pair = EcKeyPair::generate(EcCurve::P256)?;
                self.keys.insert(kid, key_pair.clone());
                key_pair
            }
        };

        let mut jwk = PublicKeyJwk::from_josekit(&key_pair.to_jwk_public_key())?;
        jwk.kid = Some(kid.to_string());
        jwk.use_ = Some("enc".to_string());
        jwk.alg = Some("ECDH-ES".to_string());
        Ok(jwk)
    }

    /// Look up the private key pair for `kid`.
    #[must_use]
    pub fn key_pair(&self, kid: &str) -> Option<EcKeyPair> {
        self.keys.get(kid)
    }

    /// Discard the key for `kid`, once the verification leg has completed.
    pub fn remove(&self, kid: &str) {
        self.keys.remove(kid);
    }

    /// Drop all expired keys.
    pub fn purge_expired(&self) {
        self.keys.purge_expired();
    }
}

impl Default for EphemeralKeys {
    fn default() -> Self {
        Self::new()
    }
}

/// Documents resolved by the verification leg, keyed by session id. Each
/// entry maps `authentic_source` to the complete document that source
/// holds for the verified identity.
#[derive(Debug)]
pub struct DocumentCache {
    documents: TtlMap<HashMap<String, CompleteDocument>>,
}

impl DocumentCache {
    /// Create an empty cache with the standard time-to-live.
    #[must_use]
    pub fn new() -> Self {
        Self { documents: TtlMap::new(Expire::Document.duration()) }
    }

    /// Store the documents resolved for a session.
    pub fn put(&self, session_id: impl Into<String>, documents: HashMap<String, CompleteDocument>) {
        self.documents.insert(session_id, documents);
    }

    /// The documents resolved for a session, if the entry is still live.
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<HashMap<String, CompleteDocument>> {
        self.documents.get(session_id)
    }

    /// Drop all expired entries.
    pub fn purge_expired(&self) {
        self.documents.purge_expired();
    }
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Sliding window of DPoP `jti` values already accepted, per
/// [RFC 9449 §11.1](https://www.rfc-editor.org/rfc/rfc9449.html#section-11.1).
#[derive(Debug)]
pub struct ReplayCache {
    seen: TtlMap<()>,
}

impl ReplayCache {
    /// Create an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self { seen: TtlMap::new(Expire::ProofWindow.duration()) }
    }

    /// Record a `jti`. Returns `false` if it was already seen within the
    /// window.
    pub fn insert(&self, jti: &str) -> bool {
        self.seen.insert_if_absent(jti, ())
    }

    /// Drop all expired entries.
    pub fn purge_expired(&self) {
        self.seen.purge_expired();
    }
}

impl Default for ReplayCache {
    fn default() -> Self {
        Self::new()
    }
}
