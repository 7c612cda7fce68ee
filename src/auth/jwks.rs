// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Cache Model
//!
//! - The cache holds one immutable [`SigningKeySet`] snapshot. A refresh builds
//!   a new snapshot and swaps it in; readers never see a half-updated set.
//! - A cached key is trusted until the provider rotates it away. Only an
//!   unknown `kid`, an explicit [`KeySetCache::invalidate`], or (if configured)
//!   a snapshot older than the max age triggers a fetch.
//! - Refreshes are coalesced: concurrent misses wait on a single fetch and
//!   all of them observe its result, failures included.
//!
//! ## Security
//!
//! - Symmetric (`oct`) keys and encryption keys in the document are ignored.
//! - Each key only accepts the algorithm(s) of its own family.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

use super::error::AuthError;
use crate::config::AuthConfig;

/// Public key material for one `kid`.
#[derive(Clone)]
pub struct KeyMaterial {
    kid: String,
    algorithms: Vec<Algorithm>,
    key: DecodingKey,
}

impl KeyMaterial {
    /// Build key material from a JWK.
    ///
    /// Returns `Ok(None)` for entries that are not asymmetric signing keys.
    fn from_jwk(kid: &str, jwk: &Jwk) -> Result<Option<Self>, AuthError> {
        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
            tracing::debug!(kid = %kid, "Skipping encryption key in JWKS");
            return Ok(None);
        }

        let Some(algorithms) = signing_algorithms(jwk) else {
            tracing::warn!(kid = %kid, "Skipping unsupported key in JWKS");
            return Ok(None);
        };

        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AuthError::FetchError(format!("invalid key material for {kid}: {e}")))?;

        Ok(Some(Self {
            kid: kid.to_string(),
            algorithms,
            key,
        }))
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    /// Whether a token signed with `alg` may be checked against this key.
    pub fn accepts(&self, alg: Algorithm) -> bool {
        self.algorithms.contains(&alg)
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("kid", &self.kid)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

/// Algorithms a JWK may verify, or `None` if it is not a usable signing key.
///
/// A declared `alg` narrows the key to that algorithm, provided it belongs to
/// the key's family. Without one, the family default applies.
fn signing_algorithms(jwk: &Jwk) -> Option<Vec<Algorithm>> {
    let family_default = match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => Algorithm::RS256,
        AlgorithmParameters::EllipticCurve(ec) => match ec.curve {
            EllipticCurve::P256 => Algorithm::ES256,
            EllipticCurve::P384 => Algorithm::ES384,
            _ => return None,
        },
        AlgorithmParameters::OctetKeyPair(okp) => match okp.curve {
            EllipticCurve::Ed25519 => Algorithm::EdDSA,
            _ => return None,
        },
        AlgorithmParameters::OctetKey(_) => return None,
    };

    let Some(declared) = jwk.common.key_algorithm else {
        return Some(vec![family_default]);
    };

    let declared = match declared {
        KeyAlgorithm::RS256 => Algorithm::RS256,
        KeyAlgorithm::RS384 => Algorithm::RS384,
        KeyAlgorithm::RS512 => Algorithm::RS512,
        KeyAlgorithm::PS256 => Algorithm::PS256,
        KeyAlgorithm::PS384 => Algorithm::PS384,
        KeyAlgorithm::PS512 => Algorithm::PS512,
        KeyAlgorithm::ES256 => Algorithm::ES256,
        KeyAlgorithm::ES384 => Algorithm::ES384,
        KeyAlgorithm::EdDSA => Algorithm::EdDSA,
        _ => return None,
    };

    let same_family = match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => matches!(
            declared,
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
        ),
        _ => declared == family_default,
    };

    same_family.then(|| vec![declared])
}

/// Immutable snapshot of the provider's signing keys.
#[derive(Debug)]
pub struct SigningKeySet {
    keys: HashMap<String, Arc<KeyMaterial>>,
    fetched_at: Instant,
    generation: u64,
}

impl SigningKeySet {
    /// Parse a fetched JWKS document into key material.
    ///
    /// Entries without a `kid` or with unparseable material reject the whole
    /// document. A document with no usable signing keys is rejected as well.
    pub fn from_jwk_set(jwks: &JwkSet, generation: u64) -> Result<Self, AuthError> {
        let mut keys = HashMap::with_capacity(jwks.keys.len());

        for jwk in &jwks.keys {
            let kid = jwk
                .common
                .key_id
                .as_deref()
                .filter(|kid| !kid.is_empty())
                .ok_or_else(|| AuthError::FetchError("JWKS entry without kid".to_string()))?;

            if let Some(material) = KeyMaterial::from_jwk(kid, jwk)? {
                keys.insert(kid.to_string(), Arc::new(material));
            }
        }

        if keys.is_empty() {
            return Err(AuthError::FetchError(
                "JWKS contains no usable signing keys".to_string(),
            ));
        }

        Ok(Self {
            keys,
            fetched_at: Instant::now(),
            generation,
        })
    }

    pub fn get(&self, kid: &str) -> Option<Arc<KeyMaterial>> {
        self.keys.get(kid).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    /// Sequence number of the refresh that produced this snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Outcome of the most recent refresh attempt.
#[derive(Default)]
struct RefreshState {
    generation: u64,
    last: Option<Result<Arc<SigningKeySet>, AuthError>>,
}

/// Shared cache of the provider's signing keys.
pub struct KeySetCache {
    jwks_url: String,
    client: reqwest::Client,
    max_age: Option<Duration>,
    current: RwLock<Option<Arc<SigningKeySet>>>,
    /// Held for the duration of a fetch so concurrent misses coalesce.
    refresh: Mutex<RefreshState>,
    /// Number of completed refresh attempts, successful or not.
    attempts: AtomicU64,
}

impl KeySetCache {
    /// Create a cache for the given JWKS URL.
    pub fn new(jwks_url: impl Into<String>, fetch_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client with timeout, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url: jwks_url.into(),
            client,
            max_age: None,
            current: RwLock::new(None),
            refresh: Mutex::new(RefreshState::default()),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        let cache = Self::new(config.jwks_url.clone(), config.fetch_timeout);
        match config.max_key_set_age {
            Some(age) => cache.with_max_age(age),
            None => cache,
        }
    }

    /// Treat snapshots older than `max_age` as expired.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Current snapshot, if any.
    pub async fn snapshot(&self) -> Option<Arc<SigningKeySet>> {
        self.current.read().await.clone()
    }

    /// Whether a non-expired snapshot is cached.
    pub async fn is_cached(&self) -> bool {
        self.snapshot()
            .await
            .is_some_and(|set| !self.is_expired(&set))
    }

    /// Drop the current snapshot; the next lookup fetches.
    pub async fn invalidate(&self) {
        tracing::info!(url = %self.jwks_url, "JWKS cache invalidated");
        *self.current.write().await = None;
    }

    /// Look up key material by key id, refreshing once on a miss.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get(&self, kid: &str) -> Result<Arc<KeyMaterial>, AuthError> {
        let attempt = self.attempts.load(Ordering::SeqCst);

        if let Some(set) = self.snapshot().await.filter(|set| !self.is_expired(set)) {
            if let Some(key) = set.get(kid) {
                tracing::debug!("JWKS cache hit");
                return Ok(key);
            }
        }

        tracing::debug!("JWKS cache miss");
        let set = self.refresh_after(attempt).await?;

        set.get(kid).ok_or_else(|| {
            tracing::warn!(available = ?set.kids().collect::<Vec<_>>(), "Key not found in JWKS after refresh");
            AuthError::UnknownKey
        })
    }

    /// Fetch a fresh key set and replace the cached one.
    ///
    /// If another caller completes a refresh while this one waits, its
    /// outcome is returned instead of fetching again.
    pub async fn refresh(&self) -> Result<Arc<SigningKeySet>, AuthError> {
        let attempt = self.attempts.load(Ordering::SeqCst);
        self.refresh_after(attempt).await
    }

    /// Refresh unless an attempt newer than `observed` finished meanwhile.
    async fn refresh_after(&self, observed: u64) -> Result<Arc<SigningKeySet>, AuthError> {
        let mut state = self.refresh.lock().await;

        if self.attempts.load(Ordering::SeqCst) != observed {
            match &state.last {
                Some(Ok(set)) if !self.is_expired(set) => {
                    tracing::debug!(
                        generation = set.generation(),
                        "JWKS refreshed by a concurrent request"
                    );
                    return Ok(Arc::clone(set));
                }
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "JWKS refresh by a concurrent request failed");
                    return Err(e.clone());
                }
                _ => {}
            }
        }

        let outcome = self.fetch_key_set(state.generation + 1).await;
        match &outcome {
            Ok(set) => {
                state.generation = set.generation();
                tracing::info!(
                    url = %self.jwks_url,
                    keys = set.len(),
                    generation = set.generation(),
                    "JWKS refreshed"
                );
                *self.current.write().await = Some(Arc::clone(set));
            }
            Err(e) => tracing::warn!(url = %self.jwks_url, error = %e, "JWKS refresh failed"),
        }

        state.last = Some(outcome.clone());
        self.attempts.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn fetch_key_set(&self, generation: u64) -> Result<Arc<SigningKeySet>, AuthError> {
        let jwks = self.fetch_with_retry().await?;
        SigningKeySet::from_jwk_set(&jwks, generation).map(Arc::new)
    }

    fn is_expired(&self, set: &SigningKeySet) -> bool {
        self.max_age
            .is_some_and(|max_age| set.fetched_at().elapsed() >= max_age)
    }

    async fn fetch_with_retry(&self) -> Result<JwkSet, AuthError> {
        match self.fetch_jwks().await {
            Ok(jwks) => Ok(jwks),
            Err(first) => {
                tracing::warn!(error = %first, "JWKS fetch failed, retrying once");
                self.fetch_jwks().await
            }
        }
    }

    /// Fetch JWKS from the endpoint.
    async fn fetch_jwks(&self) -> Result<JwkSet, AuthError> {
        tracing::debug!(url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::FetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::FetchError(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::FetchError(e.to_string()))
    }
}
