// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Refresh policy
//!
//! - Keys are cached with a configurable TTL and refreshed on the next
//!   lookup after it lapses
//! - A lookup for an unknown `kid` triggers a refresh (key rotation)
//! - Refreshes are single-flight: concurrent misses wait for one fetch
//! - At most one fetch per `min_refresh_interval`, even if it failed
//! - A stale key is still served when the endpoint cannot be reached
//!
//! ## Usage
//!
//! Build one JwksManager at startup from the issuer's certs URL and share
//! it through the token verifier.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{
    AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse,
};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::{Mutex, RwLock};

use super::error::TokenRejection;

/// Default JWKS cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Minimum time between two fetches of the key set.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Key-set resolution failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeySetError {
    /// Endpoint unreachable or returned garbage, and nothing usable is cached
    #[error("{0}")]
    Unavailable(String),
    /// The key set does not contain the requested key
    #[error("no key matching id `{0}`")]
    NotFound(String),
}

impl From<KeySetError> for TokenRejection {
    fn from(err: KeySetError) -> Self {
        match err {
            KeySetError::Unavailable(reason) => TokenRejection::KeySetUnavailable(reason),
            KeySetError::NotFound(kid) => TokenRejection::NoMatchingKey(kid),
        }
    }
}

/// A public key ready for signature verification.
#[derive(Clone)]
pub struct VerificationKey {
    pub key: DecodingKey,
    /// The only algorithm this key may verify
    pub algorithm: Algorithm,
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// JWKS cache entry.
struct CacheEntry {
    /// Keys by `kid`
    keys: HashMap<String, VerificationKey>,
    /// Usable keys in document order, for tokens without a `kid`
    ordered: Vec<VerificationKey>,
    fetched_at: Instant,
}

impl CacheEntry {
    fn lookup(&self, kid: Option<&str>) -> Option<VerificationKey> {
        match kid {
            Some(kid) => self.keys.get(kid).cloned(),
            None => self.ordered.first().cloned(),
        }
    }
}

/// JWKS manager with caching.
///
/// Cloning is cheap; clones share the same cache.
#[derive(Clone)]
pub struct JwksManager {
    /// Key set endpoint
    jwks_url: String,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    /// Held for the duration of a fetch; stores the last attempt time
    refresh: Arc<Mutex<Option<Instant>>>,
    client: reqwest::Client,
}

impl JwksManager {
    /// Create a new JWKS manager.
    ///
    /// # Arguments
    /// - `jwks_url`: The key set endpoint (e.g., `https://id.example.com/realms/shop/protocol/openid-connect/certs`)
    pub fn new(jwks_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: MIN_REFRESH_INTERVAL,
            cache: Arc::new(RwLock::new(None)),
            refresh: Arc::new(Mutex::new(None)),
            client,
        })
    }

    /// Create with custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Override the minimum spacing between fetches.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Resolve the verification key for a token's `kid`.
    ///
    /// Served from cache while fresh; otherwise refreshes the key set first.
    pub async fn resolve_key(&self, kid: Option<&str>) -> Result<VerificationKey, KeySetError> {
        let requested_at = Instant::now();
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.fetched_at.elapsed() < self.cache_ttl {
                    if let Some(key) = entry.lookup(kid) {
                        return Ok(key);
                    }
                    tracing::debug!(kid = ?kid, "Key id not in cached key set, refreshing");
                }
            }
        }

        self.refresh_and_lookup(kid, requested_at).await
    }

    async fn refresh_and_lookup(
        &self,
        kid: Option<&str>,
        requested_at: Instant,
    ) -> Result<VerificationKey, KeySetError> {
        let mut last_attempt = self.refresh.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.fetched_at >= requested_at {
                    return entry.lookup(kid).ok_or_else(|| not_found(kid));
                }
            }
        }

        let rate_limited =
            last_attempt.is_some_and(|at| at.elapsed() < self.min_refresh_interval);
        if rate_limited {
            let cache = self.cache.read().await;
            return match &*cache {
                Some(entry) => entry.lookup(kid).ok_or_else(|| not_found(kid)),
                None => Err(KeySetError::Unavailable(
                    "key set fetch recently failed".to_string(),
                )),
            };
        }

        *last_attempt = Some(Instant::now());
        match self.fetch_jwks().await {
            Ok(jwks) => {
                let entry = build_entry(&jwks);
                tracing::info!(keys = entry.keys.len(), url = %self.jwks_url, "JWKS refreshed");
                let key = entry.lookup(kid);
                *self.cache.write().await = Some(entry);
                key.ok_or_else(|| not_found(kid))
            }
            Err(err) => {
                let cache = self.cache.read().await;
                match cache.as_ref().and_then(|entry| entry.lookup(kid)) {
                    Some(key) => {
                        tracing::warn!(error = %err, "JWKS fetch failed, using stale key");
                        Ok(key)
                    }
                    None => {
                        tracing::error!(error = %err, url = %self.jwks_url, "JWKS fetch failed");
                        Err(err)
                    }
                }
            }
        }
    }

    /// Fetch JWKS from the endpoint.
    async fn fetch_jwks(&self) -> Result<JwkSet, KeySetError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| KeySetError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeySetError::Unavailable(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| KeySetError::Unavailable(e.to_string()))
    }

    /// Refresh the JWKS cache.
    ///
    /// Shares the rate limit of key lookups: within `min_refresh_interval`
    /// of the last attempt no fetch happens, and the result only reports
    /// whether any keys are cached.
    pub async fn refresh(&self) -> Result<(), KeySetError> {
        let mut last_attempt = self.refresh.lock().await;

        if last_attempt.is_some_and(|at| at.elapsed() < self.min_refresh_interval) {
            return match &*self.cache.read().await {
                Some(_) => Ok(()),
                None => Err(KeySetError::Unavailable(
                    "key set fetch recently failed".to_string(),
                )),
            };
        }

        *last_attempt = Some(Instant::now());
        let jwks = self.fetch_jwks().await?;
        *self.cache.write().await = Some(build_entry(&jwks));
        Ok(())
    }

    /// Check if JWKS is currently cached and valid.
    pub async fn is_cached(&self) -> bool {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .is_some_and(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
    }
}

fn not_found(kid: Option<&str>) -> KeySetError {
    KeySetError::NotFound(kid.unwrap_or("<none>").to_string())
}

fn build_entry(jwks: &JwkSet) -> CacheEntry {
    let mut keys = HashMap::new();
    let mut ordered = Vec::new();

    for jwk in &jwks.keys {
        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
            continue;
        }
        let key = match jwk_to_decoding_key(jwk) {
            Ok(key) => key,
            Err(reason) => {
                tracing::debug!(kid = ?jwk.common.key_id, %reason, "Skipping JWK");
                continue;
            }
        };
        if let Some(kid) = &jwk.common.key_id {
            keys.insert(kid.clone(), key.clone());
        }
        ordered.push(key);
    }

    CacheEntry {
        keys,
        ordered,
        fetched_at: Instant::now(),
    }
}

/// Convert a JWK to a DecodingKey bound to its signing algorithm.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<VerificationKey, String> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let algorithm = match jwk.common.key_algorithm {
                None | Some(KeyAlgorithm::RS256) => Algorithm::RS256,
                Some(KeyAlgorithm::RS384) => Algorithm::RS384,
                Some(KeyAlgorithm::RS512) => Algorithm::RS512,
                Some(KeyAlgorithm::PS256) => Algorithm::PS256,
                Some(KeyAlgorithm::PS384) => Algorithm::PS384,
                Some(KeyAlgorithm::PS512) => Algorithm::PS512,
                Some(other) => return Err(format!("unsupported RSA algorithm {other:?}")),
            };
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|e| format!("invalid RSA key: {e}"))?;
            Ok(VerificationKey { key, algorithm })
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let algorithm = match (jwk.common.key_algorithm, &ec.curve) {
                (Some(KeyAlgorithm::ES256), _) | (None, EllipticCurve::P256) => Algorithm::ES256,
                (Some(KeyAlgorithm::ES384), _) | (None, EllipticCurve::P384) => Algorithm::ES384,
                (alg, curve) => {
                    return Err(format!("unsupported EC key {alg:?} on {curve:?}"));
                }
            };
            let key = DecodingKey::from_ec_components(&ec.x, &ec.y)
                .map_err(|e| format!("invalid EC key: {e}"))?;
            Ok(VerificationKey { key, algorithm })
        }
        _ => Err("unsupported key type".to_string()),
    }
}
