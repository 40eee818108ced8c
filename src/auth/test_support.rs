// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test fixtures: a signing key, a local JWKS endpoint and token helpers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;

use super::{AccessPolicy, JwksManager, TokenVerifier};
use crate::state::AppState;
use crate::storage::database::tests::temp_db;

pub const TEST_KID: &str = "test-key";
pub const TEST_ISSUER: &str = "https://id.example.com/realms/shop";
pub const TEST_AUDIENCE: &str = "catalog-api";

/// Modulus of the test key, base64url.
pub const TEST_N: &str = "5qNO8qDSXqqV219dmFQ2RVEmFNkQU_oXrBtwwfoTIrlcPoqoevyPuvS6cArcWPWr4XzZyzRZ7URL8bgFQvlRLEBMmBJBbBsW9cNZmgRrm6TISO3qp-1FblAsQWdJsX4OImPtqHHmOQuauEOrEnwXSAU82-U8obTNCBi1NYG3nw3BHz-7RVnFfkSLqbfu-824MxpyzIC2noijyNjwhWs1-hYlXULWzFnvIJ_ljueXhkNWY0hOiE2uXk0wLlb2541fAIVfzSKTTI9NOziJ7IsAFfCZssAV9PopzmR5hfmYSekAeysZb-uDLQaLMkn-ayu27R0XTyWT8w1rMpNUNdi9KQ";

const TEST_PRIVATE_KEY: &str = include_str!("testdata/rsa_private.pem");

/// Sign arbitrary claims with the test key.
pub fn sign_token(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());
    let key = EncodingKey::from_rsa_pem(TEST_PRIVATE_KEY.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

/// Swap the payload of a signed token, keeping its header and signature.
pub fn with_forged_payload(token: &str, claims: &Value) -> String {
    let parts: Vec<&str> = token.split('.').collect();
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{payload}.{}", parts[0], parts[2])
}

/// Claims for a valid token for `sub` holding the given realm roles.
pub fn claims_for(sub: &str, realm_roles: &[&str]) -> Value {
    json!({
        "sub": sub,
        "iss": TEST_ISSUER,
        "aud": TEST_AUDIENCE,
        "exp": chrono::Utc::now().timestamp() + 600,
        "iat": chrono::Utc::now().timestamp(),
        "preferred_username": sub,
        "email": format!("{sub}@example.com"),
        "realm_access": { "roles": realm_roles },
    })
}

/// `Authorization` header value for a valid token.
pub fn bearer(sub: &str, realm_roles: &[&str]) -> String {
    format!("Bearer {}", sign_token(&claims_for(sub, realm_roles)))
}

/// Application state backed by a temporary database and `server`'s keys.
pub fn test_state(server: &JwksServer) -> (AppState, TempDir) {
    test_state_with(server, AccessPolicy::default())
}

pub fn test_state_with(server: &JwksServer, policy: AccessPolicy) -> (AppState, TempDir) {
    let (db, dir) = temp_db();
    let keys = JwksManager::new(server.url()).unwrap();
    let verifier =
        TokenVerifier::new(keys, TEST_ISSUER).with_audience(Some(TEST_AUDIENCE.to_string()));
    (AppState::new(db, verifier, policy), dir)
}

struct ServerState {
    hits: AtomicUsize,
    failing: AtomicBool,
}

/// A JWKS endpoint on an ephemeral local port.
pub struct JwksServer {
    url: String,
    state: Arc<ServerState>,
}

impl JwksServer {
    pub async fn start() -> Self {
        let state = Arc::new(ServerState {
            hits: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        });

        let app = Router::new()
            .route("/certs", get(certs))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/certs"),
            state,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Requests received so far, failed ones included.
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }
}

async fn certs(State(state): State<Arc<ServerState>>) -> Result<Json<Value>, StatusCode> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if state.failing.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(json!({
        "keys": [{
            "kty": "RSA",
            "kid": TEST_KID,
            "use": "sig",
            "alg": "RS256",
            "n": TEST_N,
            "e": "AQAB"
        }]
    })))
}
