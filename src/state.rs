// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{AccessPolicy, TokenVerifier};
use crate::storage::CatalogDatabase;

/// Shared application state, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<CatalogDatabase>,
    pub verifier: Arc<TokenVerifier>,
    pub policy: Arc<AccessPolicy>,
}

impl AppState {
    pub fn new(db: CatalogDatabase, verifier: TokenVerifier, policy: AccessPolicy) -> Self {
        Self {
            db: Arc::new(db),
            verifier: Arc::new(verifier),
            policy: Arc::new(policy),
        }
    }
}
