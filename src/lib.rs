// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Catalog Server - product catalog and reviews behind an OIDC gate
//!
//! Bearer tokens issued by a Keycloak realm are verified against the realm's
//! JWKS, reconciled onto local user records, and checked against realm and
//! client roles before catalog or review storage is touched.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token verification, identity reconciliation, authorization gate
//! - `config` - Environment configuration
//! - `storage` - Embedded catalog database (redb)
//! - `telemetry` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
pub mod telemetry;
