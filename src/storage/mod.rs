// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Catalog Storage Module
//!
//! Persistent storage for the catalog in a single embedded redb database.
//!
//! ## Entities
//!
//! ```text
//! users      id, external_id (unique), username, email, name
//! products   id, name, code (unique), price, rating, availability, description
//! reviews    id, product_id, user_id, title, rating, comment
//! purchases  (user_id, product_id), status
//! ```
//!
//! Handlers never touch redb directly; they go through the repositories.

pub mod database;
pub mod repository;

pub use database::{CatalogDatabase, StoreError, StoreResult};
pub use repository::{
    NewProduct, ProductRepository, PurchaseRepository, PurchaseStatus, ReviewDraft,
    ReviewRepository, ReviewWrite, StoredProduct, StoredPurchase, StoredReview, StoredUser,
    UserProfile, UserRepository, UserStore,
};
