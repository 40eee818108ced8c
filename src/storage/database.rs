// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded catalog database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user id → serialized StoredUser
//! - `users_by_external_id`: identity provider subject → user id (unique)
//! - `products`: product id → serialized StoredProduct
//! - `product_codes`: product code → product id (unique)
//! - `reviews`: review id → serialized StoredReview
//! - `reviews_by_user_product`: (user id, product id) → review id
//! - `purchases`: (user id, product id) → serialized StoredPurchase
//! - `sequences`: sequence name → last issued id
//!
//! redb serializes write transactions, so every check-then-write sequence in
//! the repositories runs inside a single write transaction.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use serde::{de::DeserializeOwned, Serialize};

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

pub(crate) const USERS_BY_EXTERNAL_ID: TableDefinition<&str, u64> =
    TableDefinition::new("users_by_external_id");

pub(crate) const PRODUCTS: TableDefinition<u64, &[u8]> = TableDefinition::new("products");

pub(crate) const PRODUCT_CODES: TableDefinition<&str, u64> = TableDefinition::new("product_codes");

pub(crate) const REVIEWS: TableDefinition<u64, &[u8]> = TableDefinition::new("reviews");

pub(crate) const REVIEWS_BY_USER_PRODUCT: TableDefinition<(u64, u64), u64> =
    TableDefinition::new("reviews_by_user_product");

pub(crate) const PURCHASES: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("purchases");

const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Sequence names used for id generation.
pub(crate) mod sequence {
    pub const USERS: &str = "users";
    pub const PRODUCTS: &str = "products";
    pub const REVIEWS: &str = "reviews";
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint would be violated.
    #[error("conflict: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// CatalogDatabase
// =============================================================================

/// Embedded ACID database holding users, products, reviews and purchases.
pub struct CatalogDatabase {
    db: Database,
}

impl CatalogDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERS_BY_EXTERNAL_ID)?;
            let _ = write_txn.open_table(PRODUCTS)?;
            let _ = write_txn.open_table(PRODUCT_CODES)?;
            let _ = write_txn.open_table(REVIEWS)?;
            let _ = write_txn.open_table(REVIEWS_BY_USER_PRODUCT)?;
            let _ = write_txn.open_table(PURCHASES)?;
            let _ = write_txn.open_table(SEQUENCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub(crate) fn raw(&self) -> &Database {
        &self.db
    }

    /// Verify that a read transaction can be opened and a table read.
    pub fn health_check(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SEQUENCES)?;
        let _ = table.get(sequence::USERS)?;
        Ok(())
    }
}

// =============================================================================
// Row Helpers
// =============================================================================

/// Issue the next id of a sequence inside an open write transaction.
pub(crate) fn next_id(txn: &WriteTransaction, name: &str) -> StoreResult<u64> {
    let mut table = txn.open_table(SEQUENCES)?;
    let next = table.get(name)?.map(|v| v.value()).unwrap_or(0) + 1;
    table.insert(name, next)?;
    Ok(next)
}

pub(crate) fn encode_row<T: Serialize>(row: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(row)?)
}

/// Read and deserialize a row keyed by a numeric id.
pub(crate) fn get_row<T, Tbl>(table: &Tbl, id: u64) -> StoreResult<Option<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<u64, &'static [u8]>,
{
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

/// Deserialize every row of a table keyed by a numeric id, in id order.
pub(crate) fn all_rows<T, Tbl>(table: &Tbl) -> StoreResult<Vec<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<u64, &'static [u8]>,
{
    let mut rows = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        rows.push(serde_json::from_slice(value.value())?);
    }
    Ok(rows)
}

// =============================================================================
// Tests
// =============================================================================
