// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User repository.
//!
//! Local user records mirror identities issued by the OIDC provider. The
//! provider's subject is stored as `external_id` and is unique across users.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    encode_row, get_row, next_id, sequence, CatalogDatabase, StoreError, StoreResult, USERS,
    USERS_BY_EXTERNAL_ID,
};

/// User record stored in the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StoredUser {
    /// Locally generated user id
    pub id: u64,
    /// Identity provider subject (`sub` claim)
    pub external_id: String,
    /// Preferred username from the identity provider
    pub username: Option<String>,
    /// Email address from the identity provider
    pub email: Option<String>,
    /// Display name from the identity provider
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable profile fields copied from identity claims.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub username: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Persistence operations the identity reconciler depends on.
pub trait UserStore {
    /// Look up a user by identity provider subject.
    fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<StoredUser>>;

    /// Create a user for `external_id` unless one already exists.
    ///
    /// Returns the stored user and whether it was created by this call.
    fn create_if_absent(
        &self,
        external_id: &str,
        profile: &UserProfile,
    ) -> StoreResult<(StoredUser, bool)>;

    /// Merge `profile` into the stored user inside one write transaction.
    ///
    /// Only present fields that differ are written. Returns the user as
    /// stored afterwards and whether anything changed.
    fn apply_profile(
        &self,
        user_id: u64,
        profile: &UserProfile,
    ) -> StoreResult<(StoredUser, bool)>;
}

impl StoredUser {
    /// Whether any present field of `profile` differs from this record.
    pub fn differs_from(&self, profile: &UserProfile) -> bool {
        [
            (&self.username, &profile.username),
            (&self.email, &profile.email),
            (&self.name, &profile.name),
        ]
        .into_iter()
        .any(|(current, incoming)| {
            incoming
                .as_deref()
                .is_some_and(|value| current.as_deref() != Some(value))
        })
    }

    /// Copy every present field of `profile`. Absent fields never clear a value.
    fn merge(&mut self, profile: &UserProfile) -> bool {
        if !self.differs_from(profile) {
            return false;
        }
        for (current, incoming) in [
            (&mut self.username, &profile.username),
            (&mut self.email, &profile.email),
            (&mut self.name, &profile.name),
        ] {
            if let Some(value) = incoming {
                *current = Some(value.clone());
            }
        }
        self.updated_at = Utc::now();
        true
    }
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    db: &'a CatalogDatabase,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository.
    pub fn new(db: &'a CatalogDatabase) -> Self {
        Self { db }
    }

    /// Get a user by local id.
    pub fn get(&self, user_id: u64) -> StoreResult<Option<StoredUser>> {
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(USERS)?;
        get_row(&table, user_id)
    }

    /// Number of stored users.
    pub fn count(&self) -> StoreResult<u64> {
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(USERS)?;
        Ok(table.len()?)
    }
}

impl UserStore for UserRepository<'_> {
    fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<StoredUser>> {
        let read_txn = self.db.raw().begin_read()?;
        let index = read_txn.open_table(USERS_BY_EXTERNAL_ID)?;
        let Some(user_id) = index.get(external_id)?.map(|v| v.value()) else {
            return Ok(None);
        };
        let table = read_txn.open_table(USERS)?;
        get_row(&table, user_id)
    }

    fn create_if_absent(
        &self,
        external_id: &str,
        profile: &UserProfile,
    ) -> StoreResult<(StoredUser, bool)> {
        let write_txn = self.db.raw().begin_write()?;

        // The index is re-checked inside the write transaction: a concurrent
        // first contact that committed before us is returned as-is.
        let existing = {
            let index = write_txn.open_table(USERS_BY_EXTERNAL_ID)?;
            let found = index.get(external_id)?.map(|v| v.value());
            found
        };

        if let Some(user_id) = existing {
            let user = {
                let table = write_txn.open_table(USERS)?;
                get_row::<StoredUser, _>(&table, user_id)?
            };
            write_txn.abort()?;
            let user = user.ok_or_else(|| {
                StoreError::NotFound(format!("User {user_id} referenced by {external_id}"))
            })?;
            return Ok((user, false));
        }

        let now = Utc::now();
        let user = StoredUser {
            id: next_id(&write_txn, sequence::USERS)?,
            external_id: external_id.to_string(),
            username: profile.username.clone(),
            email: profile.email.clone(),
            name: profile.name.clone(),
            created_at: now,
            updated_at: now,
        };

        {
            let json = encode_row(&user)?;
            let mut table = write_txn.open_table(USERS)?;
            table.insert(user.id, json.as_slice())?;

            let mut index = write_txn.open_table(USERS_BY_EXTERNAL_ID)?;
            index.insert(external_id, user.id)?;
        }
        write_txn.commit()?;

        tracing::info!(user_id = user.id, external_id = %external_id, "Created local user");
        Ok((user, true))
    }

    fn apply_profile(
        &self,
        user_id: u64,
        profile: &UserProfile,
    ) -> StoreResult<(StoredUser, bool)> {
        let write_txn = self.db.raw().begin_write()?;

        // Re-read under the write lock so a concurrent merge is never lost.
        let mut user: StoredUser = {
            let table = write_txn.open_table(USERS)?;
            get_row(&table, user_id)?
        }
        .ok_or_else(|| StoreError::NotFound(format!("User {user_id}")))?;

        if !user.merge(profile) {
            write_txn.abort()?;
            return Ok((user, false));
        }

        {
            let json = encode_row(&user)?;
            let mut table = write_txn.open_table(USERS)?;
            table.insert(user_id, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok((user, true))
    }
}
