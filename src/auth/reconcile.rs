// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mapping verified identities onto local user records.

use super::claims::ExternalClaims;
use crate::storage::{StoreResult, StoredUser, UserStore};

/// Finds or creates the local user for a verified identity and keeps its
/// profile in step with the identity provider.
pub struct IdentityReconciler<'a, S: UserStore> {
    store: &'a S,
}

impl<'a, S: UserStore> IdentityReconciler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Return the local user for `claims.subject`, creating it on first
    /// contact.
    ///
    /// Non-empty profile claims that differ from the stored values are
    /// merged into the row inside one write transaction; when nothing
    /// differs, no write happens.
    pub fn reconcile(&self, claims: &ExternalClaims) -> StoreResult<StoredUser> {
        let profile = claims.profile();

        let user = match self.store.find_by_external_id(&claims.subject)? {
            Some(user) => user,
            None => {
                let (user, created) = self.store.create_if_absent(&claims.subject, &profile)?;
                if created {
                    return Ok(user);
                }
                user
            }
        };

        if !user.differs_from(&profile) {
            return Ok(user);
        }

        let (user, changed) = self.store.apply_profile(user.id, &profile)?;
        if changed {
            tracing::debug!(user_id = user.id, external_id = %user.external_id, "Updated user profile from claims");
        }
        Ok(user)
    }
}
