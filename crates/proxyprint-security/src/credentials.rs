// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Card credentials: SHA-256 hashed card numbers mapped to users.
//
// Card numbers are never kept in clear text; the registry stores the hex
// digest of the canonical card number.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use sha2::{Digest, Sha256};
use tracing::debug;

use proxyprint_bridge::traits::CredentialResolver;
use proxyprint_core::types::{UserId, UserIdentity};

/// Lowercase hex SHA-256 of a canonical card number.
pub fn hash_card(card_number: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(card_number.as_bytes());
    hex::encode(hasher.finalize())
}

/// In-memory card → user directory.
#[derive(Default)]
pub struct CardRegistry {
    cards: RwLock<HashMap<String, UserIdentity>>,
}

impl CardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `card_number` to `identity`, replacing any previous owner.
    pub fn register(&self, card_number: &str, identity: UserIdentity) {
        debug!(user = %identity.user_id, "card registered");
        self.cards
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(hash_card(card_number), identity);
    }

    /// Remove every card owned by `user`.  Returns the number removed.
    pub fn revoke_user(&self, user: UserId) -> usize {
        let mut cards = self.cards.write().unwrap_or_else(PoisonError::into_inner);
        let before = cards.len();
        cards.retain(|_, identity| identity.user_id != user);
        before - cards.len()
    }

    pub fn len(&self) -> usize {
        self.cards.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialResolver for CardRegistry {
    fn resolve_card(&self, card_number: &str) -> Option<UserIdentity> {
        self.cards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&hash_card(card_number))
            .cloned()
    }
}
