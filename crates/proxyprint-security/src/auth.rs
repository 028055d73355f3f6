// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print-release authentication.
//
// A user who submits a print request for a card-reader-controlled printer
// must present their card at the reader next to it.  The coordinator keeps
// at most one live request per printer, waits (outside its lock) for the
// reader to report a card, and resolves the request against the card owner.
//
// Expiry is lazy: a request older than the configured window is treated as
// gone wherever it is inspected.  There is no background sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use proxyprint_bridge::traits::{CredentialResolver, ReaderEventSource};
use proxyprint_core::card::CardNumberFormat;
use proxyprint_core::types::{ReaderEvent, UserId};

/// Lifecycle of an authentication request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthStatus {
    /// Created by the caller, not yet presented to the user.
    Requested,
    /// Waiting for the user to present a card.
    NeedsAuth,
    /// The card owner matched the requesting user.
    Authenticated,
    /// The request outlived the expiry window.
    Expired,
}

/// A print request waiting to be released by card authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub id: Uuid,
    pub user_id: UserId,
    pub status: AuthStatus,
    /// Monotonic submit time, used for expiry.
    pub submitted_at: Option<Instant>,
    /// Wall-clock submit time, for display and logs.
    pub submitted_wall: Option<DateTime<Utc>>,
}

impl AuthRequest {
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: AuthStatus::NeedsAuth,
            submitted_at: None,
            submitted_wall: None,
        }
    }

    pub fn with_status(mut self, status: AuthStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether the request is older than `expiry`.  Unsubmitted requests
    /// never expire.
    pub fn is_expired(&self, expiry: Duration) -> bool {
        self.submitted_at
            .is_some_and(|submitted| submitted.elapsed() > expiry)
    }
}

#[derive(Default)]
struct AuthState {
    /// Pending requests keyed by printer name.
    requests: HashMap<String, AuthRequest>,
    /// Reader address serving each printer.
    readers: HashMap<String, String>,
}

impl AuthState {
    /// The live request for `printer`, dropping it if it has expired.
    fn live_request(&mut self, printer: &str, expiry: Duration) -> Option<&AuthRequest> {
        if self
            .requests
            .get(printer)
            .is_some_and(|r| r.is_expired(expiry))
        {
            debug!(printer, "dropping expired auth request");
            self.requests.remove(printer);
        }
        self.requests.get(printer)
    }
}

/// Coordinates print-release requests with card-reader events.
///
/// One instance per process, shared by reference.  All map access goes
/// through a single mutex that is never held across an `.await`.
pub struct AuthManager {
    expiry: Duration,
    state: Mutex<AuthState>,
    reader_source: Arc<dyn ReaderEventSource>,
    credentials: Arc<dyn CredentialResolver>,
}

impl AuthManager {
    pub fn new(
        expiry: Duration,
        reader_source: Arc<dyn ReaderEventSource>,
        credentials: Arc<dyn CredentialResolver>,
    ) -> Self {
        Self {
            expiry,
            state: Mutex::new(AuthState::default()),
            reader_source,
            credentials,
        }
    }

    fn state(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `request` for `printer`, served by the reader at
    /// `reader_address`.
    ///
    /// Returns `false` without touching anything when a live request is
    /// already pending for the printer.
    pub fn submit(&self, printer: &str, reader_address: &str, mut request: AuthRequest) -> bool {
        let mut state = self.state();
        if let Some(pending) = state.live_request(printer, self.expiry) {
            debug!(
                printer,
                pending_user = %pending.user_id,
                "auth request rejected: printer busy"
            );
            return false;
        }

        request.submitted_at = Some(Instant::now());
        request.submitted_wall = Some(Utc::now());
        info!(printer, user = %request.user_id, request = %request.id, "auth request submitted");
        state.requests.insert(printer.to_string(), request);
        state
            .readers
            .insert(printer.to_string(), reader_address.to_string());
        true
    }

    /// Wait up to `timeout` for a card at `reader_address` and resolve the
    /// request pending for `printer`.
    ///
    /// - `None` when no request is pending for the printer or it belongs to
    ///   another user.
    /// - The request unchanged when the wait timed out or the event was not
    ///   a card swipe; it stays pending.
    /// - Otherwise the request is removed and returned, `Expired` if it
    ///   outlived the window, `Authenticated` if the card owner is the
    ///   requesting user, status untouched if not.
    pub async fn wait_for_auth(
        &self,
        user: UserId,
        printer: &str,
        reader_address: &str,
        format: CardNumberFormat,
        timeout: Duration,
    ) -> Option<AuthRequest> {
        let event = self
            .reader_source
            .wait_for_event(reader_address, format, timeout)
            .await;

        let card_owner = match &event {
            Some(ReaderEvent::CardSwiped { card_number }) => {
                Some(self.credentials.resolve_card(card_number))
            }
            _ => None,
        };

        let mut state = self.state();
        let pending = state.requests.get(printer)?;
        if pending.user_id != user {
            return None;
        }
        let Some(card_owner) = card_owner else {
            return Some(pending.clone());
        };

        let expired = pending.is_expired(self.expiry);
        let mut request = state.requests.remove(printer)?;

        if expired {
            info!(printer, user = %user, "auth request expired");
            request.status = AuthStatus::Expired;
            return Some(request);
        }

        match card_owner {
            Some(identity) if identity.user_id == request.user_id => {
                info!(printer, user = %user, "print release authenticated");
                request.status = AuthStatus::Authenticated;
            }
            Some(identity) => {
                info!(
                    printer,
                    user = %user,
                    card_owner = %identity.user_id,
                    "card presented by another user"
                );
            }
            None => info!(printer, user = %user, "card presented is unknown"),
        }
        Some(request)
    }

    /// Cancel the request pending for `printer`.
    ///
    /// Returns `false` when the live request belongs to another user.  When a
    /// request is removed, expired or not, a `Void` event is injected at its
    /// reader so a blocked [`wait_for_auth`](Self::wait_for_auth) returns at
    /// once.
    pub fn cancel(&self, user: UserId, printer: &str) -> bool {
        let reader = {
            let mut state = self.state();
            let Some(pending) = state.requests.get(printer) else {
                return true;
            };
            if pending.user_id != user && !pending.is_expired(self.expiry) {
                return false;
            }
            state.requests.remove(printer);
            state.readers.get(printer).cloned()
        };

        if let Some(reader) = reader {
            info!(printer, user = %user, "auth request cancelled");
            self.reader_source.report_event(&reader, ReaderEvent::Void);
        }
        true
    }

    /// Whether `user` has a live request on any printer.
    pub fn is_auth_pending_for_user(&self, user: UserId) -> bool {
        self.state()
            .requests
            .values()
            .any(|r| r.user_id == user && !r.is_expired(self.expiry))
    }

    /// Whether `printer` has a live request.
    pub fn is_auth_pending_for_printer(&self, printer: &str) -> bool {
        self.state()
            .requests
            .get(printer)
            .is_some_and(|r| !r.is_expired(self.expiry))
    }

    /// The live request for `printer`, if any.
    pub fn pending_request(&self, printer: &str) -> Option<AuthRequest> {
        self.state()
            .requests
            .get(printer)
            .filter(|r| !r.is_expired(self.expiry))
            .cloned()
    }

    /// Number of requests in the map, expired or not.
    pub fn pending_count(&self) -> usize {
        self.state().requests.len()
    }

    /// Drop every expired request.  Returns how many were dropped.
    pub fn prune_expired(&self) -> usize {
        let mut state = self.state();
        let before = state.requests.len();
        let expiry = self.expiry;
        state.requests.retain(|_, r| !r.is_expired(expiry));
        before - state.requests.len()
    }
}
