// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Proxy-print security: print-release authentication at card-reader
// terminals, hashed card credentials, and the admin event log.

pub mod audit;
pub mod auth;
pub mod credentials;

pub use audit::AdminEventLog;
pub use auth::{AuthManager, AuthRequest, AuthStatus};
pub use credentials::CardRegistry;
