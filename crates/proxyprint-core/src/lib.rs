// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Proxy-print core: types, errors, configuration, and the cost/layout rule
// engine shared across all crates.

pub mod card;
pub mod config;
pub mod error;
pub mod rules;
pub mod types;

pub use card::CardNumberFormat;
pub use config::ProxyPrintConfig;
pub use error::ProxyPrintError;
pub use types::*;
