// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the proxy-print core.

use thiserror::Error;

/// Top-level error type for all proxy-print operations.
#[derive(Debug, Error)]
pub enum ProxyPrintError {
    // -- Chunk planning --
    #[error("document selection is not vanilla: it was modified after it was queued")]
    NotVanilla,

    #[error("invalid page range: {0}")]
    InvalidPageRange(String),

    #[error("page {page} is out of bounds for a document of {pages} pages")]
    PageOutOfBounds { page: u32, pages: u32 },

    #[error("printer {printer} has no media source for media {media}")]
    MediaSourceUnavailable { printer: String, media: String },

    // -- Printer gateway --
    #[error("printer gateway error: {0}")]
    Gateway(String),

    #[error("printer gateway call timed out")]
    GatewayTimeout,

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    // -- Collaborators --
    #[error("billing adapter error: {0}")]
    Billing(String),

    #[error("user notification failed: {0}")]
    Notification(String),

    #[error("rule definition error: {0}")]
    Rule(String),

    #[error("background worker failed: {0}")]
    Worker(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProxyPrintError>;
