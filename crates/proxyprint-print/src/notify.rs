// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// File-based user notification inbox.
//
// Each user has one JSON file `<dir>/<user>.json` holding the latest
// message.  Client tools poll the file; a newer message replaces the older.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use proxyprint_bridge::traits::UserNotificationSink;
use proxyprint_core::error::{ProxyPrintError, Result};
use proxyprint_core::types::{UserId, UserMessageKind};

/// Content of a user's message file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub user: UserId,
    /// Epoch seconds.
    pub timestamp: i64,
    pub kind: UserMessageKind,
}

/// Writes user messages below a directory.
#[derive(Debug, Clone)]
pub struct UserMessageWriter {
    dir: PathBuf,
}

impl UserMessageWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn message_path(&self, user: UserId) -> PathBuf {
        self.dir.join(format!("{user}.json"))
    }

    /// The latest message for `user`, if any.
    pub fn read(&self, user: UserId) -> Result<Option<UserMessage>> {
        let path = self.message_path(user);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }
}

impl UserNotificationSink for UserMessageWriter {
    fn write(&self, user: UserId, timestamp: i64, kind: UserMessageKind) -> Result<()> {
        let message = UserMessage {
            user,
            timestamp,
            kind,
        };
        let json = serde_json::to_string_pretty(&message)?;
        let path = self.message_path(user);
        let tmp = path.with_extension("json.tmp");

        std::fs::create_dir_all(&self.dir)
            .and_then(|()| std::fs::write(&tmp, json))
            .and_then(|()| std::fs::rename(&tmp, &path))
            .map_err(|e| ProxyPrintError::Notification(format!("{}: {e}", path.display())))?;

        debug!(%user, ?kind, "user message written");
        Ok(())
    }
}
