// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::card::CardNumberFormat;
use crate::error::Result;

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Job status reconciler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interval between background sweeps.
    pub sweep_interval_ms: u64,
    /// How long a job may go without a persisted-path notification before it
    /// is treated as externally issued.
    pub orphan_wait_secs: u64,
    /// A record not refreshed within this window is pulled from the printer.
    pub heartbeat_secs: u64,
    /// Upper bound on a single printer gateway pull.
    pub pull_timeout_ms: u64,
    /// Attempts made to find the active job in the store.
    pub lookup_attempts: u32,
    /// Fixed delay between active-job lookup attempts.
    pub lookup_delay_ms: u64,
    /// Poll interval used while waiting for the sweep worker to exit.
    pub shutdown_poll_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 2_000,
            orphan_wait_secs: 30,
            heartbeat_secs: 60,
            pull_timeout_ms: 5_000,
            lookup_attempts: 3,
            lookup_delay_ms: 500,
            shutdown_poll_ms: 100,
        }
    }
}

impl MonitorConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }

    pub fn orphan_wait(&self) -> Duration {
        Duration::from_secs(self.orphan_wait_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_millis(self.pull_timeout_ms)
    }

    pub fn lookup_delay(&self) -> Duration {
        Duration::from_millis(self.lookup_delay_ms)
    }

    pub fn shutdown_poll(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_ms.max(1))
    }
}

/// Print-release authentication settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Age after which a pending authentication request expires.
    pub expiry_secs: u64,
    /// Default time a release terminal waits for a card.
    pub default_wait_secs: u64,
    /// Canonical form of the site's card numbers.
    pub card_format: CardNumberFormat,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            expiry_secs: 30,
            default_wait_secs: 10,
            card_format: CardNumberFormat::default(),
        }
    }
}

impl AuthConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }

    pub fn default_wait(&self) -> Duration {
        Duration::from_secs(self.default_wait_secs)
    }
}

/// Persistent service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyPrintConfig {
    pub monitor: MonitorConfig,
    pub auth: AuthConfig,
    /// SQLite database holding issued print jobs (relative to the data dir).
    pub store_file: String,
    /// SQLite database holding admin events (relative to the data dir).
    pub event_log_file: String,
    /// Directory for per-user notification files (relative to the data dir).
    pub messages_dir: String,
}

impl Default for ProxyPrintConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            auth: AuthConfig::default(),
            store_file: "jobs.db".into(),
            event_log_file: "events.db".into(),
            messages_dir: "messages".into(),
        }
    }
}

impl ProxyPrintConfig {
    /// Load the configuration from `data_dir`, falling back to defaults when
    /// the file is missing or cannot be parsed.
    pub fn load_or_default(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) => {
                debug!(path = %path.display(), "no config file ({e}), using defaults");
                return Self::default();
            }
        };
        match serde_json::from_str(&data) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), "malformed config file ({e}), using defaults");
                Self::default()
            }
        }
    }

    /// Write the configuration to `data_dir` as pretty JSON.
    pub fn persist(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(())
    }
}
