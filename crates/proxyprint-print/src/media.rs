// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer media sources and media-source resolution.
//
// Each chunk of a proxy print job must be fed from a tray that holds its
// media.  Printers proxied by an external managed-print back end pick the
// tray themselves; for those we ask for the `auto` source instead.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use proxyprint_core::error::{ProxyPrintError, Result};

/// IPP keyword for automatic media-source selection.
pub const AUTO_SOURCE: &str = "auto";

/// IPP attribute carrying the requested media source.
pub const MEDIA_SOURCE_ATTR: &str = "media-source";

/// A tray and the media loaded in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSourceOption {
    /// Source keyword (e.g. "tray-1").
    pub source: String,
    /// Media keyword of the loaded media (e.g. "iso_a4_210x297mm").
    pub media: String,
}

/// Media sources of one printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterMediaSources {
    pub printer: String,
    /// Concrete sources in preference order.
    pub sources: Vec<MediaSourceOption>,
    /// Whether the printer advertises the `auto` source.
    pub auto_source: bool,
    /// Whether an external managed-print back end proxies the printer.
    pub managed_by_external: bool,
}

/// Outcome of resolving a chunk's media source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSourceChoice {
    Source(String),
    Auto,
}

impl MediaSourceChoice {
    pub fn keyword(&self) -> &str {
        match self {
            Self::Source(source) => source,
            Self::Auto => AUTO_SOURCE,
        }
    }
}

impl PrinterMediaSources {
    /// Parse media sources from printer attributes.
    ///
    /// `media-source-supported` lists source keywords; `media-source-media`
    /// lists `source=media` pairs for the loaded trays.  Sources without
    /// loaded media are ignored.
    pub fn from_attributes(
        printer: &str,
        attrs: &HashMap<String, String>,
        managed_by_external: bool,
    ) -> Self {
        let supported = parse_set(attrs.get("media-source-supported"));
        let auto_source = supported.contains(AUTO_SOURCE);

        let sources = attrs
            .get("media-source-media")
            .map(|v| {
                v.split([',', ';'])
                    .filter_map(|pair| pair.split_once('='))
                    .map(|(s, m)| (s.trim(), m.trim()))
                    .filter(|(s, m)| !s.is_empty() && !m.is_empty() && *s != AUTO_SOURCE)
                    .filter(|(s, _)| supported.is_empty() || supported.contains(*s))
                    .map(|(s, m)| MediaSourceOption {
                        source: s.to_string(),
                        media: m.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            printer: printer.to_string(),
            sources,
            auto_source,
            managed_by_external,
        }
    }

    /// Pick the source for `media`.
    ///
    /// Externally managed printers that advertise `auto` always get `auto`.
    /// Otherwise the first tray holding the media wins.
    pub fn resolve(&self, media: &str) -> Result<MediaSourceChoice> {
        if self.managed_by_external && self.auto_source {
            debug!(printer = %self.printer, media, "externally managed: auto media source");
            return Ok(MediaSourceChoice::Auto);
        }
        self.sources
            .iter()
            .find(|option| option.media == media)
            .map(|option| MediaSourceChoice::Source(option.source.clone()))
            .ok_or_else(|| ProxyPrintError::MediaSourceUnavailable {
                printer: self.printer.clone(),
                media: media.to_string(),
            })
    }
}

/// Parse a comma-separated or multi-valued attribute into a set.
fn parse_set(value: Option<&String>) -> HashSet<String> {
    match value {
        Some(v) => v
            .split([',', ';'])
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => HashSet::new(),
    }
}
