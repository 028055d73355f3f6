// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborator boundary for the proxy-print core.
//
// The core performs no printer I/O, owns no persistence engine, and talks to
// no billing system directly.  Everything it needs from the outside world is
// expressed as a trait here, together with an in-process card reader hub and
// offline stand-ins for deployments that lack a collaborator.

pub mod reader;
pub mod stub;
pub mod traits;

pub use reader::ReaderEventHub;
pub use stub::{OfflineBilling, OfflineGateway};
pub use traits::*;
