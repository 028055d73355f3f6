// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: builds the proxy-print components from configuration and
// exposes the operations the daemon's front ends call.

pub mod app_services;
pub mod data_dir;
