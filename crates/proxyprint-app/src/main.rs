// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Proxyprint daemon entry point.  Initialises logging and the backend
// services, runs the job status monitor, and shuts down on Ctrl-C.

mod services;

use services::app_services::ProxyPrintServices;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("proxyprint starting");

    let svc = match ProxyPrintServices::init() {
        Ok(s) => {
            tracing::info!("backend services initialised");
            s
        }
        Err(e) => {
            tracing::error!(error = %e, "persistent storage failed, using in-memory fallback");
            match ProxyPrintServices::fallback() {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "fallback init failed");
                    std::process::exit(1);
                }
            }
        }
    };

    svc.start();

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }

    if let Err(e) = svc.shutdown().await {
        tracing::error!(error = %e, "shutdown failed");
        std::process::exit(1);
    }
    tracing::info!("proxyprint stopped");
}
