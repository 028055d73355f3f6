// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Offline stand-ins for deployments without a printer gateway or billing
// system.
//
// Calls that need the missing collaborator fail with an error; the callers
// log and carry on.

use async_trait::async_trait;

use proxyprint_core::error::{ProxyPrintError, Result};
use proxyprint_core::types::{Amount, ExternalJobId, PrintJobSnapshot, UsageLogEntry};

use crate::traits::{BillingAdapter, PrinterGateway};

/// Printer gateway used when no printing subsystem is connected.
pub struct OfflineGateway;

#[async_trait]
impl PrinterGateway for OfflineGateway {
    async fn retrieve_print_job(
        &self,
        printer: &str,
        job_id: ExternalJobId,
    ) -> Result<Option<PrintJobSnapshot>> {
        tracing::warn!(printer, %job_id, "status pull on offline gateway");
        Err(ProxyPrintError::Gateway("no printer gateway connected".into()))
    }

    fn system_time(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn is_local_printer(&self, _printer: &str) -> Option<bool> {
        None
    }
}

/// Billing adapter used when no accounting system is configured.
pub struct OfflineBilling;

#[async_trait]
impl BillingAdapter for OfflineBilling {
    async fn adjust_shared_account(
        &self,
        account: &str,
        _amount: Amount,
        _comment: &str,
    ) -> Result<()> {
        tracing::warn!(account, "shared account adjustment on offline billing");
        Err(ProxyPrintError::Billing("no billing system configured".into()))
    }

    async fn adjust_user_account(
        &self,
        user_name: &str,
        _amount: Amount,
        _comment: &str,
    ) -> Result<()> {
        tracing::warn!(user_name, "user account adjustment on offline billing");
        Err(ProxyPrintError::Billing("no billing system configured".into()))
    }

    async fn get_usage_log(&self, _document_names: &[String]) -> Result<Vec<UsageLogEntry>> {
        Err(ProxyPrintError::Billing("no billing system configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_gateway_fails_pulls() {
        let gw = OfflineGateway;
        assert!(gw.retrieve_print_job("p", ExternalJobId(1)).await.is_err());
        assert!(gw.is_local_printer("p").is_none());
        assert!(gw.system_time() > 0);
    }

    #[tokio::test]
    async fn offline_billing_fails_adjustments() {
        let billing = OfflineBilling;
        assert!(
            billing
                .adjust_user_account("alice", Amount::ZERO, "test")
                .await
                .is_err()
        );
        assert!(billing.get_usage_log(&[]).await.is_err());
    }
}
