// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Billing through a third-party print accounting system.
//
// Settlement charges a job's cost to weighted shared accounts and the user's
// personal account.  Each adjustment stands alone: a failure is logged and
// the remaining parties are still charged.
//
// The completion check asks the accounting system which documents it
// printed or refunded, and turns the answers into finalized jobs for the
// job store's alternate completion path.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use proxyprint_bridge::traits::BillingAdapter;
use proxyprint_core::error::Result;
use proxyprint_core::types::{Amount, ExternalJobId, FinalizedJob, PrintJobState, UserId};

/// Name recorded on jobs finalized by the accounting system.
pub const BILLING_PATH: &str = "billing";

/// A shared account and its weight in the cost split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountShare {
    pub account: String,
    pub weight: u32,
}

/// Who pays for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRequest {
    pub job_name: String,
    pub user_name: String,
    pub cost: Amount,
    pub shared: Vec<AccountShare>,
    /// Weight of the user's personal account.  Ignored when there are no
    /// shared accounts; the user then pays everything.
    pub user_weight: u32,
}

/// A party charged by a settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Party {
    Shared(String),
    User(String),
}

/// Outcome of one settlement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementReport {
    /// Successful charges and their (positive) amounts.
    pub charged: Vec<(Party, Amount)>,
    /// Parties whose adjustment failed.
    pub failed: Vec<Party>,
}

impl SettlementReport {
    pub fn total_charged(&self) -> Amount {
        self.charged.iter().map(|(_, amount)| *amount).sum()
    }
}

/// Split `cost` over the parties by weight.  The last party absorbs the
/// rounding remainder so the parts always add up to `cost`.
pub fn split_cost(request: &SettlementRequest) -> Vec<(Party, Amount)> {
    let user = Party::User(request.user_name.clone());
    let mut parties: Vec<(Party, u32)> = request
        .shared
        .iter()
        .filter(|share| share.weight > 0)
        .map(|share| (Party::Shared(share.account.clone()), share.weight))
        .collect();

    if parties.is_empty() {
        return vec![(user, request.cost)];
    }
    if request.user_weight > 0 {
        parties.push((user, request.user_weight));
    }

    let total: u64 = parties.iter().map(|(_, weight)| u64::from(*weight)).sum();
    let mut allocated = Amount::ZERO;
    let last = parties.len() - 1;
    parties
        .into_iter()
        .enumerate()
        .map(|(i, (party, weight))| {
            let amount = if i == last {
                request.cost - allocated
            } else {
                request.cost.fraction(u64::from(weight), total)
            };
            allocated = allocated + amount;
            (party, amount)
        })
        .collect()
}

/// Charges jobs through the billing adapter.
pub struct BillingSettlement {
    adapter: Arc<dyn BillingAdapter>,
}

impl BillingSettlement {
    pub fn new(adapter: Arc<dyn BillingAdapter>) -> Self {
        Self { adapter }
    }

    #[instrument(skip(self, request), fields(job = %request.job_name, cost = %request.cost))]
    pub async fn settle(&self, request: &SettlementRequest) -> SettlementReport {
        let comment = format!("Proxy print: {}", request.job_name);
        let mut report = SettlementReport::default();

        for (party, amount) in split_cost(request) {
            let charge = amount.negate();
            let result = match &party {
                Party::Shared(account) => {
                    self.adapter
                        .adjust_shared_account(account, charge, &comment)
                        .await
                }
                Party::User(user_name) => {
                    self.adapter
                        .adjust_user_account(user_name, charge, &comment)
                        .await
                }
            };
            match result {
                Ok(()) => {
                    debug!(?party, %amount, "account charged");
                    report.charged.push((party, amount));
                }
                Err(e) => {
                    error!(?party, %amount, "billing adjustment failed: {e}");
                    report.failed.push(party);
                }
            }
        }

        info!(
            charged = report.charged.len(),
            failed = report.failed.len(),
            "settlement finished"
        );
        report
    }
}

/// What the accounting system did with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Printed,
    /// Refunded or cancelled.
    Refunded,
}

impl CompletionOutcome {
    pub fn job_state(&self) -> PrintJobState {
        match self {
            Self::Printed => PrintJobState::Completed,
            Self::Refunded => PrintJobState::Canceled,
        }
    }
}

/// A job released through the accounting system, not yet finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BilledJob {
    pub printer: String,
    pub job_id: ExternalJobId,
    pub user_id: Option<UserId>,
    pub document_name: String,
}

/// Queries the accounting system's usage log.
pub struct ExternalCompletionCheck {
    adapter: Arc<dyn BillingAdapter>,
}

impl ExternalCompletionCheck {
    pub fn new(adapter: Arc<dyn BillingAdapter>) -> Self {
        Self { adapter }
    }

    /// Outcome per document name.  Documents missing from the log are still
    /// in progress and absent from the result.
    pub async fn check(&self, document_names: &[String]) -> Result<HashMap<String, CompletionOutcome>> {
        let entries = self.adapter.get_usage_log(document_names).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| document_names.contains(&entry.document_name))
            .map(|entry| {
                let outcome = if entry.printed && !entry.refunded {
                    CompletionOutcome::Printed
                } else {
                    CompletionOutcome::Refunded
                };
                (entry.document_name, outcome)
            })
            .collect())
    }

    /// Finalized jobs for every billed job the accounting system has
    /// resolved, stamped with `now` (epoch seconds).
    pub async fn finalize(&self, jobs: &[BilledJob], now: i64) -> Result<Vec<FinalizedJob>> {
        let names: Vec<String> = jobs.iter().map(|j| j.document_name.clone()).collect();
        let outcomes = self.check(&names).await?;

        Ok(jobs
            .iter()
            .filter_map(|job| {
                let outcome = outcomes.get(&job.document_name)?;
                Some(FinalizedJob {
                    printer: job.printer.clone(),
                    job_id: job.job_id,
                    user_id: job.user_id,
                    state: outcome.job_state(),
                    completed_at: now,
                    finalized_by: BILLING_PATH.to_string(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use proxyprint_core::error::ProxyPrintError;
    use proxyprint_core::types::UsageLogEntry;

    #[derive(Default)]
    struct FakeBilling {
        failing_account: Option<String>,
        adjustments: Mutex<Vec<(String, Amount)>>,
        log: Vec<UsageLogEntry>,
    }

    #[async_trait]
    impl BillingAdapter for FakeBilling {
        async fn adjust_shared_account(
            &self,
            account: &str,
            amount: Amount,
            _comment: &str,
        ) -> Result<()> {
            if self.failing_account.as_deref() == Some(account) {
                return Err(ProxyPrintError::Billing("account locked".into()));
            }
            self.adjustments
                .lock()
                .unwrap()
                .push((account.to_string(), amount));
            Ok(())
        }

        async fn adjust_user_account(
            &self,
            user_name: &str,
            amount: Amount,
            _comment: &str,
        ) -> Result<()> {
            self.adjustments
                .lock()
                .unwrap()
                .push((format!("user:{user_name}"), amount));
            Ok(())
        }

        async fn get_usage_log(&self, _document_names: &[String]) -> Result<Vec<UsageLogEntry>> {
            Ok(self.log.clone())
        }
    }

    fn amount(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn request(shared: &[(&str, u32)], user_weight: u32) -> SettlementRequest {
        SettlementRequest {
            job_name: "(1-) thesis.pdf".into(),
            user_name: "alice".into(),
            cost: amount("1.00"),
            shared: shared
                .iter()
                .map(|(account, weight)| AccountShare {
                    account: account.to_string(),
                    weight: *weight,
                })
                .collect(),
            user_weight,
        }
    }

    #[test]
    fn user_pays_alone_without_shared_accounts() {
        let split = split_cost(&request(&[], 3));
        assert_eq!(split, vec![(Party::User("alice".into()), amount("1.00"))]);
    }

    #[test]
    fn split_follows_weights_and_adds_up() {
        let split = split_cost(&request(&[("physics", 1), ("library", 1)], 1));
        assert_eq!(split.len(), 3);
        assert_eq!(split[0].1, amount("0.3333"));
        assert_eq!(split[1].1, amount("0.3333"));
        assert_eq!(split[2], (Party::User("alice".into()), amount("0.3334")));
        let total: Amount = split.iter().map(|(_, a)| *a).sum();
        assert_eq!(total, amount("1.00"));
    }

    #[test]
    fn maximal_weights_split_evenly() {
        let split = split_cost(&request(
            &[("physics", u32::MAX), ("library", u32::MAX)],
            u32::MAX,
        ));
        assert_eq!(split[0].1, amount("0.3333"));
        assert_eq!(split[1].1, amount("0.3333"));
        assert_eq!(split[2], (Party::User("alice".into()), amount("0.3334")));
    }

    #[test]
    fn zero_weight_user_is_not_charged() {
        let split = split_cost(&request(&[("physics", 3), ("library", 1)], 0));
        assert_eq!(
            split,
            vec![
                (Party::Shared("physics".into()), amount("0.75")),
                (Party::Shared("library".into()), amount("0.25")),
            ]
        );
    }

    #[tokio::test]
    async fn failed_adjustment_does_not_stop_settlement() {
        let adapter = Arc::new(FakeBilling {
            failing_account: Some("physics".into()),
            ..Default::default()
        });
        let settlement = BillingSettlement::new(adapter.clone());

        let report = settlement
            .settle(&request(&[("physics", 1), ("library", 1)], 0))
            .await;
        assert_eq!(report.failed, vec![Party::Shared("physics".into())]);
        assert_eq!(report.total_charged(), amount("0.50"));

        let adjustments = adapter.adjustments.lock().unwrap().clone();
        assert_eq!(adjustments, vec![("library".to_string(), amount("-0.50"))]);
    }

    #[tokio::test]
    async fn user_account_is_charged_negatively() {
        let adapter = Arc::new(FakeBilling::default());
        let report = BillingSettlement::new(adapter.clone())
            .settle(&request(&[], 0))
            .await;
        assert!(report.failed.is_empty());
        assert_eq!(
            *adapter.adjustments.lock().unwrap(),
            vec![("user:alice".to_string(), amount("-1.00"))]
        );
    }

    fn entry(name: &str, printed: bool, refunded: bool) -> UsageLogEntry {
        UsageLogEntry {
            document_name: name.into(),
            printed,
            refunded,
            cost: amount("0.10"),
        }
    }

    #[tokio::test]
    async fn usage_log_is_classified() {
        let adapter = Arc::new(FakeBilling {
            log: vec![
                entry("a.pdf", true, false),
                entry("b.pdf", true, true),
                entry("c.pdf", false, false),
                entry("unrelated.pdf", true, false),
            ],
            ..Default::default()
        });
        let check = ExternalCompletionCheck::new(adapter);
        let names = vec!["a.pdf".to_string(), "b.pdf".into(), "c.pdf".into(), "d.pdf".into()];
        let outcomes = check.check(&names).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes["a.pdf"], CompletionOutcome::Printed);
        assert_eq!(outcomes["b.pdf"], CompletionOutcome::Refunded);
        assert_eq!(outcomes["c.pdf"], CompletionOutcome::Refunded);
        assert!(!outcomes.contains_key("d.pdf"));
    }

    #[tokio::test]
    async fn resolved_jobs_are_finalized() {
        let adapter = Arc::new(FakeBilling {
            log: vec![entry("a.pdf", true, false), entry("b.pdf", false, true)],
            ..Default::default()
        });
        let check = ExternalCompletionCheck::new(adapter);
        let billed = |id: u32, name: &str| BilledJob {
            printer: "office".into(),
            job_id: ExternalJobId(id),
            user_id: Some(UserId(42)),
            document_name: name.into(),
        };

        let finalized = check
            .finalize(&[billed(1, "a.pdf"), billed(2, "b.pdf"), billed(3, "c.pdf")], 500)
            .await
            .unwrap();
        assert_eq!(finalized.len(), 2);
        assert_eq!(finalized[0].state, PrintJobState::Completed);
        assert_eq!(finalized[1].state, PrintJobState::Canceled);
        assert!(finalized.iter().all(|f| f.finalized_by == BILLING_PATH));
        assert!(finalized.iter().all(|f| f.completed_at == 500));
    }

    #[tokio::test]
    async fn usage_log_failure_is_returned() {
        let check = ExternalCompletionCheck::new(Arc::new(proxyprint_bridge::OfflineBilling));
        assert!(check.check(&["a.pdf".to_string()]).await.is_err());
    }
}
