// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types shared by the planner, the reconciler, and the
// authentication coordinator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProxyPrintError;

/// Identifier of a user known to the print server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job identifier assigned by the printing subsystem (IPP `job-id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalJobId(pub u32);

impl fmt::Display for ExternalJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a job as reported by the printing subsystem.
///
/// Mirrors the IPP `job-state` enum (RFC 8011 §5.3.7) with an extra
/// `Unknown` for values we cannot map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrintJobState {
    Pending,
    PendingHeld,
    Processing,
    ProcessingStopped,
    Canceled,
    Aborted,
    Completed,
    Unknown,
}

impl PrintJobState {
    /// Map an IPP `job-state` enum value.
    pub fn from_ipp(value: i32) -> Self {
        match value {
            3 => Self::Pending,
            4 => Self::PendingHeld,
            5 => Self::Processing,
            6 => Self::ProcessingStopped,
            7 => Self::Canceled,
            8 => Self::Aborted,
            9 => Self::Completed,
            _ => Self::Unknown,
        }
    }

    /// IPP `job-state` enum value (0 for `Unknown`).
    pub fn ipp_value(&self) -> i32 {
        match self {
            Self::Pending => 3,
            Self::PendingHeld => 4,
            Self::Processing => 5,
            Self::ProcessingStopped => 6,
            Self::Canceled => 7,
            Self::Aborted => 8,
            Self::Completed => 9,
            Self::Unknown => 0,
        }
    }

    /// Whether the job has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Canceled | Self::Aborted | Self::Completed)
    }

    /// Severity of the admin event published when a job enters this state.
    pub fn event_severity(&self) -> EventSeverity {
        match self {
            Self::PendingHeld | Self::Aborted | Self::Canceled => EventSeverity::Warn,
            Self::ProcessingStopped | Self::Unknown => EventSeverity::Error,
            Self::Pending | Self::Processing | Self::Completed => EventSeverity::Info,
        }
    }

    /// Lower-case keyword used in logs, events, and the job store.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PendingHeld => "pending-held",
            Self::Processing => "processing",
            Self::ProcessingStopped => "processing-stopped",
            Self::Canceled => "canceled",
            Self::Aborted => "aborted",
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PrintJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Severity attached to admin events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSeverity {
    Info,
    Warn,
    Error,
}

impl EventSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// Kind of message placed in a user's notification inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserMessageKind {
    PrintCompleted,
    PrintCanceled,
}

impl UserMessageKind {
    /// Message kind matching a finished job state.
    pub fn for_state(state: PrintJobState) -> Self {
        if state == PrintJobState::Completed {
            Self::PrintCompleted
        } else {
            Self::PrintCanceled
        }
    }
}

/// Point-in-time view of a job, as delivered by either status feed or
/// pulled from the printer gateway.
///
/// Times are epoch seconds.  A snapshot without `created_at` is not
/// trackable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintJobSnapshot {
    pub printer: String,
    pub job_id: ExternalJobId,
    pub job_name: String,
    pub state: PrintJobState,
    pub created_at: Option<i64>,
    pub completed_at: Option<i64>,
}

/// A job issued through this system that the store still considers active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveJob {
    pub printer: String,
    pub job_id: ExternalJobId,
    pub job_name: String,
    pub user_id: Option<UserId>,
    pub state: PrintJobState,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

/// A job that some other path (e.g. a third-party accounting system) has
/// already finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedJob {
    pub printer: String,
    pub job_id: ExternalJobId,
    pub user_id: Option<UserId>,
    pub state: PrintJobState,
    pub completed_at: i64,
    /// Name of the path that finalized the job.
    pub finalized_by: String,
}

/// Event delivered by a card reader attached to a print-release terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReaderEvent {
    /// A card was presented; the number is the raw reading.
    CardSwiped { card_number: String },
    /// Synthetic event injected to unblock waiters.
    Void,
    /// Any other device event (keypad, tamper, ...).
    Other(String),
}

/// A resolved user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: UserId,
    pub user_name: String,
}

/// One entry in a billing system's usage log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLogEntry {
    pub document_name: String,
    pub printed: bool,
    pub refunded: bool,
    pub cost: Amount,
}

/// Fixed-point money amount with four decimal places.
///
/// Stored as an integer count of 1/10000 units so that summing costs never
/// drifts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Amount(i64);

impl Amount {
    pub const SCALE: i64 = 10_000;
    pub const ZERO: Amount = Amount(0);

    /// Build from raw 1/10000 units.
    pub const fn from_units(units: i64) -> Self {
        Self(units)
    }

    pub fn units(&self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Multiply by a whole quantity (sheets, copies).
    pub fn times(self, quantity: u32) -> Amount {
        Amount(self.0.saturating_mul(i64::from(quantity)))
    }

    /// Split by a weight fraction `numerator / denominator`, truncating.
    /// Results outside the `i64` range saturate.
    pub fn fraction(self, numerator: u64, denominator: u64) -> Amount {
        if denominator == 0 {
            return Amount::ZERO;
        }
        let scaled = i128::from(self.0) * i128::from(numerator) / i128::from(denominator);
        Amount(i64::try_from(scaled).unwrap_or(if scaled < 0 { i64::MIN } else { i64::MAX }))
    }

    pub fn negate(self) -> Amount {
        Amount(self.0.saturating_neg())
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = Self::SCALE as u64;
        write!(f, "{sign}{}.{:04}", abs / scale, abs % scale)
    }
}

impl FromStr for Amount {
    type Err = ProxyPrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProxyPrintError::Rule(format!("invalid amount: {s:?}"));
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if frac.len() > 4 || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac_units: i64 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<4}").parse().map_err(|_| invalid())?
        };
        let units = whole
            .checked_mul(Self::SCALE)
            .and_then(|w| w.checked_add(frac_units))
            .ok_or_else(invalid)?;
        Ok(Amount(if negative { -units } else { units }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipp_job_state_mapping() {
        assert_eq!(PrintJobState::from_ipp(9), PrintJobState::Completed);
        assert_eq!(PrintJobState::from_ipp(4), PrintJobState::PendingHeld);
        assert_eq!(PrintJobState::from_ipp(42), PrintJobState::Unknown);
        assert_eq!(PrintJobState::Processing.ipp_value(), 5);
    }

    #[test]
    fn finished_states() {
        assert!(PrintJobState::Completed.is_finished());
        assert!(PrintJobState::Canceled.is_finished());
        assert!(PrintJobState::Aborted.is_finished());
        assert!(!PrintJobState::ProcessingStopped.is_finished());
        assert!(!PrintJobState::PendingHeld.is_finished());
    }

    #[test]
    fn event_severity_per_state() {
        assert_eq!(PrintJobState::PendingHeld.event_severity(), EventSeverity::Warn);
        assert_eq!(PrintJobState::Aborted.event_severity(), EventSeverity::Warn);
        assert_eq!(PrintJobState::Canceled.event_severity(), EventSeverity::Warn);
        assert_eq!(
            PrintJobState::ProcessingStopped.event_severity(),
            EventSeverity::Error
        );
        assert_eq!(PrintJobState::Unknown.event_severity(), EventSeverity::Error);
        assert_eq!(PrintJobState::Completed.event_severity(), EventSeverity::Info);
    }

    #[test]
    fn amount_parse_and_display() {
        let a: Amount = "0.10".parse().unwrap();
        assert_eq!(a.units(), 1_000);
        assert_eq!(a.to_string(), "0.1000");

        let b: Amount = "-1.5".parse().unwrap();
        assert_eq!(b.units(), -15_000);
        assert_eq!(b.to_string(), "-1.5000");

        assert_eq!("3".parse::<Amount>().unwrap().units(), 30_000);
        assert!("0.12345".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
        assert!(".".parse::<Amount>().is_err());
    }

    #[test]
    fn amount_arithmetic() {
        let a: Amount = "0.25".parse().unwrap();
        assert_eq!(a.times(4), "1.00".parse().unwrap());
        assert_eq!(a.fraction(1, 2).units(), 1_250);
        assert_eq!(a.fraction(1, 0), Amount::ZERO);
        let total: Amount = [a, a, a].into_iter().sum();
        assert_eq!(total.units(), 7_500);
    }

    #[test]
    fn large_fractions_do_not_overflow() {
        let max = Amount::from_units(i64::MAX);
        let weight = u64::from(u32::MAX);
        assert_eq!(max.fraction(weight, weight), max);
        assert_eq!(
            max.fraction(weight - 1, weight).units(),
            9_223_372_034_707_292_158
        );
        assert_eq!(max.fraction(3, 1), max);
        assert_eq!(Amount::from_units(i64::MIN).fraction(2, 1).units(), i64::MIN);
        assert_eq!(Amount::from_units(i64::MIN).negate().units(), i64::MAX);
    }
}
