//! Balance arithmetic for Furriyadh accounts.
//!
//! Amounts are integer micros of the account currency. Every charge adds a
//! fixed commission on top of the spend.

use shared_types::{AccountBalance, BalanceResponse, BalanceStatus};
use thiserror::Error;

pub const COMMISSION_PERCENT: i64 = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("Account is suspended")]
    AccountSuspended,

    #[error("Account is closed")]
    AccountClosed,

    #[error("Amount overflows the ledger")]
    Overflow,
}

/// Commission owed on `spend_micros`, rounded down.
pub fn commission_for(spend_micros: i64) -> i64 {
    spend_micros * COMMISSION_PERCENT / 100
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ledger {
    pub deposited_micros: i64,
    pub spent_micros: i64,
    pub commission_micros: i64,
    pub status: BalanceStatus,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            deposited_micros: 0,
            spent_micros: 0,
            commission_micros: 0,
            status: BalanceStatus::Active,
        }
    }
}

impl Ledger {
    pub fn from_record(record: &AccountBalance) -> Self {
        Self {
            deposited_micros: record.deposited_micros,
            spent_micros: record.spent_micros,
            commission_micros: record.commission_micros,
            status: BalanceStatus::from_str(&record.status).unwrap_or_else(|| {
                tracing::warn!(user_id = %record.user_id, "Unknown balance status '{}'", record.status);
                BalanceStatus::Suspended
            }),
        }
    }

    /// Deposits minus spend and commission. Saturates for rows that were
    /// never written through [`Ledger::deposit`] or [`Ledger::charge`].
    pub fn remaining(&self) -> i64 {
        self.checked_remaining().unwrap_or_else(|| {
            let wide = i128::from(self.deposited_micros)
                - i128::from(self.spent_micros)
                - i128::from(self.commission_micros);
            if wide.is_negative() {
                i64::MIN
            } else {
                i64::MAX
            }
        })
    }

    fn checked_remaining(&self) -> Option<i64> {
        self.deposited_micros
            .checked_sub(self.spent_micros)?
            .checked_sub(self.commission_micros)
    }

    fn ensure_open(&self, amount: i64) -> Result<(), LedgerError> {
        match self.status {
            BalanceStatus::Suspended => return Err(LedgerError::AccountSuspended),
            BalanceStatus::Closed => return Err(LedgerError::AccountClosed),
            BalanceStatus::Active | BalanceStatus::OutOfBalance => {}
        }
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        Ok(())
    }

    /// Add funds. An out-of-balance account becomes active again once the
    /// remaining balance is positive.
    pub fn deposit(&mut self, amount_micros: i64) -> Result<(), LedgerError> {
        self.ensure_open(amount_micros)?;
        let next = Ledger {
            deposited_micros: self
                .deposited_micros
                .checked_add(amount_micros)
                .ok_or(LedgerError::Overflow)?,
            ..*self
        };
        let remaining = next.checked_remaining().ok_or(LedgerError::Overflow)?;

        *self = next;
        if self.status == BalanceStatus::OutOfBalance && remaining > 0 {
            self.status = BalanceStatus::Active;
        }
        Ok(())
    }

    /// Record ad spend plus commission.
    pub fn charge(&mut self, spend_micros: i64) -> Result<(), LedgerError> {
        self.ensure_open(spend_micros)?;
        if spend_micros > i64::MAX / COMMISSION_PERCENT {
            return Err(LedgerError::Overflow);
        }
        let commission = commission_for(spend_micros);

        // Spend and commission land together or not at all.
        let next = Ledger {
            spent_micros: self
                .spent_micros
                .checked_add(spend_micros)
                .ok_or(LedgerError::Overflow)?,
            commission_micros: self
                .commission_micros
                .checked_add(commission)
                .ok_or(LedgerError::Overflow)?,
            ..*self
        };
        let remaining = next.checked_remaining().ok_or(LedgerError::Overflow)?;

        *self = next;
        if remaining <= 0 {
            self.status = BalanceStatus::OutOfBalance;
        }
        Ok(())
    }

    pub fn to_response(&self, currency_code: &str) -> BalanceResponse {
        BalanceResponse {
            currency_code: currency_code.to_string(),
            deposited_micros: self.deposited_micros,
            spent_micros: self.spent_micros,
            commission_micros: self.commission_micros,
            remaining_micros: self.remaining(),
            commission_percent: COMMISSION_PERCENT,
            status: self.status.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commission_is_twenty_percent() {
        assert_eq!(commission_for(10_000_000), 2_000_000);
        assert_eq!(commission_for(3), 0);
    }

    #[test]
    fn test_charge_adds_spend_and_commission() {
        let mut ledger = Ledger::default();
        ledger.deposit(100_000_000).unwrap();
        ledger.charge(50_000_000).unwrap();

        assert_eq!(ledger.spent_micros, 50_000_000);
        assert_eq!(ledger.commission_micros, 10_000_000);
        assert_eq!(ledger.remaining(), 40_000_000);
        assert_eq!(ledger.status, BalanceStatus::Active);
    }

    #[test]
    fn test_exhausted_balance_goes_out_of_balance() {
        let mut ledger = Ledger::default();
        ledger.deposit(12_000_000).unwrap();
        ledger.charge(10_000_000).unwrap();

        assert_eq!(ledger.remaining(), 0);
        assert_eq!(ledger.status, BalanceStatus::OutOfBalance);
    }

    #[test]
    fn test_deposit_reactivates_only_when_positive() {
        let mut ledger = Ledger::default();
        ledger.deposit(1_000_000).unwrap();
        ledger.charge(5_000_000).unwrap();
        assert_eq!(ledger.remaining(), -5_000_000);

        ledger.deposit(5_000_000).unwrap();
        assert_eq!(ledger.status, BalanceStatus::OutOfBalance);

        ledger.deposit(1).unwrap();
        assert_eq!(ledger.status, BalanceStatus::Active);
    }

    #[test]
    fn test_suspended_and_closed_reject_postings() {
        let mut ledger = Ledger {
            status: BalanceStatus::Suspended,
            ..Ledger::default()
        };
        assert_eq!(ledger.deposit(1), Err(LedgerError::AccountSuspended));
        assert_eq!(ledger.charge(1), Err(LedgerError::AccountSuspended));

        ledger.status = BalanceStatus::Closed;
        assert_eq!(ledger.deposit(1), Err(LedgerError::AccountClosed));
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut ledger = Ledger::default();
        assert_eq!(ledger.deposit(0), Err(LedgerError::InvalidAmount(0)));
        assert_eq!(ledger.charge(-10), Err(LedgerError::InvalidAmount(-10)));
    }

    #[test]
    fn test_runaway_charges_stop_at_overflow_without_mutating() {
        let mut ledger = Ledger::default();
        let mut accepted = 0;
        let err = loop {
            match ledger.charge(i64::MAX / 20) {
                Ok(()) => accepted += 1,
                Err(err) => break err,
            }
            assert!(accepted < 100, "charges never overflowed");
        };
        assert_eq!(err, LedgerError::Overflow);

        let before = ledger;
        assert!(ledger.remaining() < 0);
        assert_eq!(ledger.charge(i64::MAX / 20), Err(LedgerError::Overflow));
        assert_eq!(ledger, before);
        assert_eq!(ledger.status, BalanceStatus::OutOfBalance);
    }

    #[test]
    fn test_deposit_that_overflows_remaining_is_rejected() {
        let mut ledger = Ledger {
            deposited_micros: 0,
            spent_micros: i64::MIN + 1,
            commission_micros: 0,
            status: BalanceStatus::Active,
        };
        let before = ledger;
        assert_eq!(ledger.deposit(i64::MAX), Err(LedgerError::Overflow));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_remaining_saturates_for_corrupt_rows() {
        let ledger = Ledger {
            deposited_micros: i64::MIN,
            spent_micros: i64::MAX,
            commission_micros: i64::MAX,
            status: BalanceStatus::Active,
        };
        assert_eq!(ledger.remaining(), i64::MIN);
    }

    #[test]
    fn test_response_reports_remaining() {
        let mut ledger = Ledger::default();
        ledger.deposit(20_000_000).unwrap();
        let response = ledger.to_response("SAR");
        assert_eq!(response.remaining_micros, 20_000_000);
        assert_eq!(response.commission_percent, 20);
        assert_eq!(response.status, "active");
    }
}
