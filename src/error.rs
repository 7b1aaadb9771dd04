// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Timberledger Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Error types for ledger operations, plus non-fatal warnings.
//!
//! Warnings are values returned alongside a successful result (a below-cost
//! sale is allowed, a high transport loss is allowed); they never abort an
//! operation.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Ledger operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Requested volume or piece count exceeds what the lot still holds
    #[error("insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory {
        requested: Decimal,
        available: Decimal,
    },

    /// Loss volume is negative or consumes the full dispatched amount
    #[error("invalid loss volume")]
    InvalidLoss,

    /// Unit price is zero, negative, or beyond the sanity ceiling
    #[error("invalid unit price")]
    InvalidPrice,

    /// Payment is negative or exceeds the total price
    #[error("invalid payment (must be between zero and total price)")]
    InvalidPayment,

    /// Liability split percentages do not sum to 100
    #[error("liability split percentages must sum to 100")]
    InvalidLiabilitySplit,

    /// Referenced entity does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Client still owes money in some currency or category
    #[error("client has outstanding debt")]
    OutstandingDebt,

    /// The owning shipment has closed; inventory can no longer change
    #[error("shipment state forbids this change")]
    IrreversibleState,

    /// A concurrent writer updated the same document first
    #[error("write conflict, state changed underneath this operation")]
    WriteConflict,

    /// Conflict retries exhausted; the caller must resubmit
    #[error("concurrency retries exhausted")]
    ConcurrencyExhausted,

    /// Compensation after a mid-commit failure itself failed; the affected
    /// documents need manual reconciliation
    #[error("compensation failed, manual reconciliation required: {0}")]
    ReconciliationRequired(&'static str),
}

/// Non-fatal warnings attached to a successful sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Unit price is below the lot's break-even price.
    BelowCost { loss_pct: Decimal },
    /// Transport loss exceeds ten percent of the dispatched amount.
    HighLoss { loss_pct: Decimal },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::BelowCost { loss_pct } => {
                write!(f, "selling below cost ({loss_pct}% under break-even)")
            }
            Warning::HighLoss { loss_pct } => {
                write!(f, "transport loss is {loss_pct}% of dispatched amount")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            LedgerError::InsufficientInventory {
                requested: dec!(10.0001),
                available: dec!(10.0000),
            }
            .to_string(),
            "insufficient inventory: requested 10.0001, available 10.0000"
        );
        assert_eq!(LedgerError::InvalidLoss.to_string(), "invalid loss volume");
        assert_eq!(
            LedgerError::InvalidLiabilitySplit.to_string(),
            "liability split percentages must sum to 100"
        );
        assert_eq!(LedgerError::NotFound("lot").to_string(), "lot not found");
        assert_eq!(
            LedgerError::ConcurrencyExhausted.to_string(),
            "concurrency retries exhausted"
        );
    }

    #[test]
    fn warning_display_messages() {
        assert_eq!(
            Warning::BelowCost {
                loss_pct: dec!(12.5)
            }
            .to_string(),
            "selling below cost (12.5% under break-even)"
        );
        assert_eq!(
            Warning::HighLoss {
                loss_pct: dec!(15)
            }
            .to_string(),
            "transport loss is 15% of dispatched amount"
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = LedgerError::WriteConflict;
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
