// Per-bot credit balances.
//
// The ledger is the only place balances change. Callers validate bids
// against the bidder's balance before submitting a charge, so a failed
// charge here means the negotiation engine itself is wrong.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use super::state::Seat;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds: {seat} has {available} credits, charge of {requested} refused")]
    InsufficientFunds {
        seat: Seat,
        requested: u32,
        available: u32,
    },
}

/// Credit balances for both seats. Balances are unsigned, so the
/// non-negativity floor is structural; `charge` keeps them from wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLedger {
    balances: [u32; 2],
}

impl BudgetLedger {
    /// Both seats start at `starting_budget`.
    pub fn new(starting_budget: u32) -> Self {
        BudgetLedger {
            balances: [starting_budget; 2],
        }
    }

    pub fn balance(&self, seat: Seat) -> u32 {
        self.balances[seat.index()]
    }

    /// Whether `seat` can pay `amount` right now.
    pub fn can_afford(&self, seat: Seat, amount: u32) -> bool {
        amount <= self.balance(seat)
    }

    /// Debit `amount` from `seat`. Returns the new balance.
    pub fn charge(&mut self, seat: Seat, amount: u32) -> Result<u32, LedgerError> {
        let available = self.balances[seat.index()];
        if amount > available {
            error!(
                "ledger refused charge: {} has {} credits, requested {}",
                seat, available, amount
            );
            return Err(LedgerError::InsufficientFunds {
                seat,
                requested: amount,
                available,
            });
        }
        let remaining = available - amount;
        self.balances[seat.index()] = remaining;
        debug!("charged {} credits to {} ({} remaining)", amount, seat, remaining);
        Ok(remaining)
    }
}
