use greeting_core::{Pubkey, RECORD_SIZE};

use super::GreeterError;
use crate::ledger::{Lamports, LedgerTransport};

/// Signature fees budgeted on top of rent, to cover every transaction of a
/// run and some fee schedule drift.
pub const SAFETY_MULTIPLIER: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingReport {
    pub required: Lamports,
    /// Balance after any top-up.
    pub balance: Lamports,
    pub airdropped: Option<Lamports>,
}

/// Makes sure the payer can afford the greeting account and its fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingGuard {
    pub record_size: usize,
    pub multiplier: u64,
}

impl Default for FundingGuard {
    fn default() -> Self {
        Self {
            record_size: RECORD_SIZE,
            multiplier: SAFETY_MULTIPLIER,
        }
    }
}

impl FundingGuard {
    /// `rent_exempt_minimum(record_size) + fee_per_signature * multiplier`
    pub fn required<L: LedgerTransport + ?Sized>(&self, ledger: &L) -> Result<Lamports, GreeterError> {
        let rent = ledger.minimum_balance_for_rent_exemption(self.record_size)?;
        let fee = ledger.fee_per_signature()?;
        Ok(rent.saturating_add(fee.saturating_mul(self.multiplier)))
    }

    /// Top the payer up to the required balance with a single airdrop if it
    /// falls short. A no-op once funded.
    pub fn ensure_funded<L: LedgerTransport + ?Sized>(
        &self,
        ledger: &mut L,
        payer: &Pubkey,
    ) -> Result<FundingReport, GreeterError> {
        let required = self.required(ledger)?;
        let balance = ledger.balance(payer)?;
        if balance >= required {
            return Ok(FundingReport {
                required,
                balance,
                airdropped: None,
            });
        }

        let shortfall = required - balance;
        let insufficient = |source| GreeterError::InsufficientFunding {
            payer: *payer,
            required,
            source,
        };
        let signature = ledger.request_airdrop(payer, shortfall).map_err(insufficient)?;
        ledger.confirm(&signature).map_err(insufficient)?;
        Ok(FundingReport {
            required,
            balance: ledger.balance(payer)?,
            airdropped: Some(shortfall),
        })
    }
}
