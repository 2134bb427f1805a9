//! Provisioning and greeting pipeline.
//!
//! Each stage is a precondition for the next:
//! [`FundingGuard`] → [`verify_program`] → [`ensure_account`] →
//! [`send_greeting`] → [`read_greeting`]. [`Session`] threads the connection,
//! payer, program and derived address through the stages and refuses to run
//! them out of order. Nothing is retried; the first failure ends the run.

use std::fmt;

use greeting_core::tx::{Instruction, Message, Transaction};
use greeting_core::{DecodeError, DerivationError, EncodeError, KeyError, Keypair, Pubkey, Signature};

use crate::ledger::{Lamports, LedgerTransport, TransportError};

mod account;
mod funding;
mod program;
mod service;
mod session;

pub use account::{ensure_account, ProvisionPolicy, Provisioned};
pub use funding::{FundingGuard, FundingReport, SAFETY_MULTIPLIER};
pub use program::{verify_program, DeployHint};
pub use service::{read_greeting, send_greeting};
pub use session::{RunReport, Session, SessionState};

/// Seed the greeting account address is derived from.
pub const DEFAULT_SEED: &str = "hello";

#[derive(Debug, thiserror::Error)]
pub enum GreeterError {
    #[error("cannot encode greeting: {0}")]
    Encoding(#[from] EncodeError),

    #[error("cannot decode greeting: {0}")]
    Decoding(#[from] DecodeError),

    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("could not fund payer {payer} up to {required} lamports: {source}")]
    InsufficientFunding {
        payer: Pubkey,
        required: Lamports,
        #[source]
        source: TransportError,
    },

    #[error("program {program_id} {hint}")]
    ProgramNotDeployed { program_id: Pubkey, hint: DeployHint },

    #[error("program {0} is not executable")]
    ProgramNotExecutable(Pubkey),

    #[error("could not create account {address}: {source}")]
    AccountCreation {
        address: Pubkey,
        #[source]
        source: TransportError,
    },

    #[error(
        "account {address} is owned by {actual_owner} with {actual_size} bytes, expected {expected_owner} with {expected_size} bytes"
    )]
    AccountMismatch {
        address: Pubkey,
        expected_owner: Pubkey,
        actual_owner: Pubkey,
        expected_size: usize,
        actual_size: usize,
    },

    #[error("cannot find the greeted account {0}")]
    AccountNotFound(Pubkey),

    #[error("could not greet {address}: {source}")]
    Submission {
        address: Pubkey,
        #[source]
        source: TransportError,
    },

    #[error("cannot derive account address: {0}")]
    Derivation(#[from] DerivationError),

    #[error("ledger query failed: {0}")]
    Transport(#[from] TransportError),

    #[error("session is {state}, expected {expected}")]
    OutOfSequence {
        state: SessionState,
        expected: SessionState,
    },
}

/// Step of a run, named in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    EstablishPayer,
    VerifyProgram,
    ProvisionAccount,
    Greet,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Connect => "connect",
            Stage::EstablishPayer => "establish payer",
            Stage::VerifyProgram => "verify program",
            Stage::ProvisionAccount => "provision account",
            Stage::Greet => "greet",
            Stage::Report => "report",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: GreeterError,
}

impl StageError {
    pub fn new(stage: Stage, source: impl Into<GreeterError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Parse a base58 account or program id supplied by the operator.
pub fn parse_key(text: &str) -> Result<Pubkey, GreeterError> {
    Ok(text.trim().parse::<Pubkey>()?)
}

/// Sign `instructions` with `payer` against the latest blockhash and block
/// until the ledger confirms them.
pub(crate) fn submit<L: LedgerTransport + ?Sized>(
    ledger: &mut L,
    payer: &Keypair,
    instructions: &[Instruction],
) -> Result<Signature, TransportError> {
    let rejected = |e: greeting_core::TxError| TransportError::Rejected(e.to_string());
    let message = Message::new(instructions, &payer.pubkey()).map_err(rejected)?;
    let mut tx = Transaction::new_unsigned(message);
    tx.sign(&[payer], ledger.latest_blockhash()?).map_err(rejected)?;
    ledger.send_and_confirm(&tx)
}
