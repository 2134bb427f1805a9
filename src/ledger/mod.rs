use std::time::Duration;

use greeting_core::tx::{Hash, Transaction};
use greeting_core::{Pubkey, Signature};

pub type Lamports = u64;

pub const LAMPORTS_PER_SOL: Lamports = 1_000_000_000;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("http transport: {0}")]
    Http(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { waited: Duration, what: String },
    #[error("unsupported endpoint {0}: expected an http:// or https:// url")]
    UnsupportedUrl(String),
    #[error("transaction rejected: {0}")]
    Rejected(String),
}

/// Account state as reported by the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub lamports: Lamports,
    pub data: Vec<u8>,
    pub owner: Pubkey,
    pub executable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub endpoint: String,
    pub version: String,
}

/// Blocking access to the ledger. Every call returns only once the ledger has
/// answered; submissions return once the transaction is confirmed.
pub trait LedgerTransport {
    fn connection_info(&self) -> Result<ConnectionInfo, TransportError>;

    /// `None` when no account exists at `address`.
    fn account(&self, address: &Pubkey) -> Result<Option<Account>, TransportError>;

    fn balance(&self, address: &Pubkey) -> Result<Lamports, TransportError>;

    fn minimum_balance_for_rent_exemption(&self, size: usize) -> Result<Lamports, TransportError>;

    fn fee_per_signature(&self) -> Result<Lamports, TransportError>;

    fn latest_blockhash(&self) -> Result<Hash, TransportError>;

    fn request_airdrop(&mut self, to: &Pubkey, lamports: Lamports) -> Result<Signature, TransportError>;

    fn confirm(&mut self, signature: &Signature) -> Result<(), TransportError>;

    fn send_and_confirm(&mut self, transaction: &Transaction) -> Result<Signature, TransportError>;
}
