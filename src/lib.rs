//! Client side of the greeting counter.
//!
//! * [`config`] resolves the RPC endpoint, payer and program identity from
//!   flags and the ledger CLI's `config.yml`.
//! * [`ledger`] defines the [`ledger::LedgerTransport`] seam and the account
//!   view it returns.
//! * [`rpc`] talks JSON-RPC to a node over http or https.
//! * [`greeter`] is the pipeline: fund the payer, verify the program,
//!   provision the seed-derived account, greet it and read the counter back.
//!
//! Encoding, keys, address derivation and transaction layout live in
//! `greeting-core` so the program crate can share them.

pub mod config;
pub mod greeter;
pub mod ledger;
pub mod rpc;
