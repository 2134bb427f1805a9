use greeting_core::tx::{AccountMeta, Instruction};
use greeting_core::{codec, GreetingRecord, Keypair, Pubkey, Signature};

use super::{submit, GreeterError};
use crate::ledger::LedgerTransport;

/// Send `message` to the program for the account at `address`. The counter
/// sent is always zero; the program keeps its own.
pub fn send_greeting<L: LedgerTransport + ?Sized>(
    ledger: &mut L,
    address: &Pubkey,
    program_id: &Pubkey,
    payer: &Keypair,
    message: &str,
) -> Result<Signature, GreeterError> {
    let data = codec::encode(&GreetingRecord::outgoing(message))?;
    let ix = Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(*address, false)],
        data,
    };
    submit(ledger, payer, &[ix]).map_err(|source| GreeterError::Submission {
        address: *address,
        source,
    })
}

/// Fetch and decode the record stored at `address`.
pub fn read_greeting<L: LedgerTransport + ?Sized>(
    ledger: &L,
    address: &Pubkey,
) -> Result<GreetingRecord, GreeterError> {
    let account = ledger
        .account(address)?
        .ok_or(GreeterError::AccountNotFound(*address))?;
    Ok(codec::decode(&account.data)?)
}
