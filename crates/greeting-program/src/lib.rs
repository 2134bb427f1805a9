//! Processor for the greeting counter program.
//!
//! The program owns greeting accounts. Each instruction carries an encoded
//! [`GreetingRecord`]; the processor bumps the stored counter, stores the
//! instruction's message and writes the record back into the account's fixed
//! storage. The record layout comes from the same [`GREETING_SCHEMA`] the
//! client encodes against.

use greeting_core::{
    codec, DecodeError, EncodeError, GreetingRecord, Pubkey, SchemaDescriptor, GREETING_SCHEMA,
};
use thiserror::Error;

#[cfg(feature = "entrypoint")]
pub mod entrypoint;

/// Schema this processor was built against.
pub const SCHEMA: SchemaDescriptor = GREETING_SCHEMA;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("instruction expects a greeted account")]
    NotEnoughAccountKeys,

    #[error("greeted account {0} is not owned by this program")]
    IncorrectProgramId(Pubkey),

    #[error("greeted account {0} is not writable")]
    NotWritable(Pubkey),

    #[error("invalid instruction data: {0}")]
    InvalidInstructionData(DecodeError),

    #[error("invalid account data: {0}")]
    InvalidAccountData(DecodeError),

    #[error("greeting counter overflowed")]
    CounterOverflow,

    #[error("record needs {needed} bytes, account holds {available}")]
    AccountDataTooSmall { needed: usize, available: usize },

    #[error("record encoding failed: {0}")]
    Encoding(EncodeError),
}

/// Account handed to the processor by the runtime.
#[derive(Debug)]
pub struct AccountView<'a> {
    pub key: Pubkey,
    pub owner: Pubkey,
    pub is_writable: bool,
    pub data: &'a mut [u8],
}

/// Fingerprint clients compare against before trusting the layout.
pub fn schema_fingerprint() -> [u8; 32] {
    SCHEMA.fingerprint()
}

/// Greet the first account: bump its counter and store the sent message.
/// Returns the record now held by the account.
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &mut [AccountView<'_>],
    instruction_data: &[u8],
) -> Result<GreetingRecord, ProgramError> {
    let account = accounts
        .first_mut()
        .ok_or(ProgramError::NotEnoughAccountKeys)?;
    if account.owner != *program_id {
        return Err(ProgramError::IncorrectProgramId(account.key));
    }
    if !account.is_writable {
        return Err(ProgramError::NotWritable(account.key));
    }

    let sent = codec::decode(instruction_data).map_err(ProgramError::InvalidInstructionData)?;
    let stored = codec::decode(&account.data[..]).map_err(ProgramError::InvalidAccountData)?;

    let updated = GreetingRecord {
        counter: stored
            .counter
            .checked_add(1)
            .ok_or(ProgramError::CounterOverflow)?,
        message: sent.message,
    };
    store(&updated, account.data)?;
    Ok(updated)
}

fn store(record: &GreetingRecord, data: &mut [u8]) -> Result<(), ProgramError> {
    let bytes = codec::encode(record).map_err(ProgramError::Encoding)?;
    if bytes.len() > data.len() {
        return Err(ProgramError::AccountDataTooSmall {
            needed: bytes.len(),
            available: data.len(),
        });
    }
    let (head, tail) = data.split_at_mut(bytes.len());
    head.copy_from_slice(&bytes);
    tail.fill(0);
    Ok(())
}
