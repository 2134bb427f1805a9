//! Native entrypoint. Built into the deployable shared object with
//! `cargo build-sbf --features entrypoint --sbf-out-dir dist/program`.

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint,
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError as NativeError,
    pubkey::Pubkey as NativePubkey,
};

use greeting_core::Pubkey;

use crate::{process_instruction, AccountView, ProgramError};

entrypoint!(process);

impl From<ProgramError> for NativeError {
    fn from(err: ProgramError) -> Self {
        match err {
            ProgramError::NotEnoughAccountKeys => NativeError::NotEnoughAccountKeys,
            ProgramError::IncorrectProgramId(_) => NativeError::IncorrectProgramId,
            ProgramError::NotWritable(_) | ProgramError::InvalidAccountData(_) => NativeError::InvalidAccountData,
            ProgramError::InvalidInstructionData(_) | ProgramError::Encoding(_) => {
                NativeError::InvalidInstructionData
            }
            ProgramError::CounterOverflow => NativeError::ArithmeticOverflow,
            ProgramError::AccountDataTooSmall { .. } => NativeError::AccountDataTooSmall,
        }
    }
}

fn key(native: &NativePubkey) -> Pubkey {
    Pubkey::new(native.to_bytes())
}

pub fn process(program_id: &NativePubkey, accounts: &[AccountInfo], instruction_data: &[u8]) -> ProgramResult {
    let accounts_iter = &mut accounts.iter();
    let greeted = next_account_info(accounts_iter)?;
    let mut data = greeted.try_borrow_mut_data()?;
    let mut views = [AccountView {
        key: key(greeted.key),
        owner: key(greeted.owner),
        is_writable: greeted.is_writable,
        data: &mut data[..],
    }];
    match process_instruction(&key(program_id), &mut views, instruction_data) {
        Ok(record) => {
            msg!("Greeted {} time(s)!", record.counter);
            Ok(())
        }
        Err(err) => {
            msg!("{}", err);
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use greeting_core::{codec, GreetingRecord, RECORD_SIZE};

    #[test]
    fn entrypoint_greets_an_owned_account() {
        let program_id = NativePubkey::new_from_array([9u8; 32]);
        let address = NativePubkey::new_from_array([1u8; 32]);
        let mut lamports = 1_023_120;
        let mut data = vec![0u8; RECORD_SIZE];
        let account = AccountInfo::new(&address, false, true, &mut lamports, &mut data, &program_id, false, 0);

        let ix = codec::encode(&GreetingRecord::outgoing("Hello World")).unwrap();
        process(&program_id, &[account.clone()], &ix).unwrap();
        process(&program_id, &[account.clone()], &ix).unwrap();
        let stored = codec::decode(&account.data.borrow()).unwrap();
        assert_eq!(stored.counter, 2);
    }

    #[test]
    fn failures_map_to_native_errors() {
        let program_id = NativePubkey::new_from_array([9u8; 32]);
        let stranger = NativePubkey::new_from_array([8u8; 32]);
        let address = NativePubkey::new_from_array([1u8; 32]);
        let mut lamports = 1;
        let mut data = vec![0u8; RECORD_SIZE];
        let account = AccountInfo::new(&address, false, true, &mut lamports, &mut data, &stranger, false, 0);
        let ix = codec::encode(&GreetingRecord::outgoing("Hello World")).unwrap();

        assert_eq!(process(&program_id, &[account], &ix), Err(NativeError::IncorrectProgramId));
        assert_eq!(process(&program_id, &[], &ix), Err(NativeError::NotEnoughAccountKeys));
        assert_eq!(
            NativeError::from(ProgramError::AccountDataTooSmall { needed: 20, available: 19 }),
            NativeError::AccountDataTooSmall
        );
    }
}
