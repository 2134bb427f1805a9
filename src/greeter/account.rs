use greeting_core::tx::system::create_account_with_seed;
use greeting_core::{create_with_seed, Keypair, Pubkey, RECORD_SIZE};

use super::{submit, GreeterError};
use crate::ledger::LedgerTransport;

/// How far an already existing greeting account is trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProvisionPolicy {
    /// Presence alone is enough.
    #[default]
    Trust,
    /// Owner must be the program and storage must be exactly the record size.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provisioned {
    pub address: Pubkey,
    /// False when the account already existed.
    pub created: bool,
}

/// Derive the greeting account for `(payer, seed, program_id)` and create it,
/// owned by the program and rent exempt, unless it already exists.
pub fn ensure_account<L: LedgerTransport + ?Sized>(
    ledger: &mut L,
    payer: &Keypair,
    seed: &str,
    program_id: &Pubkey,
    policy: ProvisionPolicy,
) -> Result<Provisioned, GreeterError> {
    let base = payer.pubkey();
    let address = create_with_seed(&base, seed, program_id)?;

    if let Some(existing) = ledger.account(&address)? {
        if policy == ProvisionPolicy::Strict
            && (existing.owner != *program_id || existing.data.len() != RECORD_SIZE)
        {
            return Err(GreeterError::AccountMismatch {
                address,
                expected_owner: *program_id,
                actual_owner: existing.owner,
                expected_size: RECORD_SIZE,
                actual_size: existing.data.len(),
            });
        }
        return Ok(Provisioned {
            address,
            created: false,
        });
    }

    let lamports = ledger.minimum_balance_for_rent_exemption(RECORD_SIZE)?;
    let ix = create_account_with_seed(
        &base,
        &address,
        &base,
        seed,
        lamports,
        RECORD_SIZE as u64,
        program_id,
    );
    submit(ledger, payer, &[ix]).map_err(|source| GreeterError::AccountCreation { address, source })?;
    Ok(Provisioned {
        address,
        created: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::greeter::testing::{ScriptedLedger, RECORD_RENT};
    use crate::ledger::{Account, LAMPORTS_PER_SOL};

    #[test]
    fn second_call_finds_the_first_account() {
        let mut ledger = ScriptedLedger::with_cluster_prices();
        let payer = Keypair::generate();
        ledger.request_airdrop(&payer.pubkey(), LAMPORTS_PER_SOL).unwrap();
        let program_id = Keypair::generate().pubkey();

        let first = ensure_account(&mut ledger, &payer, "hello", &program_id, ProvisionPolicy::Trust).unwrap();
        assert!(first.created);
        let second = ensure_account(&mut ledger, &payer, "hello", &program_id, ProvisionPolicy::Trust).unwrap();
        assert!(!second.created);
        assert_eq!(first.address, second.address);
        assert_eq!(ledger.sent.len(), 1);

        let account = ledger.account(&first.address).unwrap().unwrap();
        assert_eq!(account.owner, program_id);
        assert_eq!(account.lamports, RECORD_RENT);
        assert_eq!(account.data, vec![0u8; RECORD_SIZE]);
    }

    #[test]
    fn existing_account_submits_nothing() {
        let payer = Keypair::generate();
        let program_id = Pubkey::new([9u8; 32]);
        let address = create_with_seed(&payer.pubkey(), "hello", &program_id).unwrap();
        let mut ledger = ScriptedLedger::default();
        ledger.accounts.insert(
            address,
            Account {
                lamports: 1,
                data: vec![0u8; RECORD_SIZE],
                owner: program_id,
                executable: false,
            },
        );
        let provisioned = ensure_account(&mut ledger, &payer, "hello", &program_id, ProvisionPolicy::Strict).unwrap();
        assert_eq!(provisioned.address, address);
        assert!(!provisioned.created);
        assert!(ledger.sent.is_empty());
    }

    #[test]
    fn creation_requests_rent_exempt_record_storage() {
        let payer = Keypair::generate();
        let program_id = Pubkey::new([9u8; 32]);
        let mut ledger = ScriptedLedger::with_cluster_prices();
        ledger.balance = LAMPORTS_PER_SOL;
        ensure_account(&mut ledger, &payer, "hello", &program_id, ProvisionPolicy::Trust).unwrap();
        assert_eq!(ledger.sent.len(), 1);
        let tx = &ledger.sent[0];
        assert!(tx.verify());
        let data = &tx.message.instructions[0].data;
        let expected = create_account_with_seed(
            &payer.pubkey(),
            &create_with_seed(&payer.pubkey(), "hello", &program_id).unwrap(),
            &payer.pubkey(),
            "hello",
            RECORD_RENT,
            RECORD_SIZE as u64,
            &program_id,
        );
        assert_eq!(data, &expected.data);
    }

    #[test]
    fn strict_policy_flags_foreign_or_resized_accounts() {
        let payer = Keypair::generate();
        let program_id = Pubkey::new([9u8; 32]);
        let address = create_with_seed(&payer.pubkey(), "hello", &program_id).unwrap();
        let mut ledger = ScriptedLedger::default();
        ledger.accounts.insert(
            address,
            Account {
                lamports: 1,
                data: vec![0u8; 64],
                owner: Pubkey::new([8u8; 32]),
                executable: false,
            },
        );

        assert!(ensure_account(&mut ledger, &payer, "hello", &program_id, ProvisionPolicy::Trust).is_ok());
        let err = ensure_account(&mut ledger, &payer, "hello", &program_id, ProvisionPolicy::Strict).unwrap_err();
        match err {
            GreeterError::AccountMismatch {
                actual_owner,
                actual_size,
                ..
            } => {
                assert_eq!(actual_owner, Pubkey::new([8u8; 32]));
                assert_eq!(actual_size, 64);
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(ledger.sent.is_empty());
    }

    #[test]
    fn oversized_seed_is_a_derivation_error() {
        let mut ledger = ScriptedLedger::default();
        let err = ensure_account(
            &mut ledger,
            &Keypair::generate(),
            &"x".repeat(40),
            &Pubkey::new([9u8; 32]),
            ProvisionPolicy::Trust,
        )
        .unwrap_err();
        assert!(matches!(err, GreeterError::Derivation(_)));
    }

    #[test]
    fn rejected_creation_is_an_account_creation_error() {
        let mut ledger = ScriptedLedger::with_cluster_prices();
        let payer = Keypair::generate();
        let err = ensure_account(&mut ledger, &payer, "hello", &Pubkey::new([9u8; 32]), ProvisionPolicy::Trust)
            .unwrap_err();
        assert!(matches!(err, GreeterError::AccountCreation { .. }));
    }
}
