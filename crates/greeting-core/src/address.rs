use sha2::{Digest, Sha256};

use crate::error::DerivationError;
use crate::keys::Pubkey;

/// Longest seed accepted by the system program.
pub const MAX_SEED_LEN: usize = 32;

/// Suffix reserved for program derived addresses; such owners cannot be used
/// for seed derivation.
const PDA_MARKER: &[u8; 21] = b"ProgramDerivedAddress";

/// Derive the address of an account created with `seed` on behalf of `base`
/// and owned by `owner`.
///
/// The result is `sha256(base || seed || owner)`, so the same inputs always
/// find the same account without the address being stored anywhere. The
/// address has no private key.
pub fn create_with_seed(base: &Pubkey, seed: &str, owner: &Pubkey) -> Result<Pubkey, DerivationError> {
    if seed.len() > MAX_SEED_LEN {
        return Err(DerivationError::MaxSeedLengthExceeded {
            len: seed.len(),
            max: MAX_SEED_LEN,
        });
    }
    if owner.as_bytes().ends_with(PDA_MARKER) {
        return Err(DerivationError::IllegalOwner);
    }
    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    hasher.update(seed.as_bytes());
    hasher.update(owner.as_bytes());
    Ok(Pubkey::new(hasher.finalize().into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::keys::Keypair;

    #[test]
    fn derivation_is_deterministic() {
        let base = Keypair::generate().pubkey();
        let program = Keypair::generate().pubkey();
        let first = create_with_seed(&base, "hello", &program).unwrap();
        let second = create_with_seed(&base, "hello", &program).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn every_input_contributes_to_the_address() {
        let base = Keypair::generate().pubkey();
        let other_base = Keypair::generate().pubkey();
        let program = Keypair::generate().pubkey();
        let address = create_with_seed(&base, "hello", &program).unwrap();
        assert_ne!(address, create_with_seed(&base, "hellp", &program).unwrap());
        assert_ne!(address, create_with_seed(&other_base, "hello", &program).unwrap());
        assert_ne!(address, create_with_seed(&base, "hello", &other_base).unwrap());
    }

    #[test]
    fn matches_the_plain_sha256_layout() {
        let base = Pubkey::new([1u8; 32]);
        let owner = Pubkey::new([2u8; 32]);
        let mut preimage = Vec::new();
        preimage.extend_from_slice(&[1u8; 32]);
        preimage.extend_from_slice(b"hello");
        preimage.extend_from_slice(&[2u8; 32]);
        let expected: [u8; 32] = Sha256::digest(&preimage).into();
        assert_eq!(create_with_seed(&base, "hello", &owner).unwrap(), Pubkey::new(expected));
    }

    #[test]
    fn long_seeds_and_reserved_owners_are_rejected() {
        let base = Pubkey::new([1u8; 32]);
        let owner = Pubkey::new([2u8; 32]);
        let seed = "s".repeat(MAX_SEED_LEN + 1);
        assert_eq!(
            create_with_seed(&base, &seed, &owner),
            Err(DerivationError::MaxSeedLengthExceeded { len: 33, max: 32 })
        );
        assert!(create_with_seed(&base, &"s".repeat(MAX_SEED_LEN), &owner).is_ok());

        let mut reserved = [0u8; 32];
        reserved[11..].copy_from_slice(PDA_MARKER);
        assert_eq!(
            create_with_seed(&base, "hello", &Pubkey::new(reserved)),
            Err(DerivationError::IllegalOwner)
        );
    }
}
