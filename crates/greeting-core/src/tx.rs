//! Ledger transaction wire format.
//!
//! Messages are compiled by hand rather than through a full ledger SDK: the
//! client only ever needs the fee payer, a handful of account metas and opaque
//! instruction data, all of which fit the compact binary layout below.

use std::fmt;
use std::str::FromStr;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{KeyError, TxError};
use crate::keys::{Keypair, Pubkey, Signature};

/// Recent blockhash a transaction is anchored to.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

impl FromStr for Hash {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|_| KeyError::Base58)?;
        <[u8; 32]>::try_from(bytes.as_slice())
            .map(Self)
            .map_err(|_| KeyError::Length {
                expected: 32,
                actual: bytes.len(),
            })
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

/// Append `value` using 7 bits per byte, high bit marking continuation.
pub fn encode_compact_u16(mut value: u16, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// Returns the value and the number of bytes consumed.
pub fn decode_compact_u16(bytes: &[u8]) -> Option<(u16, usize)> {
    let mut value: u32 = 0;
    for (idx, byte) in bytes.iter().take(3).enumerate() {
        value |= u32::from(byte & 0x7f) << (7 * idx);
        if byte & 0x80 == 0 {
            return u16::try_from(value).ok().map(|v| (v, idx + 1));
        }
    }
    None
}

fn compact_len(len: usize) -> Result<u16, TxError> {
    u16::try_from(len).map_err(|_| TxError::Malformed("length exceeds u16"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile `instructions` with `payer` as the first (fee paying) signer.
    pub fn new(instructions: &[Instruction], payer: &Pubkey) -> Result<Self, TxError> {
        // (key, signer, writable) in first-seen order
        let mut metas: Vec<(Pubkey, bool, bool)> = vec![(*payer, true, true)];
        let mut upsert = |key: Pubkey, signer: bool, writable: bool| {
            match metas.iter_mut().find(|(k, _, _)| *k == key) {
                Some(entry) => {
                    entry.1 |= signer;
                    entry.2 |= writable;
                }
                None => metas.push((key, signer, writable)),
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                upsert(meta.pubkey, meta.is_signer, meta.is_writable);
            }
            upsert(ix.program_id, false, false);
        }

        let group = |signer: bool, writable: bool| {
            metas
                .iter()
                .filter(move |(_, s, w)| *s == signer && *w == writable)
                .map(|(k, _, _)| *k)
        };
        let mut account_keys: Vec<Pubkey> = group(true, true).collect();
        let readonly_signed = group(true, false).count();
        account_keys.extend(group(true, false));
        account_keys.extend(group(false, true));
        let readonly_unsigned = group(false, false).count();
        account_keys.extend(group(false, false));

        if account_keys.len() > usize::from(u8::MAX) + 1 {
            return Err(TxError::TooManyAccounts(account_keys.len()));
        }
        let index_of = |key: &Pubkey| -> u8 {
            // every key was inserted above and the count fits u8 indices
            account_keys.iter().position(|k| k == key).unwrap_or_default() as u8
        };

        let mut compiled = Vec::with_capacity(instructions.len());
        for ix in instructions {
            compact_len(ix.data.len())?;
            compiled.push(CompiledInstruction {
                program_id_index: index_of(&ix.program_id),
                accounts: ix.accounts.iter().map(|m| index_of(&m.pubkey)).collect(),
                data: ix.data.clone(),
            });
        }

        let signers = account_keys.len() - group(false, true).count() - readonly_unsigned;
        Ok(Self {
            header: MessageHeader {
                num_required_signatures: signers as u8,
                num_readonly_signed_accounts: readonly_signed as u8,
                num_readonly_unsigned_accounts: readonly_unsigned as u8,
            },
            account_keys,
            recent_blockhash: Hash::default(),
            instructions: compiled,
        })
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }

    pub fn signer_keys(&self) -> &[Pubkey] {
        let n = usize::from(self.header.num_required_signatures).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < usize::from(self.header.num_required_signatures)
    }

    pub fn is_writable(&self, index: usize) -> bool {
        let h = &self.header;
        let signers = usize::from(h.num_required_signatures);
        if index < signers {
            index < signers - usize::from(h.num_readonly_signed_accounts)
        } else {
            let unsigned_writable_end = self
                .account_keys
                .len()
                .saturating_sub(usize::from(h.num_readonly_unsigned_accounts));
            index < unsigned_writable_end
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = vec![
            self.header.num_required_signatures,
            self.header.num_readonly_signed_accounts,
            self.header.num_readonly_unsigned_accounts,
        ];
        // lengths were bounded when the message was compiled
        encode_compact_u16(self.account_keys.len() as u16, &mut out);
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(self.recent_blockhash.as_bytes());
        encode_compact_u16(self.instructions.len() as u16, &mut out);
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_compact_u16(ix.accounts.len() as u16, &mut out);
            out.extend_from_slice(&ix.accounts);
            encode_compact_u16(ix.data.len() as u16, &mut out);
            out.extend_from_slice(&ix.data);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Transaction {
    pub fn new_unsigned(message: Message) -> Self {
        let slots = usize::from(message.header.num_required_signatures);
        Self {
            signatures: vec![Signature::default(); slots],
            message,
        }
    }

    /// Anchor to `blockhash` and sign with every required signer.
    pub fn sign(&mut self, signers: &[&Keypair], blockhash: Hash) -> Result<(), TxError> {
        self.message.recent_blockhash = blockhash;
        let bytes = self.message.serialize();
        let mut signatures = Vec::with_capacity(self.message.signer_keys().len());
        for key in self.message.signer_keys() {
            let signer = signers
                .iter()
                .find(|kp| kp.pubkey() == *key)
                .ok_or_else(|| TxError::MissingSigner(key.to_string()))?;
            signatures.push(signer.sign(&bytes));
        }
        self.signatures = signatures;
        Ok(())
    }

    /// First signature, which identifies the transaction.
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first()
    }

    /// Every required signer produced a valid signature over the message.
    pub fn verify(&self) -> bool {
        let bytes = self.message.serialize();
        let keys = self.message.signer_keys();
        keys.len() == self.signatures.len()
            && keys
                .iter()
                .zip(&self.signatures)
                .all(|(key, sig)| key.verify(&bytes, sig))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_compact_u16(self.signatures.len() as u16, &mut out);
        for sig in &self.signatures {
            out.extend_from_slice(sig.as_bytes());
        }
        out.extend(self.message.serialize());
        out
    }
}

/// The native program that creates accounts.
pub mod system {
    use super::*;

    pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new([0u8; 32]);

    const CREATE_ACCOUNT_WITH_SEED: u32 = 3;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SystemInstruction {
        CreateAccountWithSeed {
            base: Pubkey,
            seed: String,
            lamports: u64,
            space: u64,
            owner: Pubkey,
        },
    }

    impl SystemInstruction {
        pub fn pack(&self) -> Vec<u8> {
            match self {
                SystemInstruction::CreateAccountWithSeed {
                    base,
                    seed,
                    lamports,
                    space,
                    owner,
                } => {
                    let mut out = Vec::with_capacity(4 + 32 + 8 + seed.len() + 16 + 32);
                    out.extend_from_slice(&CREATE_ACCOUNT_WITH_SEED.to_le_bytes());
                    out.extend_from_slice(base.as_bytes());
                    out.extend_from_slice(&(seed.len() as u64).to_le_bytes());
                    out.extend_from_slice(seed.as_bytes());
                    out.extend_from_slice(&lamports.to_le_bytes());
                    out.extend_from_slice(&space.to_le_bytes());
                    out.extend_from_slice(owner.as_bytes());
                    out
                }
            }
        }

        pub fn unpack(data: &[u8]) -> Result<Self, TxError> {
            let mut cursor = Cursor { data };
            let tag = u32::from_le_bytes(cursor.array()?);
            if tag != CREATE_ACCOUNT_WITH_SEED {
                return Err(TxError::UnsupportedSystemInstruction(tag));
            }
            let base = Pubkey::new(cursor.array()?);
            let seed_len = usize::try_from(u64::from_le_bytes(cursor.array()?))
                .map_err(|_| TxError::Malformed("seed length"))?;
            let seed = String::from_utf8(cursor.take(seed_len)?.to_vec())
                .map_err(|_| TxError::Malformed("seed is not utf-8"))?;
            let lamports = u64::from_le_bytes(cursor.array()?);
            let space = u64::from_le_bytes(cursor.array()?);
            let owner = Pubkey::new(cursor.array()?);
            if !cursor.data.is_empty() {
                return Err(TxError::Malformed("trailing bytes"));
            }
            Ok(SystemInstruction::CreateAccountWithSeed {
                base,
                seed,
                lamports,
                space,
                owner,
            })
        }
    }

    struct Cursor<'a> {
        data: &'a [u8],
    }

    impl<'a> Cursor<'a> {
        fn take(&mut self, n: usize) -> Result<&'a [u8], TxError> {
            if self.data.len() < n {
                return Err(TxError::Malformed("unexpected end of data"));
            }
            let (head, tail) = self.data.split_at(n);
            self.data = tail;
            Ok(head)
        }

        fn array<const N: usize>(&mut self) -> Result<[u8; N], TxError> {
            let mut out = [0u8; N];
            out.copy_from_slice(self.take(N)?);
            Ok(out)
        }
    }

    /// Create `to`, the address derived from `(base, seed, owner)`, funded by
    /// `from` with `space` bytes of zeroed storage.
    pub fn create_account_with_seed(
        from: &Pubkey,
        to: &Pubkey,
        base: &Pubkey,
        seed: &str,
        lamports: u64,
        space: u64,
        owner: &Pubkey,
    ) -> Instruction {
        let data = SystemInstruction::CreateAccountWithSeed {
            base: *base,
            seed: seed.to_string(),
            lamports,
            space,
            owner: *owner,
        }
        .pack();
        Instruction {
            program_id: SYSTEM_PROGRAM_ID,
            accounts: vec![
                AccountMeta::new(*from, true),
                AccountMeta::new(*to, false),
                AccountMeta::new_readonly(*base, true),
            ],
            data,
        }
    }
}
