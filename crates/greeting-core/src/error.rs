use thiserror::Error;

/// Malformed key material supplied as text or raw bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid base58 encoding")]
    Base58,

    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    /// Secret and public halves of a keypair do not belong together.
    #[error("invalid ed25519 keypair bytes")]
    Keypair,
}

/// Failure to derive a seed-based address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DerivationError {
    #[error("seed is {len} bytes, at most {max} allowed")]
    MaxSeedLengthExceeded { len: usize, max: usize },

    #[error("owner key is reserved for program derived addresses")]
    IllegalOwner,
}

/// A record that cannot be represented in the greeting schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("message of {len} bytes does not fit a u32 length prefix")]
    MessageTooLong { len: usize },

    #[error("borsh encoding failed: {0}")]
    Borsh(String),
}

/// Bytes that do not hold a greeting record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer of {len} bytes is shorter than the {min} byte fixed width")]
    TooShort { len: usize, min: usize },

    #[error("declared message length {declared} exceeds the {available} bytes available")]
    Truncated { declared: usize, available: usize },

    #[error("message is not valid utf-8")]
    InvalidUtf8,

    #[error("borsh decoding failed: {0}")]
    Borsh(String),
}

/// Client and program were built against different record schemas.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("schema mismatch: expected {expected}, found {actual}")]
pub struct SchemaMismatch {
    pub expected: String,
    pub actual: String,
}

/// Transaction assembly and decoding failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("transaction requires a signature from {0}")]
    MissingSigner(String),

    #[error("too many accounts in message: {0}")]
    TooManyAccounts(usize),

    #[error("malformed instruction data: {0}")]
    Malformed(&'static str),

    #[error("unsupported system instruction {0}")]
    UnsupportedSystemInstruction(u32),
}
