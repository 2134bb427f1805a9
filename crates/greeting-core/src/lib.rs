//! Wire primitives for the greeting counter client and program.
//!
//! No ledger runtime dependency; the client and the program both build on
//! it:
//!
//! * [`keys`]: public keys, ed25519 keypairs and signatures with base58 text
//!   forms.
//! * [`address`]: seed-derived account addresses.
//! * [`schema`]: the versioned descriptor of the greeting record layout.
//! * [`codec`]: borsh encoding of [`codec::GreetingRecord`] checked against
//!   the schema.
//! * [`tx`]: instructions, compiled messages, signed transactions and the
//!   system program's create-with-seed instruction.

pub mod address;
pub mod codec;
pub mod keys;
pub mod schema;
pub mod tx;

mod error;

pub use address::{create_with_seed, MAX_SEED_LEN};
pub use codec::{decode, encode, GreetingRecord};
pub use error::{DecodeError, DerivationError, EncodeError, KeyError, SchemaMismatch, TxError};
pub use keys::{Keypair, Pubkey, Signature};
pub use schema::{SchemaDescriptor, GREETING_SCHEMA, MIN_RECORD_WIDTH, RECORD_SIZE};
