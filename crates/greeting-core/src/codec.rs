use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::{DecodeError, EncodeError};
use crate::schema::{GREETING_SCHEMA, MIN_RECORD_WIDTH};

/// State held by a greeting account, laid out per [`GREETING_SCHEMA`].
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GreetingRecord {
    /// Bumped by the program on every greeting; ignored when sent.
    pub counter: u32,
    pub message: String,
}

impl GreetingRecord {
    /// Record as sent by a client; the counter is left for the program.
    pub fn outgoing(message: impl Into<String>) -> Self {
        Self {
            counter: 0,
            message: message.into(),
        }
    }

    pub fn encoded_len(&self) -> usize {
        GREETING_SCHEMA.encoded_len(self.message.len())
    }
}

/// Encode `record` as `counter (u32 LE) || len (u32 LE) || utf-8 bytes`.
pub fn encode(record: &GreetingRecord) -> Result<Vec<u8>, EncodeError> {
    if u32::try_from(record.message.len()).is_err() {
        return Err(EncodeError::MessageTooLong {
            len: record.message.len(),
        });
    }
    borsh::to_vec(record).map_err(|e| EncodeError::Borsh(e.to_string()))
}

/// Decode a record from the front of `bytes`.
///
/// Bytes past the end of the message are ignored: account storage is sized
/// for the sample record and stays zero-padded behind shorter messages.
pub fn decode(bytes: &[u8]) -> Result<GreetingRecord, DecodeError> {
    if bytes.len() < MIN_RECORD_WIDTH {
        return Err(DecodeError::TooShort {
            len: bytes.len(),
            min: MIN_RECORD_WIDTH,
        });
    }
    let mut prefix = [0u8; 4];
    prefix.copy_from_slice(&bytes[4..MIN_RECORD_WIDTH]);
    let declared = u32::from_le_bytes(prefix) as usize;
    let available = bytes.len() - MIN_RECORD_WIDTH;
    if declared > available {
        return Err(DecodeError::Truncated {
            declared,
            available,
        });
    }
    if std::str::from_utf8(&bytes[MIN_RECORD_WIDTH..MIN_RECORD_WIDTH + declared]).is_err() {
        return Err(DecodeError::InvalidUtf8);
    }
    GreetingRecord::deserialize(&mut &bytes[..]).map_err(|e| DecodeError::Borsh(e.to_string()))
}
