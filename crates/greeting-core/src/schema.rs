//! Out-of-band description of the greeting record layout.
//!
//! The encoded record carries no type tags or version byte, so the client and
//! the program must agree on field order and widths ahead of time. Both sides
//! build against [`GREETING_SCHEMA`] and can compare fingerprints to turn a
//! layout drift into a [`SchemaMismatch`] instead of silent corruption.

use sha2::{Digest, Sha256};

use crate::error::SchemaMismatch;

/// Wire representation of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 4 bytes little-endian.
    U32,
    /// u32 little-endian byte length followed by UTF-8 bytes.
    String,
}

impl FieldKind {
    pub const fn tag(&self) -> &'static str {
        match self {
            FieldKind::U32 => "u32",
            FieldKind::String => "string",
        }
    }

    /// Bytes occupied regardless of content.
    pub const fn fixed_width(&self) -> usize {
        match self {
            FieldKind::U32 => 4,
            FieldKind::String => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub name: &'static str,
    pub version: u16,
    pub fields: &'static [FieldDescriptor],
}

impl SchemaDescriptor {
    /// Smallest buffer that can hold a record (all variable parts empty).
    pub const fn min_width(&self) -> usize {
        let mut width = 0;
        let mut idx = 0;
        while idx < self.fields.len() {
            width += self.fields[idx].kind.fixed_width();
            idx += 1;
        }
        width
    }

    /// Encoded size of a record whose string fields hold `text_len` bytes in
    /// total.
    pub const fn encoded_len(&self, text_len: usize) -> usize {
        self.min_width() + text_len
    }

    /// SHA-256 over the name, version and ordered field list.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update(self.version.to_le_bytes());
        for field in self.fields {
            hasher.update(b"field");
            hasher.update(field.name.as_bytes());
            hasher.update(field.kind.tag().as_bytes());
        }
        hasher.finalize().into()
    }

    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint())
    }

    /// Compare against the fingerprint advertised by the other side.
    pub fn ensure_compatible(&self, other: &[u8; 32]) -> Result<(), SchemaMismatch> {
        let ours = self.fingerprint();
        if &ours == other {
            return Ok(());
        }
        Err(SchemaMismatch {
            expected: hex::encode(ours),
            actual: hex::encode(other),
        })
    }
}

/// Message of the sample record used to size account storage.
pub const SAMPLE_MESSAGE: &str = "Hello World";

pub const GREETING_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    name: "greeting",
    version: 1,
    fields: &[
        FieldDescriptor {
            name: "counter",
            kind: FieldKind::U32,
        },
        FieldDescriptor {
            name: "message",
            kind: FieldKind::String,
        },
    ],
};

/// Counter plus the string length prefix.
pub const MIN_RECORD_WIDTH: usize = GREETING_SCHEMA.min_width();

/// Storage allocated for a greeting account: the encoded size of the sample
/// record.
pub const RECORD_SIZE: usize = GREETING_SCHEMA.encoded_len(SAMPLE_MESSAGE.len());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_widths() {
        assert_eq!(MIN_RECORD_WIDTH, 8);
        assert_eq!(RECORD_SIZE, 19);
    }

    #[test]
    fn fingerprint_tracks_layout_changes() {
        const REORDERED: SchemaDescriptor = SchemaDescriptor {
            name: "greeting",
            version: 1,
            fields: &[
                FieldDescriptor {
                    name: "message",
                    kind: FieldKind::String,
                },
                FieldDescriptor {
                    name: "counter",
                    kind: FieldKind::U32,
                },
            ],
        };
        let bumped = SchemaDescriptor {
            version: 2,
            ..GREETING_SCHEMA
        };

        let ours = GREETING_SCHEMA.fingerprint();
        assert!(GREETING_SCHEMA.ensure_compatible(&ours).is_ok());
        assert!(GREETING_SCHEMA
            .ensure_compatible(&REORDERED.fingerprint())
            .is_err());
        let err = GREETING_SCHEMA
            .ensure_compatible(&bumped.fingerprint())
            .unwrap_err();
        assert_eq!(err.expected, GREETING_SCHEMA.fingerprint_hex());
    }
}
