//! C1: a byte blob that serializes as Base58 text in textual contexts.
//!
//! Mirrors `original_source/src/protocol/base58type.go`'s `Base58Bytes`:
//! empty/absent encodes as the literal `null`; a malformed string decodes
//! to an empty sequence rather than erroring, and it is up to callers that
//! require a fixed key size to reject that.

use std::fmt;

/// Binary blob with a Base58 textual presentation.
#[derive(Clone, PartialEq, Eq, Default, Hash)]
pub struct Base58Bytes(pub Vec<u8>);

impl Base58Bytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode a Base58 string. Malformed input yields an empty sequence.
    pub fn decode(s: &str) -> Self {
        Self(bs58::decode(s).into_vec().unwrap_or_default())
    }

    pub fn encode(&self) -> String {
        bs58::encode(&self.0).into_string()
    }
}

impl fmt::Display for Base58Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "null")
        } else {
            write!(f, "{}", self.encode())
        }
    }
}

impl fmt::Debug for Base58Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Base58Bytes({})", self)
    }
}

impl From<Vec<u8>> for Base58Bytes {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&[u8]> for Base58Bytes {
    fn from(v: &[u8]) -> Self {
        Self(v.to_vec())
    }
}

impl AsRef<[u8]> for Base58Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
