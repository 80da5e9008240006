//! Canonical wire encoding.
//!
//! Every type that needs a stable byte representation — for hashing,
//! signing, persistence, or sending over gossip — goes through this
//! module's `encode`/`decode` pair. It is **bincode 2** with the `serde`
//! integration and an explicit `standard()` configuration, the same
//! pattern the consensus engine used for `Block::canonical_bytes`, kept
//! as the one encoder for blocks, frontiers, and frontier diffs alike.

use serde::{Serialize, de::DeserializeOwned};

/// Error returned when encoding or decoding a wire value fails.
#[derive(Debug)]
pub enum WireError {
    Encode(bincode::error::EncodeError),
    Decode(bincode::error::DecodeError),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::Encode(e) => write!(f, "wire encode error: {e}"),
            WireError::Decode(e) => write!(f, "wire decode error: {e}"),
        }
    }
}

impl std::error::Error for WireError {}

/// Encodes `value` into its canonical byte representation.
pub fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    let cfg = bincode::config::standard();
    bincode::serde::encode_to_vec(value, cfg)
        .expect("wire types are always serializable with bincode 2 + serde")
}

/// Decodes `bytes` as a canonically-encoded `T`, rejecting trailing bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    let cfg = bincode::config::standard();
    let (value, consumed) =
        bincode::serde::decode_from_slice(bytes, cfg).map_err(WireError::Decode)?;
    if consumed != bytes.len() {
        return Err(WireError::Decode(bincode::error::DecodeError::Other(
            "trailing bytes after canonical decode",
        )));
    }
    Ok(value)
}

/// Content hash of the canonical encoding of `value`.
pub fn hash_of<T: Serialize>(value: &T) -> crate::types::Hash {
    crate::types::Hash::compute(&encode(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        a: u32,
        b: Vec<u8>,
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let sample = Sample {
            a: 42,
            b: vec![1, 2, 3],
        };
        let bytes = encode(&sample);
        let decoded: Sample = decode(&bytes).expect("decode should succeed");
        assert_eq!(sample, decoded);
    }

    #[test]
    fn rejects_trailing_bytes() {
        let sample = Sample {
            a: 1,
            b: vec![],
        };
        let mut bytes = encode(&sample);
        bytes.push(0xff);
        let decoded: Result<Sample, _> = decode(&bytes);
        assert!(decoded.is_err());
    }

    #[test]
    fn hash_of_is_stable_for_equal_values() {
        let a = Sample {
            a: 7,
            b: vec![9, 9],
        };
        let b = Sample {
            a: 7,
            b: vec![9, 9],
        };
        assert_eq!(hash_of(&a), hash_of(&b));
    }
}
