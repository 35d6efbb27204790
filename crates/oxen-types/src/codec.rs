//! Encode/decode helpers used everywhere a type crosses a byte boundary.
//!
//! Two schemes are deliberately kept apart: database *keys* must produce
//! bytes that binary-sort the same way the typed values sort, which bincode
//! provides with big-endian fixint options; everything else goes through bcs,
//! which handles structures bincode chokes on but does not sort.

use bincode::Options;
use serde::{Deserialize, Serialize};

/// Encode a database key. The output binary-sorts in typed order.
pub fn encode_key<T: Serialize>(obj: &T) -> Vec<u8> {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
        .serialize(obj)
        .expect("key serialization is infallible for ledger key types")
}

/// Decode a database key, panicking on malformed bytes.
///
/// Only use on bytes this process wrote; for untrusted bytes use
/// [`try_decode_key`].
pub fn decode_key<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> T {
    try_decode_key(bytes).expect("invalid key bytes")
}

/// Decode a database key.
pub fn try_decode_key<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> eyre::Result<T> {
    Ok(bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
        .deserialize(bytes)?)
}

/// Encode a value.
pub fn encode<T: Serialize>(obj: &T) -> Vec<u8> {
    bcs::to_bytes(obj).expect("value serialization is infallible for ledger value types")
}

/// Decode a value, panicking on malformed bytes.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> T {
    bcs::from_bytes(bytes).expect("invalid value bytes")
}

/// Decode a value.
pub fn try_decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> bcs::Result<T> {
    bcs::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_encoding_sorts_like_typed_values() {
        let keys = [("a".to_string(), 2u64), ("a".to_string(), 10), ("b".to_string(), 1)];
        let mut encoded: Vec<Vec<u8>> = keys.iter().map(encode_key).collect();
        let sorted = encoded.clone();
        encoded.sort();
        assert_eq!(encoded, sorted);
    }

    #[test]
    fn value_round_trip() {
        let v = vec![(1u64, "x".to_string()), (2, "y".to_string())];
        let bytes = encode(&v);
        let back: Vec<(u64, String)> = decode(&bytes);
        assert_eq!(v, back);
    }
}
