// SPDX-License-Identifier: Apache-2.0

//! Crypto primitives for the daemon core.
//!
//! Service nodes carry two identities: an Ed25519 key used to sign quorum
//! messages and blocks, and a BLS key used for the aggregated reward / exit
//! signatures presented to the L2 rewards contract. Protocol hashing is
//! blake3 throughout; the L2-facing pre-images use keccak256 to match the
//! on-chain verifier.

mod bls;

pub use bls::*;

use crate::TypeError;
use ed25519_dalek::{Signer as _, Verifier as _};
use serde::{Deserialize, Serialize};
use std::fmt;

/// bs58 Display/Debug body shared by the byte-wrapper types.
macro_rules! fmt_bs58 {
    () => {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", bs58::encode(&self.0).into_string())
        }
    };
}
pub(crate) use fmt_bs58;

/// Length of every protocol digest in bytes.
pub const DIGEST_LENGTH: usize = 32;

/// A 32-byte protocol digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Hash256(pub [u8; DIGEST_LENGTH]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0; DIGEST_LENGTH]);

    pub fn new(bytes: [u8; DIGEST_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LENGTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; DIGEST_LENGTH]
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<blake3::Hash> for Hash256 {
    fn from(h: blake3::Hash) -> Self {
        Self(*h.as_bytes())
    }
}

impl fmt::Debug for Hash256 {
    fmt_bs58!();
}

impl fmt::Display for Hash256 {
    fmt_bs58!();
}

/// Hash a sequence of byte slices into one digest, in order.
pub fn hash_parts<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> Hash256 {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// keccak256 over concatenated parts. Used wherever the pre-image must match
/// what the L2 rewards contract recomputes.
pub fn keccak256_parts<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> [u8; 32] {
    let mut buf = Vec::new();
    for part in parts {
        buf.extend_from_slice(part);
    }
    alloy::primitives::keccak256(&buf).0
}

/// An Ed25519 service-node public key.
///
/// Stored as raw bytes so it can be used as an ordered map key; decompression
/// to a verifying key (and with it point validation) happens on use.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SnPubkey(pub [u8; 32]);

impl SnPubkey {
    pub fn verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, TypeError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| TypeError::InvalidKey(e.to_string()))
    }

    /// Whether these bytes decompress to a usable Ed25519 point. Small-order
    /// points are rejected too, so the all-zero winner key of mined blocks
    /// fails this check.
    pub fn is_valid_point(&self) -> bool {
        match self.verifying_key() {
            Ok(key) => !key.is_weak(),
            Err(_) => false,
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SnPubkey {
    fmt_bs58!();
}

impl fmt::Display for SnPubkey {
    fmt_bs58!();
}

/// An Ed25519 signature over a protocol digest.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SnSignature(pub [u8; 64]);

impl SnSignature {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl Default for SnSignature {
    fn default() -> Self {
        Self([0; 64])
    }
}

impl fmt::Debug for SnSignature {
    fmt_bs58!();
}

impl fmt::Display for SnSignature {
    fmt_bs58!();
}

impl Serialize for SnSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for SnSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct SnSignatureVisitor;

        impl serde::de::Visitor<'_> for SnSignatureVisitor {
            type Value = SnSignature;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "64 ed25519 signature bytes")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let bytes: [u8; 64] = v
                    .try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))?;
                Ok(SnSignature(bytes))
            }
        }

        deserializer.deserialize_bytes(SnSignatureVisitor)
    }
}

/// The Ed25519 keypair a service node signs quorum messages with.
pub struct ServiceNodeKeys {
    secret: ed25519_dalek::SigningKey,
    /// Public half, cached for quorum-position lookups.
    pub pubkey: SnPubkey,
}

impl ServiceNodeKeys {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let secret = ed25519_dalek::SigningKey::from_bytes(&seed);
        let pubkey = SnPubkey(secret.verifying_key().to_bytes());
        Self { secret, pubkey }
    }

    /// Sign a protocol digest.
    pub fn sign(&self, digest: &Hash256) -> SnSignature {
        SnSignature(self.secret.sign(digest.as_ref()).to_bytes())
    }
}

impl fmt::Debug for ServiceNodeKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceNodeKeys").field("pubkey", &self.pubkey).finish_non_exhaustive()
    }
}

/// Verify an Ed25519 signature over a protocol digest.
pub fn verify_sn_signature(digest: &Hash256, pubkey: &SnPubkey, signature: &SnSignature) -> bool {
    let Ok(key) = pubkey.verifying_key() else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    key.verify(digest.as_ref(), &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_digest() {
        let keys = ServiceNodeKeys::from_seed([7; 32]);
        let digest = hash_parts([b"payload".as_slice()]);
        let sig = keys.sign(&digest);
        assert!(verify_sn_signature(&digest, &keys.pubkey, &sig));

        let other = hash_parts([b"other".as_slice()]);
        assert!(!verify_sn_signature(&other, &keys.pubkey, &sig));
    }

    #[test]
    fn zero_winner_key_is_not_a_point() {
        // All-zero bytes are how mined blocks mark "no pulse winner".
        assert!(!SnPubkey([0; 32]).is_valid_point());
        let keys = ServiceNodeKeys::from_seed([1; 32]);
        assert!(keys.pubkey.is_valid_point());
    }
}
