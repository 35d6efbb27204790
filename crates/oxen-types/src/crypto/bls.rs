// SPDX-License-Identifier: Apache-2.0

//! BLS key and signature wrappers over `blst` (min_sig: signatures on G1,
//! public keys on G2).
//!
//! These sign the raw canonical message bytes the L2 rewards contract
//! verifies, so there is no intent/domain wrapper here beyond the standard
//! hash-to-curve DST; domain separation lives in the keccak tag prefix of the
//! message itself.

use crate::TypeError;
use blst::min_sig::{
    AggregateSignature as CoreAggregateSignature, PublicKey as CorePublicKey,
    SecretKey as CoreSecretKey, Signature as CoreSignature,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain separation tag for hash-to-curve (basic scheme, min_sig).
pub const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_NUL_";

/// Compressed public key length (G2).
pub const BLS_PUBLIC_KEY_LENGTH: usize = 96;
/// Compressed signature length (G1).
pub const BLS_SIGNATURE_LENGTH: usize = 48;

/// A service node's BLS public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BlsPublicKey(CorePublicKey);

impl BlsPublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        let pk = CorePublicKey::from_bytes(bytes)
            .map_err(|e| TypeError::InvalidKey(format!("{e:?}")))?;
        Ok(Self(pk))
    }

    pub fn to_bytes(&self) -> [u8; BLS_PUBLIC_KEY_LENGTH] {
        self.0.compress()
    }

    /// Group/infinity check on the key.
    pub fn validate(&self) -> Result<(), TypeError> {
        self.0.validate().map_err(|e| TypeError::InvalidKey(format!("{e:?}")))
    }

    pub(crate) fn inner(&self) -> &CorePublicKey {
        &self.0
    }
}

impl fmt::Debug for BlsPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.to_bytes()).into_string())
    }
}

impl fmt::Display for BlsPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.to_bytes()).into_string())
    }
}

impl PartialOrd for BlsPublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BlsPublicKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl std::hash::Hash for BlsPublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

/// An individual BLS signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BlsSignature(CoreSignature);

impl BlsSignature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        let sig = CoreSignature::from_bytes(bytes).map_err(|_| TypeError::InvalidSignature)?;
        Ok(Self(sig))
    }

    pub fn to_bytes(&self) -> [u8; BLS_SIGNATURE_LENGTH] {
        self.0.compress()
    }

    /// Verify over raw message bytes.
    pub fn verify(&self, message: &[u8], public_key: &BlsPublicKey) -> bool {
        self.0.verify(true, message, BLS_DST, &[], public_key.inner(), true)
            == blst::BLST_ERROR::BLST_SUCCESS
    }
}

impl Default for BlsSignature {
    /// The infinity point: the identity element aggregation starts from.
    fn default() -> Self {
        let mut infinity = [0u8; BLS_SIGNATURE_LENGTH];
        // Compressed-form flag plus infinity flag.
        infinity[0] = 0xc0;
        BlsSignature::from_bytes(&infinity).expect("infinity signature decodes")
    }
}

impl fmt::Debug for BlsSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.to_bytes()).into_string())
    }
}

impl fmt::Display for BlsSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.to_bytes()).into_string())
    }
}

/// Running aggregate of individual signatures over one shared message.
#[derive(Clone, Copy)]
pub struct BlsAggregateSignature(CoreAggregateSignature);

impl BlsAggregateSignature {
    /// Start from the identity element.
    pub fn identity() -> Self {
        Self(CoreAggregateSignature::from_signature(&BlsSignature::default().0))
    }

    pub fn from_signature(signature: &BlsSignature) -> Self {
        Self(CoreAggregateSignature::from_signature(&signature.0))
    }

    /// Fold one verified signature into the aggregate.
    pub fn add(&mut self, signature: &BlsSignature) -> Result<(), TypeError> {
        self.0
            .add_signature(&signature.0, false)
            .map_err(|_| TypeError::InvalidSignature)
    }

    pub fn to_signature(&self) -> BlsSignature {
        BlsSignature(self.0.to_signature())
    }

    /// Verify the aggregate against the contributors' public keys over one
    /// shared message. This is the check the on-chain verifier performs
    /// against the summed public key.
    pub fn verify(&self, message: &[u8], public_keys: &[BlsPublicKey]) -> bool {
        if public_keys.is_empty() {
            return false;
        }
        let pks: Vec<&CorePublicKey> = public_keys.iter().map(|pk| pk.inner()).collect();
        self.to_signature().0.fast_aggregate_verify(true, message, BLS_DST, &pks)
            == blst::BLST_ERROR::BLST_SUCCESS
    }
}

impl fmt::Debug for BlsAggregateSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.to_signature().to_bytes()).into_string())
    }
}

/// A service node's BLS keypair.
pub struct BlsKeypair {
    secret: CoreSecretKey,
    public: BlsPublicKey,
}

impl BlsKeypair {
    /// Derive a keypair from 32 bytes of key material.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, TypeError> {
        let secret = CoreSecretKey::key_gen(seed, &[])
            .map_err(|e| TypeError::InvalidKey(format!("{e:?}")))?;
        let public = BlsPublicKey(secret.sk_to_pk());
        Ok(Self { secret, public })
    }

    pub fn public(&self) -> &BlsPublicKey {
        &self.public
    }

    /// Sign raw message bytes.
    pub fn sign(&self, message: &[u8]) -> BlsSignature {
        BlsSignature(self.secret.sign(message, BLS_DST, &[]))
    }
}

impl fmt::Debug for BlsKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlsKeypair").field("public", &self.public).finish_non_exhaustive()
    }
}

// ----- Serde implementations -----

impl Serialize for BlsPublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for BlsPublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct BlsPublicKeyVisitor;

        impl serde::de::Visitor<'_> for BlsPublicKeyVisitor {
            type Value = BlsPublicKey;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "valid compressed bls public key bytes")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                BlsPublicKey::from_bytes(v)
                    .map_err(|_| E::invalid_value(serde::de::Unexpected::Bytes(v), &self))
            }
        }

        deserializer.deserialize_bytes(BlsPublicKeyVisitor)
    }
}

impl Serialize for BlsSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for BlsSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct BlsSignatureVisitor;

        impl serde::de::Visitor<'_> for BlsSignatureVisitor {
            type Value = BlsSignature;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "valid compressed bls signature bytes")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                BlsSignature::from_bytes(v)
                    .map_err(|_| E::invalid_value(serde::de::Unexpected::Bytes(v), &self))
            }
        }

        deserializer.deserialize_bytes(BlsSignatureVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(seed: u8) -> BlsKeypair {
        BlsKeypair::from_seed(&[seed; 32]).expect("keypair")
    }

    #[test]
    fn sign_verify_round_trip() {
        let kp = keypair(1);
        let sig = kp.sign(b"message");
        assert!(sig.verify(b"message", kp.public()));
        assert!(!sig.verify(b"other", kp.public()));
        assert!(!sig.verify(b"message", keypair(2).public()));
    }

    #[test]
    fn aggregate_verifies_against_contributor_set() {
        let message = b"shared canonical message";
        let keypairs: Vec<_> = (1..=5).map(keypair).collect();

        let mut agg = BlsAggregateSignature::identity();
        for kp in &keypairs {
            agg.add(&kp.sign(message)).expect("add");
        }

        let pubkeys: Vec<_> = keypairs.iter().map(|kp| *kp.public()).collect();
        assert!(agg.verify(message, &pubkeys));

        // Dropping one contributor's key must break verification.
        assert!(!agg.verify(message, &pubkeys[1..]));
    }

    #[test]
    fn public_key_bytes_round_trip() {
        let kp = keypair(3);
        let bytes = kp.public().to_bytes();
        let back = BlsPublicKey::from_bytes(&bytes).expect("decode");
        assert_eq!(*kp.public(), back);
    }
}
