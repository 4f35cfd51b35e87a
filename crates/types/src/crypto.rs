//! Ed25519 key material for consul identities.

use crate::ConsulPubKey;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::{Serialize, Serializer};
use std::fmt;

/// A consul signing keypair.
///
/// Wraps an ed25519 signing key; the public half doubles as the consul's
/// ledger identity.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Build a keypair from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        Self::from_seed(rand::random())
    }

    /// The consul identity derived from this keypair.
    pub fn public(&self) -> ConsulPubKey {
        ConsulPubKey(self.signing.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing.sign(message).to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret half.
        write!(f, "KeyPair({})", self.public())
    }
}

/// A detached ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// Raw byte view.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// All-zero placeholder signature (test fixtures only).
    pub fn zero() -> Self {
        Signature([0u8; 64])
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(0x{}..)", hex::encode(&self.0[..8]))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SigVisitor;

        impl Visitor<'_> for SigVisitor {
            type Value = Signature;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a 0x-prefixed hex string of 64 bytes")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Signature, E> {
                let raw = v.strip_prefix("0x").unwrap_or(v);
                let bytes = hex::decode(raw).map_err(de::Error::custom)?;
                let arr: [u8; 64] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| de::Error::custom("signature must be 64 bytes"))?;
                Ok(Signature(arr))
            }
        }

        deserializer.deserialize_str(SigVisitor)
    }
}

/// Verify a consul signature over a message.
///
/// Returns `false` for malformed public keys as well as for signature
/// mismatches; callers only care whether the message is authentic.
pub fn verify_signature(pub_key: &ConsulPubKey, message: &[u8], signature: &Signature) -> bool {
    let Ok(vk) = VerifyingKey::from_bytes(pub_key.as_bytes()) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    vk.verify(message, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"pulse");
        assert!(verify_signature(&kp.public(), b"pulse", &sig));
        assert!(!verify_signature(&kp.public(), b"other", &sig));
    }

    #[test]
    fn test_verify_rejects_foreign_key() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let sig = kp.sign(b"pulse");
        assert!(!verify_signature(&other.public(), b"pulse", &sig));
    }

    #[test]
    fn test_signature_serde_round_trip() {
        let kp = KeyPair::from_seed([9u8; 32]);
        let sig = kp.sign(b"x");
        let json = serde_json::to_string(&sig).unwrap();
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }
}
