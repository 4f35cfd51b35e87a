//! The self-describing ledger transaction and its wire codec.
//!
//! Transactions travel as JSON. The signature covers a canonical
//! serialization of every field except itself; the id is a hash of the
//! sender, the function code and the payload, so identical submissions map
//! to the same id on every replica.

use crate::{ConsulPubKey, KeyPair, NebulaId, OraclesPubKey, PulseId, Signature};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Errors from transaction decoding and verification.
#[derive(Debug, thiserror::Error)]
pub enum TxError {
    /// Structural decode failure or unknown function code.
    #[error("malformed transaction: {0}")]
    Malformed(String),

    /// Signature did not verify against the sender key.
    #[error("bad transaction signature")]
    BadSignature,
}

/// Ledger function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxFunc {
    Vote,
    SetNebula,
    AddOracle,
    AddOracleInNebula,
    Commit,
    Reveal,
    SignResult,
}

impl TxFunc {
    /// Stable single-byte code, folded into the transaction id.
    pub fn as_byte(self) -> u8 {
        match self {
            TxFunc::Vote => 1,
            TxFunc::SetNebula => 2,
            TxFunc::AddOracle => 3,
            TxFunc::AddOracleInNebula => 4,
            TxFunc::Commit => 5,
            TxFunc::Reveal => 6,
            TxFunc::SignResult => 7,
        }
    }
}

mod hex_bytes {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(D::Error::custom)
    }
}

/// One typed payload element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum TxValue {
    Bytes(#[serde(with = "hex_bytes")] Vec<u8>),
    String(String),
    Int(i64),
}

impl TxValue {
    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        TxValue::Bytes(b.into())
    }

    pub fn int(v: i64) -> Self {
        TxValue::Int(v)
    }
}

/// A signed ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub sender_pub_key: ConsulPubKey,
    pub func: TxFunc,
    pub values: Vec<TxValue>,
    pub signature: Signature,
}

/// The portion of a transaction covered by the signature.
#[derive(Serialize)]
struct SignPayload<'a> {
    id: &'a str,
    sender_pub_key: &'a ConsulPubKey,
    func: TxFunc,
    values: &'a [TxValue],
}

impl Transaction {
    /// Build and sign a transaction.
    pub fn build(keypair: &KeyPair, func: TxFunc, values: Vec<TxValue>) -> Self {
        let sender = keypair.public();
        let id = Self::compute_id(&sender, func, &values);
        let sign_bytes = Self::sign_bytes_of(&id, &sender, func, &values);
        let signature = keypair.sign(&sign_bytes);
        Self {
            id,
            sender_pub_key: sender,
            func,
            values,
            signature,
        }
    }

    /// Decode a transaction from its JSON wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, TxError> {
        serde_json::from_slice(bytes).map_err(|e| TxError::Malformed(e.to_string()))
    }

    /// Encode to the JSON wire form.
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("transaction serialization cannot fail")
    }

    /// Check the id derivation and the sender signature.
    pub fn verify(&self) -> Result<(), TxError> {
        let expected = Self::compute_id(&self.sender_pub_key, self.func, &self.values);
        if expected != self.id {
            return Err(TxError::Malformed("transaction id mismatch".into()));
        }
        let sign_bytes =
            Self::sign_bytes_of(&self.id, &self.sender_pub_key, self.func, &self.values);
        if !crate::verify_signature(&self.sender_pub_key, &sign_bytes, &self.signature) {
            return Err(TxError::BadSignature);
        }
        Ok(())
    }

    fn sign_bytes_of(
        id: &str,
        sender: &ConsulPubKey,
        func: TxFunc,
        values: &[TxValue],
    ) -> Vec<u8> {
        let payload = SignPayload {
            id,
            sender_pub_key: sender,
            func,
            values,
        };
        serde_json::to_vec(&payload).expect("sign payload serialization cannot fail")
    }

    fn compute_id(sender: &ConsulPubKey, func: TxFunc, values: &[TxValue]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(sender.as_bytes());
        hasher.update([func.as_byte()]);
        hasher.update(serde_json::to_vec(values).expect("values serialization cannot fail"));
        format!("0x{}", hex::encode(hasher.finalize()))
    }
}

/// The pulse commit-hash: binds a preimage to the oracle, the pulse and the
/// nebula it was produced for.
///
/// Used by the oracle when committing and by the ledger when verifying the
/// matching reveal; both sides must agree byte for byte.
pub fn pulse_commit_hash(
    preimage: &[u8],
    oracle: &OraclesPubKey,
    pulse_id: PulseId,
    nebula_id: &NebulaId,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(preimage);
    hasher.update(oracle.as_bytes());
    hasher.update(pulse_id.to_le_bytes());
    hasher.update(nebula_id.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx(keypair: &KeyPair) -> Transaction {
        Transaction::build(
            keypair,
            TxFunc::Commit,
            vec![
                TxValue::bytes([1u8; 32].to_vec()),
                TxValue::int(7),
                TxValue::bytes([2u8; 33].to_vec()),
                TxValue::bytes(vec![0xde, 0xad]),
            ],
        )
    }

    #[test]
    fn test_wire_round_trip_verifies() {
        let kp = KeyPair::generate();
        let tx = sample_tx(&kp);
        let decoded = Transaction::decode(&tx.encode()).unwrap();
        assert_eq!(decoded, tx);
        decoded.verify().unwrap();
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            Transaction::decode(b"not json"),
            Err(TxError::Malformed(_))
        ));
        // Unknown function code fails structurally, not with a panic.
        assert!(matches!(
            Transaction::decode(br#"{"id":"0x00","sender_pub_key":"0x00","func":"Launch","values":[],"signature":"0x00"}"#),
            Err(TxError::Malformed(_))
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let kp = KeyPair::generate();
        let mut tx = sample_tx(&kp);
        tx.values[1] = TxValue::int(8);
        assert!(matches!(tx.verify(), Err(TxError::Malformed(_))));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let mut tx = sample_tx(&kp);
        // Re-sign the same payload with a different key: id still matches,
        // signature must not.
        let forged = sample_tx(&other);
        tx.signature = forged.signature;
        assert!(matches!(tx.verify(), Err(TxError::BadSignature)));
    }

    #[test]
    fn test_commit_hash_binds_context() {
        let oracle = OraclesPubKey([3u8; 33]);
        let nebula = NebulaId([4u8; 32]);
        let h = pulse_commit_hash(b"data", &oracle, 7, &nebula);
        assert_ne!(h, pulse_commit_hash(b"data", &oracle, 8, &nebula));
        assert_ne!(h, pulse_commit_hash(b"atad", &oracle, 7, &nebula));
        assert_eq!(h, pulse_commit_hash(b"data", &oracle, 7, &nebula));
    }
}
