//! Development stand-in for the external proof system.
//!
//! Real deployments verify a Groth16 proof through an out-of-process
//! verifier. For local runs and tests we substitute a plain Ed25519
//! signature over the canonical claim JSON: the "proof" blob carries the
//! signature, and [`DevVerifier`] checks it against a configured public
//! key. The claim/validation pipeline downstream is identical either way.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde_json::Value as JsonValue;

use crate::{PcdError, ProofVerifier, TicketClaim, ZkTicketPcd};

const DEV_PROTOCOL: &str = "dev-ed25519";

/// Bytes the dev signature covers: the claim serialized as canonical JSON.
///
/// Field order is fixed by the struct definition, so prover and verifier
/// agree on the message without a separate canonicalization step.
fn claim_message(claim: &TicketClaim) -> Result<Vec<u8>, PcdError> {
    serde_json::to_vec(claim)
        .map_err(|err| PcdError::Verifier(format!("claim serialization failed: {err}")))
}

/// Produces dev PCDs whose proof is an Ed25519 signature over the claim.
pub struct DevProver {
    signing_key: SigningKey,
}

impl DevProver {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Package a claim into a PCD carrying a dev-protocol proof blob.
    pub fn prove(&self, id: impl Into<String>, claim: TicketClaim) -> Result<ZkTicketPcd, PcdError> {
        let message = claim_message(&claim)?;
        let signature = self.signing_key.sign(&message);
        Ok(ZkTicketPcd {
            id: id.into(),
            claim,
            proof: serde_json::json!({
                "protocol": DEV_PROTOCOL,
                "signature": hex::encode(signature.to_bytes()),
            }),
        })
    }
}

/// Verifies dev PCDs produced by [`DevProver`].
pub struct DevVerifier {
    verifying_key: VerifyingKey,
}

impl DevVerifier {
    pub fn new(verifying_key: VerifyingKey) -> Self {
        Self { verifying_key }
    }

    /// Build from a hex-encoded 32-byte Ed25519 public key.
    pub fn from_hex(pubkey_hex: &str) -> Result<Self, PcdError> {
        let bytes = hex::decode(pubkey_hex.trim())
            .map_err(|err| PcdError::Verifier(format!("invalid verifier pubkey hex: {err}")))?;
        let key_bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| PcdError::Verifier("verifier pubkey must be 32 bytes".to_string()))?;
        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|err| PcdError::Verifier(format!("invalid verifier pubkey: {err}")))?;
        Ok(Self { verifying_key })
    }

    fn signature_from_proof(proof: &JsonValue) -> Option<Signature> {
        if proof.get("protocol").and_then(JsonValue::as_str) != Some(DEV_PROTOCOL) {
            return None;
        }
        let signature_hex = proof.get("signature").and_then(JsonValue::as_str)?;
        let bytes = hex::decode(signature_hex).ok()?;
        let sig_bytes: [u8; 64] = bytes.as_slice().try_into().ok()?;
        Some(Signature::from_bytes(&sig_bytes))
    }
}

impl ProofVerifier for DevVerifier {
    fn verify(&self, pcd: &ZkTicketPcd) -> Result<bool, PcdError> {
        // A structurally wrong proof blob is "proof invalid", not a fault.
        let Some(signature) = Self::signature_from_proof(&pcd.proof) else {
            return Ok(false);
        };
        let message = claim_message(&pcd.claim)?;
        Ok(self.verifying_key.verify(&message, &signature).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EdDsaPublicKey, PartialTicket};
    use uuid::Uuid;

    fn sample_claim(watermark: &str) -> TicketClaim {
        TicketClaim {
            watermark: watermark.to_string(),
            partial_ticket: PartialTicket {
                event_id: Some(Uuid::nil()),
                product_id: Some(Uuid::nil()),
                attendee_email: Some("resident@zuzalu.org".to_string()),
            },
            signer: EdDsaPublicKey::new("05aa", "1b2c"),
            nullifier_hash: Some("777".to_string()),
        }
    }

    fn keypair() -> (DevProver, DevVerifier) {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let verifier = DevVerifier::new(signing_key.verifying_key());
        (DevProver::new(signing_key), verifier)
    }

    #[test]
    fn prove_then_verify() {
        let (prover, verifier) = keypair();
        let pcd = prover.prove("t1", sample_claim("42")).unwrap();
        assert!(verifier.verify(&pcd).unwrap());
    }

    #[test]
    fn tampered_claim_fails_verification() {
        let (prover, verifier) = keypair();
        let mut pcd = prover.prove("t1", sample_claim("42")).unwrap();
        pcd.claim.watermark = "43".to_string();
        assert!(!verifier.verify(&pcd).unwrap());
    }

    #[test]
    fn foreign_key_fails_verification() {
        let (prover, _) = keypair();
        let (_, other_verifier) = keypair();
        let pcd = prover.prove("t1", sample_claim("42")).unwrap();
        assert!(!other_verifier.verify(&pcd).unwrap());
    }

    #[test]
    fn missing_signature_is_invalid_not_fault() {
        let (prover, verifier) = keypair();
        let mut pcd = prover.prove("t1", sample_claim("42")).unwrap();
        pcd.proof = serde_json::json!({ "protocol": DEV_PROTOCOL });
        assert!(!verifier.verify(&pcd).unwrap());
    }

    #[test]
    fn from_hex_rejects_short_keys() {
        assert!(DevVerifier::from_hex("deadbeef").is_err());
    }
}
