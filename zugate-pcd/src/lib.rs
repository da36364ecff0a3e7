//! Data model for ZK EdDSA event-ticket PCDs and the verifier seam.
//!
//! A PCD ("proof-carrying data") packages a zero-knowledge proof together
//! with its public claim. This crate defines the claim shape the login gate
//! consumes, the serialized envelope clients submit, and the [`ProofVerifier`]
//! capability through which the actual proof system is invoked. The proof
//! blob itself is opaque here: proof generation and the cryptographic
//! verification primitive belong to an external collaborator.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

pub mod dev;

/// Envelope `type` tag for serialized ZK EdDSA event-ticket PCDs.
pub const ZK_EDDSA_EVENT_TICKET_PCD_TYPE: &str = "zk-eddsa-event-ticket-pcd";

/// Errors surfaced by PCD deserialization and verification.
#[derive(Debug, Error)]
pub enum PcdError {
    /// The submitted payload is not a well-formed serialized PCD.
    #[error("malformed pcd: {0}")]
    Malformed(String),

    /// The verifier collaborator itself failed (not "proof invalid").
    #[error("verifier failure: {0}")]
    Verifier(String),
}

/// An EdDSA public key as a Baby Jubjub point: two hex-encoded field
/// elements.
///
/// Equality is structural on the encoded coordinates, tolerant of case,
/// a `0x` prefix, and leading zeros, so keys sourced from different
/// serializers compare equal.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdDsaPublicKey(pub [String; 2]);

impl EdDsaPublicKey {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self([x.into(), y.into()])
    }
}

fn normalize_coord(coord: &str) -> &str {
    let trimmed = coord.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix("0X").unwrap_or(trimmed);
    let stripped = trimmed.trim_start_matches('0');
    if stripped.is_empty() {
        "0"
    } else {
        stripped
    }
}

fn coords_equal(a: &str, b: &str) -> bool {
    normalize_coord(a).eq_ignore_ascii_case(normalize_coord(b))
}

impl PartialEq for EdDsaPublicKey {
    fn eq(&self, other: &Self) -> bool {
        coords_equal(&self.0[0], &other.0[0]) && coords_equal(&self.0[1], &other.0[1])
    }
}

impl Eq for EdDsaPublicKey {}

/// The revealed subset of a ticket. Fields a proof chooses not to disclose
/// are absent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialTicket {
    pub event_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub attendee_email: Option<String>,
}

/// Public claim of a ZK EdDSA event-ticket PCD.
///
/// Untrusted input: every field must be validated by the consumer before
/// any of it influences authentication state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketClaim {
    /// Application-chosen challenge value the proof is bound to.
    pub watermark: String,
    pub partial_ticket: PartialTicket,
    /// Public key of the ticket issuer that signed the underlying ticket.
    pub signer: EdDsaPublicKey,
    /// Proof-derived reuse detector; `None` when the circuit was not asked
    /// to reveal one.
    pub nullifier_hash: Option<String>,
}

/// A deserialized PCD: claim plus opaque proof blob.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZkTicketPcd {
    pub id: String,
    pub claim: TicketClaim,
    pub proof: JsonValue,
}

/// Wire envelope for a serialized PCD, mirroring the `{ type, pcd }` shape
/// produced by PCD packages.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SerializedPcd {
    #[serde(rename = "type")]
    pub pcd_type: String,
    /// JSON-encoded [`ZkTicketPcd`].
    pub pcd: String,
}

impl ZkTicketPcd {
    /// Parse a serialized PCD envelope submitted by a client.
    ///
    /// All failure modes here are [`PcdError::Malformed`]: the input never
    /// reached the proof system, so the fault is the client's.
    pub fn from_serialized(raw: &str) -> Result<Self, PcdError> {
        let envelope: SerializedPcd = serde_json::from_str(raw)
            .map_err(|err| PcdError::Malformed(format!("invalid pcd envelope: {err}")))?;

        if envelope.pcd_type != ZK_EDDSA_EVENT_TICKET_PCD_TYPE {
            return Err(PcdError::Malformed(format!(
                "unsupported pcd type '{}'",
                envelope.pcd_type
            )));
        }

        serde_json::from_str(&envelope.pcd)
            .map_err(|err| PcdError::Malformed(format!("invalid pcd body: {err}")))
    }

    /// Serialize into the wire envelope.
    pub fn to_serialized(&self) -> Result<String, PcdError> {
        let body = serde_json::to_string(self)
            .map_err(|err| PcdError::Verifier(format!("pcd serialization failed: {err}")))?;
        let envelope = SerializedPcd {
            pcd_type: ZK_EDDSA_EVENT_TICKET_PCD_TYPE.to_string(),
            pcd: body,
        };
        serde_json::to_string(&envelope)
            .map_err(|err| PcdError::Verifier(format!("pcd serialization failed: {err}")))
    }
}

/// Capability through which the external proof system checks that a PCD's
/// proof matches its claim.
///
/// `Ok(false)` means "proof invalid" (an authentication failure);
/// `Err(_)` means the collaborator itself faulted (an internal error).
/// Implementations may block; callers must not hold locks across the call.
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, pcd: &ZkTicketPcd) -> Result<bool, PcdError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claim() -> TicketClaim {
        TicketClaim {
            watermark: "12345".to_string(),
            partial_ticket: PartialTicket {
                event_id: Some(Uuid::nil()),
                product_id: Some(Uuid::nil()),
                attendee_email: Some("resident@zuzalu.org".to_string()),
            },
            signer: EdDsaPublicKey::new("05aa", "1b2c"),
            nullifier_hash: Some("999".to_string()),
        }
    }

    #[test]
    fn pubkey_equality_is_structural() {
        let a = EdDsaPublicKey::new("05aabb", "1B2C");
        let b = EdDsaPublicKey::new("0x05AABB", "00001b2c");
        let c = EdDsaPublicKey::new("05aabb", "1b2d");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn pubkey_zero_coordinate() {
        let a = EdDsaPublicKey::new("0", "1b2c");
        let b = EdDsaPublicKey::new("0x000", "1b2c");
        assert_eq!(a, b);
    }

    #[test]
    fn serialized_roundtrip() {
        let pcd = ZkTicketPcd {
            id: "fixture".to_string(),
            claim: sample_claim(),
            proof: serde_json::json!({ "protocol": "none" }),
        };
        let raw = pcd.to_serialized().unwrap();
        let parsed = ZkTicketPcd::from_serialized(&raw).unwrap();
        assert_eq!(parsed.claim.watermark, "12345");
        assert_eq!(
            parsed.claim.partial_ticket.attendee_email.as_deref(),
            Some("resident@zuzalu.org")
        );
    }

    #[test]
    fn claim_uses_camel_case_wire_names() {
        let value = serde_json::to_value(sample_claim()).unwrap();
        assert!(value.get("nullifierHash").is_some());
        assert!(value["partialTicket"].get("attendeeEmail").is_some());
    }

    #[test]
    fn rejects_garbage_envelope() {
        let err = ZkTicketPcd::from_serialized("not json").unwrap_err();
        assert!(matches!(err, PcdError::Malformed(_)));
    }

    #[test]
    fn rejects_wrong_pcd_type() {
        let raw = serde_json::json!({ "type": "semaphore-group-pcd", "pcd": "{}" }).to_string();
        let err = ZkTicketPcd::from_serialized(&raw).unwrap_err();
        assert!(matches!(err, PcdError::Malformed(_)));
    }

    #[test]
    fn rejects_envelope_with_garbage_body() {
        let raw = serde_json::json!({
            "type": ZK_EDDSA_EVENT_TICKET_PCD_TYPE,
            "pcd": "{\"id\": 42}",
        })
        .to_string();
        let err = ZkTicketPcd::from_serialized(&raw).unwrap_err();
        assert!(matches!(err, PcdError::Malformed(_)));
    }
}
