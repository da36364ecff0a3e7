//! Shared fixtures for ticket-login tests: a process-wide dev prover
//! keypair and a builder for serialized ticket PCDs in every shape the
//! validation pipeline distinguishes.

use ed25519_dalek::SigningKey;
use once_cell::sync::Lazy;
use uuid::{uuid, Uuid};

use zugate_pcd::{
    dev::{DevProver, DevVerifier},
    EdDsaPublicKey, PartialTicket, TicketClaim, ZkTicketPcd,
};

/// Zuzalu event ID from the built-in whitelist.
pub const ZUZALU_EVENT: Uuid = uuid!("5de90d09-22db-40ca-b3ae-d934573def8b");
/// Zuzalu resident product ID from the built-in whitelist.
pub const ZUZALU_RESIDENT_PRODUCT: Uuid = uuid!("5ba4cd9e-893c-4a4a-b15b-cf36ceda1938");

static DEV_SIGNING_KEY: Lazy<SigningKey> =
    Lazy::new(|| SigningKey::generate(&mut rand::rngs::OsRng));

/// Issuer key every fixture ticket claims to be signed by.
pub fn zuzalu_signer() -> EdDsaPublicKey {
    EdDsaPublicKey::new(
        "05e0a4d0b3b4e6c9bd24e8e64a84d7ad4cf35c2c937824f769da1cf9f61b2733",
        "29a16efc33b720dcce1c8a1ad6f7fc21dcf47bbab6e1fb14f3dfcd9bf31d4aae",
    )
}

/// Prover bound to the fixture keypair.
pub fn dev_prover() -> DevProver {
    DevProver::new(DEV_SIGNING_KEY.clone())
}

/// Verifier that accepts proofs from [`dev_prover`].
pub fn dev_verifier() -> DevVerifier {
    DevVerifier::new(DEV_SIGNING_KEY.verifying_key())
}

/// Builds serialized ticket PCDs. Defaults to a valid Zuzalu resident
/// ticket with a fresh random nullifier; each method perturbs one aspect.
pub struct TicketPcdBuilder {
    id: String,
    watermark: String,
    event_id: Option<Uuid>,
    product_id: Option<Uuid>,
    attendee_email: Option<String>,
    signer: EdDsaPublicKey,
    nullifier_hash: Option<String>,
}

impl TicketPcdBuilder {
    pub fn new(watermark: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            watermark: watermark.into(),
            event_id: Some(ZUZALU_EVENT),
            product_id: Some(ZUZALU_RESIDENT_PRODUCT),
            attendee_email: Some("resident@zuzalu.org".to_string()),
            signer: zuzalu_signer(),
            nullifier_hash: Some(rand::random::<u128>().to_string()),
        }
    }

    pub fn event_id(mut self, event_id: Uuid) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn product_id(mut self, product_id: Uuid) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn attendee_email(mut self, email: impl Into<String>) -> Self {
        self.attendee_email = Some(email.into());
        self
    }

    pub fn signer(mut self, signer: EdDsaPublicKey) -> Self {
        self.signer = signer;
        self
    }

    pub fn nullifier(mut self, nullifier_hash: impl Into<String>) -> Self {
        self.nullifier_hash = Some(nullifier_hash.into());
        self
    }

    /// Hide the event and product IDs, as a proof that reveals neither.
    pub fn without_ticket_fields(mut self) -> Self {
        self.event_id = None;
        self.product_id = None;
        self
    }

    pub fn without_nullifier(mut self) -> Self {
        self.nullifier_hash = None;
        self
    }

    pub fn without_email(mut self) -> Self {
        self.attendee_email = None;
        self
    }

    fn claim(&self) -> TicketClaim {
        TicketClaim {
            watermark: self.watermark.clone(),
            partial_ticket: PartialTicket {
                event_id: self.event_id,
                product_id: self.product_id,
                attendee_email: self.attendee_email.clone(),
            },
            signer: self.signer.clone(),
            nullifier_hash: self.nullifier_hash.clone(),
        }
    }

    /// Serialized PCD proven with the fixture key; verifies cleanly.
    pub fn serialized(&self) -> String {
        dev_prover()
            .prove(self.id.clone(), self.claim())
            .expect("fixture proving failed")
            .to_serialized()
            .expect("fixture serialization failed")
    }

    /// Serialized PCD proven with a throwaway key the fixture verifier
    /// does not trust.
    pub fn serialized_with_bad_proof(&self) -> String {
        let rogue = DevProver::new(SigningKey::generate(&mut rand::rngs::OsRng));
        rogue
            .prove(self.id.clone(), self.claim())
            .expect("fixture proving failed")
            .to_serialized()
            .expect("fixture serialization failed")
    }

    /// The deserialized form, for tests that inspect the claim directly.
    pub fn pcd(&self) -> ZkTicketPcd {
        dev_prover()
            .prove(self.id.clone(), self.claim())
            .expect("fixture proving failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zugate_pcd::ProofVerifier;

    #[test]
    fn builder_default_verifies() {
        let pcd = TicketPcdBuilder::new("42").pcd();
        assert!(dev_verifier().verify(&pcd).unwrap());
        assert_eq!(pcd.claim.partial_ticket.event_id, Some(ZUZALU_EVENT));
    }

    #[test]
    fn bad_proof_fails_verification() {
        let raw = TicketPcdBuilder::new("42").serialized_with_bad_proof();
        let pcd = ZkTicketPcd::from_serialized(&raw).unwrap();
        assert!(!dev_verifier().verify(&pcd).unwrap());
    }
}
