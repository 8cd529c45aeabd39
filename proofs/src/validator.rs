//! Claim validation and issuer signatures.
//!
//! A claim becomes a [`Proof`] only through [`ProofValidator::validate`], which
//! stamps it with a fresh nonce, a SHA-256 content hash and an HMAC-SHA256
//! signature under the issuer key. [`ProofValidator::authenticate`] re-derives
//! both, so a proof edited or fabricated outside the validator is rejected.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::{debug, warn};

use crate::types::{ActivityClaim, ActivityType, ChainAudit, Proof, ProofError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Issuer key length used by [`ProofValidator::generate`].
pub const ISSUER_KEY_LEN: usize = 32;

/// Validates activity claims and signs the resulting proofs.
#[derive(Clone)]
pub struct ProofValidator {
    issuer_key: Vec<u8>,
}

impl fmt::Debug for ProofValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofValidator")
            .field("issuer_key", &"<redacted>")
            .finish()
    }
}

impl ProofValidator {
    /// Create a validator with the given issuer key.
    pub fn new(issuer_key: impl Into<Vec<u8>>) -> Result<Self> {
        let issuer_key = issuer_key.into();
        if issuer_key.is_empty() {
            return Err(ProofError::InvalidKey("issuer key is empty".to_string()));
        }
        Ok(Self { issuer_key })
    }

    /// Create a validator from a hex-encoded issuer key.
    pub fn from_hex(key: &str) -> Result<Self> {
        let bytes = hex::decode(key.trim()).map_err(|e| ProofError::InvalidKey(e.to_string()))?;
        Self::new(bytes)
    }

    /// Create a validator with a random 32-byte issuer key.
    ///
    /// Proofs signed by it cannot be authenticated by any other process.
    pub fn generate() -> Self {
        let mut key = [0u8; ISSUER_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self {
            issuer_key: key.to_vec(),
        }
    }

    /// Turn a raw claim into a verified, signed proof.
    pub fn validate(&self, claim: &ActivityClaim) -> Result<Proof> {
        let activity_type: ActivityType = claim.activity_type.parse()?;
        if claim.id.trim().is_empty() {
            return Err(ProofError::MalformedClaim("activity id is empty".to_string()));
        }
        if claim.student_id.trim().is_empty() {
            return Err(ProofError::MalformedClaim("student id is empty".to_string()));
        }

        let nonce = uuid::Uuid::new_v4().to_string();
        let content_hash = content_hash(&claim.id, &claim.student_id, activity_type, &nonce);
        let signature = self.sign(&content_hash)?;

        debug!(
            activity_id = %claim.id,
            student_id = %claim.student_id,
            activity_type = %activity_type,
            "Validated activity claim"
        );

        Ok(Proof {
            activity_id: claim.id.clone(),
            student_id: claim.student_id.clone(),
            activity_type,
            timestamp: claim.timestamp,
            nonce,
            content_hash,
            signature,
            verified: true,
        })
    }

    /// Check that a proof was issued by this validator and left untouched.
    pub fn authenticate(&self, proof: &Proof) -> Result<()> {
        let expected = content_hash(
            &proof.activity_id,
            &proof.student_id,
            proof.activity_type,
            &proof.nonce,
        );
        if expected != proof.content_hash {
            warn!(activity_id = %proof.activity_id, "Proof content hash mismatch");
            return Err(ProofError::InvalidSignature);
        }

        let signature = hex::decode(&proof.signature).map_err(|_| ProofError::InvalidSignature)?;
        let mut mac = self.mac()?;
        mac.update(proof.content_hash.as_bytes());
        mac.verify_slice(&signature).map_err(|_| {
            warn!(activity_id = %proof.activity_id, "Proof signature rejected");
            ProofError::InvalidSignature
        })
    }

    /// True iff timestamps never decrease across the sequence.
    pub fn verify_chain(proofs: &[Proof]) -> bool {
        Self::audit_chain(proofs).is_ordered()
    }

    /// Locate the first proof that is earlier than its predecessor.
    pub fn audit_chain(proofs: &[Proof]) -> ChainAudit {
        match proofs
            .windows(2)
            .position(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            Some(i) => ChainAudit::OutOfOrder { index: i + 1 },
            None => ChainAudit::Ordered,
        }
    }

    fn sign(&self, content_hash: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(content_hash.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.issuer_key)
            .map_err(|e| ProofError::InvalidKey(e.to_string()))
    }
}

/// Length-prefixed SHA-256 over the canonical claim fields.
fn content_hash(activity_id: &str, student_id: &str, activity_type: ActivityType, nonce: &str) -> String {
    let mut hasher = Sha256::new();
    for field in [activity_id, student_id, activity_type.as_str(), nonce] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn validator() -> ProofValidator {
        ProofValidator::new(b"issuer-test-key".to_vec()).unwrap()
    }

    #[test]
    fn test_validate_produces_verified_proof() {
        let claim = ActivityClaim::new("act-1", "student-1", "quiz_passed");
        let proof = validator().validate(&claim).unwrap();

        assert!(proof.verified);
        assert_eq!(proof.activity_type, ActivityType::QuizPassed);
        assert_eq!(proof.content_hash.len(), 64);
        assert!(validator().authenticate(&proof).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_type() {
        let claim = ActivityClaim::new("act-1", "student-1", "watched_video");
        let err = validator().validate(&claim).unwrap_err();
        assert_eq!(err, ProofError::InvalidActivityType("watched_video".to_string()));
    }

    #[test]
    fn test_validate_rejects_empty_ids() {
        let claim = ActivityClaim::new("", "student-1", "peer_help");
        assert!(matches!(
            validator().validate(&claim),
            Err(ProofError::MalformedClaim(_))
        ));
    }

    #[test]
    fn test_nonce_changes_hash_but_not_idempotency_key() {
        let claim = ActivityClaim::new("act-1", "student-1", "lesson_complete");
        let a = validator().validate(&claim).unwrap();
        let b = validator().validate(&claim).unwrap();

        assert_ne!(a.content_hash, b.content_hash);
        assert_eq!(a.idempotency_key(), b.idempotency_key());
    }

    #[test]
    fn test_tampered_proof_fails_authentication() {
        let claim = ActivityClaim::new("act-1", "student-1", "lesson_complete");
        let mut proof = validator().validate(&claim).unwrap();
        proof.activity_type = ActivityType::ContentCreated;

        assert_eq!(validator().authenticate(&proof), Err(ProofError::InvalidSignature));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let claim = ActivityClaim::new("act-1", "student-1", "lesson_complete");
        let proof = ProofValidator::generate().validate(&claim).unwrap();

        assert_eq!(validator().authenticate(&proof), Err(ProofError::InvalidSignature));
    }

    #[test]
    fn test_generated_keys_are_full_length_and_distinct() {
        let a = ProofValidator::generate();
        let b = ProofValidator::generate();

        assert_eq!(a.issuer_key.len(), ISSUER_KEY_LEN);
        assert_ne!(a.issuer_key, b.issuer_key);

        let claim = ActivityClaim::new("act-1", "student-1", "quiz_passed");
        let proof = a.validate(&claim).unwrap();
        assert!(a.authenticate(&proof).is_ok());
        assert_eq!(b.authenticate(&proof), Err(ProofError::InvalidSignature));
    }

    #[test]
    fn test_from_hex_key() {
        assert!(ProofValidator::from_hex("00ff10").is_ok());
        assert!(matches!(
            ProofValidator::from_hex("not-hex"),
            Err(ProofError::InvalidKey(_))
        ));
        assert!(matches!(ProofValidator::new(Vec::new()), Err(ProofError::InvalidKey(_))));
    }

    #[test]
    fn test_verify_chain() {
        let v = validator();
        let t0 = Utc::now();
        let proof_at = |id: &str, offset: i64| {
            v.validate(&ActivityClaim::new(id, "s", "peer_help").at(t0 + Duration::seconds(offset)))
                .unwrap()
        };

        assert!(ProofValidator::verify_chain(&[]));
        assert!(ProofValidator::verify_chain(&[proof_at("a", 0)]));
        assert!(ProofValidator::verify_chain(&[
            proof_at("a", 0),
            proof_at("b", 0),
            proof_at("c", 5),
        ]));

        let tampered = [proof_at("a", 0), proof_at("b", 10), proof_at("c", 3)];
        assert!(!ProofValidator::verify_chain(&tampered));
        assert_eq!(
            ProofValidator::audit_chain(&tampered),
            ChainAudit::OutOfOrder { index: 2 }
        );
    }
}
