//! Opaque signing primitive (spec.md §1 treats the cosign-style
//! signer/verifier as an external collaborator out of core scope) plus one
//! concrete `Ed25519` implementation for local/testing use.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;

use agdir_common::cid_to_digest;

use crate::error::SignError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignProvider {
    Key,
    Oidc,
}

/// `payload = GeneratePayload(CID-digest-string)` (spec.md §4.6): the
/// signature is computed over the CID's OCI digest form, not the record
/// bytes or the CID string itself.
pub fn generate_payload(cid: &str) -> Result<Vec<u8>, SignError> {
    let digest = cid_to_digest(cid).map_err(|e| SignError::InvalidInput(e.to_string()))?;
    Ok(digest.into_bytes())
}

pub trait Signer: Send + Sync {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SignError>;
    fn public_key_pem(&self) -> Result<String, SignError>;
}

pub trait Verifier: Send + Sync {
    fn verify(&self, payload: &[u8], signature: &[u8], public_key_pem: &str) -> Result<bool, SignError>;
}

/// Local/testing key-based signer. OIDC/bundle-based signing is left as an
/// external collaborator (spec.md §3: "when `content_bundle` is empty the
/// signature is key-based, otherwise OIDC/bundle-based").
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Ed25519Signer { signing_key }
    }

    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, SignError> {
        use ed25519_dalek::pkcs8::DecodePrivateKey;
        let signing_key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| SignError::InvalidInput(format!("invalid ed25519 private key: {e}")))?;
        Ok(Ed25519Signer { signing_key })
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SignError> {
        let signature: Signature = self.signing_key.sign(payload);
        Ok(signature.to_bytes().to_vec())
    }

    fn public_key_pem(&self) -> Result<String, SignError> {
        encode_verifying_key_pem(&self.verifying_key())
    }
}

pub struct Ed25519Verifier;

impl Verifier for Ed25519Verifier {
    fn verify(&self, payload: &[u8], signature: &[u8], public_key_pem: &str) -> Result<bool, SignError> {
        let verifying_key = decode_verifying_key_pem(public_key_pem)?;
        let signature_bytes: [u8; 64] = signature
            .try_into()
            .map_err(|_| SignError::VerificationFailed("signature must be 64 bytes".into()))?;
        let signature = Signature::from_bytes(&signature_bytes);
        Ok(verifying_key.verify(payload, &signature).is_ok())
    }
}

fn encode_verifying_key_pem(key: &VerifyingKey) -> Result<String, SignError> {
    let der = pem::Pem::new("PUBLIC KEY", key.to_bytes().to_vec());
    Ok(pem::encode(&der))
}

fn decode_verifying_key_pem(pem_str: &str) -> Result<VerifyingKey, SignError> {
    let parsed = pem::parse(pem_str).map_err(|e| SignError::InvalidInput(format!("invalid PEM: {e}")))?;
    let bytes: [u8; 32] = parsed
        .contents()
        .try_into()
        .map_err(|_| SignError::InvalidInput("ed25519 public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| SignError::InvalidInput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let signer = Ed25519Signer::generate();
        let payload = b"sha256:deadbeef";
        let signature = signer.sign(payload).unwrap();
        let pem = signer.public_key_pem().unwrap();

        let verifier = Ed25519Verifier;
        assert!(verifier.verify(payload, &signature, &pem).unwrap());
    }

    #[test]
    fn verify_rejects_tampered_payload() {
        let signer = Ed25519Signer::generate();
        let signature = signer.sign(b"original").unwrap();
        let pem = signer.public_key_pem().unwrap();

        let verifier = Ed25519Verifier;
        assert!(!verifier.verify(b"tampered", &signature, &pem).unwrap());
    }

    #[test]
    fn generate_payload_is_digest_string_bytes() {
        let cid = agdir_common::cid_string_from_canonical_bytes(b"{}").unwrap();
        let payload = generate_payload(&cid).unwrap();
        assert_eq!(String::from_utf8(payload).unwrap(), agdir_common::cid_to_digest(&cid).unwrap());
    }
}
