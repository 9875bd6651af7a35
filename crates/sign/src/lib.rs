//! agdir_sign
//!
//! Signature subsystem (spec.md §4.6): opaque Signer/Verifier interfaces, a
//! concrete Ed25519 implementation, Sign/Verify over CID referrers, and a
//! background reconciler that periodically re-verifies stale cache entries.

mod error;
mod reconciler;
mod service;
mod signer;

pub use error::SignError;
pub use reconciler::{
    run_once, ReconcilerConfig, VerificationCache, VerificationCacheEntry, DEFAULT_PER_RECORD_TIMEOUT, DEFAULT_TTL,
};
pub use service::{sign_cid, verify_cid, verify_cid_with_key, PublicKeyRecord, SignatureRecord};
pub use signer::{generate_payload, Ed25519Signer, Ed25519Verifier, SignProvider, Signer, Verifier};
