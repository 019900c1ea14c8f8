//! PKCE (Proof Key for Code Exchange) for the authorization request
//!
//! The verifier is 64 random bytes, base64url-encoded without padding
//! (86 characters, inside RFC 7636's 43-128 range). The challenge is
//! BASE64URL(SHA256(ASCII(verifier))).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random bytes behind each verifier
pub const VERIFIER_ENTROPY_BYTES: usize = 64;

/// Verifier/challenge pair for one login attempt
#[derive(Clone)]
pub struct PkcePair {
    /// Kept secret until the code exchange
    pub verifier: String,
    /// Sent with the authorization request
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh pair from the thread-local CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; VERIFIER_ENTROPY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    pub fn method(&self) -> &'static str {
        "S256"
    }
}

impl std::fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// Derive the S256 challenge for a verifier
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// `(verifier, challenge)` shorthand
pub fn generate() -> (String, String) {
    let pair = PkcePair::generate();
    (pair.verifier, pair.challenge)
}
