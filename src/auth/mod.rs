//! Authentication against the Azure AD B2C tenant
//!
//! - `pkce`: verifier/challenge pairs for the authorization request
//! - `flow`: the scripted sign-in pages that end in an authorization code
//! - `tokens`: token set storage, expiry checks, refresh and code exchange

pub mod flow;
pub mod pkce;
pub mod tokens;

pub use flow::{FlowStep, LoginFlow};
pub use pkce::PkcePair;
pub use tokens::{EXPIRY_MARGIN_SECS, TokenManager, TokenSet};

/// Account credentials, fixed for the lifetime of a client
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
