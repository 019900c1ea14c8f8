//! Token set storage, expiry checks, refresh and code exchange
//!
//! The manager hands out a cached access token while it is comfortably
//! valid, tries a refresh-token grant when it is not, and falls back to the
//! full sign-in flow when there is nothing to refresh or the refresh is
//! rejected for any reason.

use crate::auth::Credentials;
use crate::auth::flow::LoginFlow;
use crate::auth::pkce::PkcePair;
use crate::config::EndpointsConfig;
use crate::error::{Result, WattsonError};
use crate::http::HttpSession;
use crate::logging::{StructuredLogger, get_logger};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Seconds before `expires_on` at which a token is already treated as stale
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Access/refresh token pair as issued by the token endpoint
///
/// Provider fields beyond the ones used here (`id_token`, `scope`,
/// `not_before`, ...) are kept in `extra` so the set round-trips unchanged
/// through the host's storage.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Unix seconds
    #[serde(default, deserialize_with = "deserialize_epoch")]
    pub expires_on: i64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_on", &self.expires_on)
            .field("extra_fields", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn epoch_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn deserialize_epoch<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    epoch_from_value(&value)
        .ok_or_else(|| D::Error::custom(format!("expires_on is not an epoch: {value}")))
}

impl TokenSet {
    /// Parse a token endpoint response received at `now`
    ///
    /// `expires_on` may be missing when the endpoint only reports
    /// `expires_in`; it is derived from `now` in that case.
    pub fn from_response(body: Value, now: i64) -> Result<Self> {
        let Value::Object(mut map) = body else {
            return Err(WattsonError::Serialization {
                message: "token response is not a JSON object".to_string(),
            });
        };
        let has_expiry = map.get("expires_on").and_then(epoch_from_value).is_some();
        if !has_expiry
            && let Some(expires_in) = map.get("expires_in").and_then(epoch_from_value)
        {
            map.insert("expires_on".to_string(), Value::from(now + expires_in));
        }
        let tokens: TokenSet = serde_json::from_value(Value::Object(map))?;
        if tokens.access_token.is_empty() {
            return Err(WattsonError::Serialization {
                message: "token response has an empty access_token".to_string(),
            });
        }
        Ok(tokens)
    }

    /// Whether the access token can still be used at `now` (unix seconds)
    pub fn is_valid_at(&self, now: i64) -> bool {
        now < self.expires_on - EXPIRY_MARGIN_SECS
    }
}

fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Owner of the client's token set
#[derive(Debug)]
pub struct TokenManager {
    tokens: Option<TokenSet>,
    logger: StructuredLogger,
}

impl TokenManager {
    pub fn new(tokens: Option<TokenSet>) -> Self {
        Self {
            tokens,
            logger: get_logger("tokens"),
        }
    }

    /// Latest committed token set
    pub fn tokens(&self) -> Option<&TokenSet> {
        self.tokens.as_ref()
    }

    /// Whether a cached access token is usable without a network call
    pub fn has_valid_token(&self) -> bool {
        self.tokens
            .as_ref()
            .is_some_and(|t| t.is_valid_at(now_epoch()))
    }

    /// Return a usable access token, refreshing or signing in as needed
    pub async fn ensure_access_token(
        &mut self,
        session: &HttpSession,
        endpoints: &EndpointsConfig,
        credentials: &Credentials,
    ) -> Result<String> {
        if let Some(tokens) = &self.tokens
            && tokens.is_valid_at(now_epoch())
        {
            return Ok(tokens.access_token.clone());
        }

        let refresh_token = self
            .tokens
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .filter(|t| !t.is_empty());

        if let Some(refresh_token) = refresh_token {
            self.logger.debug("Refreshing access token using refresh_token");
            match self.refresh(session, endpoints, &refresh_token).await {
                Ok(tokens) => {
                    self.logger.info("Token refreshed successfully");
                    let access_token = tokens.access_token.clone();
                    self.tokens = Some(tokens);
                    return Ok(access_token);
                }
                Err(e) => {
                    self.logger
                        .warn(&format!("{}, falling back to full login", e));
                }
            }
        }

        let tokens = self.login(session, endpoints, credentials).await?;
        self.logger.info("Signed in with credentials");
        let access_token = tokens.access_token.clone();
        self.tokens = Some(tokens);
        Ok(access_token)
    }

    /// Refresh-token grant; any non-200 answer is a `RefreshFailed`
    pub async fn refresh(
        &self,
        session: &HttpSession,
        endpoints: &EndpointsConfig,
        refresh_token: &str,
    ) -> Result<TokenSet> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", endpoints.client_id.as_str()),
            ("scope", endpoints.scopes.as_str()),
            ("refresh_token", refresh_token),
            ("redirect_uri", endpoints.redirect_uri.as_str()),
        ];
        let resp = session
            .client()
            .post(endpoints.token_url())
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if status.as_u16() != 200 {
            return Err(WattsonError::refresh_failed(status.as_u16(), &body));
        }

        let value: Value = serde_json::from_str(&body)?;
        let mut tokens = TokenSet::from_response(value, now_epoch())?;
        // Keep the old refresh token when the provider does not rotate it
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        Ok(tokens)
    }

    /// Full sign-in followed by an authorization-code grant
    pub async fn login(
        &self,
        session: &HttpSession,
        endpoints: &EndpointsConfig,
        credentials: &Credentials,
    ) -> Result<TokenSet> {
        let pkce = PkcePair::generate();
        let code = LoginFlow::new(session, endpoints)
            .run(credentials, &pkce)
            .await?;
        self.exchange_code(session, endpoints, &code, &pkce.verifier)
            .await
    }

    async fn exchange_code(
        &self,
        session: &HttpSession,
        endpoints: &EndpointsConfig,
        code: &str,
        verifier: &str,
    ) -> Result<TokenSet> {
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", endpoints.client_id.as_str()),
            ("scope", endpoints.scopes.as_str()),
            ("code", code),
            ("redirect_uri", endpoints.redirect_uri.as_str()),
            ("code_verifier", verifier),
        ];
        let resp = session
            .client()
            .post(endpoints.token_url())
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if status.as_u16() != 200 {
            return Err(WattsonError::token_exchange_failed(status.as_u16(), &body));
        }

        let value: Value = serde_json::from_str(&body)?;
        TokenSet::from_response(value, now_epoch())
    }
}
