//! Scripted B2C sign-in ending in an authorization code
//!
//! ```text
//! Start --authorize--> Authorized --SelfAsserted POST--> SelfAsserted
//!       --confirmed GET--> Confirmed --> Done          (any step --> Failed)
//! ```
//!
//! Each step consumes artifacts produced by the previous one (cookies, the
//! `StateProperties` transaction id). Every extraction is its own function
//! returning a named `FlowShape` error, so a markup change on the provider
//! side fails at the exact artifact that disappeared.

use crate::auth::Credentials;
use crate::auth::pkce::PkcePair;
use crate::config::EndpointsConfig;
use crate::error::{Result, WattsonError};
use crate::http::HttpSession;
use crate::logging::{StructuredLogger, get_logger};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::{LOCATION, ORIGIN, REFERER};

/// Cookie carrying the CSRF token for the self-asserted POST
pub const CSRF_COOKIE: &str = "x-ms-cpim-csrf";

#[allow(clippy::expect_used)]
static STATE_PROPERTIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"StateProperties=([^&"'<> ]+)"#).expect("StateProperties pattern compiles")
});

#[allow(clippy::expect_used)]
static AUTHORIZATION_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[?&]code=([^&\s"'>]+)"#).expect("authorization code pattern compiles")
});

/// Position of a login attempt in the sign-in sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep {
    Start,
    Authorized,
    SelfAsserted,
    Confirmed,
    Done,
    Failed,
}

/// Artifacts of the authorize page
#[derive(Debug, Clone)]
pub struct Authorized {
    /// Value following `StateProperties=`
    pub transaction: String,
    pub csrf_token: String,
    /// Final authorize URL without fragment, echoed as `Referer`
    pub referer: String,
}

/// Credentials accepted; confirmation pending
#[derive(Debug, Clone)]
pub struct SelfAsserted {
    pub transaction: String,
    pub csrf_token: String,
}

/// One sign-in attempt over a shared session
pub struct LoginFlow<'a> {
    session: &'a HttpSession,
    endpoints: &'a EndpointsConfig,
    step: FlowStep,
    logger: StructuredLogger,
}

impl<'a> LoginFlow<'a> {
    pub fn new(session: &'a HttpSession, endpoints: &'a EndpointsConfig) -> Self {
        Self {
            session,
            endpoints,
            step: FlowStep::Start,
            logger: get_logger("login"),
        }
    }

    /// Current step; `Failed` once any step has errored
    pub fn step(&self) -> FlowStep {
        self.step
    }

    /// Drive all steps and return the authorization code
    pub async fn run(&mut self, credentials: &Credentials, pkce: &PkcePair) -> Result<String> {
        let result = self.run_steps(credentials, pkce).await;
        if let Err(e) = &result {
            self.logger
                .error(&format!("Sign-in failed after step {:?}: {}", self.step, e));
            self.step = FlowStep::Failed;
        }
        result
    }

    async fn run_steps(&mut self, credentials: &Credentials, pkce: &PkcePair) -> Result<String> {
        let authorized = self.authorize(pkce).await?;
        let asserted = self.submit_credentials(&authorized, credentials).await?;
        let code = self.confirm(&asserted).await?;
        self.step = FlowStep::Done;
        Ok(code)
    }

    /// Open the authorize page and collect the transaction id and CSRF cookie
    pub async fn authorize(&mut self, pkce: &PkcePair) -> Result<Authorized> {
        let params = [
            ("client_id", self.endpoints.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", self.endpoints.redirect_uri.as_str()),
            ("response_mode", "query"),
            ("scope", self.endpoints.scopes.as_str()),
            ("code_challenge", pkce.challenge.as_str()),
            ("code_challenge_method", pkce.method()),
            ("prompt", "select_account"),
            ("client_info", "1"),
        ];

        let resp = self
            .session
            .client()
            .get(self.endpoints.authorize_url())
            .query(&params)
            .send()
            .await?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(WattsonError::login_failed(status.as_u16(), &body));
        }

        let transaction = extract_state_properties(&final_url, &body)?;
        let csrf_token = self.csrf_cookie()?;
        let referer = final_url
            .split('#')
            .next()
            .unwrap_or(final_url.as_str())
            .to_string();

        self.step = FlowStep::Authorized;
        self.logger.debug("Authorize page loaded, transaction id found");
        Ok(Authorized {
            transaction,
            csrf_token,
            referer,
        })
    }

    fn csrf_cookie(&self) -> Result<String> {
        self.session
            .cookie(&self.endpoints.self_asserted_url(), CSRF_COOKIE)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                WattsonError::flow_shape(
                    format!("{CSRF_COOKIE} cookie"),
                    "not set by the authorize page".to_string(),
                )
            })
    }

    /// POST the credentials to the self-asserted endpoint
    pub async fn submit_credentials(
        &mut self,
        authorized: &Authorized,
        credentials: &Credentials,
    ) -> Result<SelfAsserted> {
        let tx = format!("StateProperties={}", authorized.transaction);
        let form = [
            ("request_type", "RESPONSE"),
            ("signInName", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];

        let resp = self
            .session
            .client()
            .post(self.endpoints.self_asserted_url())
            .query(&[("tx", tx.as_str()), ("p", self.endpoints.policy.as_str())])
            .header("X-Requested-With", "XMLHttpRequest")
            .header("X-CSRF-TOKEN", authorized.csrf_token.as_str())
            .header(ORIGIN, self.endpoints.origin())
            .header(REFERER, authorized.referer.as_str())
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if status != StatusCode::OK && status != StatusCode::NO_CONTENT {
            return Err(WattsonError::login_failed(status.as_u16(), &body));
        }
        if let Some(rejected) = self_asserted_rejection(&body) {
            return Err(WattsonError::login_failed(rejected, &body));
        }

        self.step = FlowStep::SelfAsserted;
        self.logger.debug("Credentials accepted");
        Ok(SelfAsserted {
            transaction: authorized.transaction.clone(),
            csrf_token: authorized.csrf_token.clone(),
        })
    }

    /// Hit the confirmation endpoint and read the code off its redirect
    pub async fn confirm(&mut self, asserted: &SelfAsserted) -> Result<String> {
        let tx = format!("StateProperties={}", asserted.transaction);
        let resp = self
            .session
            .no_redirect()
            .get(self.endpoints.confirmed_url())
            .query(&[
                ("rememberMe", "false"),
                ("csrf_token", asserted.csrf_token.as_str()),
                ("tx", tx.as_str()),
                ("p", self.endpoints.policy.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::FOUND && status != StatusCode::SEE_OTHER {
            let body = resp.text().await.unwrap_or_default();
            return Err(WattsonError::login_failed(status.as_u16(), &body));
        }

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                WattsonError::flow_shape(
                    "redirect Location header",
                    "confirmation response had no Location",
                )
            })?;
        let code = extract_authorization_code(location)?;

        self.step = FlowStep::Confirmed;
        self.logger.debug("Authorization code received");
        Ok(code)
    }
}

/// Transaction id from the final authorize URL, falling back to the page body
pub fn extract_state_properties(final_url: &str, body: &str) -> Result<String> {
    STATE_PROPERTIES
        .captures(final_url)
        .or_else(|| STATE_PROPERTIES.captures(body))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            WattsonError::flow_shape("StateProperties", "not in authorize URL or page body")
        })
}

/// Authorization code from a redirect `Location`
pub fn extract_authorization_code(location: &str) -> Result<String> {
    AUTHORIZATION_CODE
        .captures(location)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            WattsonError::flow_shape("authorization code", "no code parameter in redirect")
        })
}

/// B2C answers a rejected sign-in with HTTP 200 and `{"status":"400",...}`
pub fn self_asserted_rejection(body: &str) -> Option<u16> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let status = match value.get("status")? {
        serde_json::Value::String(s) => s.trim().parse::<u16>().ok()?,
        serde_json::Value::Number(n) => u16::try_from(n.as_u64()?).ok()?,
        _ => return None,
    };
    (status != 200).then_some(status)
}
