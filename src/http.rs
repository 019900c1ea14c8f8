//! HTTP session shared by the login flow and the data endpoints
//!
//! The B2C login pages hand their CSRF token and transaction state over in
//! cookies, so every request of a client instance goes through one cookie
//! jar. Two reqwest clients sit on top of it: one that follows redirects and
//! one that does not, for the confirmation step whose `Location` header
//! carries the authorization code.

use crate::config::HttpConfig;
use crate::error::Result;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Url, redirect};
use std::sync::Arc;
use std::time::Duration;

/// Cookie-persistent HTTP session, one per client instance
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: Client,
    no_redirect: Client,
    jar: Arc<Jar>,
}

impl HttpSession {
    /// Build both clients over a fresh cookie jar
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let timeout = Duration::from_secs(config.timeout_secs);

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .cookie_provider(jar.clone())
            .build()?;

        let no_redirect = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .cookie_provider(jar.clone())
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            no_redirect,
            jar,
        })
    }

    /// Client that follows redirects
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Client that returns 3xx responses as-is
    pub fn no_redirect(&self) -> &Client {
        &self.no_redirect
    }

    /// Value of cookie `name` as it would be sent to `url`
    pub fn cookie(&self, url: &str, name: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let header = self.jar.cookies(&url)?;
        let header = header.to_str().ok()?;
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }
}
