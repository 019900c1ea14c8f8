//! # Wattson - Watts Energy consumption client
//!
//! Signs in to the Watts Energy Azure AD B2C tenant the way the mobile app
//! does (authorization code + PKCE behind a self-asserted login page),
//! discovers the account's water and heating meters and turns their reading
//! history into rolling statistics.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `http`: Cookie-persistent HTTP session
//! - `auth`: PKCE, the scripted sign-in flow and token lifecycle
//! - `devices`: Device discovery
//! - `readings`: Reading normalization and aggregation
//! - `snapshot`: Per-poll result structures
//! - `client`: Polling façade tying the above together
//! - `persistence`: Token and device id persistence across restarts
//! - `coordinator`: Interval polling with stale-but-available data

pub mod auth;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod devices;
pub mod error;
pub mod http;
pub mod logging;
pub mod persistence;
pub mod readings;
pub mod snapshot;

// Re-export commonly used types
pub use client::WattsonClient;
pub use config::Config;
pub use error::{Result, WattsonError};
pub use snapshot::{Snapshot, Utility, UtilitySnapshot};
