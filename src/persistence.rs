//! Persistence of tokens and device ids across restarts
//!
//! The client never writes to disk itself. After each poll the host captures
//! the client's state and hands it to a `TokenPersistence` implementation,
//! which is only called when the state differs from what was last stored.

use crate::auth::TokenSet;
use crate::client::WattsonClient;
use crate::devices::DeviceIdentifiers;
use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// State carried between process restarts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistentState {
    /// Latest token set, opaque to the store
    #[serde(default)]
    pub tokens: Option<TokenSet>,

    #[serde(default, flatten)]
    pub devices: DeviceIdentifiers,
}

impl PersistentState {
    /// Current token set and device ids of a client
    pub fn capture(client: &WattsonClient) -> Self {
        Self {
            tokens: client.tokens().cloned(),
            devices: client.devices().clone(),
        }
    }
}

/// Outbound persistence hook
#[async_trait]
pub trait TokenPersistence: Send + Sync {
    /// Last stored state; the default state when nothing was stored yet
    async fn load(&self) -> Result<PersistentState>;

    async fn persist(&self, state: &PersistentState) -> Result<()>;
}

/// Persist `current` unless it equals `last`; returns whether it wrote
pub async fn persist_if_changed<P: TokenPersistence + ?Sized>(
    store: &P,
    last: &mut Option<PersistentState>,
    current: &PersistentState,
) -> Result<bool> {
    if last.as_ref() == Some(current) {
        return Ok(false);
    }
    store.persist(current).await?;
    *last = Some(current.clone());
    Ok(true)
}

/// JSON state file
#[derive(Debug, Clone)]
pub struct StateStore {
    file_path: PathBuf,
    logger: StructuredLogger,
}

impl StateStore {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            logger: get_logger("persistence"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.file_path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl TokenPersistence for StateStore {
    async fn load(&self) -> Result<PersistentState> {
        if !tokio::fs::try_exists(&self.file_path).await? {
            self.logger
                .info("No persistent state file found, using defaults");
            return Ok(PersistentState::default());
        }

        let contents = tokio::fs::read_to_string(&self.file_path).await?;
        let state: PersistentState = serde_json::from_str(&contents)?;
        self.logger.info("Loaded persistent state from disk");
        Ok(state)
    }

    async fn persist(&self, state: &PersistentState) -> Result<()> {
        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(state)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, contents).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }
        tokio::fs::rename(&tmp, &self.file_path).await?;

        self.logger.debug("Saved persistent state to disk");
        Ok(())
    }
}
