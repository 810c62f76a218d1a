use crate::error::{storage_error, AppResult, Error};
use async_trait::async_trait;
use chrono::Utc;
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Redis key holding the session token
pub const SESSION_TOKEN_KEY: &str = "slug_events_session_token";

/// Persistent storage for the bearer token
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the stored token, if any
    async fn load(&self) -> AppResult<Option<String>>;

    /// Persist a token, replacing any previous one
    async fn save(&self, token: &str) -> AppResult<()>;

    /// Forget the stored token
    async fn clear(&self) -> AppResult<()>;
}

/// Which token store the configuration asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStoreKind {
    File(PathBuf),
    Redis(String),
    Memory,
}

impl FromStr for TokenStoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "memory" {
            Ok(TokenStoreKind::Memory)
        } else if s.starts_with("redis://") || s.starts_with("rediss://") {
            Ok(TokenStoreKind::Redis(s.to_string()))
        } else if let Some(path) = s.strip_prefix("file:") {
            if path.is_empty() {
                return Err(storage_error("TOKEN_STORE file path is empty"));
            }
            Ok(TokenStoreKind::File(PathBuf::from(path)))
        } else {
            Err(storage_error(&format!("Unsupported TOKEN_STORE: {}", s)))
        }
    }
}

impl TokenStoreKind {
    /// Build the store this kind describes
    pub fn build(&self) -> AppResult<Arc<dyn TokenStore>> {
        Ok(match self {
            TokenStoreKind::File(path) => Arc::new(FileTokenStore::new(path.clone())),
            TokenStoreKind::Redis(url) => Arc::new(RedisTokenStore::open(url)?),
            TokenStoreKind::Memory => Arc::new(MemoryTokenStore::default()),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    saved_at: i64,
}

/// Token kept in a small JSON file
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> AppResult<Option<String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // A corrupt file is treated like a missing token
        match serde_json::from_str::<StoredToken>(&content) {
            Ok(stored) => Ok(Some(stored.token)),
            Err(e) => {
                debug!("Ignoring unreadable token file {:?}: {}", self.path, e);
                Ok(None)
            }
        }
    }

    async fn save(&self, token: &str) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let stored = StoredToken {
            token: token.to_string(),
            saved_at: Utc::now().timestamp(),
        };
        tokio::fs::write(&self.path, serde_json::to_string(&stored)?).await?;
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Token kept under a Redis key
#[derive(Clone)]
pub struct RedisTokenStore {
    client: RedisClient,
}

impl RedisTokenStore {
    pub fn open(url: &str) -> AppResult<Self> {
        let client = RedisClient::open(url)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn load(&self) -> AppResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let token: Option<String> = conn.get(SESSION_TOKEN_KEY).await?;
        Ok(token)
    }

    async fn save(&self, token: &str) -> AppResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        () = conn.set(SESSION_TOKEN_KEY, token).await?;
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        () = conn.del(SESSION_TOKEN_KEY).await?;
        Ok(())
    }
}

/// Token kept for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    /// Store pre-seeded with a token
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> AppResult<Option<String>> {
        Ok(self.token.lock().await.clone())
    }

    async fn save(&self, token: &str) -> AppResult<()> {
        *self.token.lock().await = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        *self.token.lock().await = None;
        Ok(())
    }
}
