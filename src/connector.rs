use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::Adapter;

/// Name of the credentials file looked up under the base directory.
pub const CREDENTIALS_FILE: &str = "service_account.json";

/// Ambient fallback when no credentials file is present.
pub const DATABASE_URL_VAR: &str = "CORPUS_DATABASE_URL";

#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub base_dir: PathBuf,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
        }
    }
}

impl ConnectorConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.base_dir.join(CREDENTIALS_FILE)
    }
}

#[derive(Debug, Deserialize)]
struct Credentials {
    database_url: String,
}

/// Connection provider: owns the one store handle for the life of the
/// process. Constructed once at startup and shared by `Arc` into every
/// collection; the handle itself is built lazily on first use, exactly
/// once, guarded by a `OnceCell`.
///
/// Construction tries the credentials file under the base directory first,
/// then the ambient database URL. Both failing is not an error: the
/// connector settles into a soft-offline state (absent handle) where reads
/// come back empty, writes echo without persisting, and deletes no-op.
/// Nothing outside this type retries initialization.
pub struct Connector {
    config: ConnectorConfig,
    handle: OnceCell<Option<Arc<dyn Adapter>>>,
}

impl Connector {
    pub fn new(config: ConnectorConfig) -> Self {
        Self {
            config,
            handle: OnceCell::new(),
        }
    }

    /// Pre-initialized with an injected adapter. Used by tests and by
    /// embedders that build their own store.
    pub fn with_adapter(adapter: Arc<dyn Adapter>) -> Self {
        Self {
            config: ConnectorConfig::default(),
            handle: OnceCell::new_with(Some(Some(adapter))),
        }
    }

    /// Pre-initialized absent handle: permanently soft-offline.
    pub fn offline() -> Self {
        Self {
            config: ConnectorConfig::default(),
            handle: OnceCell::new_with(Some(None)),
        }
    }

    /// The shared store handle, constructing it on first call. Always
    /// returns the same value afterwards, `None` meaning soft-offline.
    pub async fn handle(&self) -> Option<Arc<dyn Adapter>> {
        self.handle
            .get_or_init(|| Self::initialize(&self.config))
            .await
            .clone()
    }

    async fn initialize(config: &ConnectorConfig) -> Option<Arc<dyn Adapter>> {
        let url = match Self::resolve_url(config) {
            Some(url) => url,
            None => {
                tracing::warn!(
                    base_dir = %config.base_dir.display(),
                    "no credentials file and no ambient database url; running offline"
                );
                return None;
            }
        };

        match Self::open(&url).await {
            Ok(adapter) => {
                tracing::info!("store connection initialized");
                Some(adapter)
            }
            Err(err) => {
                tracing::warn!(%err, "store initialization failed; running offline");
                None
            }
        }
    }

    fn resolve_url(config: &ConnectorConfig) -> Option<String> {
        let path = config.credentials_path();
        if path.exists() {
            match Self::read_credentials(&path) {
                Ok(credentials) => return Some(credentials.database_url),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "unreadable credentials file");
                }
            }
        }
        std::env::var(DATABASE_URL_VAR).ok()
    }

    fn read_credentials(path: &Path) -> Result<Credentials, Box<dyn std::error::Error>> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    #[cfg(feature = "sqlite")]
    async fn open(url: &str) -> Result<Arc<dyn Adapter>, crate::error::Error> {
        let adapter = crate::adapters::SqliteAdapter::connect(url).await?;
        adapter.init_schema().await?;
        Ok(Arc::new(adapter))
    }

    #[cfg(not(feature = "sqlite"))]
    async fn open(url: &str) -> Result<Arc<dyn Adapter>, crate::error::Error> {
        let _ = url;
        Err(crate::error::Error::Storage(
            "no storage backend compiled in".to_string(),
        ))
    }
}
