//! Pending Order Vaults
//!
//! The order snapshot has to outlive an off-site authentication redirect.
//! `LocalVault` keeps it on the device under `pendingOrder`; `ServerVault`
//! keeps it on the checkout server and carries only a token through the
//! redirect URL.

use async_trait::async_trait;
use magnet_core::{CheckoutToken, PendingOrder, PENDING_ORDER_KEY};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::api::HttpOrderApi;
use crate::error::{ClientError, Result};

#[async_trait]
pub trait PendingOrderVault: Send + Sync {
    /// Save the snapshot, replacing any earlier one. Returns a token if the
    /// snapshot must be found again by token.
    async fn stash(&self, order: &PendingOrder) -> Result<Option<CheckoutToken>>;

    async fn load(&self, token: Option<&CheckoutToken>) -> Result<Option<PendingOrder>>;

    async fn discard(&self, token: Option<&CheckoutToken>) -> Result<()>;
}

/// In-process vault
#[derive(Default)]
pub struct MemoryVault {
    slot: Mutex<Option<PendingOrder>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.slot.lock().await.is_none()
    }
}

#[async_trait]
impl PendingOrderVault for MemoryVault {
    async fn stash(&self, order: &PendingOrder) -> Result<Option<CheckoutToken>> {
        *self.slot.lock().await = Some(order.clone());
        Ok(None)
    }

    async fn load(&self, _token: Option<&CheckoutToken>) -> Result<Option<PendingOrder>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn discard(&self, _token: Option<&CheckoutToken>) -> Result<()> {
        self.slot.lock().await.take();
        Ok(())
    }
}

/// Device storage: one JSON file named after the storage key
pub struct LocalVault {
    path: PathBuf,
}

impl LocalVault {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{PENDING_ORDER_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn storage_error(action: &str, err: impl std::fmt::Display) -> ClientError {
    ClientError::Unexpected(format!("Could not {action} saved order details: {err}"))
}

#[async_trait]
impl PendingOrderVault for LocalVault {
    async fn stash(&self, order: &PendingOrder) -> Result<Option<CheckoutToken>> {
        let json = serde_json::to_vec(order).map_err(|e| storage_error("encode", e))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("save", e))?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| storage_error("save", e))?;
        Ok(None)
    }

    async fn load(&self, _token: Option<&CheckoutToken>) -> Result<Option<PendingOrder>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error("read", e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| storage_error("read", e))
    }

    async fn discard(&self, _token: Option<&CheckoutToken>) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", e)),
        }
    }
}

/// Server-side pending checkout
pub struct ServerVault {
    api: HttpOrderApi,
}

impl ServerVault {
    pub const fn new(api: HttpOrderApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PendingOrderVault for ServerVault {
    async fn stash(&self, order: &PendingOrder) -> Result<Option<CheckoutToken>> {
        self.api.save_pending(order).await.map(Some)
    }

    async fn load(&self, token: Option<&CheckoutToken>) -> Result<Option<PendingOrder>> {
        match token {
            Some(token) => self.api.load_pending(token).await,
            None => Ok(None),
        }
    }

    async fn discard(&self, token: Option<&CheckoutToken>) -> Result<()> {
        match token {
            Some(token) => self.api.discard_pending(token).await,
            None => Ok(()),
        }
    }
}
