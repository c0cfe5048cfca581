use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::models::{Cart, Category, Order, Product, Review, User};

/// Full serializable state. Every save writes the whole thing; partial
/// snapshots are never emitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub carts: Vec<Cart>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

/// The durable sink. The store treats it as opaque: mutations commit
/// in memory first, then write through here.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn load(&self) -> Result<Snapshot>;
    async fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// JSON file sink. Saves go through a sibling temp file and a rename so a
/// crash mid-write cannot leave a torn snapshot behind.
pub struct JsonSnapshotFile {
    path: PathBuf,
}

impl JsonSnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotSink for JsonSnapshotFile {
    async fn load(&self) -> Result<Snapshot> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Snapshot::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let contents = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &contents).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Keeps only the most recent snapshot, in memory. Used by tests and by the
/// server when no snapshot path is configured.
#[derive(Default)]
pub struct MemorySink {
    last: Mutex<Option<Snapshot>>,
}

impl MemorySink {
    pub fn last(&self) -> Option<Snapshot> {
        self.last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SnapshotSink for MemorySink {
    async fn load(&self) -> Result<Snapshot> {
        Ok(self.last().unwrap_or_default())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self
            .last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(snapshot.clone());
        Ok(())
    }
}
