use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, warn};

use super::entities::TrackingState;

/// Interface for abstracting persistence of [TrackingState].
pub trait StateStorage {
    /// Loads previously stored state. `None` means nothing was ever stored.
    fn load(&self) -> impl Future<Output = Result<Option<TrackingState>>>;

    /// Replaces the stored state with `state`.
    fn save(&self, state: &TrackingState) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> StateStorage for T
where
    T::Target: StateStorage,
{
    fn load(&self) -> impl Future<Output = Result<Option<TrackingState>>> {
        self.deref().load()
    }

    fn save(&self, state: &TrackingState) -> impl Future<Output = Result<()>> {
        self.deref().save(state)
    }
}

/// The main realization of [StateStorage]. Keeps everything in one json file which is locked
/// while being read or written, so the cli never observes a half written state.
pub struct JsonStateStorage {
    path: PathBuf,
}

impl JsonStateStorage {
    pub fn new(path: PathBuf) -> Result<Self, std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_locked(&self) -> std::result::Result<Vec<u8>, std::io::Error> {
        let mut file = File::open(&self.path).await?;
        file.lock_shared()?;
        let mut buffer = Vec::new();
        let result = file.read_to_end(&mut buffer).await;
        file.unlock_async().await?;
        result?;
        Ok(buffer)
    }

    /// Keeps a copy of a state file that can't be understood at all before it gets overwritten
    /// with defaults.
    async fn back_up_unreadable(&self) {
        let backup = self.path.with_extension("json.bak");
        match tokio::fs::copy(&self.path, &backup).await {
            Ok(_) => warn!("Unreadable state was copied to {backup:?}"),
            Err(e) => warn!("Failed to back up unreadable state to {backup:?}: {e}"),
        }
    }
}

impl StateStorage for JsonStateStorage {
    async fn load(&self) -> Result<Option<TrackingState>> {
        debug!("Loading state from {:?}", self.path);
        let bytes = match self.read_locked().await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read state {:?}", self.path))
            }
        };

        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => Ok(Some(TrackingState::from_stored(value))),
            Err(e) => {
                warn!("State file {:?} is not valid json: {e}", self.path);
                self.back_up_unreadable().await;
                Ok(Some(TrackingState::default()))
            }
        }
    }

    async fn save(&self, state: &TrackingState) -> Result<()> {
        let payload = serde_json::to_vec_pretty(state)?;

        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open state {:?}", self.path))?;

        // Truncating only after the lock is held, so readers never see an empty file.
        file.lock_exclusive()?;
        let result = write_all(&mut file, &payload).await;
        file.unlock_async().await?;
        result.with_context(|| format!("Failed to write state {:?}", self.path))
    }
}

async fn write_all(file: &mut File, payload: &[u8]) -> std::result::Result<(), std::io::Error> {
    file.set_len(0).await?;
    file.rewind().await?;
    file.write_all(payload).await?;
    file.flush().await?;
    file.sync_data().await
}
