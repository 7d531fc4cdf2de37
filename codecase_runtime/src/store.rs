//! Remote profile store interface plus the two local implementations.
//!
//! A profile is one document holding the point balance and the unlocked-id
//! set; every write replaces both fields at once.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use prost::Message;
use tokio::sync::Mutex;

use codecase_engine::ledger::LedgerState;

use crate::proto_bridge::{ledger_to_proto, proto_to_ledger};
use crate::proto_types::ProtoProfileBook;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
    #[error("profile store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("profile store i/o: {0}")]
    Io(#[from] io::Error),
    #[error("profile document undecodable: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Current ledger for `user_id`. Unknown users read as an empty ledger.
    async fn read(&self, user_id: &str) -> Result<LedgerState, StoreError>;

    /// Replace the whole profile document for `user_id`.
    async fn write(&self, user_id: &str, ledger: &LedgerState) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local store with failure and latency injection for tests and
/// offline hosts.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: Mutex<HashMap<String, LedgerState>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    delay: Mutex<Option<Duration>>,
    writes: AtomicUsize,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(user_id: &str, ledger: LedgerState) -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(user_id.to_string(), ledger);
        Self {
            profiles: Mutex::new(profiles),
            ..Self::default()
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Delay every call by `delay` before it touches the document.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().await = delay;
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self, user_id: &str) -> Option<LedgerState> {
        self.profiles.lock().await.get(user_id).cloned()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn read(&self, user_id: &str) -> Result<LedgerState, StoreError> {
        self.pause().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("read rejected".to_string()));
        }
        Ok(self
            .profiles
            .lock()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn write(&self, user_id: &str, ledger: &LedgerState) -> Result<(), StoreError> {
        self.pause().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write rejected".to_string()));
        }
        self.profiles
            .lock()
            .await
            .insert(user_id.to_string(), ledger.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File-backed
// ---------------------------------------------------------------------------

/// Every profile in one protobuf document, rewritten through a temp file
/// and rename, fsynced before the rename.
#[derive(Debug)]
pub struct FileProfileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileProfileStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_book(&self) -> Result<ProtoProfileBook, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => ProtoProfileBook::decode(bytes.as_slice())
                .map_err(|e| StoreError::Decode(e.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ProtoProfileBook::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_book(&self, book: &ProtoProfileBook) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        let bytes = book.encode_to_vec();
        let mut file = tokio::fs::File::create(&tmp).await?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn read(&self, user_id: &str) -> Result<LedgerState, StoreError> {
        let _guard = self.lock.lock().await;
        let book = self.load_book().await?;
        Ok(book
            .profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .map(proto_to_ledger)
            .unwrap_or_default())
    }

    async fn write(&self, user_id: &str, ledger: &LedgerState) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut book = self.load_book().await?;
        let doc = ledger_to_proto(user_id, ledger);
        match book.profiles.iter_mut().find(|p| p.user_id == user_id) {
            Some(existing) => *existing = doc,
            None => book.profiles.push(doc),
        }
        self.save_book(&book).await
    }
}
