// # File Store
//
// File-based implementation of PhoneDirectory and MessageStore with crash
// recovery.
//
// ## Purpose
//
// Keeps phones (with their blacklist flags) and accepted messages across
// daemon restarts, so late delivery callbacks still find their message.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "phones": [
//     {
//       "number": "5551234",
//       "blacklisted": false,
//       "created_at": "2025-01-09T12:00:00Z",
//       "updated_at": "2025-01-09T12:00:00Z"
//     }
//   ],
//   "messages": [
//     {
//       "id": "a1b2c3",
//       "phone_number": "5551234",
//       "provider": { "id": 1, "url": "https://example.com/provider1" },
//       "status": "sending",
//       "created_at": "2025-01-09T12:00:00Z",
//       "updated_at": "2025-01-09T12:00:01Z"
//     }
//   ]
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::lifecycle::Transition;
use crate::model::{Message, MessageId, Phone, PhoneNumber};
use crate::store::Records;
use crate::traits::{MessageStore, PhoneDirectory};

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based store with crash recovery
///
/// Every change is applied to a copy of the records and written to disk
/// before it becomes visible. A failed write leaves the store exactly as it
/// was. The write guard is held until the file is renamed into place, so
/// concurrent updates reach the disk in the order they were applied.
///
/// # Example
///
/// ```rust,no_run
/// use sms_core::model::PhoneNumber;
/// use sms_core::store::FileStore;
/// use sms_core::traits::PhoneDirectory;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStore::new("/var/lib/smsd/store.json").await?;
///     let number = PhoneNumber::parse("5551234")?;
///
///     // Created and written to disk
///     store.find_or_create_phone(&number).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    records: RwLock<Records>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFileFormat {
    version: String,
    #[serde(flatten)]
    records: Records,
}

impl FileStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing store file
    /// 3. If it is corrupted, try to load the backup
    /// 4. If both fail, start empty
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let records = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Load the store file, falling back to the backup on corruption
    async fn load_with_recovery(path: &Path) -> Result<Records, Error> {
        let err = match Self::load(path).await {
            Ok(records) => {
                tracing::debug!(
                    "Loaded store from file: {} phones, {} messages",
                    records.phone_count(),
                    records.message_count()
                );
                return Ok(records);
            }
            // Unreadable file, not a corrupted one
            Err(Error::Io(e)) => {
                return Err(Error::store(format!(
                    "Failed to read store file {}: {}",
                    path.display(),
                    e
                )));
            }
            Err(e) => e,
        };

        tracing::warn!(
            "Store file appears corrupted: {}. Attempting recovery from backup.",
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty store.");
            return Ok(Records::default());
        }

        match Self::load(&backup_path).await {
            Ok(records) => {
                tracing::info!(
                    "Recovered store from backup: {} messages",
                    records.message_count()
                );

                if let Err(e) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore store file from backup: {}", e);
                }

                Ok(records)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with empty store.",
                    backup_err
                );
                Ok(Records::default())
            }
        }
    }

    async fn load(path: &Path) -> Result<Records, Error> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(Records::default());
        }

        let content = fs::read_to_string(path).await?;
        let file: StoreFileFormat = serde_json::from_str(&content)?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        let mut records = file.records;
        records.reindex()?;
        Ok(records)
    }

    /// Write staged records to disk, then make them the live state
    ///
    /// On error the live state is left untouched.
    async fn commit(&self, live: &mut Records, staged: Records) -> Result<(), Error> {
        self.persist(&staged).await?;
        *live = staged;
        Ok(())
    }

    /// Write the records to disk atomically
    ///
    /// Callers hold the write guard for the whole call.
    async fn persist(&self, records: &Records) -> Result<(), Error> {
        let file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            records: records.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::store(format!("Failed to serialize store: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            temp.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Store written to file: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl PhoneDirectory for FileStore {
    async fn find_phone(&self, number: &PhoneNumber) -> Result<Option<Phone>, Error> {
        let guard = self.records.read().await;
        Ok(guard.find_phone(number).cloned())
    }

    async fn find_or_create_phone(&self, number: &PhoneNumber) -> Result<Phone, Error> {
        let mut guard = self.records.write().await;
        if let Some(phone) = guard.find_phone(number) {
            return Ok(phone.clone());
        }

        let mut staged = guard.clone();
        let (phone, _) = staged.find_or_create_phone(number);
        self.commit(&mut guard, staged).await?;
        Ok(phone)
    }

    async fn set_blacklisted(&self, number: &PhoneNumber, blacklisted: bool) -> Result<Phone, Error> {
        let mut guard = self.records.write().await;
        let mut staged = guard.clone();
        let phone = staged.set_blacklisted(number, blacklisted)?;
        self.commit(&mut guard, staged).await?;
        Ok(phone)
    }
}

#[async_trait]
impl MessageStore for FileStore {
    async fn insert_message(&self, message: Message) -> Result<(), Error> {
        let mut guard = self.records.write().await;
        let mut staged = guard.clone();
        staged.insert_message(message)?;
        self.commit(&mut guard, staged).await
    }

    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>, Error> {
        let guard = self.records.read().await;
        Ok(guard.get_message(id).cloned())
    }

    async fn apply_transition(&self, id: &MessageId, transition: &Transition) -> Result<Message, Error> {
        let mut guard = self.records.write().await;
        let mut staged = guard.clone();
        let message = staged.apply_transition(id, transition)?;
        self.commit(&mut guard, staged).await?;
        Ok(message)
    }

    async fn list_messages(&self, phone_number: Option<&PhoneNumber>) -> Result<Vec<Message>, Error> {
        let guard = self.records.read().await;
        Ok(guard.list_messages(phone_number))
    }

    /// Rewrite the store file from the live records
    ///
    /// Every change is already on disk once its call returns, so this only
    /// restores a file removed while the daemon was running. An empty store
    /// writes nothing.
    async fn flush(&self) -> Result<(), Error> {
        let guard = self.records.read().await;
        if guard.phone_count() == 0 && guard.message_count() == 0 {
            return Ok(());
        }
        self.persist(&guard).await
    }
}
