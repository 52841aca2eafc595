use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;

use crate::{FileMailboxStore, MemoryMailboxStore, r#trait::MailboxStore};

/// Configuration for the mailbox store
///
/// # Examples
///
/// File-backed store in RON config:
/// ```ron
/// Twmailer (
///     spool: File(
///         path: "/var/spool/twmailer",
///     ),
/// )
/// ```
///
/// Memory-backed store with capacity limit:
/// ```ron
/// Twmailer (
///     spool: Memory(
///         capacity: Some(1000),
///     ),
/// )
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum SpoolConfig {
    /// One directory per mailbox below a spool root
    File { path: PathBuf },
    /// Transient storage for testing and development
    Memory {
        /// Maximum number of messages to store (omit for unlimited)
        #[serde(default)]
        capacity: Option<usize>,
    },
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self::File {
            path: FileMailboxStore::default().path().to_path_buf(),
        }
    }
}

impl SpoolConfig {
    /// The spool root for file-backed stores
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path } => Some(path),
            Self::Memory { .. } => None,
        }
    }

    /// Build and prepare the configured store, handing it out as a trait object
    ///
    /// # Errors
    /// If a file-backed spool path fails validation, or its root cannot be
    /// created or is not a directory
    pub fn into_store(self) -> crate::Result<Arc<dyn MailboxStore>> {
        match self {
            Self::File { path } => {
                let store = FileMailboxStore::builder().path(path).build()?;
                store.init()?;
                Ok(Arc::new(store))
            }
            Self::Memory { capacity } => Ok(capacity.map_or_else(
                || Arc::new(MemoryMailboxStore::new()) as Arc<dyn MailboxStore>,
                |capacity| Arc::new(MemoryMailboxStore::with_capacity(capacity)),
            )),
        }
    }
}
