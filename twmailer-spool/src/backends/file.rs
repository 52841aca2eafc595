use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::{
    fs,
    sync::{Mutex, OwnedMutexGuard},
};
use twmailer_common::{Identity, internal};

use crate::{
    Message, MessageNumber, StoreError, Subject,
    error::{SerializationError, ValidationError},
    r#trait::MailboxStore,
};

const TEMP_PREFIX: &str = ".tmp_";
const DELETED_SUFFIX: &str = ".deleted";
const COUNTER_FILE: &str = ".next";
const COUNTER_TEMP_FILE: &str = ".tmp_next";

/// File-based mailbox store
///
/// Layout below the spool root:
///
/// ```text
/// <root>/<identity>/<n>.txt     one message, see [`Message::encode`]
/// <root>/<identity>/.next       next number to hand out
/// ```
///
/// # Atomicity
/// Messages are written to `.tmp_<n>.txt` and renamed into place, so a
/// reader sees a message completely or not at all. Deletes rename the file
/// to `<n>.txt.deleted` before removing it. Leftovers of either step are
/// ignored by listings and removed by [`FileMailboxStore::init`].
///
/// # Numbering
/// The next number is the larger of the `.next` counter and the highest
/// stored number plus one. Deleting a message first raises the counter
/// past it, so its number is not handed out again, across restarts too.
///
/// # Concurrency
/// Every operation on a mailbox holds that mailbox's async mutex. Clones of
/// a store share their locks.
#[derive(Debug, Clone)]
pub struct FileMailboxStore {
    path: PathBuf,
    locks: Arc<DashMap<Identity, Arc<Mutex<()>>>>,
}

impl Default for FileMailboxStore {
    fn default() -> Self {
        Self::new(PathBuf::from("/var/spool/twmailer"))
    }
}

impl FileMailboxStore {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            locks: Arc::default(),
        }
    }

    /// Validate a spool path
    ///
    /// # Security Checks
    /// - Rejects paths containing `..` (directory traversal)
    /// - Rejects relative paths
    /// - Rejects paths inside sensitive system directories
    ///
    /// # Errors
    /// Returns an error if the path is invalid or potentially dangerous
    pub fn validate_path(path: &Path) -> Result<(), ValidationError> {
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(ValidationError::InvalidConfiguration(format!(
                "Spool path cannot contain '..' components: {}",
                path.display()
            )));
        }

        if !path.is_absolute() {
            return Err(ValidationError::InvalidConfiguration(format!(
                "Spool path must be absolute: {}",
                path.display()
            )));
        }

        let sensitive_prefixes = [
            "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc", "/dev",
        ];

        if let Some(prefix) = sensitive_prefixes
            .iter()
            .find(|prefix| path.starts_with(prefix))
        {
            return Err(ValidationError::InvalidConfiguration(format!(
                "Spool path cannot be in system directory {prefix}: {}",
                path.display()
            )));
        }

        Ok(())
    }

    #[must_use]
    pub fn builder() -> FileMailboxStoreBuilder {
        FileMailboxStoreBuilder::default()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Prepare the spool root
    ///
    /// Creates the root if it doesn't exist and checks that it is a
    /// directory, then removes temporary and deleted files left behind in
    /// mailboxes by an interrupted write or delete.
    ///
    /// # Errors
    /// - If the spool root cannot be created or read
    /// - If the path exists but is not a directory
    pub fn init(&self) -> crate::Result<()> {
        internal!("Initialising mailbox store at {}", self.path.display());

        if !self.path.try_exists()? {
            internal!("{} does not exist, creating...", self.path.display());
            create_private_dir_all(&self.path)?;
        } else if !self.path.is_dir() {
            return Err(ValidationError::NotDirectory(self.path.display().to_string()).into());
        }

        let cleaned = self.cleanup_orphans()?;
        if cleaned > 0 {
            internal!(
                level = INFO,
                "Cleaned up {cleaned} orphaned temporary or deleted files from spool"
            );
        }

        Ok(())
    }

    fn cleanup_orphans(&self) -> crate::Result<usize> {
        let mut cleaned = 0;

        for mailbox in std::fs::read_dir(&self.path)? {
            let mailbox = mailbox?;
            if !mailbox.file_type()?.is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(mailbox.path())? {
                let entry = entry?;
                let filename = entry.file_name();
                let filename = filename.to_string_lossy();

                if filename.starts_with(TEMP_PREFIX) || filename.ends_with(DELETED_SUFFIX) {
                    std::fs::remove_file(entry.path())?;
                    cleaned += 1;
                }
            }
        }

        Ok(cleaned)
    }

    fn mailbox_path(&self, mailbox: &Identity) -> PathBuf {
        self.path.join(mailbox.as_str())
    }

    async fn lock(&self, mailbox: &Identity) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(mailbox.clone()).or_default().value());
        lock.lock_owned().await
    }

    /// Message numbers present in `dir`, ascending. A missing directory is an
    /// empty mailbox.
    async fn scan(dir: &Path) -> crate::Result<Vec<MessageNumber>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut numbers = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name();
            if let Some(number) = MessageNumber::from_filename(&filename.to_string_lossy()) {
                numbers.push(number);
            }
        }

        numbers.sort_unstable();
        Ok(numbers)
    }

    async fn read_counter(dir: &Path) -> crate::Result<Option<MessageNumber>> {
        match fs::read_to_string(dir.join(COUNTER_FILE)).await {
            Ok(content) => MessageNumber::parse(content.trim())
                .map(Some)
                .map_err(|_| SerializationError::CorruptCounter(content).into()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_counter(dir: &Path, next: MessageNumber) -> crate::Result<()> {
        let temp = dir.join(COUNTER_TEMP_FILE);
        fs::write(&temp, format!("{next}\n")).await?;
        fs::rename(&temp, dir.join(COUNTER_FILE)).await?;
        Ok(())
    }

    async fn next_number(dir: &Path) -> crate::Result<MessageNumber> {
        let after_highest = match Self::scan(dir).await?.last() {
            Some(highest) => highest.next().ok_or_else(exhausted)?,
            None => MessageNumber::FIRST,
        };

        Ok(Self::read_counter(dir)
            .await?
            .map_or(after_highest, |counter| counter.max(after_highest)))
    }
}

fn exhausted() -> StoreError {
    StoreError::Internal("Message number space exhausted".to_string())
}

fn not_found(mailbox: &Identity, number: MessageNumber) -> impl FnOnce(std::io::Error) -> StoreError {
    let mailbox = mailbox.clone();
    move |err| {
        if err.kind() == ErrorKind::NotFound {
            StoreError::NotFound { mailbox, number }
        } else {
            err.into()
        }
    }
}

#[cfg(unix)]
fn create_private_dir_all(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)
}

#[cfg(not(unix))]
fn create_private_dir_all(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}

async fn create_mailbox(path: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(path).await
}

#[async_trait]
impl MailboxStore for FileMailboxStore {
    #[tracing::instrument(level = "debug", skip_all, fields(mailbox = %message.receiver))]
    async fn append(&self, message: &Message) -> crate::Result<MessageNumber> {
        let _guard = self.lock(&message.receiver).await;
        let dir = self.mailbox_path(&message.receiver);

        create_mailbox(&dir).await?;

        let number = Self::next_number(&dir).await?;
        let filename = number.filename();
        let temp_path = dir.join(format!("{TEMP_PREFIX}{filename}"));
        let path = dir.join(&filename);

        let following = number.next().ok_or_else(exhausted)?;

        fs::write(&temp_path, message.encode()).await?;

        // The counter moves first: a failed append leaves no message behind,
        // at worst a skipped number.
        if let Err(err) = Self::write_counter(&dir, following).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err);
        }

        if let Err(err) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err.into());
        }

        internal!(level = DEBUG, "Stored message {number} at {}", path.display());

        Ok(number)
    }

    async fn count(&self, mailbox: &Identity) -> crate::Result<usize> {
        let _guard = self.lock(mailbox).await;
        Ok(Self::scan(&self.mailbox_path(mailbox)).await?.len())
    }

    #[tracing::instrument(level = "debug", skip(self), fields(mailbox = %mailbox))]
    async fn list(&self, mailbox: &Identity) -> crate::Result<Vec<MessageNumber>> {
        let _guard = self.lock(mailbox).await;
        Self::scan(&self.mailbox_path(mailbox)).await
    }

    #[tracing::instrument(level = "debug", skip(self), fields(mailbox = %mailbox))]
    async fn list_subjects(&self, mailbox: &Identity) -> crate::Result<Vec<Subject>> {
        let _guard = self.lock(mailbox).await;
        let dir = self.mailbox_path(mailbox);

        let mut subjects = Vec::new();
        for number in Self::scan(&dir).await? {
            let record = fs::read_to_string(dir.join(number.filename())).await?;
            subjects.push(Message::decode_subject(&record)?);
        }

        Ok(subjects)
    }

    #[tracing::instrument(level = "debug", skip(self), fields(mailbox = %mailbox, number = %number))]
    async fn fetch(&self, mailbox: &Identity, number: MessageNumber) -> crate::Result<Message> {
        let _guard = self.lock(mailbox).await;

        let record = fs::read_to_string(self.mailbox_path(mailbox).join(number.filename()))
            .await
            .map_err(not_found(mailbox, number))?;

        Ok(Message::decode(&record)?)
    }

    #[tracing::instrument(level = "debug", skip(self), fields(mailbox = %mailbox, number = %number))]
    async fn delete(&self, mailbox: &Identity, number: MessageNumber) -> crate::Result<()> {
        let _guard = self.lock(mailbox).await;
        let dir = self.mailbox_path(mailbox);
        let filename = number.filename();
        let path = dir.join(&filename);

        if !fs::try_exists(&path).await? {
            return Err(StoreError::NotFound {
                mailbox: mailbox.clone(),
                number,
            });
        }

        let following = number.next().ok_or_else(exhausted)?;
        if Self::read_counter(&dir)
            .await?
            .is_none_or(|counter| counter < following)
        {
            Self::write_counter(&dir, following).await?;
        }

        let deleted_path = dir.join(format!("{filename}{DELETED_SUFFIX}"));
        fs::rename(&path, &deleted_path)
            .await
            .map_err(not_found(mailbox, number))?;
        fs::remove_file(&deleted_path).await?;

        internal!(level = DEBUG, "Deleted message {number} from mailbox {mailbox}");

        Ok(())
    }
}

/// Builder for [`FileMailboxStore`]
#[derive(Debug, Default)]
pub struct FileMailboxStoreBuilder {
    path: Option<PathBuf>,
}

impl FileMailboxStoreBuilder {
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Build the store, validating its path
    ///
    /// # Errors
    /// If the path is relative, contains `..` or points into a system directory
    pub fn build(self) -> crate::Result<FileMailboxStore> {
        let store = self
            .path
            .map_or_else(FileMailboxStore::default, FileMailboxStore::new);

        FileMailboxStore::validate_path(&store.path)?;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_validation() {
        assert!(FileMailboxStore::validate_path(Path::new("/var/spool/twmailer")).is_ok());
        assert!(FileMailboxStore::validate_path(Path::new("/tmp/mail")).is_ok());

        assert!(FileMailboxStore::validate_path(Path::new("relative/mail")).is_err());
        assert!(FileMailboxStore::validate_path(Path::new("/var/spool/../../etc")).is_err());
        assert!(FileMailboxStore::validate_path(Path::new("/etc/twmailer")).is_err());
        assert!(FileMailboxStore::validate_path(Path::new("/proc/self")).is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let store = FileMailboxStore::builder().build().unwrap();
        assert_eq!(store.path(), Path::new("/var/spool/twmailer"));

        assert!(FileMailboxStore::builder().path("mail").build().is_err());
    }

    #[test]
    fn test_init_rejects_plain_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let store = FileMailboxStore::builder()
            .path(temp.path())
            .build()
            .unwrap();

        assert!(matches!(
            store.init(),
            Err(StoreError::Validation(ValidationError::NotDirectory(_)))
        ));
    }
}
