use async_trait::async_trait;
use twmailer_common::Identity;

use crate::{Message, MessageNumber, Subject};

/// Persistent storage of per-user mailboxes
///
/// A mailbox that has never received mail behaves exactly like an empty
/// one: it counts zero messages and lists nothing. Numbers handed out by
/// [`MailboxStore::append`] are strictly increasing per mailbox and are
/// never handed out again, even after the message is deleted.
///
/// Implementations must serialise operations on the same mailbox so that
/// concurrent appends and deletes cannot collide on a number or expose a
/// partially written message.
#[async_trait]
pub trait MailboxStore: Send + Sync + std::fmt::Debug {
    /// Store `message` in the mailbox of `message.receiver`
    ///
    /// # Errors
    /// If the mailbox cannot be created or the message cannot be written
    async fn append(&self, message: &Message) -> crate::Result<MessageNumber>;

    /// Number of messages currently held by `mailbox`
    ///
    /// # Errors
    /// If the mailbox exists but cannot be read
    async fn count(&self, mailbox: &Identity) -> crate::Result<usize>;

    /// Numbers of every message held by `mailbox`, ascending
    ///
    /// # Errors
    /// If the mailbox exists but cannot be read
    async fn list(&self, mailbox: &Identity) -> crate::Result<Vec<MessageNumber>>;

    /// Subjects of every message held by `mailbox`, in the order of [`MailboxStore::list`]
    ///
    /// # Errors
    /// If the mailbox or one of its messages cannot be read
    async fn list_subjects(&self, mailbox: &Identity) -> crate::Result<Vec<Subject>>;

    /// Read one message
    ///
    /// # Errors
    /// [`crate::StoreError::NotFound`] if no message has that number, or any
    /// storage failure
    async fn fetch(&self, mailbox: &Identity, number: MessageNumber) -> crate::Result<Message>;

    /// Permanently remove one message; the remaining messages keep their numbers
    ///
    /// # Errors
    /// [`crate::StoreError::NotFound`] if no message has that number, or any
    /// storage failure
    async fn delete(&self, mailbox: &Identity, number: MessageNumber) -> crate::Result<()>;
}
