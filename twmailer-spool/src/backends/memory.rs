use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use twmailer_common::Identity;

use crate::{Message, MessageNumber, StoreError, Subject, r#trait::MailboxStore};

#[derive(Debug)]
struct Mailbox {
    next: MessageNumber,
    messages: BTreeMap<MessageNumber, Message>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self {
            next: MessageNumber::FIRST,
            messages: BTreeMap::new(),
        }
    }
}

/// In-memory mailbox store
///
/// Mailboxes live in a `HashMap` behind an `RwLock`; nothing survives the
/// process. Intended for tests and development.
///
/// # Capacity Management
/// An optional capacity bounds the number of messages held across all
/// mailboxes. Appends beyond it fail with [`StoreError::Internal`].
#[derive(Debug, Clone, Default)]
pub struct MemoryMailboxStore {
    mailboxes: Arc<RwLock<HashMap<Identity, Mailbox>>>,
    /// Maximum number of messages to store (None = unlimited)
    capacity: Option<usize>,
}

impl MemoryMailboxStore {
    /// Create a new empty store with unlimited capacity
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new store holding at most `capacity` messages
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.mailboxes
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .map(|mailbox| mailbox.messages.len())
            .sum()
    }
}

#[async_trait]
impl MailboxStore for MemoryMailboxStore {
    async fn append(&self, message: &Message) -> crate::Result<MessageNumber> {
        let mut mailboxes = self.mailboxes.write()?;

        if let Some(cap) = self.capacity {
            let len: usize = mailboxes.values().map(|m| m.messages.len()).sum();
            if len >= cap {
                return Err(StoreError::Internal(format!(
                    "Memory store capacity exceeded: {len}/{cap} messages"
                )));
            }
        }

        let mailbox = mailboxes.entry(message.receiver.clone()).or_default();
        let number = mailbox.next;
        mailbox.next = number
            .next()
            .ok_or_else(|| StoreError::Internal("Message number space exhausted".to_string()))?;
        mailbox.messages.insert(number, message.clone());

        Ok(number)
    }

    async fn count(&self, mailbox: &Identity) -> crate::Result<usize> {
        Ok(self
            .mailboxes
            .read()?
            .get(mailbox)
            .map_or(0, |m| m.messages.len()))
    }

    async fn list(&self, mailbox: &Identity) -> crate::Result<Vec<MessageNumber>> {
        Ok(self
            .mailboxes
            .read()?
            .get(mailbox)
            .map(|m| m.messages.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn list_subjects(&self, mailbox: &Identity) -> crate::Result<Vec<Subject>> {
        Ok(self
            .mailboxes
            .read()?
            .get(mailbox)
            .map(|m| m.messages.values().map(|msg| msg.subject.clone()).collect())
            .unwrap_or_default())
    }

    async fn fetch(&self, mailbox: &Identity, number: MessageNumber) -> crate::Result<Message> {
        self.mailboxes
            .read()?
            .get(mailbox)
            .and_then(|m| m.messages.get(&number))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                mailbox: mailbox.clone(),
                number,
            })
    }

    async fn delete(&self, mailbox: &Identity, number: MessageNumber) -> crate::Result<()> {
        self.mailboxes
            .write()?
            .get_mut(mailbox)
            .and_then(|m| m.messages.remove(&number))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                mailbox: mailbox.clone(),
                number,
            })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn message(receiver: &str, subject: &str) -> Message {
        Message::new(
            Identity::parse("alice").unwrap(),
            Identity::parse(receiver).unwrap(),
            Subject::parse(subject).unwrap(),
            vec!["body".to_string()],
        )
    }

    #[tokio::test]
    async fn test_memory_store_numbering() {
        let store = MemoryMailboxStore::new();
        let bob = Identity::parse("bob").unwrap();

        let first = store.append(&message("bob", "one")).await.unwrap();
        let second = store.append(&message("bob", "two")).await.unwrap();
        assert_eq!((first.get(), second.get()), (1, 2));

        store.delete(&bob, second).await.unwrap();
        let third = store.append(&message("bob", "three")).await.unwrap();
        assert_eq!(third.get(), 3);

        let subjects: Vec<String> = store
            .list_subjects(&bob)
            .await
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(subjects, vec!["one", "three"]);
    }

    #[tokio::test]
    async fn test_memory_store_absent_mailbox() {
        let store = MemoryMailboxStore::new();
        let nobody = Identity::parse("nobody").unwrap();

        assert_eq!(store.count(&nobody).await.unwrap(), 0);
        assert!(store.list(&nobody).await.unwrap().is_empty());
        assert!(
            store
                .fetch(&nobody, MessageNumber::FIRST)
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(
            store
                .delete(&nobody, MessageNumber::FIRST)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_memory_store_capacity() {
        let store = MemoryMailboxStore::with_capacity(2);

        store.append(&message("bob", "one")).await.unwrap();
        store.append(&message("carol", "two")).await.unwrap();

        let result = store.append(&message("bob", "three")).await;
        assert!(matches!(result, Err(StoreError::Internal(_))));
        assert_eq!(store.len(), 2);
    }
}
