pub mod backends;
pub mod config;
pub mod error;
pub mod message;
pub mod r#trait;
pub mod types;

pub use backends::{FileMailboxStore, FileMailboxStoreBuilder, MemoryMailboxStore};
pub use config::SpoolConfig;
pub use error::{Result, SerializationError, StoreError, ValidationError};
pub use message::{Message, Subject};
pub use r#trait::MailboxStore;
pub use types::MessageNumber;
