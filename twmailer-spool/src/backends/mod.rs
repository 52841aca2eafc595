//! Mailbox store implementations
//!
//! - `file`: one directory per mailbox, one text file per message
//! - `memory`: transient storage for tests and development

pub mod file;
pub mod memory;

pub use file::{FileMailboxStore, FileMailboxStoreBuilder};
pub use memory::MemoryMailboxStore;
