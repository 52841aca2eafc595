//! Protocol client, used by the interactive `twmailer-client` and by tests.
//!
//! # Examples
//!
//! ```no_run
//! use twmailer_common::{Identity, config::ClientTimeouts};
//! use twmailer_proto::client::Client;
//! use twmailer_spool::Subject;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = Client::connect("localhost:6543", ClientTimeouts::default()).await?;
//!
//! if client.login(&Identity::parse("alice")?, "secret").await? {
//!     client
//!         .send(
//!             &Identity::parse("bob")?,
//!             &Subject::parse("hi")?,
//!             &["hello".to_string()],
//!         )
//!         .await?;
//! }
//!
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```

mod client;

pub use client::Client;
