//! # Instapaper Rust Client
//!
//! A small async client for the Instapaper Simple API that keeps working offline.
//!
//! ## Features
//!
//! - **Simple API**: authorize once, then `client.send(url, title, selection)`
//! - **Secure**: the account lives in the platform keychain, not in plain files
//! - **Offline queue**: failed submissions are persisted and flushed when Instapaper is reachable again
//! - **Testable**: transport, credential store, queue store and reachability probe are traits
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use instapaper_rs::{Config, InstapaperClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = InstapaperClient::from_config(Config::from_env()?)?;
//!     client.set_queue_urls(true);
//!
//!     // Flush anything queued by a previous run
//!     client.send_queued_urls().await?;
//!
//!     if !client.has_stored_account().await {
//!         client.authorize("reader@example.com", Some("password")).await?;
//!     }
//!     match client.send("https://example.com/article", Some("An article"), None).await {
//!         Ok(()) => println!("Saved"),
//!         Err(e) if e.is_soft() => println!("Queued until Instapaper is reachable"),
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod queue;
pub mod reachability;
pub mod traits;
pub mod utils;

// Re-export main types for convenience
pub use client::{DrainReport, InstapaperClient, InstapaperClientBuilder};
pub use config::Config;
pub use credentials::{Account, KeyringCredentialStore, MemoryCredentialStore};
pub use error::{ErrorCode, InstapaperError, Result, TransportError};
pub use http::InstapaperHttpClient;
pub use queue::{FileQueueStore, MemoryQueueStore, PendingQueue, PendingSubmission};
pub use reachability::{ReachabilityMonitor, ReachabilityStatus, StaticProbe, TcpProbe};
pub use traits::{CredentialStore, QueueStore, ReachabilityProbe, Transport};
