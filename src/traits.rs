//! Trait abstractions for the Instapaper client.
//!
//! This module defines the seams between the client core and its external collaborators:
//! - The remote service transport
//! - The secure credential store
//! - The durable key-value store behind the pending queue
//! - The network reachability probe
//!
//! Production implementations live next to each concern; tests substitute their own.

use crate::credentials::Account;
use crate::error::{Result, TransportError};
use crate::queue::PendingSubmission;
use crate::reachability::ReachabilityStatus;
use async_trait::async_trait;

/// Trait for talking to the remote bookmarking service.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Verifies the account's credentials.
    async fn authenticate(&self, account: &Account) -> std::result::Result<(), TransportError>;

    /// Saves a URL to the account.
    async fn add_url(
        &self,
        account: &Account,
        submission: &PendingSubmission,
    ) -> std::result::Result<(), TransportError>;
}

/// Trait for the single-slot secure credential store.
///
/// Implementations fail with [`crate::InstapaperError::Keychain`] when the underlying
/// store misbehaves.
pub trait CredentialStore: Send + Sync {
    /// Stores the account, replacing any previous one atomically.
    fn save(&self, account: &Account) -> Result<()>;

    /// Loads the stored account, or fails with [`crate::InstapaperError::NoStoredAccount`].
    fn load(&self) -> Result<Account>;

    /// Deletes the stored account. Succeeds when nothing is stored.
    fn delete(&self) -> Result<()>;
}

/// Trait for the durable store holding the pending queue as a whole list.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Loads the full ordered list, oldest first. An absent list is empty.
    async fn load(&self) -> Result<Vec<PendingSubmission>>;

    /// Replaces the persisted list. Must be durable when this returns.
    async fn store(&self, entries: &[PendingSubmission]) -> Result<()>;
}

/// Trait for checking whether the remote service can currently be reached.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self) -> ReachabilityStatus;
}
