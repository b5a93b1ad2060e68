//! Credential storage for the single Instapaper account.
//!
//! The account lives in the platform keychain as one JSON secret under a fixed
//! service identifier, so a save replaces username and password together.

use crate::error::{InstapaperError, Result};
use crate::traits::CredentialStore;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Keychain account name under which the credential pair is stored.
const KEYCHAIN_ACCOUNT: &str = "default";

/// The stored username/password pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    /// Instapaper accounts may have no password; empty means none.
    #[serde(default)]
    pub password: String,
}

impl Account {
    /// Creates an account. A `None` password is stored as empty.
    pub fn new(username: impl Into<String>, password: Option<&str>) -> Self {
        Self {
            username: username.into(),
            password: password.unwrap_or_default().to_string(),
        }
    }

    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credential store backed by the platform keychain through `keyring`.
///
/// Every operation opens the keychain item afresh, so separate instances (and separate
/// processes) with the same service identifier see the same account. Without the
/// `native-keychain` feature `keyring` falls back to its in-process mock store and the
/// account does not survive a restart.
pub struct KeyringCredentialStore {
    service_name: String,
}

impl KeyringCredentialStore {
    /// Creates a store for the given keychain service identifier.
    pub fn new(service_name: impl Into<String>) -> Result<Self> {
        let store = Self {
            service_name: service_name.into(),
        };
        store.entry()?;
        if !cfg!(feature = "native-keychain") {
            warn!(
                service = %store.service_name,
                "Built without native-keychain, the stored account will not persist"
            );
        }
        Ok(store)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service_name, KEYCHAIN_ACCOUNT).map_err(|e| {
            InstapaperError::keychain_error(format!(
                "Failed to open keychain entry for {}: {e}",
                self.service_name
            ))
        })
    }
}

impl std::fmt::Debug for KeyringCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringCredentialStore")
            .field("service_name", &self.service_name)
            .finish()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save(&self, account: &Account) -> Result<()> {
        debug!(service = %self.service_name, username = %account.username, "Storing account in keychain");

        let secret = serde_json::to_string(account).map_err(|e| {
            InstapaperError::keychain_error(format!("Failed to encode account: {e}"))
        })?;
        self.entry()?.set_password(&secret).map_err(|e| {
            InstapaperError::keychain_error(format!("Failed to store account: {e}"))
        })?;

        Ok(())
    }

    fn load(&self) -> Result<Account> {
        let secret = self.entry()?.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => InstapaperError::NoStoredAccount,
            e => InstapaperError::keychain_error(format!("Failed to read account: {e}")),
        })?;

        serde_json::from_str(&secret).map_err(|e| {
            InstapaperError::keychain_error(format!("Stored account is corrupt: {e}"))
        })
    }

    fn delete(&self) -> Result<()> {
        debug!(service = %self.service_name, "Deleting account from keychain");

        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(InstapaperError::keychain_error(format!(
                "Failed to delete account: {e}"
            ))),
        }
    }
}

/// In-process credential store.
///
/// Useful for tests and for hosts without a keychain. `set_failing(true)` makes every
/// operation report a keychain error.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Account>>,
    failing: Mutex<bool>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds an account.
    pub fn with_account(account: Account) -> Self {
        Self {
            slot: Mutex::new(Some(account)),
            failing: Mutex::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut flag) = self.failing.lock() {
            *flag = failing;
        }
    }

    fn check(&self) -> Result<()> {
        match self.failing.lock() {
            Ok(flag) if !*flag => Ok(()),
            Ok(_) => Err(InstapaperError::keychain_error("credential store unavailable")),
            Err(_) => Err(InstapaperError::keychain_error("credential store poisoned")),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<Account>>> {
        self.slot
            .lock()
            .map_err(|_| InstapaperError::keychain_error("credential store poisoned"))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, account: &Account) -> Result<()> {
        self.check()?;
        *self.slot()? = Some(account.clone());
        Ok(())
    }

    fn load(&self) -> Result<Account> {
        self.check()?;
        self.slot()?.clone().ok_or(InstapaperError::NoStoredAccount)
    }

    fn delete(&self) -> Result<()> {
        self.check()?;
        self.slot()?.take();
        Ok(())
    }
}
