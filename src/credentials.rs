//! Backend access token storage in the OS keyring.

use keyring::Entry;
use tracing::{info, warn};

use crate::error::{AutoGuardError, Result};

pub const KEYRING_SERVICE: &str = "autoguard-api";
const KEYRING_USER: &str = "autoguard";

fn entry() -> Result<Entry> {
    Entry::new(KEYRING_SERVICE, KEYRING_USER).map_err(|e| {
        warn!("Failed to create keyring entry for {}: {}", KEYRING_SERVICE, e);
        AutoGuardError::Storage(e.to_string())
    })
}

pub fn store_token(token: &str) -> Result<()> {
    info!("Storing access token");
    entry()?.set_password(token).map_err(|e| {
        warn!("Failed to store access token: {}", e);
        AutoGuardError::Storage(e.to_string())
    })
}

/// The stored token, or None when the user never logged in.
pub fn load_token() -> Result<Option<String>> {
    match entry()?.get_password() {
        Ok(token) => Ok(Some(token)),
        Err(keyring::Error::NoEntry) => {
            info!("No access token stored");
            Ok(None)
        }
        Err(e) => {
            warn!("Failed to read access token: {}", e);
            Err(AutoGuardError::Storage(e.to_string()))
        }
    }
}

/// Remove the stored token. Succeeds when none was stored.
pub fn delete_token() -> Result<()> {
    info!("Deleting access token");
    match entry()?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => {
            warn!("Failed to delete access token: {}", e);
            Err(AutoGuardError::Storage(e.to_string()))
        }
    }
}
