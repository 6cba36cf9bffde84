//! Credential storage in the system keychain
//!
//! All credentials live in a single keychain entry as JSON, so the user is
//! prompted at most once per session.

use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use tracing::{info, warn};

const KEYRING_SERVICE: &str = "devtool-assistant";
const KEYRING_USERNAME: &str = "credentials";

/// Env var that turns the keychain off entirely.
pub const DISABLE_KEYRING_ENV: &str = "DEVTOOL_DISABLE_KEYRING";

/// All credentials stored in a single keychain entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    groq_api_key: Option<String>,
}

type KeyringResult<T> = Result<T, String>;

#[derive(Debug, Default)]
struct CredentialsCache {
    cached: Option<KeyringResult<StoredCredentials>>,
}

static CREDENTIALS_CACHE: OnceLock<Mutex<CredentialsCache>> = OnceLock::new();
static KEYRING_ERROR_WARNED: AtomicBool = AtomicBool::new(false);

fn credentials_cache() -> &'static Mutex<CredentialsCache> {
    CREDENTIALS_CACHE.get_or_init(|| Mutex::new(CredentialsCache::default()))
}

fn keyring_disabled() -> bool {
    if cfg!(test) {
        return true;
    }
    matches!(
        std::env::var(DISABLE_KEYRING_ENV)
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
        "1" | "true" | "yes"
    )
}

fn keyring_entry() -> Result<Entry, keyring::Error> {
    Entry::new(KEYRING_SERVICE, KEYRING_USERNAME)
}

/// Human-friendly credential backend label used in CLI messages.
pub fn credentials_store_label() -> &'static str {
    if keyring_disabled() {
        "environment only (keychain disabled)"
    } else {
        "system keychain"
    }
}

/// Warn about keychain errors only once per session
pub fn warn_keychain_error_once(context: &str, err: &str) {
    if KEYRING_ERROR_WARNED.swap(true, Ordering::Relaxed) {
        return;
    }
    warn!(
        "Couldn't access system keychain for {}: {}. Set GROQ_API_KEY to bypass the keychain.",
        context, err
    );
}

fn read_credentials_uncached() -> KeyringResult<StoredCredentials> {
    if keyring_disabled() {
        return Ok(StoredCredentials::default());
    }
    let entry = keyring_entry().map_err(|e| e.to_string())?;
    match entry.get_password() {
        Ok(json) => {
            serde_json::from_str(&json).map_err(|e| format!("Failed to parse credentials: {}", e))
        }
        Err(keyring::Error::NoEntry) => Ok(StoredCredentials::default()),
        Err(err) => Err(err.to_string()),
    }
}

fn write_credentials(creds: &StoredCredentials) -> KeyringResult<()> {
    if keyring_disabled() {
        return Err(format!(
            "the keychain is disabled ({} is set)",
            DISABLE_KEYRING_ENV
        ));
    }
    let json = serde_json::to_string(creds)
        .map_err(|e| format!("Failed to serialize credentials: {}", e))?;
    let entry = keyring_entry().map_err(|e| e.to_string())?;
    entry.set_password(&json).map_err(|e| e.to_string())?;
    info!("Credentials written to {}", credentials_store_label());
    Ok(())
}

fn read_credentials_cached() -> KeyringResult<StoredCredentials> {
    let cache = credentials_cache();
    let mut guard = match cache.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    if let Some(ref result) = guard.cached {
        return result.clone();
    }

    let result = read_credentials_uncached();
    guard.cached = Some(result.clone());
    result
}

fn update_cache(creds: StoredCredentials) {
    let cache = credentials_cache();
    let mut guard = match cache.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.cached = Some(Ok(creds));
}

/// Get the Groq API key from the keychain
pub fn get_api_key() -> KeyringResult<Option<String>> {
    let creds = read_credentials_cached()?;
    Ok(creds.groq_api_key)
}

/// Set the Groq API key in the keychain
pub fn set_api_key(key: &str) -> KeyringResult<()> {
    let mut creds = read_credentials_cached().unwrap_or_default();
    creds.groq_api_key = Some(key.to_string());
    write_credentials(&creds)?;
    update_cache(creds);
    Ok(())
}
