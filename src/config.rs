//! Configuration management for devtool-assistant
//!
//! Stores settings in ~/.config/devtool-assistant/config.json. The API key is
//! never written there; it lives in the system keychain or `GROQ_API_KEY`.

use crate::analysis::mapreduce::{
    AnalysisSettings, DEFAULT_CHUNK_MAX_TOKENS, DEFAULT_SINGLE_PASS_THRESHOLD,
};
use crate::keyring;
use crate::llm::DEFAULT_MODEL;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Env var holding the Groq API key
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model used when `--model` is not given
    pub model: String,
    /// Inputs estimated at or above this many tokens are analysed map-reduce style
    pub single_pass_threshold: usize,
    /// Token budget per map-phase chunk
    pub chunk_max_tokens: usize,
    /// Deadline for a single chat completion request
    pub request_timeout_secs: u64,
    /// Directory whose `<name>.txt` files override the built-in prompts
    pub prompts_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            single_pass_threshold: DEFAULT_SINGLE_PASS_THRESHOLD,
            chunk_max_tokens: DEFAULT_CHUNK_MAX_TOKENS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            prompts_dir: None,
        }
    }
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("devtool-assistant"))
    }

    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load config from `path`. A corrupt file is moved aside and defaults are used.
    pub fn load_from(path: &Path) -> Self {
        if let Ok(content) = fs::read_to_string(path) {
            match serde_json::from_str::<Config>(&content) {
                Ok(config) => return config,
                Err(err) => {
                    preserve_corrupt_config(path, &content);
                    warn!(
                        "Config file was corrupted ({}). A backup was saved and defaults were loaded.",
                        err
                    );
                }
            }
        }
        Self::default()
    }

    /// Save config to disk
    pub fn save(&self) -> Result<(), String> {
        let path =
            Self::config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
                    warn!("Failed to set config directory permissions: {}", e);
                }
            }
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        #[cfg(unix)]
        {
            write_config_atomic(path, &content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;
        }

        Ok(())
    }

    /// Get the Groq API key (environment first, then keychain)
    pub fn get_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Some(key.trim().to_string());
            }
        }

        match keyring::get_api_key() {
            Ok(key) => key,
            Err(err) => {
                keyring::warn_keychain_error_once("API key", &err);
                None
            }
        }
    }

    /// Store the API key in the keychain and verify it reads back
    pub fn set_api_key(&self, key: &str) -> Result<(), String> {
        keyring::set_api_key(key).map_err(|e| {
            format!(
                "Failed to store API key in {}: {}. \
                 You can set the {} environment variable instead.",
                keyring::credentials_store_label(),
                e,
                API_KEY_ENV
            )
        })?;

        match keyring::get_api_key() {
            Ok(Some(stored_key)) if stored_key == key => self.save(),
            Ok(_) => Err(format!(
                "API key verification failed: key was not persisted to {}. \
                 You can set the {} environment variable instead.",
                keyring::credentials_store_label(),
                API_KEY_ENV
            )),
            Err(read_err) => Err(format!(
                "API key verification failed: couldn't read back from {} ({}). \
                 You can set the {} environment variable instead.",
                keyring::credentials_store_label(),
                read_err,
                API_KEY_ENV
            )),
        }
    }

    /// Validate API key format.
    pub fn validate_api_key_format(key: &str) -> bool {
        let key = key.trim();
        !key.is_empty() && key.starts_with("gsk_")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Analysis settings seeded from this config
    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            model: self.model.clone(),
            single_pass_threshold: self.single_pass_threshold,
            chunk_max_tokens: self.chunk_max_tokens,
        }
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/devtool-assistant/config.json".to_string())
    }
}

/// Interactive prompt to set up API key
pub fn setup_api_key_interactive() -> Result<String, String> {
    use std::io;

    println!();
    println!("  ┌─────────────────────────────────────────────────────────┐");
    println!("  │  DEVTOOL ASSISTANT SETUP                                │");
    println!("  └─────────────────────────────────────────────────────────┘");
    println!();
    println!("  devtool uses Groq to audit, review and describe your code.");
    println!();
    println!("  Steps:");
    println!("    1) Create a key at https://console.groq.com/keys");
    println!("    2) Paste the key below and press Enter");
    println!();
    println!("  Data use notice: the code or diff you analyse is sent to Groq.");
    println!(
        "  The key is stored in your {}.",
        keyring::credentials_store_label()
    );
    println!("  Prefer env vars? Set {} and rerun.", API_KEY_ENV);
    println!();
    print!("  API Key: ");
    io::stdout().flush().map_err(|e| e.to_string())?;

    let mut key = String::new();
    io::stdin().read_line(&mut key).map_err(|e| e.to_string())?;
    let key = key.trim().to_string();

    if key.is_empty() {
        return Err("No API key provided".to_string());
    }

    if !Config::validate_api_key_format(&key) {
        println!();
        println!("  Warning: Key doesn't look like a Groq key (usually starts with gsk_)");
        println!("     Saving anyway...");
    }

    let config = Config::load();
    config.set_api_key(&key)?;

    println!();
    println!("  + API key saved to {}", keyring::credentials_store_label());
    println!("  + Settings live in {}", Config::config_location());
    println!();

    Ok(key)
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(unix)]
fn write_config_atomic(path: &Path, content: &str) -> Result<(), String> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::PermissionsExt;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(|e| e.to_string())?;

    if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
        warn!("Failed to set temp config file permissions: {}", e);
    }

    file.write_all(content.as_bytes())
        .map_err(|e| e.to_string())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.to_string());
    }
    Ok(())
}
