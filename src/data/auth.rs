//! Credentials and the authenticated session for the dataset host.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://www.kaggle.com/api/v1";

/// API credentials (`username` + API `key`), as found in `kaggle.json`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, key: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            key: key.into(),
        }
    }

    /// Look up credentials from the process environment.
    ///
    /// Order: `KAGGLE_USERNAME` + `KAGGLE_KEY`, then `kaggle.json` in
    /// `KAGGLE_CONFIG_DIR`, then `~/.kaggle/kaggle.json`.
    pub fn discover() -> Result<Self> {
        Self::discover_with(|name| std::env::var(name).ok())
    }

    /// Same as [`Credentials::discover`] with an explicit variable lookup.
    pub fn discover_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        if let (Some(username), Some(key)) =
            (non_empty("KAGGLE_USERNAME"), non_empty("KAGGLE_KEY"))
        {
            log::debug!("Using credentials from KAGGLE_USERNAME / KAGGLE_KEY");
            return Ok(Credentials { username, key });
        }

        let config_dir = non_empty("KAGGLE_CONFIG_DIR")
            .map(PathBuf::from)
            .or_else(|| {
                non_empty("HOME")
                    .or_else(|| non_empty("USERPROFILE"))
                    .map(|home| PathBuf::from(home).join(".kaggle"))
            });

        if let Some(dir) = config_dir {
            let file = dir.join("kaggle.json");
            if file.is_file() {
                log::debug!("Using credentials from {}", file.display());
                return Self::from_file(&file);
            }
        }

        Err(Error::Auth(
            "no credentials found: set KAGGLE_USERNAME and KAGGLE_KEY \
             or provide kaggle.json"
                .into(),
        ))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Auth(format!("Failed to read {}: {e}", path.display())))?;
        let creds: Credentials = serde_json::from_str(&text)
            .map_err(|e| Error::Auth(format!("Failed to parse {}: {e}", path.display())))?;
        if creds.username.trim().is_empty() || creds.key.trim().is_empty() {
            return Err(Error::Auth(format!("{} has an empty username or key", path.display())));
        }
        Ok(creds)
    }
}

/// Authenticated session against the dataset host API.
///
/// Created once per invocation and passed to the pipeline explicitly.
pub struct KaggleClient {
    pub(crate) http: reqwest::blocking::Client,
    pub(crate) credentials: Credentials,
    pub(crate) api_base: String,
}

impl KaggleClient {
    pub fn authenticate(credentials: Credentials) -> Result<Self> {
        Self::with_api_base(credentials, DEFAULT_API_BASE)
    }

    /// Point the client at another API root (mirrors, test servers).
    pub fn with_api_base(credentials: Credentials, api_base: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("busca-doggo/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<std::time::Duration>)
            .build()?;
        log::info!("Authenticated on dataset host as '{}'", credentials.username);
        Ok(KaggleClient {
            http,
            credentials,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}
