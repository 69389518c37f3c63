use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dotenvy::dotenv;

/// One store's credentials as found in the environment.
///
/// Either half of the pair may be missing at scan time; the resolver rejects
/// incomplete pairs when the store is actually selected.
#[derive(Debug, Clone)]
pub struct ConfiguredStore {
    pub name: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Application configuration loaded from environment variables.
///
/// Read once at startup and immutable thereafter.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Base URL of the Effi application, without trailing slash.
    pub effi_base_url: String,
    pub token_secret: String,
    pub jwt_issuer: String,
    /// Working directory for downloaded artifacts and cache snapshots.
    pub work_dir: PathBuf,
    pub webdriver_url: String,
    pub headless: bool,
    /// When true (the default), the export-confirmation modal must appear;
    /// a missing modal fails the run. Set to false for variant UIs that
    /// export directly from the first click.
    pub export_modal_required: bool,
    /// Stores scanned from `EFFI_USER[_<STORE>]` / `EFFI_PASS[_<STORE>]`.
    pub stores: Vec<ConfiguredStore>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            effi_base_url: env::var("EFFI_BASE_URL")
                .unwrap_or_else(|_| "https://effi.com.co".to_string())
                .trim_end_matches('/')
                .to_string(),
            token_secret: env::var("TOKEN_SECRET").context("TOKEN_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "effi-export".to_string()),
            work_dir: PathBuf::from(env::var("WORK_DIR").unwrap_or_else(|_| "temp".to_string())),
            webdriver_url: env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| "http://localhost:9515".to_string()),
            headless: env_flag("EFFI_HEADLESS", true),
            export_modal_required: env_flag("EFFI_EXPORT_MODAL_REQUIRED", true),
            stores: scan_store_credentials(env::vars()),
        })
    }

    /// Directory holding per-store cache snapshots.
    pub fn cache_dir(&self) -> PathBuf {
        self.work_dir.join("cache")
    }

    /// Directory the browser downloads into before artifacts are saved.
    pub fn download_dir(&self) -> PathBuf {
        self.work_dir.join("downloads")
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => !matches!(value.trim(), "0" | "false" | "no" | "off"),
        Err(_) => default,
    }
}

/// Store name used when credentials are configured without a store suffix.
pub const DEFAULT_STORE: &str = "default";

/// Scan environment pairs for store credentials.
///
/// `EFFI_USER` / `EFFI_PASS` configure the reserved `default` store;
/// `EFFI_USER_<STORE>` / `EFFI_PASS_<STORE>` configure named stores. Store
/// names keep the casing they were configured with.
pub fn scan_store_credentials(
    vars: impl Iterator<Item = (String, String)>,
) -> Vec<ConfiguredStore> {
    let mut stores: BTreeMap<String, ConfiguredStore> = BTreeMap::new();

    for (key, value) in vars {
        let (name, is_user) = if key == "EFFI_USER" {
            (DEFAULT_STORE.to_string(), true)
        } else if key == "EFFI_PASS" {
            (DEFAULT_STORE.to_string(), false)
        } else if let Some(name) = key.strip_prefix("EFFI_USER_") {
            (name.to_string(), true)
        } else if let Some(name) = key.strip_prefix("EFFI_PASS_") {
            (name.to_string(), false)
        } else {
            continue;
        };

        let entry = stores
            .entry(name.to_lowercase())
            .or_insert_with(|| ConfiguredStore {
                name,
                username: None,
                password: None,
            });
        if is_user {
            entry.username = Some(value);
        } else {
            entry.password = Some(value);
        }
    }

    stores.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Iterator<Item = (String, String)> + 'a {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
    }

    #[test]
    fn bare_pair_configures_default_store() {
        let stores = scan_store_credentials(vars(&[
            ("EFFI_USER", "ops@example.com"),
            ("EFFI_PASS", "secret"),
        ]));

        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].name, DEFAULT_STORE);
        assert_eq!(stores[0].username.as_deref(), Some("ops@example.com"));
        assert_eq!(stores[0].password.as_deref(), Some("secret"));
    }

    #[test]
    fn suffixed_pairs_configure_named_stores() {
        let stores = scan_store_credentials(vars(&[
            ("EFFI_USER_ZILONIX", "zilonix@example.com"),
            ("EFFI_PASS_ZILONIX", "z-secret"),
            ("EFFI_USER_NORTE", "norte@example.com"),
            ("EFFI_PASS_NORTE", "n-secret"),
            ("PATH", "/usr/bin"),
        ]));

        assert_eq!(stores.len(), 2);
        let names: Vec<&str> = stores.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"ZILONIX"));
        assert!(names.contains(&"NORTE"));
    }

    #[test]
    fn half_configured_pair_is_kept_incomplete() {
        let stores = scan_store_credentials(vars(&[("EFFI_USER_SUR", "sur@example.com")]));

        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].username.as_deref(), Some("sur@example.com"));
        assert!(stores[0].password.is_none());
    }
}
