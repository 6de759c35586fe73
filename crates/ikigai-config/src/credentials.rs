// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! API-key loading.
//!
//! Resolution order per provider:
//! 1. explicit `api_key` in the model config
//! 2. the provider's canonical environment variable
//! 3. `~/.config/ikigai/credentials.json` (`{"openai": "sk-...", ...}`)

use std::collections::HashMap;
use std::path::Path;

use crate::ModelConfig;

/// Parsed contents of `credentials.json`: provider name → API key.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    keys: HashMap<String, String>,
}

impl Credentials {
    /// Load the credentials file.  A missing file yields empty credentials;
    /// a malformed file is an error so typos are not silently ignored.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let raw: HashMap<String, String> = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("malformed credentials file {}: {e}", path.display()))?;
        Ok(Self { keys: raw })
    }

    pub fn get(&self, provider: &str) -> Option<&str> {
        self.keys.get(provider).map(String::as_str)
    }

    #[cfg(test)]
    pub fn with_key(provider: &str, key: &str) -> Self {
        let mut keys = HashMap::new();
        keys.insert(provider.to_string(), key.to_string());
        Self { keys }
    }
}

/// Canonical environment variable for a provider's API key.
pub fn api_key_env_var(provider: &str) -> &'static str {
    match provider {
        "openai" => "OPENAI_API_KEY",
        "anthropic" => "ANTHROPIC_API_KEY",
        "google" => "GOOGLE_API_KEY",
        _ => "API_KEY",
    }
}

/// Resolve the API key for `cfg` using the order documented at module level.
pub fn resolve_api_key(cfg: &ModelConfig, credentials: &Credentials) -> Option<String> {
    if let Some(k) = &cfg.api_key {
        return Some(k.clone());
    }
    if let Ok(k) = std::env::var(api_key_env_var(&cfg.provider)) {
        if !k.is_empty() {
            return Some(k);
        }
    }
    credentials.get(&cfg.provider).map(str::to_string)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_names_match_providers() {
        assert_eq!(api_key_env_var("openai"), "OPENAI_API_KEY");
        assert_eq!(api_key_env_var("anthropic"), "ANTHROPIC_API_KEY");
        assert_eq!(api_key_env_var("google"), "GOOGLE_API_KEY");
        assert_eq!(api_key_env_var("whatever"), "API_KEY");
    }

    #[test]
    fn explicit_key_wins() {
        let cfg = ModelConfig {
            api_key: Some("explicit".into()),
            ..ModelConfig::default()
        };
        let creds = Credentials::with_key("openai", "from-file");
        assert_eq!(resolve_api_key(&cfg, &creds).as_deref(), Some("explicit"));
    }

    #[test]
    fn credentials_file_is_fallback() {
        let cfg = ModelConfig {
            provider: "nosuchprovider".into(),
            ..ModelConfig::default()
        };
        let creds = Credentials::with_key("nosuchprovider", "from-file");
        assert_eq!(resolve_api_key(&cfg, &creds).as_deref(), Some("from-file"));
    }

    #[test]
    fn missing_file_loads_empty() {
        let creds = Credentials::load(Path::new("/tmp/ikigai_no_such_credentials.json")).unwrap();
        assert!(creds.get("openai").is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "not json").unwrap();
        assert!(Credentials::load(f.path()).is_err());
    }

    #[test]
    fn valid_file_round_trips() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"anthropic": "sk-ant-test"}}"#).unwrap();
        let creds = Credentials::load(f.path()).unwrap();
        assert_eq!(creds.get("anthropic"), Some("sk-ant-test"));
    }
}
