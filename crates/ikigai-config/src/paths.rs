// Copyright (c) 2024-2026 Ikigai Contributors
//
// SPDX-License-Identifier: MIT
//! Install-path resolution.
//!
//! Each directory can be pinned with an `IKIGAI_*_DIR` environment variable;
//! otherwise a `HOME`-derived default is used.  A leading `~/` in an override
//! is expanded against the home directory.

use std::path::PathBuf;

/// Resolved installation directories.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Executable directory (`IKIGAI_BIN_DIR`, default `~/.local/bin`).
    pub bin_dir: PathBuf,
    /// Configuration directory (`IKIGAI_CONFIG_DIR`, default `~/.config/ikigai`).
    pub config_dir: PathBuf,
    /// Data directory (`IKIGAI_DATA_DIR`, default `~/.local/share/ikigai`).
    pub data_dir: PathBuf,
    /// Helper-binary directory (`IKIGAI_LIBEXEC_DIR`, default `~/.local/libexec/ikigai`).
    pub libexec_dir: PathBuf,
}

impl Paths {
    /// Resolve all directories from the environment.
    ///
    /// Fails only when no home directory can be determined and an override
    /// requires tilde expansion.
    pub fn resolve() -> anyhow::Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("cannot determine home directory (HOME not set)"))?;

        let dir = |env: &str, default: PathBuf| -> PathBuf {
            match std::env::var(env) {
                Ok(v) if !v.is_empty() => expand_tilde(&v, &home),
                _ => default,
            }
        };

        Ok(Self {
            bin_dir: dir("IKIGAI_BIN_DIR", home.join(".local/bin")),
            config_dir: dir("IKIGAI_CONFIG_DIR", home.join(".config/ikigai")),
            data_dir: dir("IKIGAI_DATA_DIR", home.join(".local/share/ikigai")),
            libexec_dir: dir("IKIGAI_LIBEXEC_DIR", home.join(".local/libexec/ikigai")),
        })
    }

    /// Path of the credentials file inside the config directory.
    pub fn credentials_file(&self) -> PathBuf {
        self.config_dir.join("credentials.json")
    }
}

fn expand_tilde(value: &str, home: &std::path::Path) -> PathBuf {
    if let Some(rest) = value.strip_prefix("~/") {
        home.join(rest)
    } else if value == "~" {
        home.to_path_buf()
    } else {
        PathBuf::from(value)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn tilde_slash_expands_to_home() {
        let home = Path::new("/home/alice");
        assert_eq!(
            expand_tilde("~/bin", home),
            PathBuf::from("/home/alice/bin")
        );
    }

    #[test]
    fn bare_tilde_is_home() {
        let home = Path::new("/home/alice");
        assert_eq!(expand_tilde("~", home), PathBuf::from("/home/alice"));
    }

    #[test]
    fn absolute_path_is_unchanged() {
        let home = Path::new("/home/alice");
        assert_eq!(
            expand_tilde("/opt/ikigai", home),
            PathBuf::from("/opt/ikigai")
        );
    }

    #[test]
    fn mid_string_tilde_is_not_expanded() {
        let home = Path::new("/home/alice");
        assert_eq!(
            expand_tilde("/opt/~backup", home),
            PathBuf::from("/opt/~backup")
        );
    }

    #[test]
    fn credentials_file_lives_in_config_dir() {
        let paths = Paths {
            bin_dir: "/b".into(),
            config_dir: "/c".into(),
            data_dir: "/d".into(),
            libexec_dir: "/l".into(),
        };
        assert_eq!(
            paths.credentials_file(),
            PathBuf::from("/c/credentials.json")
        );
    }
}
