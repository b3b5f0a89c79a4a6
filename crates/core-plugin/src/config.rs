//! Host configuration loading and parsing.
//!
//! A small TOML file lets an installation veto auto-enabling of individual
//! plugins and tune completion aggregation without recompiling. Unknown
//! fields are ignored (TOML deserialization tolerance) so the file can grow
//! without breaking older hosts, and a malformed file falls back to defaults
//! with a warning rather than failing host construction; configuration
//! must never take the editor down.

use std::{fs, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// File name probed in the working directory by [`discover`].
pub const CONFIG_FILE_NAME: &str = "plugin-host.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed host config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct PluginsConfig {
    /// Plugin ids never auto-enabled at registration, regardless of their
    /// declared default. They can still be enabled explicitly.
    #[serde(default)]
    pub disabled: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    #[serde(default = "CompletionConfig::default_dedupe_labels")]
    pub dedupe_labels: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            dedupe_labels: Self::default_dedupe_labels(),
        }
    }
}

impl CompletionConfig {
    const fn default_dedupe_labels() -> bool {
        true
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct HostConfig {
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

impl HostConfig {
    /// Strict parse with a typed error, for embedders that want to surface
    /// configuration problems themselves.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Best-effort config path: the local working directory only. Platform
/// config-dir discovery is the embedding application's concern; it can pass
/// an explicit path to [`load_from`].
pub fn discover() -> PathBuf {
    PathBuf::from(CONFIG_FILE_NAME)
}

/// Load the host config, falling back to defaults when the file is missing
/// or malformed (logged, never an error).
pub fn load_from(path: Option<PathBuf>) -> HostConfig {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return HostConfig::default();
    };
    match HostConfig::parse(&content) {
        Ok(config) => config,
        Err(err) => {
            warn!(target: "plugin.config", file = %path.display(), error = %err, "config_parse_failed_using_defaults");
            HostConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_when_file_missing() {
        let config = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml")));
        assert!(config.plugins.disabled.is_empty());
        assert!(config.completion.dedupe_labels);
    }

    #[test]
    fn parses_disabled_list_and_completion_flag() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[plugins]\ndisabled = [\"telemetry\", \"beta-hints\"]\n\n[completion]\ndedupe_labels = false\n",
        )
        .unwrap();
        let config = load_from(Some(tmp.path().to_path_buf()));
        assert_eq!(
            config.plugins.disabled,
            vec!["telemetry".to_string(), "beta-hints".to_string()]
        );
        assert!(!config.completion.dedupe_labels);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let config =
            HostConfig::parse("[plugins]\ndisabled = []\nfuture_knob = 3\n[layout]\ncols = 2\n")
                .expect("unknown fields must not fail the parse");
        assert_eq!(config, HostConfig::default());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[plugins\ndisabled = oops").unwrap();
        let config = load_from(Some(tmp.path().to_path_buf()));
        assert_eq!(config, HostConfig::default());
        assert!(HostConfig::parse("[plugins\n").is_err());
    }
}
