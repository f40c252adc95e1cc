use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::logging::LogFormat;

pub const CONFIG_FILE: &str = "mill.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MillConfig {
    pub mill: MillSection,
    pub log: LogSection,
    pub workflow: WorkflowSection,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MillSection {
    pub name: String,
}

impl Default for MillSection {
    fn default() -> Self {
        Self {
            name: "Rice Mill".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowSection {
    /// Replacement transition table, relative to the mill root.
    pub file: Option<PathBuf>,
}

impl MillConfig {
    /// Reads `mill.toml` under `root`. A missing file yields defaults.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn workflow_path(&self, root: &Path) -> Option<PathBuf> {
        self.workflow.file.as_ref().map(|file| root.join(file))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, MillConfig, CONFIG_FILE};
    use crate::logging::LogFormat;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn unique_root() -> PathBuf {
        let root = std::env::temp_dir().join(format!("millflow-config-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&root).expect("temp root should be creatable");
        root
    }

    #[test]
    fn missing_file_yields_defaults() {
        let root = unique_root();
        let config = MillConfig::load(&root).expect("defaults should load");
        assert_eq!(config, MillConfig::default());
        assert_eq!(config.log.level, "warn");
        assert!(config.workflow_path(&root).is_none());
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn reads_partial_sections() {
        let root = unique_root();
        std::fs::write(
            root.join(CONFIG_FILE),
            "[mill]\nname = \"Sri Venkateswara Rice Mill\"\n\n[log]\nformat = \"json\"\n\n[workflow]\nfile = \"custom.toml\"\n",
        )
        .expect("config should be writable");
        let config = MillConfig::load(&root).expect("config should load");
        assert_eq!(config.mill.name, "Sri Venkateswara Rice Mill");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.workflow_path(&root), Some(root.join("custom.toml")));
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let root = unique_root();
        std::fs::write(root.join(CONFIG_FILE), "[mill]\nowner = \"x\"\n")
            .expect("config should be writable");
        let err = MillConfig::load(&root).expect_err("unknown key should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
        let _ = std::fs::remove_dir_all(root);
    }
}
