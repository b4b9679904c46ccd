use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AgewrapError, AgewrapResult};

/// Config file used when neither `--config` nor `AGEWRAP_CONFIG` is given
pub const DEFAULT_CONFIG_PATH: &str = "agewrap.toml";

/// Transport encodings understood by `[transport] encoding`
pub const TRANSPORT_ENCODINGS: [&str; 4] = ["raw-std", "std", "url", "raw-url"];

/// Hard upper bound for either scrypt work factor setting
pub const MAX_WORK_FACTOR: u8 = 30;

/// Top-level configuration (loaded from agewrap.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgewrapConfig {
    pub log: LogConfig,
    pub keys: KeysConfig,
    pub scrypt: ScryptConfig,
    pub transport: TransportConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Human-readable part for public keys (default: agewrap)
    pub public_prefix: String,
    /// Human-readable part for private keys (default: AGEWRAP-SECRET-KEY-)
    pub private_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScryptConfig {
    /// log2(N) for new passphrase stanzas (default: 18)
    pub work_factor: u8,
    /// Largest log2(N) accepted when decrypting (default: 22)
    pub max_work_factor: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// base64 variant: "raw-std", "std", "url" or "raw-url"
    pub encoding: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Where previous file versions go (default: `.agewrap-backup` inside the target dir)
    pub backup_dir: Option<PathBuf>,
    /// Stop at the first failing file instead of continuing (default: true)
    pub fail_fast: bool,
    /// Backups retained per file; unset keeps all
    pub keep_backups: Option<usize>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            public_prefix: "agewrap".into(),
            private_prefix: "AGEWRAP-SECRET-KEY-".into(),
        }
    }
}

impl Default for ScryptConfig {
    fn default() -> Self {
        Self {
            work_factor: 18,
            max_work_factor: 22,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            encoding: "raw-std".into(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            backup_dir: None,
            fail_fast: true,
            keep_backups: None,
        }
    }
}

impl AgewrapConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> AgewrapResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| AgewrapError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> AgewrapResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| AgewrapError::Config(format!("{}: {e}", path.display())))
    }

    pub fn to_toml_string(&self) -> AgewrapResult<String> {
        toml::to_string_pretty(self).map_err(|e| AgewrapError::Config(e.to_string()))
    }

    pub fn validate(&self) -> AgewrapResult<()> {
        if !matches!(self.log.format.as_str(), "text" | "json") {
            return Err(AgewrapError::Config(format!(
                "log.format must be \"text\" or \"json\", got {:?}",
                self.log.format
            )));
        }
        if self.keys.public_prefix.is_empty() || self.keys.private_prefix.is_empty() {
            return Err(AgewrapError::Config("key prefixes must not be empty".into()));
        }
        for (name, value) in [
            ("scrypt.work_factor", self.scrypt.work_factor),
            ("scrypt.max_work_factor", self.scrypt.max_work_factor),
        ] {
            if value == 0 || value > MAX_WORK_FACTOR {
                return Err(AgewrapError::Config(format!(
                    "{name} must be in 1..={MAX_WORK_FACTOR}, got {value}"
                )));
            }
        }
        if !TRANSPORT_ENCODINGS.contains(&self.transport.encoding.as_str()) {
            return Err(AgewrapError::Config(format!(
                "transport.encoding must be one of {TRANSPORT_ENCODINGS:?}, got {:?}",
                self.transport.encoding
            )));
        }
        if self.batch.keep_backups == Some(0) {
            return Err(AgewrapError::Config(
                "batch.keep_backups must be at least 1 (omit it to keep all)".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[log]
level = "debug"
format = "json"

[keys]
public_prefix = "myapp"
private_prefix = "MYAPP-SECRET-"

[scrypt]
work_factor = 15
max_work_factor = 20

[transport]
encoding = "url"

[batch]
backup_dir = "/var/backups/agewrap"
fail_fast = false
keep_backups = 5
"#;
        let config = AgewrapConfig::from_toml_str(toml_str).unwrap();

        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
        assert_eq!(config.keys.public_prefix, "myapp");
        assert_eq!(config.keys.private_prefix, "MYAPP-SECRET-");
        assert_eq!(config.scrypt.work_factor, 15);
        assert_eq!(config.scrypt.max_work_factor, 20);
        assert_eq!(config.transport.encoding, "url");
        assert_eq!(
            config.batch.backup_dir,
            Some(PathBuf::from("/var/backups/agewrap"))
        );
        assert!(!config.batch.fail_fast);
        assert_eq!(config.batch.keep_backups, Some(5));
    }

    #[test]
    fn test_parse_defaults() {
        let config = AgewrapConfig::from_toml_str("").unwrap();

        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "text");
        assert_eq!(config.keys.public_prefix, "agewrap");
        assert_eq!(config.keys.private_prefix, "AGEWRAP-SECRET-KEY-");
        assert_eq!(config.scrypt.work_factor, 18);
        assert_eq!(config.scrypt.max_work_factor, 22);
        assert_eq!(config.transport.encoding, "raw-std");
        assert!(config.batch.backup_dir.is_none());
        assert!(config.batch.fail_fast);
        assert!(config.batch.keep_backups.is_none());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[scrypt]
work_factor = 20
"#;
        let config = AgewrapConfig::from_toml_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.scrypt.work_factor, 20);
        // Defaults
        assert_eq!(config.scrypt.max_work_factor, 22);
        assert_eq!(config.log.level, "info");
        assert!(config.batch.fail_fast);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        for toml_str in [
            "[log]\nformat = \"xml\"",
            "[keys]\npublic_prefix = \"\"",
            "[scrypt]\nwork_factor = 0",
            "[scrypt]\nmax_work_factor = 31",
            "[transport]\nencoding = \"hex\"",
            "[batch]\nkeep_backups = 0",
        ] {
            assert!(
                matches!(
                    AgewrapConfig::from_toml_str(toml_str),
                    Err(AgewrapError::Config(_))
                ),
                "{toml_str:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = AgewrapConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = AgewrapConfig::from_toml_str(&toml_str).unwrap();

        assert_eq!(config.keys.public_prefix, parsed.keys.public_prefix);
        assert_eq!(config.scrypt.work_factor, parsed.scrypt.work_factor);
        assert_eq!(config.transport.encoding, parsed.transport.encoding);
        assert_eq!(config.batch.fail_fast, parsed.batch.fail_fast);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgewrapConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.scrypt.work_factor, 18);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agewrap.toml");
        std::fs::write(&path, "[transport]\nencoding = \"std\"\n").unwrap();

        let config = AgewrapConfig::load(&path).unwrap();
        assert_eq!(config.transport.encoding, "std");
    }

    #[test]
    fn test_load_invalid_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[scrypt]\nwork_factor = \"high\"\n").unwrap();

        let err = AgewrapConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
