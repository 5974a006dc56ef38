use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fixtura_generate::{Flavor, GenerationPolicy, SessionConfig};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "fixtura.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid toml in {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid policy: {0}")]
    Policy(String),
}

/// Format of the files written next to `instances.ndjson` in a run directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// `[session]` table. Every key is optional; flags win over it.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSection {
    pub seed: Option<u64>,
    pub flavor: Option<Flavor>,
    pub locale: Option<String>,
    pub count: Option<u64>,
    pub out: Option<PathBuf>,
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub session: SessionSection,
    pub policy: GenerationPolicy,
}

impl FileConfig {
    pub fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let config: FileConfig = toml::from_str(contents).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let policy = &self.policy;
        if !(0.0..=1.0).contains(&policy.null_probability) {
            return Err(ConfigError::Policy(format!(
                "null_probability must be within [0, 1], got {}",
                policy.null_probability
            )));
        }
        if policy.max_unique_attempts == 0 {
            return Err(ConfigError::Policy(
                "max_unique_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Session settings with command-line values layered over the file.
    pub fn session_config(
        &self,
        seed: Option<u64>,
        flavor: Option<Flavor>,
        locale: Option<String>,
        persist: bool,
    ) -> SessionConfig {
        let defaults = SessionConfig::default();
        SessionConfig {
            seed: seed.or(self.session.seed),
            flavor: flavor.or(self.session.flavor).unwrap_or(defaults.flavor),
            locale: locale
                .or_else(|| self.session.locale.clone())
                .unwrap_or(defaults.locale),
            persist,
        }
    }
}

/// Load `explicit`, or `fixtura.toml` from the working directory when present.
pub fn load(explicit: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.is_file() {
                return Ok(FileConfig::default());
            }
            fallback
        }
    };
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    FileConfig::parse(&path, &contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse(contents: &str) -> Result<FileConfig, ConfigError> {
        FileConfig::parse(Path::new("fixtura.toml"), contents)
    }

    #[test]
    fn reads_session_and_policy_tables() {
        let config = parse(
            r#"
            [session]
            seed = 42
            flavor = "minimal"
            count = 10
            format = "csv"

            [policy]
            null_probability = 0.2
            base_date = "2020-06-01"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.session.seed, Some(42));
        assert_eq!(config.session.flavor, Some(Flavor::Minimal));
        assert_eq!(config.session.count, Some(10));
        assert_eq!(config.session.format, Some(OutputFormat::Csv));
        assert_eq!(config.policy.null_probability, 0.2);
        assert_eq!(config.policy.max_unique_attempts, 100);
        assert_eq!(
            config.policy.base_date,
            NaiveDate::from_ymd_opt(2020, 6, 1).expect("date")
        );
    }

    #[test]
    fn flags_win_over_file_values() {
        let config = parse("[session]\nseed = 1\nflavor = \"creative\"\nlocale = \"pt_BR\"\n")
            .expect("valid config");

        let merged = config.session_config(Some(7), None, None, true);
        assert_eq!(merged.seed, Some(7));
        assert_eq!(merged.flavor, Flavor::Creative);
        assert_eq!(merged.locale, "pt_BR");
        assert!(merged.persist);

        let defaults = FileConfig::default().session_config(None, None, None, false);
        assert_eq!(defaults, SessionConfig::default());
    }

    #[test]
    fn rejects_unknown_keys_and_bad_policy() {
        assert!(matches!(
            parse("[session]\ncolour = \"red\"\n"),
            Err(ConfigError::Toml { .. })
        ));
        assert!(matches!(
            parse("[policy]\nnull_probability = 1.5\n"),
            Err(ConfigError::Policy(_))
        ));
        assert!(matches!(
            parse("[policy]\nmax_unique_attempts = 0\n"),
            Err(ConfigError::Policy(_))
        ));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("fixtura_missing_{}.toml", uuid::Uuid::new_v4()));
        assert!(matches!(load(Some(&path)), Err(ConfigError::Read { .. })));
    }
}
