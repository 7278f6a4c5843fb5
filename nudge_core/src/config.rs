use crate::mutator::DEFAULT_HINT_PROBABILITY;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or validating a [`NudgeConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("dedup = false is not supported with ignore or keep-going > 1")]
    DedupRequired,
    #[error("Invalid dedup token (expected up to 16 hex digits): '{0}'")]
    InvalidDedupToken(String),
    #[error("keep-going must be at least 1")]
    InvalidKeepGoing,
    #[error("hint-probability must be between 0 and 1, got {0}")]
    InvalidHintProbability(f64),
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct CorpusConfig {
    #[serde(default)]
    pub initial_seed_paths: Option<Vec<PathBuf>>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct FuzzerSettings {
    #[serde(default = "default_iterations")]
    pub max_iterations: u64,
    /// Seed for the fuzzer's RNG. Runs with the same seed are reproducible.
    #[serde(default)]
    pub seed: u64,
    /// Number of distinct findings to collect before stopping.
    #[serde(default = "default_keep_going")]
    pub keep_going: u32,
    /// Print a dedup token for every finding. Required by `keep-going` and `ignore`.
    #[serde(default = "default_dedup")]
    pub dedup: bool,
    /// Dedup tokens, in hex, of findings to skip.
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default = "default_hint_probability")]
    pub hint_probability: f64,
    /// Directory crashing inputs are written to. Nothing is written when unset.
    #[serde(default)]
    pub artifact_dir: Option<PathBuf>,
}

pub fn default_iterations() -> u64 {
    1_000_000
}

pub fn default_keep_going() -> u32 {
    1
}

fn default_dedup() -> bool {
    true
}

fn default_hint_probability() -> f64 {
    DEFAULT_HINT_PROBABILITY
}

impl Default for FuzzerSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_iterations(),
            seed: 0,
            keep_going: default_keep_going(),
            dedup: default_dedup(),
            ignore: Vec::new(),
            hint_probability: default_hint_probability(),
            artifact_dir: None,
        }
    }
}

/// Fuzzer configuration, read from a TOML file with `[fuzzer]` and `[corpus]`
/// tables. Missing tables and keys take their defaults.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct NudgeConfig {
    #[serde(default)]
    pub fuzzer: FuzzerSettings,
    #[serde(default)]
    pub corpus: CorpusConfig,
}

impl NudgeConfig {
    /// Reads and parses the TOML file at `path`.
    ///
    /// # Errors
    /// [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not a valid configuration. The result
    /// is not validated; call [`NudgeConfig::validate`] after applying
    /// overrides.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Checks the settings that cannot be expressed in the TOML schema.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fuzzer = &self.fuzzer;
        if fuzzer.keep_going == 0 {
            return Err(ConfigError::InvalidKeepGoing);
        }
        if !fuzzer.dedup && (fuzzer.keep_going > 1 || !fuzzer.ignore.is_empty()) {
            return Err(ConfigError::DedupRequired);
        }
        if !(0.0..=1.0).contains(&fuzzer.hint_probability) {
            return Err(ConfigError::InvalidHintProbability(fuzzer.hint_probability));
        }
        self.ignore_tokens().map(|_| ())
    }

    /// The `ignore` list as dedup tokens. Empty entries are skipped.
    pub fn ignore_tokens(&self) -> Result<Vec<u64>, ConfigError> {
        self.fuzzer
            .ignore
            .iter()
            .map(|token| token.trim())
            .filter(|token| !token.is_empty())
            .map(parse_dedup_token)
            .collect()
    }
}

/// Parses a dedup token of 1 to 16 hex digits.
pub fn parse_dedup_token(token: &str) -> Result<u64, ConfigError> {
    let valid = !token.is_empty()
        && token.len() <= 16
        && token.chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(ConfigError::InvalidDedupToken(token.to_string()));
    }
    u64::from_str_radix(token, 16).map_err(|_| ConfigError::InvalidDedupToken(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = NudgeConfig::from_toml_str("").unwrap();
        assert_eq!(config.fuzzer.max_iterations, default_iterations());
        assert_eq!(config.fuzzer.keep_going, 1);
        assert!(config.fuzzer.dedup);
        assert!(config.fuzzer.ignore.is_empty());
        assert_eq!(config.fuzzer.hint_probability, DEFAULT_HINT_PROBABILITY);
        assert!(config.fuzzer.artifact_dir.is_none());
        assert!(config.corpus.initial_seed_paths.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn kebab_case_keys_are_parsed() {
        let config = NudgeConfig::from_toml_str(
            r#"
            [fuzzer]
            max-iterations = 500
            seed = 42
            keep-going = 3
            ignore = ["d41d8cd98f00b204", "", "FF"]
            hint-probability = 0.25
            artifact-dir = "artifacts"

            [corpus]
            initial-seed-paths = ["seeds"]
            "#,
        )
        .unwrap();

        assert_eq!(config.fuzzer.max_iterations, 500);
        assert_eq!(config.fuzzer.seed, 42);
        assert_eq!(config.fuzzer.keep_going, 3);
        assert_eq!(config.fuzzer.hint_probability, 0.25);
        assert_eq!(config.fuzzer.artifact_dir, Some(PathBuf::from("artifacts")));
        assert_eq!(
            config.corpus.initial_seed_paths,
            Some(vec![PathBuf::from("seeds")])
        );
        assert_eq!(
            config.ignore_tokens().unwrap(),
            vec![0xd41d_8cd9_8f00_b204, 0xff]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = NudgeConfig::from_toml_str("[fuzzer]\nthreads = 4\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn disabling_dedup_conflicts_with_keep_going_and_ignore() {
        let mut config = NudgeConfig::default();
        config.fuzzer.dedup = false;
        assert!(config.validate().is_ok());

        config.fuzzer.keep_going = 2;
        assert!(matches!(config.validate(), Err(ConfigError::DedupRequired)));

        config.fuzzer.keep_going = 1;
        config.fuzzer.ignore = vec!["abc".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::DedupRequired)));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut config = NudgeConfig::default();
        config.fuzzer.keep_going = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidKeepGoing)));

        let mut config = NudgeConfig::default();
        config.fuzzer.hint_probability = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidHintProbability(_))
        ));

        let mut config = NudgeConfig::default();
        config.fuzzer.ignore = vec!["not-hex".to_string()];
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid dedup token (expected up to 16 hex digits): 'not-hex'"
        );
    }

    #[test]
    fn parse_dedup_token_accepts_up_to_sixteen_hex_digits() {
        assert_eq!(parse_dedup_token("0").unwrap(), 0);
        assert_eq!(parse_dedup_token("ffffffffffffffff").unwrap(), u64::MAX);
        assert!(parse_dedup_token("1ffffffffffffffff").is_err());
        assert!(parse_dedup_token("+1").is_err());
        assert!(parse_dedup_token("").is_err());
    }

    #[test]
    fn load_from_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nudge.toml");
        assert!(matches!(
            NudgeConfig::load_from_file(&missing),
            Err(ConfigError::Read { .. })
        ));

        std::fs::write(&missing, "[fuzzer]\nmax-iterations = 7\n").unwrap();
        let config = NudgeConfig::load_from_file(&missing).unwrap();
        assert_eq!(config.fuzzer.max_iterations, 7);
    }
}
