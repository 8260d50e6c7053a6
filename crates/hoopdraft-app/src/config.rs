// Configuration loading and parsing (rules.toml, app.toml, credentials.toml).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use hoopdraft_core::catalog::DEFAULT_MIN_GAMES;
use hoopdraft_core::rules::RulesConfig;
use hoopdraft_llm::LlmSettings;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub rules: RulesConfig,
    pub app: AppConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// app.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
    #[serde(default)]
    pub llm: LlmSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// Empty means the platform data directory.
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    pub path: String,
    #[serde(default = "default_min_games")]
    pub min_games: u32,
}

fn default_min_games() -> u32 {
    DEFAULT_MIN_GAMES
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardConfig {
    pub size: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        LeaderboardConfig { size: 10 }
    }
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub anthropic_api_key: Option<String>,
}

impl Config {
    /// Database location: the configured path, or `hoopdraft.db` in the
    /// platform data directory when none is set.
    pub fn database_path(&self) -> PathBuf {
        if !self.app.database.path.trim().is_empty() {
            return PathBuf::from(&self.app.database.path);
        }
        match directories::ProjectDirs::from("", "", "hoopdraft") {
            Some(dirs) => dirs.data_dir().join("hoopdraft.db"),
            None => PathBuf::from("hoopdraft.db"),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/rules.toml`,
/// `config/app.toml`, and (optionally) `config/credentials.toml`, all
/// relative to `base_dir`. Does not copy defaults.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let rules: RulesConfig = parse_file(&config_dir.join("rules.toml"))?;
    let app: AppConfig = parse_file(&config_dir.join("app.toml"))?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        parse_file(&credentials_path)?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        rules,
        app,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    copied.sort();
    Ok(copied)
}

/// Loads config relative to the current working directory, copying
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn parse_file<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let text = read_file(path)?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    config
        .rules
        .validate()
        .map_err(|e| ConfigError::ValidationError {
            field: format!("rules.{}", e.field),
            message: e.message,
        })?;

    if config.app.catalog.path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "catalog.path".into(),
            message: "must not be empty".into(),
        });
    }

    if config.app.leaderboard.size == 0 {
        return Err(ConfigError::ValidationError {
            field: "leaderboard.size".into(),
            message: "must be greater than 0".into(),
        });
    }

    let llm = &config.app.llm;
    if llm.model.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "llm.model".into(),
            message: "must not be empty".into(),
        });
    }
    if llm.max_tokens == 0 {
        return Err(ConfigError::ValidationError {
            field: "llm.max_tokens".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    }

    /// Fresh temp dir with the shipped defaults copied into `config/`.
    fn staged(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        let config_dir = tmp.join("config");
        fs::create_dir_all(&config_dir).unwrap();
        let root = project_root();
        for file in ["rules.toml", "app.toml"] {
            fs::copy(root.join("defaults").join(file), config_dir.join(file)).unwrap();
        }
        tmp
    }

    fn expect_validation(tmp: &Path, field: &str) {
        match load_config_from(tmp) {
            Err(ConfigError::ValidationError { field: f, .. }) => assert_eq!(f, field),
            other => panic!("expected ValidationError for {field}, got: {other:?}"),
        }
    }

    #[test]
    fn load_valid_config_from_defaults() {
        let tmp = staged("hoopdraft_config_valid");
        let config = load_config_from(&tmp).expect("should load valid config");

        assert_eq!(config.rules, RulesConfig::default());
        assert_eq!(config.app.database.path, "hoopdraft.db");
        assert_eq!(config.app.catalog.path, "data/season_totals.csv");
        assert_eq!(config.app.catalog.min_games, 10);
        assert_eq!(config.app.leaderboard.size, 10);
        assert_eq!(config.app.llm, LlmSettings::default());
        assert!(config.credentials.anthropic_api_key.is_none());
        assert_eq!(config.database_path(), PathBuf::from("hoopdraft.db"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn omitted_rule_fields_take_defaults() {
        let tmp = staged("hoopdraft_config_partial_rules");
        fs::write(
            tmp.join("config/rules.toml"),
            "starting_budget = 150\n[advisor]\ntimeout_ms = 5000\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.rules.starting_budget, 150);
        assert_eq!(config.rules.advisor.timeout_ms, 5000);
        assert_eq!(config.rules.advisor.max_retries, 1);
        assert_eq!(config.rules.scored_roster_size, 5);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_toml_with_api_key() {
        let tmp = staged("hoopdraft_config_credentials");
        fs::write(
            tmp.join("config/credentials.toml"),
            "anthropic_api_key = \"sk-ant-test\"\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(
            config.credentials.anthropic_api_key.as_deref(),
            Some("sk-ant-test")
        );

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_bad_quotas_as_rules_field() {
        let tmp = staged("hoopdraft_config_bad_quotas");
        fs::write(
            tmp.join("config/rules.toml"),
            "[quotas]\nelite = 3\ngood = 4\nmid = 4\nrole = 2\n",
        )
        .unwrap();
        expect_validation(&tmp, "rules.quotas");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_two_retries() {
        let tmp = staged("hoopdraft_config_two_retries");
        fs::write(tmp.join("config/rules.toml"), "[advisor]\nmax_retries = 2\n").unwrap();
        expect_validation(&tmp, "rules.advisor.max_retries");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_leaderboard_size() {
        let tmp = staged("hoopdraft_config_zero_board");
        fs::write(
            tmp.join("config/app.toml"),
            "[catalog]\npath = \"x.csv\"\n[leaderboard]\nsize = 0\n",
        )
        .unwrap();
        expect_validation(&tmp, "leaderboard.size");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_empty_catalog_path() {
        let tmp = staged("hoopdraft_config_empty_catalog");
        fs::write(tmp.join("config/app.toml"), "[catalog]\npath = \"  \"\n").unwrap();
        expect_validation(&tmp, "catalog.path");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn empty_database_path_uses_platform_dir() {
        let tmp = staged("hoopdraft_config_platform_db");
        fs::write(
            tmp.join("config/app.toml"),
            "[database]\npath = \"\"\n[catalog]\npath = \"x.csv\"\n",
        )
        .unwrap();
        let config = load_config_from(&tmp).unwrap();
        assert!(config.database_path().ends_with("hoopdraft.db"));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_rules_toml() {
        let tmp = staged("hoopdraft_config_missing_rules");
        fs::remove_file(tmp.join("config/rules.toml")).unwrap();
        match load_config_from(&tmp) {
            Err(ConfigError::FileNotFound { path }) => assert!(path.ends_with("rules.toml")),
            other => panic!("expected FileNotFound, got: {other:?}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = staged("hoopdraft_config_invalid_toml");
        fs::write(tmp.join("config/app.toml"), "[catalog\npath = ").unwrap();
        match load_config_from(&tmp) {
            Err(ConfigError::ParseError { path, .. }) => assert!(path.ends_with("app.toml")),
            other => panic!("expected ParseError, got: {other:?}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_files() {
        let tmp = std::env::temp_dir().join("hoopdraft_config_ensure_copies");
        let _ = fs::remove_dir_all(&tmp);
        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();

        let root = project_root();
        for file in ["rules.toml", "app.toml", "credentials.toml.example"] {
            fs::copy(root.join("defaults").join(file), defaults_dir.join(file)).unwrap();
        }

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 2);
        assert!(tmp.join("config/rules.toml").exists());
        assert!(tmp.join("config/app.toml").exists());
        assert!(!tmp.join("config/credentials.toml.example").exists());

        load_config_from(&tmp).expect("copied defaults should load");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_skips_existing() {
        let tmp = std::env::temp_dir().join("hoopdraft_config_ensure_skips");
        let _ = fs::remove_dir_all(&tmp);
        let defaults_dir = tmp.join("defaults");
        let config_dir = tmp.join("config");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::create_dir_all(&config_dir).unwrap();

        let root = project_root();
        for file in ["rules.toml", "app.toml"] {
            fs::copy(root.join("defaults").join(file), defaults_dir.join(file)).unwrap();
        }
        fs::write(config_dir.join("rules.toml"), "# custom\n").unwrap();

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 1);
        assert!(copied[0].ends_with("app.toml"));
        assert_eq!(
            fs::read_to_string(config_dir.join("rules.toml")).unwrap(),
            "# custom\n"
        );

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = std::env::temp_dir().join("hoopdraft_config_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        match ensure_config_files(&tmp).unwrap_err() {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("neither defaults/ nor config/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }
}
