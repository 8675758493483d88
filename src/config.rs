use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration for a forksync run
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// GitHub username whose forks are synchronized
    #[serde(default)]
    pub username: String,

    /// Local root directory that holds the repository clones
    #[serde(default)]
    pub directory: String,

    /// GitHub API token
    #[serde(default)]
    pub token: String,

    /// Base URL of the GitHub REST API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Maximum concurrent detail requests against the GitHub API
    #[serde(default = "default_github_concurrency")]
    pub github_concurrency: usize,

    /// Maximum concurrent repository synchronizations (unbounded when absent)
    #[serde(default)]
    pub git_concurrency: Option<usize>,
}

/// Startup configuration failures; fatal before any pipeline work starts
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required option: {0}")]
    MissingOption(&'static str),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to expand directory path: {0}")]
    Expand(#[from] shellexpand::LookupError<std::env::VarError>),
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_github_concurrency() -> usize {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            directory: String::new(),
            token: String::new(),
            api_url: default_api_url(),
            github_concurrency: default_github_concurrency(),
            git_concurrency: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Expand `~` and environment variables in the root directory
    pub fn expand_paths(&mut self) -> Result<(), ConfigError> {
        if !self.directory.is_empty() {
            self.directory = shellexpand::full(&self.directory)?.into_owned();
        }
        Ok(())
    }

    /// Verify every required option is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.is_empty() {
            return Err(ConfigError::MissingOption("username"));
        }
        if self.directory.is_empty() {
            return Err(ConfigError::MissingOption("directory"));
        }
        if self.token.is_empty() {
            return Err(ConfigError::MissingOption("token"));
        }
        Ok(())
    }

    /// The local root directory as a path
    pub fn root(&self) -> PathBuf {
        PathBuf::from(&self.directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serial_test::serial;
    use std::env;

    fn valid_config() -> Config {
        Config {
            username: "octocat".to_string(),
            directory: "/tmp/forks".to_string(),
            token: "ghp_test".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();

        assert_eq!(config.api_url, "https://api.github.com");
        assert_eq!(config.github_concurrency, 3);
        assert_eq!(config.git_concurrency, None);
        assert!(config.username.is_empty());
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_options() {
        let mut config = valid_config();
        config.username = String::new();
        assert_matches!(config.validate(), Err(ConfigError::MissingOption("username")));

        let mut config = valid_config();
        config.directory = String::new();
        assert_matches!(
            config.validate(),
            Err(ConfigError::MissingOption("directory"))
        );

        let mut config = valid_config();
        config.token = String::new();
        assert_matches!(config.validate(), Err(ConfigError::MissingOption("token")));
    }

    // Mutates process environment; must not interleave with other tests
    #[test]
    #[serial]
    fn test_expand_paths() {
        env::set_var("TEST_FORKSYNC_HOME", "/test/home");

        let mut config = valid_config();
        config.directory = "${TEST_FORKSYNC_HOME}/forks".to_string();
        config.expand_paths().expect("Failed to expand paths");

        assert_eq!(config.directory, "/test/home/forks");

        env::remove_var("TEST_FORKSYNC_HOME");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml_content = r#"
username: "octocat"
directory: "${HOME}/forks"
token: "ghp_secret"
github_concurrency: 5
git_concurrency: 8
"#;

        let config: Config = serde_yaml::from_str(yaml_content).expect("Failed to parse YAML");

        assert_eq!(config.username, "octocat");
        assert_eq!(config.directory, "${HOME}/forks");
        assert_eq!(config.token, "ghp_secret");
        assert_eq!(config.github_concurrency, 5);
        assert_eq!(config.git_concurrency, Some(8));
        assert_eq!(config.api_url, "https://api.github.com");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.yml"));
        assert_matches!(result, Err(ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "invalid: yaml: content: [").expect("Failed to write config");

        let result = Config::load(&path);
        assert_matches!(result, Err(ConfigError::Parse { .. }));
    }
}
