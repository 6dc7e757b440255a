//! Run configuration.
//!
//! Defaults reproduce the stock deployment (the `anuket-project` organization
//! and the OPNFV Gerrit). A TOML file may override any section:
//!
//! ```toml
//! [github]
//! org = "anuket-project"
//!
//! [gerrit]
//! base_url = "https://gerrit.opnfv.org/gerrit"
//! projects = ["functest", "releng"]
//!
//! [retry]
//! max_retries = 3
//! timeout_seconds = 30
//! ```

use crate::error::{PulseError, Result};
use crate::fetch::RetryPolicy;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Github,
    Gerrit,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Github => f.write_str("github"),
            Platform::Gerrit => f.write_str("gerrit"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub gerrit: GerritConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub org: String,
    pub api_url: String,
    /// Usually supplied through `GITHUB_TOKEN` rather than the file.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub affiliations_file: Option<PathBuf>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            org: "anuket-project".to_string(),
            api_url: "https://api.github.com".to_string(),
            token: None,
            affiliations_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GerritConfig {
    pub base_url: String,
    pub projects: Vec<String>,
    pub affiliations_file: Option<PathBuf>,
}

impl Default for GerritConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gerrit.opnfv.org/gerrit".to_string(),
            projects: [
                "functest",
                "functest-kubernetes",
                "functest-requirements",
                "functest-xtesting",
                "releng",
                "kuberef",
                "thoth",
                "barometer",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            affiliations_file: None,
        }
    }
}

impl Config {
    /// Read `path` if given, otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PulseError::Config(format!("Cannot read config {}: {e}", path.display()))
        })?;
        let mut config: Config = toml::from_str(&raw)?;
        config.resolve_relative_paths(path.parent().unwrap_or(Path::new(".")));
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Affiliation paths in a config file are relative to that file.
    fn resolve_relative_paths(&mut self, base: &Path) {
        for file in [
            &mut self.github.affiliations_file,
            &mut self.gerrit.affiliations_file,
        ]
        .into_iter()
        .flatten()
        {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
    }

    pub fn validate(&self, platform: Platform) -> Result<()> {
        match platform {
            Platform::Github => {
                if self.github.org.trim().is_empty() {
                    return Err(PulseError::Config("github.org must not be empty".into()));
                }
                if self.github.api_url.trim().is_empty() {
                    return Err(PulseError::Config("github.api_url must not be empty".into()));
                }
            }
            Platform::Gerrit => {
                if self.gerrit.base_url.trim().is_empty() {
                    return Err(PulseError::Config("gerrit.base_url must not be empty".into()));
                }
                if self.gerrit.projects.is_empty() {
                    return Err(PulseError::Config("gerrit.projects must list at least one project".into()));
                }
            }
        }
        if self.retry.max_retries == 0 {
            return Err(PulseError::Config("retry.max_retries must be at least 1".into()));
        }
        Ok(())
    }

    /// The affiliation file for `platform`: the configured one, or the
    /// platform's default file next to the running executable.
    pub fn affiliations_path(&self, platform: Platform) -> Result<PathBuf> {
        let configured = match platform {
            Platform::Github => self.github.affiliations_file.as_ref(),
            Platform::Gerrit => self.gerrit.affiliations_file.as_ref(),
        };
        if let Some(path) = configured {
            return Ok(path.clone());
        }
        let exe = std::env::current_exe()?;
        let dir = exe.parent().unwrap_or(Path::new("."));
        Ok(dir.join(default_affiliations_file(platform)))
    }
}

pub fn default_affiliations_file(platform: Platform) -> &'static str {
    match platform {
        Platform::Github => "affiliations.json",
        Platform::Gerrit => "company_mapping.json",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn defaults_match_stock_deployment() {
        let config = Config::default();
        assert_eq!(config.github.org, "anuket-project");
        assert_eq!(config.gerrit.base_url, "https://gerrit.opnfv.org/gerrit");
        assert_eq!(config.gerrit.projects.len(), 8);
        assert_eq!(config.gerrit.projects[0], "functest");
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.validate(Platform::Github).is_ok());
        assert!(config.validate(Platform::Gerrit).is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulse.toml");
        fs::write(
            &path,
            r#"
[gerrit]
projects = ["releng"]
affiliations_file = "maps/companies.json"

[retry]
max_retries = 5
"#,
        )
        .unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();

        assert_eq!(config.gerrit.projects, vec!["releng"]);
        assert_eq!(config.gerrit.base_url, "https://gerrit.opnfv.org/gerrit");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.timeout_seconds, 30);
        assert_eq!(config.github.org, "anuket-project");
        assert_eq!(
            config.affiliations_path(Platform::Gerrit).unwrap(),
            dir.path().join("maps/companies.json")
        );
    }

    #[test]
    fn empty_project_list_is_rejected() {
        let mut config = Config::default();
        config.gerrit.projects.clear();
        assert!(matches!(
            config.validate(Platform::Gerrit),
            Err(PulseError::Config(_))
        ));
        assert!(config.validate(Platform::Github).is_ok());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[gerrit\nprojects = 3").unwrap();
        assert!(matches!(
            Config::load(Some(path.as_path())),
            Err(PulseError::Toml(_))
        ));
    }

    #[test]
    fn default_affiliation_file_sits_next_to_executable() {
        let path = Config::default()
            .affiliations_path(Platform::Github)
            .unwrap();
        assert!(path.ends_with("affiliations.json"));
        assert_eq!(default_affiliations_file(Platform::Gerrit), "company_mapping.json");
    }
}
