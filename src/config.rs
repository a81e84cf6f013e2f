//! Repository configuration: the targets that get updated when an image is pushed.

use std::{fs::File, io::Read, path::Path};

use serde::Deserialize;
use thiserror::Error;

use crate::hooks::PushEvent;

const DEFAULT_SOURCE_BRANCH: &str = "master";

/// Errors raised while loading the repository configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An entry lacks one of the fields needed to update it.
    #[error("repository {index} is missing required field {field}")]
    MissingField { index: usize, field: &'static str },
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct RepoConfiguration {
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

/// One update target.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// The registry's name for the image, matched against incoming push events.
    pub name: String,
    pub source_repo: String,
    #[serde(default)]
    pub source_branch: String,
    pub file_path: String,
    /// Dotted path of the value to replace inside the file.
    pub update_key: String,
    /// Prefix of the branch to push changes to; empty commits straight to the source branch.
    #[serde(default)]
    pub branch_generate_name: String,
}

impl Repository {
    pub fn source_branch(&self) -> &str {
        if self.source_branch.is_empty() {
            DEFAULT_SOURCE_BRANCH
        } else {
            &self.source_branch
        }
    }

    pub fn creates_branch(&self) -> bool {
        !self.branch_generate_name.is_empty()
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let required = [
            ("name", &self.name),
            ("sourceRepo", &self.source_repo),
            ("filePath", &self.file_path),
            ("updateKey", &self.update_key),
        ];
        match required.iter().find(|(_, value)| value.is_empty()) {
            Some((field, _)) => Err(ConfigError::MissingField {
                index,
                field: *field,
            }),
            None => Ok(()),
        }
    }
}

impl RepoConfiguration {
    pub fn from_reader(reader: impl Read) -> Result<Self, ConfigError> {
        let config: RepoConfiguration = serde_yaml::from_reader(reader)?;
        for (index, repository) in config.repositories.iter().enumerate() {
            repository.validate(index)?;
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_reader(File::open(path)?)
    }

    /// Returns every repository configured for the pushed image, in configuration order.
    pub fn match_all(&self, hook: &PushEvent) -> Vec<&Repository> {
        self.repositories
            .iter()
            .filter(|repo| repo.name == hook.repository)
            .collect()
    }
}
