//! Reading of `sonar-project.properties`.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use tracing::debug;

pub const PROPERTIES_FILE: &str = "sonar-project.properties";
const PROJECT_KEY_PROPERTY: &str = "sonar.projectKey";

/// Identifier of a project on the scan server. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectKey(String);

impl ProjectKey {
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        (!key.is_empty()).then_some(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
pub enum PropertiesError {
    Io(PathBuf, std::io::Error),
    MissingProjectKey,
}

impl std::error::Error for PropertiesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PropertiesError::Io(_, e) => Some(e),
            PropertiesError::MissingProjectKey => None,
        }
    }
}

impl Display for PropertiesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertiesError::Io(path, e) => {
                write!(f, "failed to read {}: {}", path.display(), e)
            }
            PropertiesError::MissingProjectKey => write!(
                f,
                "{PROJECT_KEY_PROPERTY} value not found in sonar properties file: {PROPERTIES_FILE}"
            ),
        }
    }
}

/// Reads the project key from the properties file at the root of `workspace`.
pub fn read_project_key(workspace: &Path) -> Result<ProjectKey, PropertiesError> {
    let path = workspace.join(PROPERTIES_FILE);
    debug!("Reading project properties at {}", path.display());
    let contents = std::fs::read_to_string(&path).map_err(|e| PropertiesError::Io(path, e))?;
    parse_project_key(&contents).ok_or(PropertiesError::MissingProjectKey)
}

fn parse_project_key(contents: &str) -> Option<ProjectKey> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| line.split_once('='))
        .filter(|(name, _)| name.trim() == PROJECT_KEY_PROPERTY)
        .find_map(|(_, value)| ProjectKey::new(value.trim()))
}
