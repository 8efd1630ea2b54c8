//! Runtime parameters, read from the environment of the workflow step.

use std::{collections::HashMap, fmt::Display, path::PathBuf};

use tracing::debug;
use url::Url;

use crate::{
    github::api::Repository,
    metrics::{parse_key_list, MetricLayout},
};

pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const GITHUB_REPOSITORY: &str = "GITHUB_REPOSITORY";
pub const GITHUB_EVENT_PATH: &str = "GITHUB_EVENT_PATH";
pub const GITHUB_WORKSPACE: &str = "GITHUB_WORKSPACE";
pub const GITHUB_API_URL: &str = "GITHUB_API_URL";
pub const SONAR_HOST_URL: &str = "SONAR_HOST_URL";
pub const SONAR_TOKEN: &str = "SONAR_TOKEN";
pub const SONAR_METRIC_KEYS: &str = "SONAR_METRIC_KEYS";
pub const SONAR_OVERALL_METRIC_KEYS: &str = "SONAR_OVERALL_METRIC_KEYS";

const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Source of configuration values.
pub trait Env {
    /// Returns the value of a variable. Empty values count as unset.
    fn var(&self, name: &str) -> Option<String>;
}

/// The environment of the current process.
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

impl Env for HashMap<&str, &str> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name)
            .filter(|v| !v.is_empty())
            .map(|v| (*v).to_owned())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar { name: &'static str, reason: String },
}

impl ConfigError {
    /// Instructions to fix the workflow, when there is something specific to say.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ConfigError::MissingVar(GITHUB_TOKEN) => Some(
                "please ensure your workflow step includes
    env:
        GITHUB_TOKEN: ${{ secrets.GITHUB_TOKEN }}",
            ),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVar(name) => write!(f, "env var not found: {name}"),
            ConfigError::InvalidVar { name, reason } => {
                write!(f, "invalid value for env var {name}: {reason}")
            }
        }
    }
}

type ConfigResult<T> = Result<T, ConfigError>;

fn required(env: &impl Env, name: &'static str) -> ConfigResult<String> {
    env.var(name).ok_or(ConfigError::MissingVar(name))
}

fn parse_url(name: &'static str, value: &str) -> ConfigResult<Url> {
    Url::parse(value).map_err(|e| ConfigError::InvalidVar {
        name,
        reason: e.to_string(),
    })
}

pub fn event_path(env: &impl Env) -> ConfigResult<PathBuf> {
    required(env, GITHUB_EVENT_PATH).map(PathBuf::from)
}

/// Everything needed to query the scan server.
#[derive(Debug, Clone)]
pub struct SonarConfig {
    pub url: Url,
    pub token: String,
    pub workspace: PathBuf,
    pub layout: MetricLayout,
}

impl SonarConfig {
    pub fn resolve(env: &impl Env) -> ConfigResult<Self> {
        Self::resolve_in(env, None)
    }

    /// Same as [`SonarConfig::resolve`], but `workspace` takes precedence
    /// over `GITHUB_WORKSPACE`.
    pub fn resolve_in(env: &impl Env, workspace: Option<PathBuf>) -> ConfigResult<Self> {
        let workspace = match workspace {
            Some(workspace) => workspace,
            None => PathBuf::from(required(env, GITHUB_WORKSPACE)?),
        };
        let url = parse_url(SONAR_HOST_URL, &required(env, SONAR_HOST_URL)?)?;
        let token = required(env, SONAR_TOKEN)?;

        let defaults = MetricLayout::default();
        let custom = |name: &str| {
            env.var(name)
                .map(|list| parse_key_list(&list))
                .filter(|keys| !keys.is_empty())
        };
        let layout = MetricLayout {
            comparison: custom(SONAR_METRIC_KEYS).unwrap_or(defaults.comparison),
            overall: custom(SONAR_OVERALL_METRIC_KEYS).unwrap_or(defaults.overall),
        };
        debug!("Metric layout: {:?}", layout);

        Ok(Self {
            url,
            token,
            workspace,
            layout,
        })
    }
}

/// Everything needed to comment on the pull request.
#[derive(Debug)]
pub struct GitHubConfig {
    pub token: String,
    pub repository: Repository,
    pub api_url: Url,
}

impl GitHubConfig {
    pub fn resolve(env: &impl Env) -> ConfigResult<Self> {
        let token = required(env, GITHUB_TOKEN)?;
        let repository = required(env, GITHUB_REPOSITORY)?;
        let repository =
            Repository::new(&repository).map_err(|e| ConfigError::InvalidVar {
                name: GITHUB_REPOSITORY,
                reason: e.to_string(),
            })?;
        let api_url = match env.var(GITHUB_API_URL) {
            Some(url) => parse_url(GITHUB_API_URL, &url)?,
            None => parse_url(GITHUB_API_URL, DEFAULT_GITHUB_API_URL)?,
        };

        Ok(Self {
            token,
            repository,
            api_url,
        })
    }
}
