use std::{fmt::Display, path::PathBuf};

use crate::{
    comment::{
        digest::{compute_digest, Decision, ResultDigest},
        format_comment, project_link, Template,
    },
    config::{self, ConfigError, Env, GitHubConfig, SonarConfig},
    event::{read_event, EventError},
    github::{
        self,
        api::{pr::MinimalPullRequest, ApiError, GitHub},
    },
    properties::{read_project_key, PropertiesError},
    sonar::{SonarError, SonarQube},
};

/// Prints a status line for the workflow log.
pub fn status(message: impl Display) {
    println!(" * {message}");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NotAPullRequest,
    Skipped,
    Published,
}

#[derive(Debug)]
pub enum ActionError {
    Config(ConfigError),
    Event(EventError),
    Properties(PropertiesError),
    Sonar(SonarError),
    GitHub(ApiError),
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ActionError::Config(e) => Some(e),
            ActionError::Event(e) => Some(e),
            ActionError::Properties(e) => Some(e),
            ActionError::Sonar(e) => Some(e),
            ActionError::GitHub(e) => Some(e),
        }
    }
}

impl Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionError::Config(e) => e.fmt(f),
            ActionError::Event(e) => e.fmt(f),
            ActionError::Properties(e) => e.fmt(f),
            ActionError::Sonar(e) => e.fmt(f),
            ActionError::GitHub(e) => write!(f, "GitHub API error: {e}"),
        }
    }
}

impl From<ConfigError> for ActionError {
    fn from(value: ConfigError) -> Self {
        ActionError::Config(value)
    }
}

impl From<EventError> for ActionError {
    fn from(value: EventError) -> Self {
        ActionError::Event(value)
    }
}

impl From<PropertiesError> for ActionError {
    fn from(value: PropertiesError) -> Self {
        ActionError::Properties(value)
    }
}

impl From<SonarError> for ActionError {
    fn from(value: SonarError) -> Self {
        ActionError::Sonar(value)
    }
}

impl From<ApiError> for ActionError {
    fn from(value: ApiError) -> Self {
        ActionError::GitHub(value)
    }
}

/// A rendered comment, and the digest it embeds.
pub struct Report {
    pub body: String,
    pub digest: ResultDigest,
}

/// Comments the scan results on the pull request that triggered the workflow.
pub async fn main(env: &impl Env, template: &Template) -> Result<Outcome, ActionError> {
    let event = read_event(&config::event_path(env)?)?;
    let Some(number) = event.pull_request_number() else {
        status("Not a pull request.");
        return Ok(Outcome::NotAPullRequest);
    };

    let sonar_config = SonarConfig::resolve(env)?;
    let github_config = GitHubConfig::resolve(env)?;

    let report = scan(&sonar_config, template).await?;

    let api = GitHub::new(github_config.token, github_config.api_url);
    let pr = MinimalPullRequest { number };
    let thread = pr.comments(&api, &github_config.repository);
    let decision = github::publish(&thread, &report.body, &report.digest, template).await?;

    Ok(match decision {
        Decision::Skip => Outcome::Skipped,
        Decision::Publish => Outcome::Published,
    })
}

/// Prints the comment for the current scan results, without posting it.
pub async fn preview(
    env: &impl Env,
    workspace: Option<PathBuf>,
    template: &Template,
) -> Result<(), ActionError> {
    let config = SonarConfig::resolve_in(env, workspace)?;
    let report = scan(&config, template).await?;
    println!("{}", report.body);
    Ok(())
}

/// Fetches the results of the project in the workspace and renders them.
#[tracing::instrument(skip_all)]
pub async fn scan(config: &SonarConfig, template: &Template) -> Result<Report, ActionError> {
    let project = read_project_key(&config.workspace)?;
    let sonar = SonarQube::new(config.url.clone(), config.token.clone());
    let results = sonar
        .fetch(&project, &config.layout.request_keys())
        .await?;
    status(format_args!("Sonar scan results: {results}"));

    let link = project_link(&config.url, &project);
    Ok(Report {
        body: format_comment(&results, &config.layout, template, &link),
        digest: compute_digest(&results, &config.layout, template),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::{GITHUB_EVENT_PATH, GITHUB_WORKSPACE};

    fn event_file(json: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), json).unwrap();
        file
    }

    #[tokio::test]
    async fn other_events_stop_early() {
        let file = event_file(r#"{"ref": "refs/heads/main", "commits": []}"#);
        let path = file.path().to_str().unwrap();
        // Nothing else is configured, so any further step would fail.
        let env = HashMap::from([(GITHUB_EVENT_PATH, path)]);

        let outcome = main(&env, &Template::default()).await.unwrap();
        assert_eq!(outcome, Outcome::NotAPullRequest);
    }

    #[tokio::test]
    async fn pull_requests_need_configuration() {
        let file = event_file(r#"{"pull_request": {"number": 3}}"#);
        let path = file.path().to_str().unwrap();
        let env = HashMap::from([(GITHUB_EVENT_PATH, path)]);

        let err = main(&env, &Template::default()).await.unwrap_err();
        assert!(matches!(
            err,
            ActionError::Config(ConfigError::MissingVar(GITHUB_WORKSPACE))
        ));
    }

    #[tokio::test]
    async fn missing_event_path() {
        let env: HashMap<&str, &str> = HashMap::new();
        let err = main(&env, &Template::default()).await.unwrap_err();
        assert!(matches!(
            err,
            ActionError::Config(ConfigError::MissingVar(GITHUB_EVENT_PATH))
        ));
    }

    #[tokio::test]
    async fn unreadable_event() {
        let env = HashMap::from([(GITHUB_EVENT_PATH, "/nonexistent/event.json")]);
        let err = main(&env, &Template::default()).await.unwrap_err();
        assert!(matches!(err, ActionError::Event(EventError::Io(..))));
    }
}
