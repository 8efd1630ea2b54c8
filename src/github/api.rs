//! Interact with the GitHub REST API.

use std::fmt::Display;

use eyre::Error;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;
use url::Url;

pub mod pr;

#[derive(Debug)]
pub enum ApiError {
    Reqwest(reqwest::Error),
    Json(serde_json::Error),
    UnexpectedResponse(String),
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Reqwest(e) => Some(e),
            ApiError::Json(e) => Some(e),
            ApiError::UnexpectedResponse(_) => None,
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Reqwest(e) => write!(f, "Network error: {:?}", e),
            ApiError::Json(e) => write!(f, "JSON ser/de error: {:?}", e),
            ApiError::UnexpectedResponse(e) => write!(f, "Unexpected response: {:?}", e),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        ApiError::Reqwest(value)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::Json(value)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Authentication for the GitHub API using the token of the workflow run.
pub struct AuthToken(String);

impl Display for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A GitHub API client
pub struct GitHub {
    auth: AuthToken,
    base: Url,
    req: reqwest::Client,
}

impl GitHub {
    pub fn new(token: String, base: Url) -> Self {
        Self {
            auth: AuthToken(token),
            base,
            req: reqwest::Client::new(),
        }
    }

    fn get(&self, url: impl AsRef<str>) -> RequestBuilder {
        self.with_headers(self.req.get(self.url(url)))
    }

    fn post(&self, url: impl AsRef<str>) -> RequestBuilder {
        self.with_headers(self.req.post(self.url(url)))
    }

    fn with_headers(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(self.auth.to_string())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", "Sonar PR comment")
    }

    fn url<S: AsRef<str>>(&self, path: S) -> String {
        let u = format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            path.as_ref()
        );
        debug!("API URL: {}", u);
        u
    }
}

#[derive(Debug)]
pub struct OwnerId(String);

#[derive(Debug)]
pub struct RepoId(String);

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A repository, as `owner/name`.
#[derive(Debug, Clone)]
pub struct Repository {
    full_name: String,
}

impl Repository {
    pub fn new(name: &str) -> eyre::Result<Self> {
        match name.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => Ok(Self {
                full_name: name.to_owned(),
            }),
            _ => Err(Error::msg("Invalid repository path")),
        }
    }

    pub fn owner(&self) -> OwnerId {
        OwnerId(self.parts().0.to_owned())
    }

    pub fn name(&self) -> RepoId {
        RepoId(self.parts().1.to_owned())
    }

    fn parts(&self) -> (&str, &str) {
        // Checked on construction.
        self.full_name
            .split_once('/')
            .unwrap_or((&self.full_name, ""))
    }
}

impl Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_name)
    }
}

trait JsonExt {
    async fn parse_json<T: for<'a> Deserialize<'a>>(self) -> Result<T, ApiError>;
}

impl JsonExt for Response {
    async fn parse_json<T: for<'a> Deserialize<'a>>(self) -> Result<T, ApiError> {
        let status = self.status();
        let bytes = self.bytes().await?;

        debug!(
            "Parsing JSON: {}",
            std::str::from_utf8(&bytes).unwrap_or("[INVALID UTF8]")
        );

        if !status.is_success() {
            return Err(ApiError::UnexpectedResponse(format!(
                "{status}: {}",
                String::from_utf8_lossy(&bytes)
            )));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repositories() {
        let repo = Repository::new("acme/widgets").unwrap();
        assert_eq!(repo.owner().to_string(), "acme");
        assert_eq!(repo.name().to_string(), "widgets");
        assert_eq!(repo.to_string(), "acme/widgets");

        assert!(Repository::new("widgets").is_err());
        assert!(Repository::new("/widgets").is_err());
        assert!(Repository::new("acme/").is_err());
    }

    #[test]
    fn urls_are_relative_to_the_api_base() {
        let api = GitHub::new(
            "token".into(),
            Url::parse("https://ghe.example.com/api/v3/").unwrap(),
        );
        assert_eq!(
            api.url("repos/acme/widgets/issues/1/comments"),
            "https://ghe.example.com/api/v3/repos/acme/widgets/issues/1/comments"
        );
    }
}
