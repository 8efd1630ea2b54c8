//! Querying measures from a SonarQube server.

use std::fmt::Display;

use regex::Regex;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::{
    metrics::{MetricKey, MetricValue, ResultSet},
    properties::ProjectKey,
};

/// Where to look up valid metric keys.
pub const METRIC_DEFINITIONS: &str =
    "https://docs.sonarqube.org/latest/user-guide/metric-definitions/";

#[derive(Debug)]
pub enum SonarError {
    Reqwest(reqwest::Error),
    Json(serde_json::Error),
    /// No project or no metric to ask for.
    EmptyQuery,
    /// The server does not know these metrics. This is a configuration error,
    /// asking again will not help.
    UnknownMetricKey(Vec<String>),
    Api { status: StatusCode, message: String },
}

impl std::error::Error for SonarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SonarError::Reqwest(e) => Some(e),
            SonarError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for SonarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SonarError::Reqwest(e) => write!(f, "Network error: {:?}", e),
            SonarError::Json(e) => write!(f, "JSON ser/de error: {:?}", e),
            SonarError::EmptyQuery => write!(f, "a project key and metric keys are required"),
            SonarError::UnknownMetricKey(keys) => {
                write!(f, "unknown sonar metric key: key={}", keys.join(", "))
            }
            SonarError::Api { status, message } => {
                write!(f, "SonarQube responded with {status}: {message}")
            }
        }
    }
}

impl From<reqwest::Error> for SonarError {
    fn from(value: reqwest::Error) -> Self {
        SonarError::Reqwest(value)
    }
}

impl From<serde_json::Error> for SonarError {
    fn from(value: serde_json::Error) -> Self {
        SonarError::Json(value)
    }
}

/// A SonarQube API client
pub struct SonarQube {
    token: String,
    base: Url,
    req: reqwest::Client,
}

impl SonarQube {
    pub fn new(base: Url, token: String) -> Self {
        Self {
            token,
            base,
            req: reqwest::Client::new(),
        }
    }

    fn get(&self, path: impl AsRef<str>) -> RequestBuilder {
        let url = format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            path.as_ref()
        );
        debug!("API URL: {}", url);
        self.req
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
    }

    /// One query for all of `keys`, in order.
    fn measures(&self, project: &ProjectKey, keys: &[MetricKey]) -> RequestBuilder {
        let metric_keys = keys
            .iter()
            .map(MetricKey::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.get("api/measures/component").query(&[
            ("component", project.as_str()),
            ("metricKeys", metric_keys.as_str()),
            ("additionalFields", "metrics,periods"),
        ])
    }

    /// Fetches the current value of each metric in `keys`. Metrics the server
    /// has no value for are set to zero.
    #[tracing::instrument(skip(self, keys))]
    pub async fn fetch(
        &self,
        project: &ProjectKey,
        keys: &[MetricKey],
    ) -> Result<ResultSet, SonarError> {
        if project.as_str().is_empty() || keys.is_empty() {
            return Err(SonarError::EmptyQuery);
        }

        let response = self.measures(project, keys).send().await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(
            "SonarQube said: {}",
            std::str::from_utf8(&bytes).unwrap_or("[INVALID UTF8]")
        );

        if !status.is_success() {
            return Err(parse_error(status, &bytes));
        }
        parse_measures(&bytes, keys)
    }
}

#[derive(Deserialize)]
struct MeasuresResponse {
    component: Component,
    #[serde(default)]
    metrics: Vec<MetricDefinition>,
}

#[derive(Deserialize)]
struct Component {
    #[serde(default)]
    measures: Vec<Measure>,
}

#[derive(Deserialize)]
struct Measure {
    metric: String,
    #[serde(default)]
    value: Option<String>,
    /// Value on the new code period, for `new_*` metrics.
    #[serde(default)]
    period: Option<PeriodValue>,
    /// Same as `period`, as reported by older servers.
    #[serde(default)]
    periods: Vec<PeriodValue>,
}

impl Measure {
    fn value(self) -> Option<String> {
        self.period
            .and_then(|p| p.value)
            .or_else(|| self.periods.into_iter().find_map(|p| p.value))
            .or(self.value)
    }
}

#[derive(Deserialize)]
struct PeriodValue {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Deserialize)]
struct MetricDefinition {
    key: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<ErrorMessage>,
}

#[derive(Deserialize)]
struct ErrorMessage {
    msg: String,
}

fn parse_measures(body: &[u8], keys: &[MetricKey]) -> Result<ResultSet, SonarError> {
    let response: MeasuresResponse = serde_json::from_slice(body)?;

    let values: Vec<(String, String)> = response
        .component
        .measures
        .into_iter()
        .filter_map(|m| {
            let metric = m.metric.clone();
            m.value().map(|v| (metric, v))
        })
        .collect();

    let mut results = ResultSet::from_values(keys, |key| {
        values
            .iter()
            .find(|(metric, _)| metric == key.as_str())
            .map(|(_, value)| MetricValue::new(value.as_str()))
    });

    for metric in response.metrics {
        if metric.kind.as_deref() == Some("PERCENT") {
            results.mark_percentage(MetricKey::new(metric.key));
        }
    }

    Ok(results)
}

fn parse_error(status: StatusCode, body: &[u8]) -> SonarError {
    let messages = serde_json::from_slice::<ErrorResponse>(body)
        .map(|r| r.errors.into_iter().map(|e| e.msg).collect::<Vec<_>>())
        .unwrap_or_default();

    if status == StatusCode::NOT_FOUND {
        let unknown = Regex::new("The following metric keys are not found: (.*)$")
            .ok()
            .and_then(|re| {
                messages
                    .iter()
                    .find_map(|msg| re.captures(msg)?.get(1).map(|m| m.as_str().to_owned()))
            });
        if let Some(unknown) = unknown {
            return SonarError::UnknownMetricKey(
                unknown
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_owned)
                    .collect(),
            );
        }
    }

    let message = if messages.is_empty() {
        String::from_utf8_lossy(body).into_owned()
    } else {
        messages.join("; ")
    };
    SonarError::Api { status, message }
}
