//! Detection of comments that already show the current scan results.
//!
//! Every comment embeds a digest of the values it displays, as an HTML comment
//! that GitHub does not render. A new comment is only posted when the digest
//! of the most recent comment from this action differs from the current one.

use std::fmt::Display;

use regex::Regex;

use crate::metrics::{MetricLayout, ResultSet};

use super::{Template, NOT_APPLICABLE};

/// Order sensitive serialization of a result set, used for equality only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultDigest(String);

impl ResultDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResultDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An existing comment on the pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub id: u64,
    pub body: String,
    /// Position in newest-first order, 0 being the most recent comment.
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The most recent comment already shows these results.
    Skip,
    /// No comment shows these results yet.
    Publish,
}

pub fn compute_digest(
    results: &ResultSet,
    layout: &MetricLayout,
    template: &Template,
) -> ResultDigest {
    let comparison = layout.comparison.iter().map(|key| {
        format!(
            "{key},{},{}",
            results.get(&key.new_code()),
            results.get(key)
        )
    });
    let overall = layout
        .overall
        .iter()
        .map(|key| format!("{key},{NOT_APPLICABLE},{}", results.get(key)));

    let fragments = comparison.chain(overall).collect::<Vec<_>>().join("|");
    ResultDigest(format!(
        "<!-- {}: \"{fragments}\" -->",
        template.digest_label
    ))
}

/// Finds the digest embedded in a comment body, if any.
pub fn extract_digest(body: &str, template: &Template) -> Option<ResultDigest> {
    let pattern = format!("<!-- {}: .* -->", regex::escape(&template.digest_label));
    // The label is escaped, so the pattern is always valid.
    let re = Regex::new(&pattern).ok()?;
    re.find(body).map(|m| ResultDigest(m.as_str().to_owned()))
}

/// Decides whether `digest` needs a new comment, given the most recent comment
/// carrying the marker of this action.
pub fn should_publish(
    digest: &ResultDigest,
    most_recent: Option<&CommentRecord>,
    template: &Template,
) -> Decision {
    let Some(comment) = most_recent else {
        return Decision::Publish;
    };

    match extract_digest(&comment.body, template) {
        Some(previous) if &previous == digest => Decision::Skip,
        _ => Decision::Publish,
    }
}
