use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{comment::digest::CommentRecord, github::CommentThread};

use super::{ApiError, ApiResult, GitHub, JsonExt, Repository};

/// Maximum page size of the GitHub REST API.
const PER_PAGE: u64 = 100;

#[derive(Clone, Copy, Debug)]
pub struct MinimalPullRequest {
    pub number: u64,
}

impl MinimalPullRequest {
    /// Comments of this pull request, in `repository`.
    pub fn comments<'a>(
        &self,
        api: &'a GitHub,
        repository: &'a Repository,
    ) -> PullRequestComments<'a> {
        PullRequestComments {
            api,
            repository,
            number: self.number,
        }
    }
}

/// The conversation of a pull request. On GitHub, these are the comments of
/// the issue backing the pull request.
pub struct PullRequestComments<'a> {
    api: &'a GitHub,
    repository: &'a Repository,
    number: u64,
}

#[derive(Deserialize)]
struct Issue {
    /// Number of comments on the issue.
    comments: u64,
}

#[derive(Clone, Deserialize)]
struct IssueComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Serialize)]
struct NewComment<'a> {
    body: &'a str,
}

impl PullRequestComments<'_> {
    fn path(&self) -> String {
        format!(
            "repos/{owner}/{repo}/issues/{number}",
            owner = self.repository.owner(),
            repo = self.repository.name(),
            number = self.number,
        )
    }

    async fn issue(&self) -> ApiResult<Issue> {
        self.api.get(self.path()).send().await?.parse_json().await
    }

    async fn page(&self, page: u64) -> ApiResult<Vec<IssueComment>> {
        self.api
            .get(format!("{}/comments", self.path()))
            .query(&[("per_page", PER_PAGE), ("page", page)])
            .send()
            .await?
            .parse_json()
            .await
    }
}

impl CommentThread for PullRequestComments<'_> {
    /// Comments are listed oldest first, so pages are read from the last one
    /// backwards, and each page is scanned in reverse.
    #[tracing::instrument(skip_all, fields(pr = self.number))]
    async fn find_latest(
        &self,
        matches: impl Fn(&str) -> bool,
    ) -> ApiResult<Option<CommentRecord>> {
        let issue = self.issue().await?;
        debug!("{} comments on the pull request", issue.comments);

        newest_first(last_page(issue.comments), move |page| self.page(page), matches).await
    }

    #[tracing::instrument(skip_all, fields(pr = self.number))]
    async fn create(&self, body: &str) -> ApiResult<()> {
        let response = self
            .api
            .post(format!("{}/comments", self.path()))
            .json(&NewComment { body })
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::CREATED {
            return Err(ApiError::UnexpectedResponse(response.text().await?));
        }

        let created: IssueComment = response.parse_json().await?;
        debug!("Created comment {}", created.id);
        Ok(())
    }
}

/// Index of the last page of comments. There is always at least one page,
/// even if it is empty.
fn last_page(comments: u64) -> u64 {
    comments.div_ceil(PER_PAGE).max(1)
}

/// Walks pages `last..=1` in that order, each page in reverse, and returns the
/// first comment whose body `matches`. No page older than the match is loaded.
async fn newest_first<F, Fut>(
    last: u64,
    mut load: F,
    matches: impl Fn(&str) -> bool,
) -> ApiResult<Option<CommentRecord>>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = ApiResult<Vec<IssueComment>>>,
{
    let mut position = 0;
    for page in (1..=last).rev() {
        for comment in load(page).await?.into_iter().rev() {
            let body = comment.body.unwrap_or_default();
            if matches(&body) {
                return Ok(Some(CommentRecord {
                    id: comment.id,
                    body,
                    position,
                }));
            }
            position += 1;
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// `count` comments with ids `1..=count`, split in pages as GitHub does.
    fn pages(count: u64, marked: &[u64]) -> Vec<Vec<IssueComment>> {
        let comments: Vec<_> = (1..=count)
            .map(|id| IssueComment {
                id,
                body: Some(if marked.contains(&id) {
                    format!("MARK {id}")
                } else {
                    format!("comment {id}")
                }),
            })
            .collect();
        comments.chunks(PER_PAGE as usize).map(<[_]>::to_vec).collect()
    }

    /// Runs the walk over `count` comments, returning the match and the pages
    /// that were requested.
    async fn walk(count: u64, marked: &[u64]) -> (Option<CommentRecord>, Vec<u64>) {
        let pages = pages(count, marked);
        let requested = Mutex::new(Vec::new());
        let found = newest_first(
            last_page(count),
            |page| {
                requested.lock().unwrap().push(page);
                let comments = pages.get(page as usize - 1).cloned().unwrap_or_default();
                async move { Ok(comments) }
            },
            |body| body.starts_with("MARK"),
        )
        .await
        .unwrap();
        (found, requested.into_inner().unwrap())
    }

    #[tokio::test]
    async fn stops_at_the_newest_match() {
        let (found, requested) = walk(250, &[20, 150]).await;
        let found = found.unwrap();
        assert_eq!(found.id, 150);
        assert_eq!(found.body, "MARK 150");
        // 50 comments on page 3, then 200..=151 on page 2.
        assert_eq!(found.position, 100);
        assert_eq!(requested, [3, 2]);
    }

    #[tokio::test]
    async fn reads_every_page_without_a_match() {
        let (found, requested) = walk(250, &[]).await;
        assert!(found.is_none());
        assert_eq!(requested, [3, 2, 1]);

        let (found, requested) = walk(0, &[]).await;
        assert!(found.is_none());
        assert_eq!(requested, [1]);
    }

    #[tokio::test]
    async fn match_on_the_first_page() {
        let (found, requested) = walk(250, &[1]).await;
        let found = found.unwrap();
        assert_eq!(found.id, 1);
        assert_eq!(found.position, 249);
        assert_eq!(requested, [3, 2, 1]);
    }

    #[test]
    fn page_count() {
        assert_eq!(last_page(0), 1);
        assert_eq!(last_page(1), 1);
        assert_eq!(last_page(100), 1);
        assert_eq!(last_page(101), 2);
        assert_eq!(last_page(250), 3);
    }

    #[test]
    fn comments_without_body() {
        let comments: Vec<IssueComment> =
            serde_json::from_str(r#"[{"id": 1, "body": "hi"}, {"id": 2}, {"id": 3, "body": null}]"#)
                .unwrap();
        assert_eq!(comments.len(), 3);
        assert_eq!(comments[0].body.as_deref(), Some("hi"));
        assert!(comments[1].body.is_none());
        assert!(comments[2].body.is_none());
    }
}
