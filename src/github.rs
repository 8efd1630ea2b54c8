//! Publishing scan results on pull requests.

use tracing::debug;

use crate::{
    action::status,
    comment::{
        digest::{should_publish, CommentRecord, Decision, ResultDigest},
        Template,
    },
};

use self::api::ApiResult;

pub mod api;

/// The comments of a pull request.
pub trait CommentThread {
    /// Walks the comments from the most recent one, and returns the first one
    /// whose body `matches`. Older comments are not fetched.
    async fn find_latest(&self, matches: impl Fn(&str) -> bool)
        -> ApiResult<Option<CommentRecord>>;

    /// Appends a comment to the thread.
    async fn create(&self, body: &str) -> ApiResult<()>;
}

/// Posts `body` on the pull request, unless the most recent comment of this
/// action already carries the same `digest`.
///
/// A change in the results always adds a comment. Previous comments are left
/// untouched.
#[tracing::instrument(skip_all)]
pub async fn publish(
    thread: &impl CommentThread,
    body: &str,
    digest: &ResultDigest,
    template: &Template,
) -> ApiResult<Decision> {
    let latest = thread.find_latest(|comment| template.is_marked(comment)).await?;
    if let Some(comment) = &latest {
        debug!(
            id = comment.id,
            position = comment.position,
            "Found a previous scan comment"
        );
    }

    let decision = should_publish(digest, latest.as_ref(), template);
    match decision {
        Decision::Skip => status("Sonar scan results comment already exists. No update."),
        Decision::Publish => {
            status("Creating PR comment with latest sonar scan results");
            thread.create(body).await?;
        }
    }

    Ok(decision)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::comment::{
        digest::compute_digest,
        format_comment,
        tests::{example_layout, example_results},
    };

    /// An in-memory pull request conversation, oldest comment first.
    #[derive(Default)]
    struct FakeThread {
        comments: Mutex<Vec<String>>,
        inspected: Mutex<usize>,
    }

    impl FakeThread {
        fn with(comments: &[&str]) -> Self {
            Self {
                comments: Mutex::new(comments.iter().map(|c| c.to_string()).collect()),
                ..Default::default()
            }
        }

        fn comments(&self) -> Vec<String> {
            self.comments.lock().unwrap().clone()
        }
    }

    impl CommentThread for FakeThread {
        async fn find_latest(
            &self,
            matches: impl Fn(&str) -> bool,
        ) -> ApiResult<Option<CommentRecord>> {
            let comments = self.comments();
            for (position, body) in comments.iter().rev().enumerate() {
                *self.inspected.lock().unwrap() += 1;
                if matches(body) {
                    return Ok(Some(CommentRecord {
                        id: (comments.len() - position) as u64,
                        body: body.clone(),
                        position,
                    }));
                }
            }
            Ok(None)
        }

        async fn create(&self, body: &str) -> ApiResult<()> {
            self.comments.lock().unwrap().push(body.to_owned());
            Ok(())
        }
    }

    fn render(bugs: &str) -> (String, ResultDigest) {
        let template = Template::default();
        let results = example_results(bugs);
        let layout = example_layout();
        (
            format_comment(&results, &layout, &template, "https://sonar/p"),
            compute_digest(&results, &layout, &template),
        )
    }

    #[tokio::test]
    async fn first_run_publishes() {
        let thread = FakeThread::with(&["LGTM"]);
        let (body, digest) = render("0");

        let decision = publish(&thread, &body, &digest, &Template::default())
            .await
            .unwrap();

        assert_eq!(decision, Decision::Publish);
        assert_eq!(thread.comments(), vec!["LGTM".to_owned(), body]);
    }

    #[tokio::test]
    async fn unchanged_results_are_skipped() {
        let thread = FakeThread::default();
        let (body, digest) = render("0");
        let template = Template::default();

        publish(&thread, &body, &digest, &template).await.unwrap();
        let decision = publish(&thread, &body, &digest, &template).await.unwrap();

        assert_eq!(decision, Decision::Skip);
        assert_eq!(thread.comments().len(), 1);
    }

    #[tokio::test]
    async fn changed_results_add_a_comment() {
        let thread = FakeThread::default();
        let template = Template::default();
        let (first, first_digest) = render("0");
        let (second, second_digest) = render("1");

        publish(&thread, &first, &first_digest, &template).await.unwrap();
        let decision = publish(&thread, &second, &second_digest, &template)
            .await
            .unwrap();

        assert_eq!(decision, Decision::Publish);
        assert_eq!(thread.comments(), vec![first, second]);
    }

    #[tokio::test]
    async fn only_the_latest_scan_comment_counts() {
        let (old, _) = render("0");
        let (latest, _) = render("1");
        let thread = FakeThread::with(&[&old, &latest, "human reply", "another reply"]);
        let (body, digest) = render("0");

        // The latest scan comment shows other results, even though an older
        // one matches.
        let decision = publish(&thread, &body, &digest, &Template::default())
            .await
            .unwrap();

        assert_eq!(decision, Decision::Publish);
        assert_eq!(*thread.inspected.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn scan_comment_without_digest_is_republished() {
        let template = Template::default();
        let marked = format!("{} legacy comment", template.marker);
        let thread = FakeThread::with(&[&marked]);
        let (body, digest) = render("0");

        let decision = publish(&thread, &body, &digest, &template).await.unwrap();

        assert_eq!(decision, Decision::Publish);
        assert_eq!(thread.comments().len(), 2);
    }
}
