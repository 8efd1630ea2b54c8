//! Rendering of scan results as a pull request comment.

use url::Url;

use crate::{
    metrics::{MetricKey, MetricLayout, MetricValue, ResultSet},
    properties::ProjectKey,
};

pub mod digest;

/// Placeholder for values that have no meaning for a single pull request.
pub const NOT_APPLICABLE: &str = "-";

/// Fixed strings used to recognize our own comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Visible first line of every comment. Any comment containing it is
    /// considered to have been posted by this action.
    pub marker: String,
    /// Name of the hidden HTML comment that carries the result digest.
    pub digest_label: String,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            marker: "![image](https://github.com/awilmore/tmp-composite-action/raw/master/images/sonar-logo-s.png)"
                .to_owned(),
            digest_label: "sonar_results".to_owned(),
        }
    }
}

impl Template {
    pub fn is_marked(&self, body: &str) -> bool {
        body.contains(&self.marker)
    }
}

/// Link to the measures page of a project on the scan server.
pub fn project_link(server: &Url, project: &ProjectKey) -> String {
    format!(
        "{}/component_measures?id={project}",
        server.as_str().trim_end_matches('/')
    )
}

/// Renders the comparison table, followed by the hidden result digest.
///
/// The output only depends on its inputs, so that a comment posted by a
/// previous run can be compared with the one this run would post.
pub fn format_comment(
    results: &ResultSet,
    layout: &MetricLayout,
    template: &Template,
    project_link: &str,
) -> String {
    let mut body = format!(
        "{}   **[Scan Results]({project_link})**:\n\n",
        template.marker
    );
    body.push_str("| Metric | This PR | Overall |\n");
    body.push_str("|-------|--------------|---------|\n");

    for key in &layout.comparison {
        let pr = render_value(results, key, &results.get(&key.new_code()));
        let overall = render_value(results, key, &results.get(key));
        push_row(&mut body, project_link, key, &pr, &overall);
    }

    for key in &layout.overall {
        let overall = render_value(results, key, &results.get(key));
        push_row(&mut body, project_link, key, NOT_APPLICABLE, &overall);
    }

    body.push_str(digest::compute_digest(results, layout, template).as_str());

    body.truncate(body.trim_end().len());
    body
}

fn render_value(results: &ResultSet, key: &MetricKey, value: &MetricValue) -> String {
    if results.is_percentage(key) {
        format!("{value}%")
    } else {
        value.to_string()
    }
}

fn push_row(body: &mut String, project_link: &str, key: &MetricKey, pr: &str, overall: &str) {
    body.push_str(&format!(
        "| [{key}]({project_link}&metric={key}) | {pr} | {overall} |\n"
    ));
}
