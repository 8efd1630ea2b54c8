//! Metric keys, values and the result set of one scan snapshot.

use std::{collections::HashSet, fmt::Display};

/// Prefix SonarQube uses for metrics scoped to the new code of a pull request.
const NEW_CODE_PREFIX: &str = "new_";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricKey(String);

impl MetricKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The `new_` variant of this key, measuring only the code changed by the PR.
    pub fn new_code(&self) -> MetricKey {
        MetricKey(format!("{NEW_CODE_PREFIX}{}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value as reported by the scan server. Kept textual so that rendering and
/// digests reproduce exactly what the server said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricValue(String);

impl MetricValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn zero() -> Self {
        Self("0".to_owned())
    }
}

impl Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which metrics are reported, and in which order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricLayout {
    /// Metrics shown both for the PR and for the whole project.
    pub comparison: Vec<MetricKey>,
    /// Metrics that only make sense for the whole project, like complexity.
    pub overall: Vec<MetricKey>,
}

impl Default for MetricLayout {
    fn default() -> Self {
        Self {
            comparison: ["coverage", "lines", "code_smells", "bugs"]
                .into_iter()
                .map(MetricKey::new)
                .collect(),
            overall: vec![MetricKey::new("complexity")],
        }
    }
}

impl MetricLayout {
    /// Keys to request from the server: each comparison key followed by its
    /// `new_` variant, then the overall keys.
    pub fn request_keys(&self) -> Vec<MetricKey> {
        let mut keys = Vec::with_capacity(self.comparison.len() * 2 + self.overall.len());
        for key in &self.comparison {
            keys.push(key.clone());
            keys.push(key.new_code());
        }
        keys.extend(self.overall.iter().cloned());
        keys
    }
}

/// Values of one scan snapshot, in the order they were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    entries: Vec<(MetricKey, MetricValue)>,
    percentages: HashSet<MetricKey>,
}

impl ResultSet {
    /// Builds a result set holding exactly `keys`, in that order. Keys without
    /// a value in `values` are set to zero.
    pub fn from_values(
        keys: &[MetricKey],
        mut values: impl FnMut(&MetricKey) -> Option<MetricValue>,
    ) -> Self {
        let entries = keys
            .iter()
            .map(|key| (key.clone(), values(key).unwrap_or_else(MetricValue::zero)))
            .collect();
        Self {
            entries,
            percentages: HashSet::new(),
        }
    }

    pub fn mark_percentage(&mut self, key: MetricKey) {
        self.percentages.insert(key);
    }

    /// Whether values of this metric are percentages. Anything about coverage
    /// is, as are metrics the server declared as such.
    pub fn is_percentage(&self, key: &MetricKey) -> bool {
        key.as_str().contains("coverage") || self.percentages.contains(key)
    }

    /// The value of a metric. Unknown metrics read as zero, so that rendering
    /// never fails on a key the server did not return.
    pub fn get(&self, key: &MetricKey) -> MetricValue {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(MetricValue::zero)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetricKey, &MetricValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl Display for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        f.write_str("}")
    }
}

/// Parses a comma separated list of metric keys, ignoring blank entries.
/// A key listed twice is kept once, at its first position.
pub fn parse_key_list(list: &str) -> Vec<MetricKey> {
    let mut seen = HashSet::new();
    list.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty() && seen.insert(*k))
        .map(MetricKey::new)
        .collect()
}
