use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FaultlineError;

/// Feature column names, in output order.
pub mod feature {
    /// Number of code smells reported for the method.
    pub const CODE_SMELLS: &str = "CodeSmells";
    /// McCabe cyclomatic complexity.
    pub const CYCLOMATIC_COMPLEXITY: &str = "CyclomaticComplexity";
    /// Number of declared parameters.
    pub const PARAMETER_COUNT: &str = "ParameterCount";
    /// Maximum block nesting depth.
    pub const NESTING_DEPTH: &str = "NestingDepth";
    /// Number of revisions touching the method.
    pub const REVISIONS: &str = "NR";
    /// Number of distinct authors.
    pub const AUTHORS: &str = "NAuth";
    /// Statements added across revisions.
    pub const STMT_ADDED: &str = "stmtAdded";
    /// Statements deleted across revisions.
    pub const STMT_DELETED: &str = "stmtDeleted";
    /// Largest single-revision churn.
    pub const MAX_CHURN: &str = "maxChurn";
    /// Mean churn per revision.
    pub const AVG_CHURN: &str = "avgChurn";

    /// Every feature emitted into the dataset, in column order.
    pub const ALL: [&str; 10] = [
        CODE_SMELLS,
        CYCLOMATIC_COMPLEXITY,
        PARAMETER_COUNT,
        NESTING_DEPTH,
        REVISIONS,
        AUTHORS,
        STMT_ADDED,
        STMT_DELETED,
        MAX_CHURN,
        AVG_CHURN,
    ];
}

/// A named release on the project timeline.
///
/// `index` is a dense 1-based ordinal matching chronological order.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use faultline_core::Release;
///
/// let r = Release::new("4.1.0", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 1);
/// assert_eq!(r.to_string(), "4.1.0 (#1, 2020-01-01)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Release {
    /// Release name, e.g. a tag or tracker version label.
    pub name: String,
    /// Release date.
    pub date: NaiveDate,
    /// Chronological ordinal, starting at 1.
    pub index: u32,
}

impl Release {
    /// Create a release.
    pub fn new(name: impl Into<String>, date: NaiveDate, index: u32) -> Self {
        Self {
            name: name.into(),
            date,
            index,
        }
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{}, {})", self.name, self.index, self.date)
    }
}

/// Releases in verified ascending chronological order.
///
/// Every consumer that walks releases "in order" takes a timeline rather than
/// a bare slice, so ordering is checked once when the timeline is built.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use faultline_core::ReleaseTimeline;
///
/// let d = |m| NaiveDate::from_ymd_opt(2020, m, 1).unwrap();
/// let timeline = ReleaseTimeline::from_dated(vec![("1.1", d(6)), ("1.0", d(1))]);
/// assert_eq!(timeline.by_index(1).unwrap().name, "1.0");
/// assert_eq!(timeline.last().unwrap().index, 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseTimeline {
    releases: Vec<Release>,
}

impl ReleaseTimeline {
    /// Build a timeline from already-indexed releases.
    ///
    /// Releases are sorted by date; the result is rejected if index order
    /// disagrees with date order or an index is not unique and positive.
    ///
    /// # Errors
    ///
    /// Returns [`FaultlineError::Timeline`] when the releases are inconsistent.
    pub fn new(mut releases: Vec<Release>) -> Result<Self, FaultlineError> {
        releases.sort_by(|a, b| a.date.cmp(&b.date).then(a.index.cmp(&b.index)));

        if let Some(zero) = releases.iter().find(|r| r.index == 0) {
            return Err(FaultlineError::Timeline(format!(
                "release {} has index 0; indices start at 1",
                zero.name
            )));
        }
        for pair in releases.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.index <= prev.index {
                return Err(FaultlineError::Timeline(format!(
                    "release {} (#{}, {}) is not after {} (#{}, {})",
                    next.name, next.index, next.date, prev.name, prev.index, prev.date
                )));
            }
        }

        Ok(Self { releases })
    }

    /// Build a timeline from `(name, date)` pairs, assigning dense indices
    /// `1..=n` by date. Ties keep their input order.
    pub fn from_dated<S: Into<String>>(dated: Vec<(S, NaiveDate)>) -> Self {
        let mut dated: Vec<(String, NaiveDate)> =
            dated.into_iter().map(|(n, d)| (n.into(), d)).collect();
        dated.sort_by_key(|(_, date)| *date);

        let releases = dated
            .into_iter()
            .zip(1u32..)
            .map(|((name, date), index)| Release { name, date, index })
            .collect();
        Self { releases }
    }

    /// Number of releases.
    pub fn len(&self) -> usize {
        self.releases.len()
    }

    /// Whether the timeline has no releases.
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// Releases in ascending order.
    pub fn iter(&self) -> std::slice::Iter<'_, Release> {
        self.releases.iter()
    }

    /// Releases as a slice, ascending.
    pub fn as_slice(&self) -> &[Release] {
        &self.releases
    }

    /// The most recent release.
    pub fn last(&self) -> Option<&Release> {
        self.releases.last()
    }

    /// Look a release up by name.
    pub fn by_name(&self, name: &str) -> Option<&Release> {
        self.releases.iter().find(|r| r.name == name)
    }

    /// Look a release up by its index.
    pub fn by_index(&self, index: u32) -> Option<&Release> {
        self.releases.iter().find(|r| r.index == index)
    }
}

impl<'a> IntoIterator for &'a ReleaseTimeline {
    type Item = &'a Release;
    type IntoIter = std::slice::Iter<'a, Release>;

    fn into_iter(self) -> Self::IntoIter {
        self.releases.iter()
    }
}

/// Inclusive 1-based line range of a method in its file.
///
/// # Examples
///
/// ```
/// use faultline_core::LineSpan;
///
/// let method = LineSpan::new(10, 20);
/// assert!(method.overlaps(&LineSpan::new(20, 25)));
/// assert!(!method.overlaps(&LineSpan::new(21, 25)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSpan {
    /// First line.
    pub start: u32,
    /// Last line, inclusive.
    pub end: u32,
}

impl LineSpan {
    /// Create a span; the bounds are swapped if given in reverse.
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// Whether two spans share at least one line.
    pub fn overlaps(&self, other: &LineSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// A method measured by the external static analyzer in one release.
///
/// Values are immutable once constructed; the assembler only reads them.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use faultline_core::AnalyzedMethod;
///
/// let m = AnalyzedMethod::new(
///     "org.acme.Parser.parse",
///     "parse(String)",
///     "src/org/acme/Parser.java",
///     BTreeMap::from([("CyclomaticComplexity".to_string(), 4.0)]),
/// );
/// assert_eq!(m.method_key(), "src/org/acme/Parser.java::parse(String)");
/// assert_eq!(m.method_name(), "src/org/acme/Parser.java/parse(String)");
/// assert_eq!(m.feature("CyclomaticComplexity"), 4.0);
/// assert_eq!(m.feature("NR"), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedMethod {
    identity: String,
    signature: String,
    filepath: String,
    #[serde(default)]
    span: Option<LineSpan>,
    #[serde(default, deserialize_with = "lenient_features")]
    features: BTreeMap<String, f64>,
}

/// Keep finite numeric features (numbers or numeric strings); `null` and
/// anything else reads as absent.
fn lenient_features<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| {
            let number = match &value {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            number.filter(|v| v.is_finite()).map(|v| (name, v))
        })
        .collect())
}

impl AnalyzedMethod {
    /// Create a method without line information.
    pub fn new(
        identity: impl Into<String>,
        signature: impl Into<String>,
        filepath: impl Into<String>,
        features: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            identity: identity.into(),
            signature: signature.into(),
            filepath: filepath.into(),
            span: None,
            features,
        }
    }

    /// Attach the method's line range.
    pub fn with_span(mut self, span: LineSpan) -> Self {
        self.span = Some(span);
        self
    }

    /// Analyzer-provided identity (usually the qualified name).
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Method signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// File path relative to the repository root.
    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    /// Line range, when the analyzer reported one.
    pub fn span(&self) -> Option<LineSpan> {
        self.span
    }

    /// Key used to attribute fixes to methods: `filepath::signature`.
    pub fn method_key(&self) -> String {
        format!("{}::{}", self.filepath, self.signature)
    }

    /// Display name used in the dataset: `filepath/signature`.
    pub fn method_name(&self) -> String {
        format!("{}/{}", self.filepath, self.signature)
    }

    /// Feature value by name; absent features read as zero.
    pub fn feature(&self, name: &str) -> f64 {
        self.features.get(name).copied().unwrap_or(0.0)
    }

    /// All reported features.
    pub fn features(&self) -> &BTreeMap<String, f64> {
        &self.features
    }
}

/// Format for command summaries printed to stdout.
///
/// # Examples
///
/// ```
/// use faultline_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn timeline_sorts_by_date() {
        let timeline = ReleaseTimeline::new(vec![
            Release::new("R2", d(2020, 6, 1), 2),
            Release::new("R1", d(2020, 1, 1), 1),
        ])
        .unwrap();
        let names: Vec<_> = timeline.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["R1", "R2"]);
    }

    #[test]
    fn timeline_rejects_index_date_disagreement() {
        let err = ReleaseTimeline::new(vec![
            Release::new("R1", d(2020, 1, 1), 2),
            Release::new("R2", d(2020, 6, 1), 1),
        ])
        .unwrap_err();
        assert!(matches!(err, FaultlineError::Timeline(_)));
    }

    #[test]
    fn timeline_rejects_duplicate_and_zero_indices() {
        assert!(ReleaseTimeline::new(vec![
            Release::new("R1", d(2020, 1, 1), 1),
            Release::new("R1b", d(2020, 1, 1), 1),
        ])
        .is_err());
        assert!(ReleaseTimeline::new(vec![Release::new("R0", d(2020, 1, 1), 0)]).is_err());
    }

    #[test]
    fn from_dated_assigns_dense_indices() {
        let timeline = ReleaseTimeline::from_dated(vec![
            ("c", d(2021, 1, 1)),
            ("a", d(2019, 1, 1)),
            ("b", d(2020, 1, 1)),
        ]);
        let indexed: Vec<_> = timeline
            .iter()
            .map(|r| (r.name.as_str(), r.index))
            .collect();
        assert_eq!(indexed, [("a", 1), ("b", 2), ("c", 3)]);
        assert_eq!(timeline.by_name("b").map(|r| r.index), Some(2));
        assert!(timeline.by_index(4).is_none());
    }

    #[test]
    fn line_span_normalizes_bounds() {
        let span = LineSpan::new(9, 3);
        assert_eq!((span.start, span.end), (3, 9));
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn method_deserializes_with_defaults() {
        let json = r#"{"identity":"A.f","signature":"f()","filepath":"A.java"}"#;
        let m: AnalyzedMethod = serde_json::from_str(json).unwrap();
        assert!(m.span().is_none());
        assert!(m.features().is_empty());
        assert_eq!(m.feature("NR"), 0.0);
    }

    #[test]
    fn unusable_feature_values_read_as_absent() {
        let json = r#"{"identity":"A.f","signature":"f()","filepath":"A.java",
            "features":{"NR":null,"NAuth":"n/a","CodeSmells":"2","maxChurn":7.5,"stmtAdded":[1]}}"#;
        let m: AnalyzedMethod = serde_json::from_str(json).unwrap();
        assert_eq!(m.features().len(), 2);
        assert_eq!(m.feature("NR"), 0.0);
        assert_eq!(m.feature("NAuth"), 0.0);
        assert_eq!(m.feature("CodeSmells"), 2.0);
        assert_eq!(m.feature("maxChurn"), 7.5);
    }

    #[test]
    fn null_feature_map_is_empty() {
        let json = r#"{"identity":"A.f","signature":"f()","filepath":"A.java","features":null}"#;
        let m: AnalyzedMethod = serde_json::from_str(json).unwrap();
        assert!(m.features().is_empty());
    }
}
