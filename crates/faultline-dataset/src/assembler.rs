//! Release iteration, deduplication and row construction.

use std::collections::HashSet;

use faultline_core::{feature, AnalyzedMethod, BugReport, FaultlineError, ReleaseTimeline};
use serde::Serialize;

use crate::labeler::{is_buggy_at, FixedMethodMap};
use crate::source::MethodSource;
use crate::table::{FeatureRow, FeatureTable};

/// Methods at or below this complexity, parameter count and nesting depth
/// (all three at once) are excluded as trivial.
pub const TRIVIAL_THRESHOLD: f64 = 1.0;

/// Counters describing one assembly run.
///
/// # Examples
///
/// ```
/// use faultline_dataset::assembler::AssemblyReport;
///
/// let report = AssemblyReport::default();
/// assert_eq!(report.rows, 0);
/// assert!(report.releases_skipped.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyReport {
    /// Releases on the full timeline.
    pub releases_total: usize,
    /// Releases inside the cutoff that produced a snapshot.
    pub releases_analyzed: usize,
    /// Releases inside the cutoff with no resolvable snapshot.
    pub releases_skipped: Vec<String>,
    /// Rows emitted.
    pub rows: usize,
    /// Rows labeled buggy.
    pub buggy_rows: usize,
    /// Methods dropped as repeated `(method, release)` keys.
    pub duplicates: usize,
    /// Methods excluded by the trivial-method filter.
    pub trivial_methods: usize,
}

/// Builds the raw, unpruned feature table for one project.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use chrono::NaiveDate;
/// use faultline_core::{AnalyzedMethod, ReleaseTimeline};
/// use faultline_dataset::assembler::DatasetAssembler;
/// use faultline_dataset::labeler::FixedMethodMap;
///
/// let timeline = ReleaseTimeline::from_dated(vec![
///     ("1.0", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()),
///     ("1.1", NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()),
/// ]);
/// let method = AnalyzedMethod::new(
///     "A.f", "f(int)", "A.java",
///     BTreeMap::from([("CyclomaticComplexity".to_string(), 3.0)]),
/// );
/// let mut snapshots = BTreeMap::from([("1.0".to_string(), vec![method])]);
/// let fixed = FixedMethodMap::new();
///
/// let (table, report) = DatasetAssembler::new("AVRO", &timeline, &[], &fixed)
///     .with_cutoff(0.5)
///     .assemble(&mut snapshots)
///     .unwrap();
/// assert_eq!(table.len(), 1);
/// assert_eq!(report.releases_analyzed, 1);
/// ```
#[derive(Debug, Clone)]
pub struct DatasetAssembler<'a> {
    project: String,
    timeline: &'a ReleaseTimeline,
    tickets: &'a [BugReport],
    fixed_methods: &'a FixedMethodMap,
    cutoff_fraction: f64,
}

impl<'a> DatasetAssembler<'a> {
    /// Assembler over the whole timeline; tickets must already carry
    /// resolved version indices.
    pub fn new(
        project: impl Into<String>,
        timeline: &'a ReleaseTimeline,
        tickets: &'a [BugReport],
        fixed_methods: &'a FixedMethodMap,
    ) -> Self {
        Self {
            project: project.into(),
            timeline,
            tickets,
            fixed_methods,
            cutoff_fraction: 1.0,
        }
    }

    /// Only analyze the oldest `fraction` of the timeline.
    pub fn with_cutoff(mut self, fraction: f64) -> Self {
        self.cutoff_fraction = fraction;
        self
    }

    /// Walk the analyzed releases in order and build the table.
    ///
    /// # Errors
    ///
    /// Propagates errors from `source`; a release without a snapshot is
    /// skipped rather than treated as an error.
    pub fn assemble<S>(&self, source: &mut S) -> Result<(FeatureTable, AssemblyReport), FaultlineError>
    where
        S: MethodSource + ?Sized,
    {
        let limit = analyzed_release_count(self.timeline.len(), self.cutoff_fraction);
        let mut table = FeatureTable::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut report = AssemblyReport {
            releases_total: self.timeline.len(),
            ..AssemblyReport::default()
        };

        for release in self.timeline.iter().take(limit) {
            let Some(methods) = source.methods_for_release(release)? else {
                tracing::warn!(release = %release.name, "no method snapshot; release skipped");
                report.releases_skipped.push(release.name.clone());
                continue;
            };
            report.releases_analyzed += 1;
            tracing::debug!(release = %release.name, methods = methods.len(), "assembling release");

            for method in &methods {
                let method_name = method.method_name();
                if !seen.insert(format!("{method_name}|{}", release.name)) {
                    report.duplicates += 1;
                    continue;
                }
                if is_trivial(method) {
                    report.trivial_methods += 1;
                    continue;
                }

                let buggy = is_buggy_at(method, release, self.tickets, self.fixed_methods);
                if buggy {
                    report.buggy_rows += 1;
                }
                table.push(FeatureRow {
                    project: self.project.clone(),
                    method_name,
                    release: release.name.clone(),
                    values: feature_values(method),
                    buggy,
                });
            }
        }

        report.rows = table.len();
        if report.duplicates > 0 {
            tracing::warn!(duplicates = report.duplicates, "dropped duplicate method rows");
        }
        tracing::info!(
            project = %self.project,
            releases = report.releases_analyzed,
            skipped = report.releases_skipped.len(),
            rows = report.rows,
            buggy = report.buggy_rows,
            "assembled dataset"
        );
        Ok((table, report))
    }
}

/// Number of releases analyzed: `ceil(total * fraction)`, at most `total`.
///
/// A tiny tolerance absorbs float noise, so `10 * 0.3` analyzes 3
/// releases rather than 4.
pub fn analyzed_release_count(total: usize, fraction: f64) -> usize {
    if total == 0 || fraction.is_nan() || fraction <= 0.0 {
        return 0;
    }
    let count = (total as f64 * fraction - 1e-9).ceil();
    (count.max(0.0) as usize).min(total)
}

/// Whether `method` is an accessor-like method excluded from the dataset.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use faultline_core::AnalyzedMethod;
/// use faultline_dataset::assembler::is_trivial;
///
/// let getter = AnalyzedMethod::new("A.get", "get()", "A.java", BTreeMap::from([
///     ("CyclomaticComplexity".to_string(), 1.0),
///     ("NestingDepth".to_string(), 1.0),
/// ]));
/// assert!(is_trivial(&getter));
/// ```
pub fn is_trivial(method: &AnalyzedMethod) -> bool {
    method.feature(feature::CYCLOMATIC_COMPLEXITY) <= TRIVIAL_THRESHOLD
        && method.feature(feature::PARAMETER_COUNT) <= TRIVIAL_THRESHOLD
        && method.feature(feature::NESTING_DEPTH) <= TRIVIAL_THRESHOLD
}

/// Formatted feature cells in column order; missing features read as 0.
pub fn feature_values(method: &AnalyzedMethod) -> Vec<String> {
    feature::ALL
        .iter()
        .map(|&name| {
            let value = method.feature(name);
            if name == feature::AVG_CHURN {
                format!("{value:.2}")
            } else {
                format!("{}", value.round() as i64)
            }
        })
        .collect()
}
