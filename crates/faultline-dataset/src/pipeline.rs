//! One complete dataset-generation run.
//!
//! Version attribution → fix attribution → proportion → introduction
//! estimation → assembly → column pruning. The run is all-or-nothing: any
//! error surfaces as [`FaultlineError::Generation`] naming the project.

use std::path::{Path, PathBuf};

use faultline_core::{BugReport, FaultlineError, ReleaseTimeline, TableFormat};
use serde::Serialize;

use crate::assembler::{AssemblyReport, DatasetAssembler};
use crate::indexer::assign_ticket_versions;
use crate::labeler::FixedMethodMap;
use crate::proportion::{estimate_proportion, proportion_samples, resolve_all};
use crate::source::MethodSource;
use crate::table::{output_path, write_atomic, FeatureTable};
use crate::variance::prune_low_variance_columns;

/// Links tickets to the methods their fixes touched.
pub trait FixAttribution {
    /// Record each ticket's fix commit where one can be found.
    ///
    /// Returns the number of tickets that carry a fix commit afterwards.
    fn resolve_fix_commits(&mut self, tickets: &mut [BugReport]) -> Result<usize, FaultlineError>;

    /// Ticket key → method keys touched by the ticket's fix.
    ///
    /// Tickets arrive with opening and fixed versions assigned.
    fn map_fixed_methods(
        &mut self,
        tickets: &[BugReport],
        timeline: &ReleaseTimeline,
        source: &mut dyn MethodSource,
    ) -> Result<FixedMethodMap, FaultlineError>;
}

/// A precomputed mapping; fix commits are taken as already recorded.
impl FixAttribution for FixedMethodMap {
    fn resolve_fix_commits(&mut self, tickets: &mut [BugReport]) -> Result<usize, FaultlineError> {
        Ok(tickets.iter().filter(|t| t.fix_commit.is_some()).count())
    }

    fn map_fixed_methods(
        &mut self,
        _tickets: &[BugReport],
        _timeline: &ReleaseTimeline,
        _source: &mut dyn MethodSource,
    ) -> Result<FixedMethodMap, FaultlineError> {
        Ok(self.clone())
    }
}

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    /// Project name written into every row.
    pub project: String,
    /// Release timeline.
    pub timeline: ReleaseTimeline,
    /// Tickets as exported from the tracker.
    pub tickets: Vec<BugReport>,
    /// Fraction of the timeline to analyze, oldest first.
    pub cutoff_fraction: f64,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    /// Project name.
    pub project: String,
    /// Tickets considered.
    pub tickets: usize,
    /// Tickets with a fix commit.
    pub fix_commits: usize,
    /// Tickets whose introduction came from affected versions.
    pub grounded_introductions: usize,
    /// Tickets contributing to the proportion estimate.
    pub proportion_samples: usize,
    /// Median proportion used for estimation.
    pub proportion: f64,
    /// Introduction versions estimated from the proportion.
    pub estimated_introductions: usize,
    /// Assembly counters.
    pub assembly: AssemblyReport,
    /// Feature columns removed as quasi-constant.
    pub dropped_columns: Vec<String>,
    /// Columns in the final table.
    pub columns: usize,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Final, pruned table.
    pub table: FeatureTable,
    /// Tickets with every index resolved.
    pub tickets: Vec<BugReport>,
    /// Run summary.
    pub report: GenerationReport,
}

/// Run the whole pipeline for one project.
///
/// # Errors
///
/// Any collaborator failure, wrapped as [`FaultlineError::Generation`].
pub fn generate<F, S>(
    input: GenerationInput,
    attribution: &mut F,
    source: &mut S,
) -> Result<Generation, FaultlineError>
where
    F: FixAttribution + ?Sized,
    S: MethodSource,
{
    let project = input.project.clone();
    run(input, attribution, source).map_err(|e| e.for_project(&project))
}

fn run<F, S>(
    input: GenerationInput,
    attribution: &mut F,
    source: &mut S,
) -> Result<Generation, FaultlineError>
where
    F: FixAttribution + ?Sized,
    S: MethodSource,
{
    let GenerationInput {
        project,
        timeline,
        mut tickets,
        cutoff_fraction,
    } = input;
    tracing::info!(
        project = %project,
        releases = timeline.len(),
        tickets = tickets.len(),
        "generating dataset"
    );

    let grounded = assign_ticket_versions(&mut tickets, &timeline);
    let fix_commits = attribution.resolve_fix_commits(&mut tickets)?;
    let fixed_methods = attribution.map_fixed_methods(&tickets, &timeline, &mut *source)?;

    let samples = proportion_samples(&tickets).len();
    let proportion = estimate_proportion(&tickets);
    let estimated = resolve_all(&mut tickets, proportion);

    let (mut table, assembly) = DatasetAssembler::new(&project, &timeline, &tickets, &fixed_methods)
        .with_cutoff(cutoff_fraction)
        .assemble(source)?;
    let dropped_columns = prune_low_variance_columns(&mut table);

    let report = GenerationReport {
        project,
        tickets: tickets.len(),
        fix_commits,
        grounded_introductions: grounded,
        proportion_samples: samples,
        proportion,
        estimated_introductions: estimated,
        assembly,
        dropped_columns,
        columns: table.header().len(),
    };
    Ok(Generation {
        table,
        tickets,
        report,
    })
}

/// Persist the table once per format under `base` (`<base>.<ext>`).
///
/// # Errors
///
/// Any write failure, wrapped as [`FaultlineError::Generation`].
pub fn write_outputs(
    generation: &Generation,
    base: &Path,
    formats: &[TableFormat],
) -> Result<Vec<PathBuf>, FaultlineError> {
    let project = &generation.report.project;
    let mut written = Vec::with_capacity(formats.len());
    for &format in formats {
        let path = output_path(base, format);
        let content = generation.table.render(format, project);
        write_atomic(&path, &content).map_err(|e| e.for_project(project))?;
        tracing::info!(path = %path.display(), rows = generation.table.len(), "wrote dataset");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::NaiveDate;
    use faultline_core::{feature, parse_tracker_datetime, AnalyzedMethod, Release};

    use super::*;

    fn timeline() -> ReleaseTimeline {
        ReleaseTimeline::from_dated(
            (1..=6u32)
                .map(|m| (format!("1.{m}"), NaiveDate::from_ymd_opt(2020, m * 2, 1).unwrap()))
                .collect(),
        )
    }

    fn method(sig: &str) -> AnalyzedMethod {
        AnalyzedMethod::new(
            sig,
            sig,
            "src/Store.java",
            BTreeMap::from([
                (feature::CYCLOMATIC_COMPLEXITY.to_string(), 4.0),
                (feature::REVISIONS.to_string(), 2.0),
            ]),
        )
    }

    fn ticket(key: &str, created: &str, resolved: &str) -> BugReport {
        let mut t = BugReport::new(key, parse_tracker_datetime(created).unwrap());
        t.resolved = parse_tracker_datetime(resolved);
        t
    }

    fn source() -> BTreeMap<String, Vec<AnalyzedMethod>> {
        (1..=6)
            .map(|m| (format!("1.{m}"), vec![method("put()"), method("get()")]))
            .collect()
    }

    #[test]
    fn run_labels_with_estimated_introduction() {
        // Grounded: IV=1.1, OV=1.2 (created Mar), FV=1.4 (resolved Jul) -> P = 3/2.
        let mut grounded = ticket("K-1", "2020-03-10", "2020-07-10");
        grounded.affected_versions = BTreeSet::from(["1.1".to_string()]);
        // Unknown IV: OV=1.4, FV=1.6 -> IV = round(6 - 2 * 1.5) = 3.
        let estimated = ticket("K-2", "2020-07-10", "2020-11-10");

        let mut fixed: FixedMethodMap = BTreeMap::from([
            ("K-2".to_string(), BTreeSet::from([method("put()").method_key()])),
        ]);
        let input = GenerationInput {
            project: "STORE".into(),
            timeline: timeline(),
            tickets: vec![grounded, estimated],
            cutoff_fraction: 1.0,
        };

        let generation = generate(input, &mut fixed, &mut source()).unwrap();
        let report = &generation.report;
        assert_eq!(report.proportion_samples, 1);
        assert_eq!(report.proportion, 1.5);
        assert_eq!(report.grounded_introductions, 1);
        assert_eq!(report.estimated_introductions, 1);
        assert_eq!(generation.tickets[1].introduction, Some(3));

        let table = &generation.table;
        let label_at = table.header().len() - 1;
        let buggy: Vec<(&str, &str)> = table
            .rows()
            .iter()
            .filter(|r| r[label_at] == "yes")
            .map(|r| (r[1].as_str(), r[2].as_str()))
            .collect();
        assert_eq!(
            buggy,
            [("src/Store.java/put()", "1.3"), ("src/Store.java/put()", "1.4"), ("src/Store.java/put()", "1.5")]
        );
    }

    #[test]
    fn constant_columns_are_pruned_after_assembly() {
        let input = GenerationInput {
            project: "STORE".into(),
            timeline: timeline(),
            tickets: Vec::new(),
            cutoff_fraction: 0.5,
        };
        let generation = generate(input, &mut FixedMethodMap::new(), &mut source()).unwrap();
        let report = &generation.report;
        assert_eq!(report.assembly.rows, 6);
        assert_eq!(report.proportion, 1.5);
        assert_eq!(
            generation.table.header(),
            ["Project", "MethodName", "Release", "CyclomaticComplexity", "NR", "IsBuggy"]
        );
        assert_eq!(report.columns, 6);
        assert_eq!(report.dropped_columns.len(), 8);
    }

    struct FailingSource;

    impl MethodSource for FailingSource {
        fn methods_for_release(
            &mut self,
            release: &Release,
        ) -> Result<Option<Vec<AnalyzedMethod>>, FaultlineError> {
            Err(FaultlineError::Snapshot(format!("{} is corrupt", release.name)))
        }
    }

    #[test]
    fn failures_name_the_project() {
        let input = GenerationInput {
            project: "STORE".into(),
            timeline: timeline(),
            tickets: Vec::new(),
            cutoff_fraction: 1.0,
        };
        let err = generate(input, &mut FixedMethodMap::new(), &mut FailingSource).unwrap_err();
        match err {
            FaultlineError::Generation { project, source } => {
                assert_eq!(project, "STORE");
                assert!(matches!(*source, FaultlineError::Snapshot(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn write_outputs_emits_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = GenerationInput {
            project: "STORE".into(),
            timeline: timeline(),
            tickets: Vec::new(),
            cutoff_fraction: 1.0,
        };
        let generation = generate(input, &mut FixedMethodMap::new(), &mut source()).unwrap();
        let base = dir.path().join("out/STORE");
        let written =
            write_outputs(&generation, &base, &[TableFormat::Csv, TableFormat::Arff]).unwrap();

        assert_eq!(written, [dir.path().join("out/STORE.csv"), dir.path().join("out/STORE.arff")]);
        let csv = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(csv.lines().count(), 13);
        assert!(csv.starts_with("\"Project\",\"MethodName\",\"Release\""));
        let arff = std::fs::read_to_string(&written[1]).unwrap();
        assert!(arff.starts_with("@relation 'STORE'"));
    }

    #[test]
    fn write_failure_is_a_generation_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = GenerationInput {
            project: "STORE".into(),
            timeline: timeline(),
            tickets: Vec::new(),
            cutoff_fraction: 1.0,
        };
        let generation = generate(input, &mut FixedMethodMap::new(), &mut source()).unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let err = write_outputs(&generation, &blocker.join("STORE"), &[TableFormat::Csv]).unwrap_err();
        assert!(err.to_string().contains("STORE"));
    }
}
