use std::collections::BTreeMap;
use std::path::PathBuf;

use faultline_core::{BugReport, FaultlineError, ReleaseTimeline};
use faultline_dataset::labeler::FixedMethodMap;
use faultline_dataset::pipeline::FixAttribution;
use faultline_dataset::source::MethodSource;
use faultline_history::fixes::{self, RevisionSnapshot};
use faultline_history::releases::TaggedRelease;

/// Fix attribution backed by the project's git history.
///
/// Fixes are matched against the method snapshot of each ticket's fixed
/// release, measured at that release's tagged commit.
pub struct GitFixAttribution {
    repo: PathBuf,
    release_commits: BTreeMap<u32, String>,
}

impl GitFixAttribution {
    pub fn new(repo: impl Into<PathBuf>, tagged: &[TaggedRelease]) -> Self {
        Self {
            repo: repo.into(),
            release_commits: tagged
                .iter()
                .map(|t| (t.release.index, t.commit.clone()))
                .collect(),
        }
    }
}

impl FixAttribution for GitFixAttribution {
    fn resolve_fix_commits(&mut self, tickets: &mut [BugReport]) -> Result<usize, FaultlineError> {
        fixes::resolve_fix_commits(&self.repo, tickets)
    }

    fn map_fixed_methods(
        &mut self,
        tickets: &[BugReport],
        timeline: &ReleaseTimeline,
        source: &mut dyn MethodSource,
    ) -> Result<FixedMethodMap, FaultlineError> {
        let release_commits = &self.release_commits;
        // Several tickets usually share a fixed release.
        let mut snapshots = BTreeMap::new();
        fixes::map_fixed_methods(&self.repo, tickets, |ticket| {
            let Some(release) = ticket.fixed.and_then(|fv| timeline.by_index(fv)) else {
                return Ok(None);
            };
            let Some(commit) = release_commits.get(&release.index) else {
                tracing::debug!(release = %release, "fixed release has no tagged commit");
                return Ok(None);
            };
            if !snapshots.contains_key(&release.index) {
                let methods = source.methods_for_release(release)?;
                if methods.is_none() {
                    tracing::debug!(release = %release, "no snapshot for fixed release");
                }
                snapshots.insert(release.index, methods);
            }
            Ok(snapshots
                .get(&release.index)
                .cloned()
                .flatten()
                .map(|methods| RevisionSnapshot {
                    commit: commit.clone(),
                    methods,
                }))
        })
    }
}
