//! Release timeline discovery from repository tags.

use std::path::Path;

use chrono::DateTime;
use faultline_core::{FaultlineError, Release, ReleaseTimeline};

use crate::mining::open_repo;

/// A release and the commit its tag points at.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use faultline_core::Release;
/// use faultline_history::releases::TaggedRelease;
///
/// let tagged = TaggedRelease {
///     release: Release::new("v1.0", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 1),
///     commit: "3f2a9c1e".into(),
/// };
/// assert_eq!(tagged.release.index, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedRelease {
    /// The release, dated by its tagged commit.
    pub release: Release,
    /// Full hash of the tagged commit.
    pub commit: String,
}

/// Every tag in the repository as a release, oldest first.
///
/// Tags are peeled to their commits (annotated and lightweight tags alike);
/// the release date is the commit date. Tags that do not resolve to a
/// commit are skipped. Indices are assigned densely from 1 by commit time,
/// ties broken by tag name.
///
/// # Errors
///
/// Returns [`FaultlineError::Git`] if the repository cannot be opened or
/// its tags listed.
pub fn releases_from_tags(repo_path: &Path) -> Result<Vec<TaggedRelease>, FaultlineError> {
    let repo = open_repo(repo_path)?;
    let names = repo
        .tag_names(None)
        .map_err(|e| FaultlineError::Git(format!("failed to list tags: {e}")))?;

    let mut tagged: Vec<(i64, String, String)> = Vec::new();
    for name in names.iter().flatten() {
        let commit = match repo
            .revparse_single(&format!("refs/tags/{name}"))
            .and_then(|obj| obj.peel_to_commit())
        {
            Ok(commit) => commit,
            Err(e) => {
                tracing::warn!(tag = name, error = %e, "tag does not point at a commit; skipped");
                continue;
            }
        };
        tagged.push((commit.time().seconds(), name.to_string(), commit.id().to_string()));
    }
    tagged.sort();

    let mut releases = Vec::with_capacity(tagged.len());
    for ((seconds, name, commit), index) in tagged.into_iter().zip(1u32..) {
        let date = DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| FaultlineError::Git(format!("tag {name} has an invalid commit time")))?
            .date_naive();
        releases.push(TaggedRelease {
            release: Release::new(name, date, index),
            commit,
        });
    }

    tracing::debug!(releases = releases.len(), "read releases from tags");
    Ok(releases)
}

/// Validated timeline of the tagged releases.
///
/// # Errors
///
/// Returns [`FaultlineError::Timeline`] if the releases are inconsistent.
pub fn timeline_of(tagged: &[TaggedRelease]) -> Result<ReleaseTimeline, FaultlineError> {
    ReleaseTimeline::new(tagged.iter().map(|t| t.release.clone()).collect())
}
