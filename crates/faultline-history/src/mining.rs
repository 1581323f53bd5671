//! Git history extraction via git2.
//!
//! Walks commit history oldest to newest, extracting the hash, timestamp
//! and message of each commit, computes per-commit changed line spans, and
//! carries those spans forward to later revisions.

use std::collections::BTreeMap;
use std::path::Path;

use faultline_core::{FaultlineError, LineSpan};
use git2::{Commit, Delta, Diff, DiffFindOptions, DiffOptions, Patch, Repository, Sort, Tree};

/// Raw commit data extracted from git history.
///
/// # Examples
///
/// ```
/// use faultline_history::mining::CommitInfo;
///
/// let info = CommitInfo {
///     hash: "3f2a9c1e".into(),
///     timestamp: 1700000000,
///     message: "AVRO-101: guard against empty schema".into(),
/// };
/// assert!(info.message.starts_with("AVRO-101"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full commit hash.
    pub hash: String,
    /// Unix timestamp of the commit.
    pub timestamp: i64,
    /// Full commit message.
    pub message: String,
}

/// Open the repository at `repo_path`.
///
/// # Errors
///
/// Returns [`FaultlineError::Git`] if no repository can be opened there.
pub fn open_repo(repo_path: &Path) -> Result<Repository, FaultlineError> {
    Repository::open(repo_path)
        .map_err(|e| FaultlineError::Git(format!("failed to open repository: {e}")))
}

/// Mine the commit history reachable from HEAD.
///
/// Returns commits in chronological order (oldest first).
///
/// # Errors
///
/// Returns [`FaultlineError::Git`] if the repository cannot be opened or walked.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use faultline_history::mining::mine_history;
///
/// let commits = mine_history(Path::new(".")).unwrap();
/// for c in &commits {
///     println!("{}: {}", &c.hash[..7], c.message.lines().next().unwrap_or(""));
/// }
/// ```
pub fn mine_history(repo_path: &Path) -> Result<Vec<CommitInfo>, FaultlineError> {
    let repo = open_repo(repo_path)?;

    let mut revwalk = repo
        .revwalk()
        .map_err(|e| FaultlineError::Git(format!("failed to create revwalk: {e}")))?;

    revwalk
        .set_sorting(Sort::TIME | Sort::REVERSE)
        .map_err(|e| FaultlineError::Git(format!("failed to set walk order: {e}")))?;

    revwalk
        .push_head()
        .map_err(|e| FaultlineError::Git(format!("failed to push HEAD: {e}")))?;

    let mut commits = Vec::new();
    for oid_result in revwalk {
        let oid = oid_result.map_err(|e| FaultlineError::Git(format!("revwalk error: {e}")))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| FaultlineError::Git(format!("failed to find commit: {e}")))?;

        commits.push(CommitInfo {
            hash: oid.to_string(),
            timestamp: commit.time().seconds(),
            message: commit.message().unwrap_or("").to_string(),
        });
    }

    tracing::debug!(commits = commits.len(), "mined history");
    Ok(commits)
}

/// Line spans touched by `commit_hash`, keyed by file path.
///
/// Spans are on the new side of the diff against the first parent. A pure
/// deletion is recorded at the line where the removed text used to start.
///
/// # Errors
///
/// Returns [`FaultlineError::Git`] if the commit cannot be found or diffed.
pub fn changed_lines(
    repo_path: &Path,
    commit_hash: &str,
) -> Result<BTreeMap<String, Vec<LineSpan>>, FaultlineError> {
    let repo = open_repo(repo_path)?;
    let commit = find_commit(&repo, commit_hash)?;
    let diff = first_parent_diff(&repo, &commit)?;

    let mut lines: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    diff.foreach(
        &mut |_delta, _progress| true,
        None,
        None,
        Some(&mut |delta, hunk, line| {
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .unwrap_or(Path::new(""))
                .to_string_lossy()
                .to_string();

            let touched = match line.origin() {
                '+' => line.new_lineno(),
                '-' => hunk.map(|h| h.new_start().max(1)),
                _ => None,
            };
            if let Some(lineno) = touched {
                lines.entry(path).or_default().push(lineno);
            }
            true
        }),
    )
    .map_err(|e| FaultlineError::Git(format!("failed to iterate diff lines: {e}")))?;

    Ok(lines
        .into_iter()
        .filter(|(path, _)| !path.is_empty())
        .map(|(path, lines)| (path, merge_lines(lines)))
        .collect())
}

/// Move `changes`, expressed as lines of revision `from`, onto the lines of
/// revision `to`.
///
/// Lines outside any edit shift by the lines inserted or removed above them.
/// A line inside an edited region lands on the corresponding line of the new
/// region. Renamed files follow their new path; spans of files deleted by
/// `to` are dropped.
///
/// # Errors
///
/// Returns [`FaultlineError::Git`] if either revision cannot be found or diffed.
pub fn carry_lines(
    repo_path: &Path,
    from: &str,
    to: &str,
    changes: &BTreeMap<String, Vec<LineSpan>>,
) -> Result<BTreeMap<String, Vec<LineSpan>>, FaultlineError> {
    if from == to || changes.is_empty() {
        return Ok(changes.clone());
    }
    let repo = open_repo(repo_path)?;
    let from_tree = commit_tree(&find_commit(&repo, from)?)?;
    let to_tree = commit_tree(&find_commit(&repo, to)?)?;

    let mut diff_opts = DiffOptions::new();
    diff_opts.context_lines(0);
    let mut diff = repo
        .diff_tree_to_tree(Some(&from_tree), Some(&to_tree), Some(&mut diff_opts))
        .map_err(|e| FaultlineError::Git(format!("failed to compute diff: {e}")))?;
    diff.find_similar(Some(DiffFindOptions::new().renames(true)))
        .map_err(|e| FaultlineError::Git(format!("failed to detect renames: {e}")))?;

    // Old path -> (new path, or None when deleted; hunks in old-line order).
    let mut edits: BTreeMap<String, (Option<String>, Vec<HunkShift>)> = BTreeMap::new();
    for (idx, delta) in diff.deltas().enumerate() {
        let Some(old_path) = delta.old_file().path().map(|p| p.to_string_lossy().to_string())
        else {
            continue;
        };
        if !changes.contains_key(&old_path) {
            continue;
        }
        let new_path = match delta.status() {
            Delta::Deleted => None,
            _ => delta.new_file().path().map(|p| p.to_string_lossy().to_string()),
        };

        let mut hunks = Vec::new();
        let patch = Patch::from_diff(&diff, idx)
            .map_err(|e| FaultlineError::Git(format!("failed to read patch: {e}")))?;
        if let Some(patch) = patch {
            for h in 0..patch.num_hunks() {
                let (hunk, _) = patch
                    .hunk(h)
                    .map_err(|e| FaultlineError::Git(format!("failed to read hunk: {e}")))?;
                hunks.push(HunkShift {
                    old_start: hunk.old_start(),
                    old_lines: hunk.old_lines(),
                    new_start: hunk.new_start(),
                    new_lines: hunk.new_lines(),
                });
            }
        }
        edits.insert(old_path, (new_path, hunks));
    }

    let mut carried: BTreeMap<String, Vec<LineSpan>> = BTreeMap::new();
    for (path, spans) in changes {
        let (target, hunks) = match edits.get(path) {
            Some((Some(new_path), hunks)) => (new_path.clone(), hunks.as_slice()),
            Some((None, _)) => continue,
            None => (path.clone(), &[][..]),
        };
        let shifted = spans
            .iter()
            .map(|span| LineSpan::new(shift_line(span.start, hunks), shift_line(span.end, hunks)));
        carried.entry(target).or_default().extend(shifted);
    }

    tracing::debug!(from, to, files = carried.len(), "carried changed lines forward");
    Ok(carried)
}

/// Line counts of one diff hunk, as git reports them.
#[derive(Debug, Clone, Copy)]
struct HunkShift {
    old_start: u32,
    old_lines: u32,
    new_start: u32,
    new_lines: u32,
}

/// Position of old-side `line` after applying `hunks` (sorted by old start).
fn shift_line(line: u32, hunks: &[HunkShift]) -> u32 {
    let mut offset: i64 = 0;
    for hunk in hunks {
        if hunk.old_lines == 0 {
            // Pure insertion after old line `old_start`.
            if line > hunk.old_start {
                offset += i64::from(hunk.new_lines);
                continue;
            }
            break;
        }
        if line < hunk.old_start {
            break;
        }
        if line < hunk.old_start + hunk.old_lines {
            return if hunk.new_lines > 0 {
                hunk.new_start + (line - hunk.old_start).min(hunk.new_lines - 1)
            } else {
                hunk.new_start.max(1)
            };
        }
        offset += i64::from(hunk.new_lines) - i64::from(hunk.old_lines);
    }
    u32::try_from((i64::from(line) + offset).max(1)).unwrap_or(u32::MAX)
}

fn find_commit<'r>(repo: &'r Repository, hash: &str) -> Result<Commit<'r>, FaultlineError> {
    repo.revparse_single(hash)
        .and_then(|obj| obj.peel_to_commit())
        .map_err(|e| FaultlineError::Git(format!("failed to find commit {hash}: {e}")))
}

fn commit_tree<'r>(commit: &Commit<'r>) -> Result<Tree<'r>, FaultlineError> {
    commit
        .tree()
        .map_err(|e| FaultlineError::Git(format!("failed to get commit tree: {e}")))
}

fn first_parent_diff<'r>(repo: &'r Repository, commit: &Commit<'_>) -> Result<Diff<'r>, FaultlineError> {
    let tree = commit_tree(commit)?;

    let parent_tree = if commit.parent_count() > 0 {
        let parent = commit
            .parent(0)
            .map_err(|e| FaultlineError::Git(format!("failed to get parent: {e}")))?;
        Some(
            parent
                .tree()
                .map_err(|e| FaultlineError::Git(format!("failed to get parent tree: {e}")))?,
        )
    } else {
        None
    };

    let mut diff_opts = DiffOptions::new();
    diff_opts.context_lines(0);
    repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut diff_opts))
        .map_err(|e| FaultlineError::Git(format!("failed to compute diff: {e}")))
}

/// Collapse line numbers into sorted, non-adjacent spans.
fn merge_lines(mut lines: Vec<u32>) -> Vec<LineSpan> {
    lines.sort_unstable();
    lines.dedup();

    let mut spans: Vec<LineSpan> = Vec::new();
    for line in lines {
        match spans.last_mut() {
            Some(last) if line <= last.end + 1 => last.end = line,
            _ => spans.push(LineSpan::new(line, line)),
        }
    }
    spans
}
