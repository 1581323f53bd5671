//! Linking tickets to fix commits and the methods those commits touched.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use faultline_core::{AnalyzedMethod, BugReport, FaultlineError, LineSpan};

use crate::mining::{carry_lines, changed_lines, mine_history};

/// Whether `message` mentions `key` as a whole token, ignoring ASCII case.
///
/// # Examples
///
/// ```
/// use faultline_history::fixes::mentions_ticket;
///
/// assert!(mentions_ticket("[AVRO-12] fix NPE", "AVRO-12"));
/// assert!(mentions_ticket("avro-12: fix NPE", "AVRO-12"));
/// assert!(!mentions_ticket("AVRO-123: unrelated", "AVRO-12"));
/// assert!(!mentions_ticket("XAVRO-12", "AVRO-12"));
/// ```
pub fn mentions_ticket(message: &str, key: &str) -> bool {
    if key.is_empty() {
        return false;
    }
    let haystack = message.to_ascii_uppercase();
    let needle = key.to_ascii_uppercase();
    let bytes = haystack.as_bytes();

    haystack.match_indices(&needle).any(|(start, _)| {
        let end = start + needle.len();
        let clean_before = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        let clean_after = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
        clean_before && clean_after
    })
}

/// Set the fix commit of every ticket that lacks one.
///
/// The newest commit mentioning the ticket key wins. Returns the number of
/// tickets carrying a fix commit afterwards.
///
/// # Errors
///
/// Returns [`FaultlineError::Git`] if history cannot be read.
pub fn resolve_fix_commits(
    repo_path: &Path,
    tickets: &mut [BugReport],
) -> Result<usize, FaultlineError> {
    let commits = mine_history(repo_path)?;

    for ticket in tickets.iter_mut().filter(|t| t.fix_commit.is_none()) {
        // Ties keep the later commit in walk order.
        ticket.fix_commit = commits
            .iter()
            .filter(|c| mentions_ticket(&c.message, &ticket.key))
            .max_by_key(|c| c.timestamp)
            .map(|c| c.hash.clone());
    }

    let resolved = tickets.iter().filter(|t| t.fix_commit.is_some()).count();
    tracing::info!(
        tickets = tickets.len(),
        resolved,
        commits = commits.len(),
        "resolved fix commits"
    );
    Ok(resolved)
}

/// Keys of the methods in `methods` touched by `changes`.
///
/// A method is touched when its file changed and its span overlaps a changed
/// span; a method without a span is touched whenever its file changed.
pub fn touched_methods(
    changes: &BTreeMap<String, Vec<LineSpan>>,
    methods: &[AnalyzedMethod],
) -> BTreeSet<String> {
    methods
        .iter()
        .filter(|method| {
            changes.get(method.filepath()).is_some_and(|spans| match method.span() {
                Some(span) => spans.iter().any(|changed| changed.overlaps(&span)),
                None => true,
            })
        })
        .map(AnalyzedMethod::method_key)
        .collect()
}

/// Methods measured at a known revision of the repository.
#[derive(Debug, Clone)]
pub struct RevisionSnapshot {
    /// Commit the methods were measured at.
    pub commit: String,
    /// Measured methods, with spans in that commit's line numbering.
    pub methods: Vec<AnalyzedMethod>,
}

/// Ticket key → keys of the methods its fix commit touched.
///
/// `methods_at_fix` supplies the snapshot to match the fix against,
/// typically the one of the ticket's fixed release; `Ok(None)` leaves the
/// ticket unmapped. The fix's changed lines are carried forward to the
/// snapshot's commit before matching. Tickets without a fix commit are not
/// mapped.
///
/// # Errors
///
/// Propagates git failures and errors from `methods_at_fix`.
pub fn map_fixed_methods<F>(
    repo_path: &Path,
    tickets: &[BugReport],
    mut methods_at_fix: F,
) -> Result<BTreeMap<String, BTreeSet<String>>, FaultlineError>
where
    F: FnMut(&BugReport) -> Result<Option<RevisionSnapshot>, FaultlineError>,
{
    let mut mapped = BTreeMap::new();
    for ticket in tickets {
        let Some(commit) = ticket.fix_commit.as_deref() else {
            continue;
        };
        let Some(snapshot) = methods_at_fix(ticket)? else {
            tracing::debug!(ticket = %ticket.key, "no snapshot at fix; ticket unmapped");
            continue;
        };
        let changes = changed_lines(repo_path, commit)?;
        let changes = carry_lines(repo_path, commit, &snapshot.commit, &changes)?;
        let keys = touched_methods(&changes, &snapshot.methods);
        if !keys.is_empty() {
            mapped.insert(ticket.key.clone(), keys);
        }
    }

    tracing::info!(mapped = mapped.len(), "mapped tickets to fixed methods");
    Ok(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(sig: &str, file: &str, span: Option<(u32, u32)>) -> AnalyzedMethod {
        let m = AnalyzedMethod::new(sig, sig, file, BTreeMap::new());
        match span {
            Some((start, end)) => m.with_span(LineSpan::new(start, end)),
            None => m,
        }
    }

    #[test]
    fn key_at_message_edges_matches() {
        assert!(mentions_ticket("AVRO-7", "AVRO-7"));
        assert!(mentions_ticket("Fixes AVRO-7.", "AVRO-7"));
        assert!(mentions_ticket("merge AVRO-70 and AVRO-7", "AVRO-7"));
        assert!(!mentions_ticket("AVRO-70", "AVRO-7"));
        assert!(!mentions_ticket("anything", ""));
    }

    #[test]
    fn touched_methods_uses_span_overlap() {
        let changes = BTreeMap::from([(
            "src/A.java".to_string(),
            vec![LineSpan::new(12, 14)],
        )]);
        let methods = vec![
            method("a()", "src/A.java", Some((1, 11))),
            method("b()", "src/A.java", Some((10, 20))),
            method("c()", "src/B.java", Some((10, 20))),
            method("d()", "src/A.java", None),
        ];
        let keys = touched_methods(&changes, &methods);
        assert_eq!(
            keys,
            BTreeSet::from(["src/A.java::b()".to_string(), "src/A.java::d()".to_string()])
        );
    }
}
