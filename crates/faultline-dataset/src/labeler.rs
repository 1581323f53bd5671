//! Per-release buggy/clean labeling of methods.

use std::collections::{BTreeMap, BTreeSet};

use faultline_core::{AnalyzedMethod, BugReport, Release};

/// Ticket key → method keys (`filepath::signature`) touched by its fix.
pub type FixedMethodMap = BTreeMap<String, BTreeSet<String>>;

/// Whether `method` is defective in `release`.
///
/// True when some ticket fixed this method, has both introduction and fixed
/// versions resolved, and `release` lies in the half-open window
/// `[introduction, fixed)`.
///
/// # Examples
///
/// ```
/// use std::collections::{BTreeMap, BTreeSet};
/// use chrono::{NaiveDate, Utc};
/// use faultline_core::{AnalyzedMethod, BugReport, Release};
/// use faultline_dataset::labeler::{is_buggy_at, FixedMethodMap};
///
/// let method = AnalyzedMethod::new("A.f", "f()", "A.java", BTreeMap::new());
/// let ticket = BugReport::new("K-1", Utc::now()).with_versions(Some(3), Some(4), Some(6));
/// let fixed: FixedMethodMap =
///     BTreeMap::from([("K-1".to_string(), BTreeSet::from([method.method_key()]))]);
///
/// let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
/// let tickets = [ticket];
/// assert!(is_buggy_at(&method, &Release::new("r5", date, 5), &tickets, &fixed));
/// assert!(!is_buggy_at(&method, &Release::new("r6", date, 6), &tickets, &fixed));
/// ```
pub fn is_buggy_at(
    method: &AnalyzedMethod,
    release: &Release,
    tickets: &[BugReport],
    fixed_methods: &FixedMethodMap,
) -> bool {
    let key = method.method_key();
    tickets.iter().any(|ticket| {
        let touched = fixed_methods
            .get(&ticket.key)
            .is_some_and(|keys| keys.contains(&key));
        touched && in_bug_window(ticket, release.index)
    })
}

/// Whether `release_index` falls in `[introduction, fixed)` for `ticket`.
pub fn in_bug_window(ticket: &BugReport, release_index: u32) -> bool {
    match (ticket.introduction, ticket.fixed) {
        (Some(iv), Some(fv)) if iv > 0 && fv > 0 => release_index >= iv && release_index < fv,
        _ => false,
    }
}
