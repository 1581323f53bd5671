//! Proportion-based estimation of unknown introduction versions.
//!
//! For tickets whose introduction version (IV) is known, the proportion
//! `P = (FV - IV) / (FV - OV)` measures how far before the opening version
//! (OV) the defect appeared, relative to the opening → fix span. The median
//! `P` over those tickets is then used to estimate IV for the rest:
//! `IV = FV - (FV - OV) * P`.

use faultline_core::BugReport;

/// Coefficient used when no ticket has a usable known introduction version.
pub const DEFAULT_PROPORTION: f64 = 1.5;

/// Proportion of a ticket with known IV, OV and FV where `FV > OV`.
///
/// Returns `None` for tickets that are not eligible.
pub fn ticket_proportion(ticket: &BugReport) -> Option<f64> {
    let iv = ticket.introduction.filter(|iv| *iv > 0)?;
    let (ov, fv) = ticket.open_fix_window()?;
    Some((f64::from(fv) - f64::from(iv)) / (f64::from(fv) - f64::from(ov)))
}

/// Proportions of every eligible ticket, in ticket order.
pub fn proportion_samples(tickets: &[BugReport]) -> Vec<f64> {
    tickets.iter().filter_map(ticket_proportion).collect()
}

/// Median proportion over all eligible tickets.
///
/// Falls back to [`DEFAULT_PROPORTION`] when no ticket is eligible.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use faultline_core::BugReport;
/// use faultline_dataset::proportion::{estimate_proportion, DEFAULT_PROPORTION};
///
/// assert_eq!(estimate_proportion(&[]), DEFAULT_PROPORTION);
///
/// let t = BugReport::new("K-1", Utc::now()).with_versions(Some(1), Some(3), Some(5));
/// assert_eq!(estimate_proportion(&[t]), 2.0);
/// ```
pub fn estimate_proportion(tickets: &[BugReport]) -> f64 {
    let mut samples = proportion_samples(tickets);
    let p = median(&mut samples).unwrap_or(DEFAULT_PROPORTION);
    tracing::info!(eligible = samples.len(), proportion = p, "estimated proportion");
    p
}

/// Median of `values`, sorting them in place. `None` when empty.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Introduction version for `ticket`, estimating it from `p` if unknown.
///
/// A known introduction always wins. An estimate needs OV and FV with
/// `FV > OV` and is never below 1. Otherwise the result stays unknown.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use faultline_core::BugReport;
/// use faultline_dataset::proportion::resolve_introduction;
///
/// let known = BugReport::new("K-1", Utc::now()).with_versions(Some(2), Some(4), Some(6));
/// assert_eq!(resolve_introduction(&known, 9.0), Some(2));
///
/// let unknown = BugReport::new("K-2", Utc::now()).with_versions(None, Some(4), Some(6));
/// assert_eq!(resolve_introduction(&unknown, 1.5), Some(3));
/// assert_eq!(resolve_introduction(&unknown, 10.0), Some(1));
/// ```
pub fn resolve_introduction(ticket: &BugReport, p: f64) -> Option<u32> {
    if let Some(iv) = ticket.introduction.filter(|iv| *iv > 0) {
        return Some(iv);
    }
    let (ov, fv) = ticket.open_fix_window()?;
    let estimate = f64::from(fv) - (f64::from(fv) - f64::from(ov)) * p;
    Some(estimate.round().max(1.0) as u32)
}

/// Apply [`resolve_introduction`] to every ticket in place.
///
/// Returns the number of introduction versions that were estimated.
pub fn resolve_all(tickets: &mut [BugReport], p: f64) -> usize {
    let mut estimated = 0;
    for ticket in tickets.iter_mut() {
        let known = ticket.introduction.is_some_and(|iv| iv > 0);
        ticket.introduction = resolve_introduction(ticket, p);
        if !known && ticket.introduction.is_some() {
            estimated += 1;
        }
    }
    tracing::debug!(estimated, "resolved introduction versions");
    estimated
}
