//! Date → release mapping and per-ticket version attribution.

use chrono::NaiveDate;
use faultline_core::{BugReport, ReleaseTimeline};

/// Index of the release that was current on `date`.
///
/// Rounds forward: returns the first release whose date is not before
/// `date`. Dates after the last release clamp silently to the last release,
/// so a match on the final release may be imprecise. Returns `None` for an
/// empty timeline.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use faultline_core::{Release, ReleaseTimeline};
/// use faultline_dataset::indexer::release_index_for_date;
///
/// let d = |y, m| NaiveDate::from_ymd_opt(y, m, 1).unwrap();
/// let timeline = ReleaseTimeline::new(vec![
///     Release::new("R1", d(2020, 1), 1),
///     Release::new("R2", d(2020, 6), 2),
/// ]).unwrap();
///
/// assert_eq!(release_index_for_date(d(2020, 3), &timeline), Some(2));
/// assert_eq!(release_index_for_date(d(2019, 3), &timeline), Some(1));
/// assert_eq!(release_index_for_date(d(2021, 1), &timeline), Some(2));
/// ```
pub fn release_index_for_date(date: NaiveDate, timeline: &ReleaseTimeline) -> Option<u32> {
    timeline
        .iter()
        .find(|release| date <= release.date)
        .or_else(|| timeline.last())
        .map(|release| release.index)
}

/// Fill in opening, fixed and introduction indices for every ticket.
///
/// - opening: release current at ticket creation;
/// - fixed: release current at resolution, unknown if unresolved;
/// - introduction: earliest affected version found on the timeline, kept
///   only if it does not come after the opening release.
///
/// Returns how many tickets received a tracker-grounded introduction.
pub fn assign_ticket_versions(tickets: &mut [BugReport], timeline: &ReleaseTimeline) -> usize {
    let mut grounded = 0;

    for ticket in tickets.iter_mut() {
        ticket.opening = release_index_for_date(ticket.created.date_naive(), timeline);
        ticket.fixed = ticket
            .resolved
            .and_then(|resolved| release_index_for_date(resolved.date_naive(), timeline));

        let earliest_affected = ticket
            .affected_versions
            .iter()
            .filter_map(|name| timeline.by_name(name))
            .map(|release| release.index)
            .min();

        ticket.introduction = match (earliest_affected, ticket.opening) {
            (Some(iv), Some(ov)) if iv <= ov => Some(iv),
            (Some(_), Some(_)) => {
                tracing::debug!(ticket = %ticket.key, "affected version after opening; ignored");
                None
            }
            (iv, None) => iv,
            (None, _) => None,
        };

        if ticket.introduction.is_some() {
            grounded += 1;
        }
    }

    tracing::debug!(
        tickets = tickets.len(),
        grounded,
        "assigned ticket version indices"
    );
    grounded
}
