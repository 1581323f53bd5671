//! Removal of quasi-constant feature columns.

use crate::table::{FeatureTable, IDENTIFIER_COLUMNS};

/// Share of zero/missing cells at which a feature column is dropped.
pub const LOW_VARIANCE_THRESHOLD: f64 = 0.95;

/// Whether a cell counts as "no signal": empty, zero, or not a finite number.
fn is_zero_or_missing(cell: &str) -> bool {
    match cell.trim().parse::<f64>() {
        Ok(value) => value == 0.0 || !value.is_finite(),
        Err(_) => true,
    }
}

/// Share of zero/missing cells in column `index`. `None` for an empty table.
pub fn zero_ratio(table: &FeatureTable, index: usize) -> Option<f64> {
    if table.is_empty() {
        return None;
    }
    let zeros = table.column(index).filter(|c| is_zero_or_missing(c)).count();
    Some(zeros as f64 / table.len() as f64)
}

/// Drop feature columns whose zero/missing ratio reaches
/// [`LOW_VARIANCE_THRESHOLD`].
///
/// Only columns between the identifier columns and the trailing label column
/// are considered. The decision is made once over the whole table. An empty
/// table is left untouched. Returns the names of dropped columns in header
/// order.
///
/// # Examples
///
/// ```
/// use faultline_dataset::table::{FeatureRow, FeatureTable};
/// use faultline_dataset::variance::prune_low_variance_columns;
///
/// let mut table = FeatureTable::with_header(
///     ["Project", "MethodName", "Release", "NR", "NAuth", "IsBuggy"].map(String::from).to_vec(),
/// );
/// for i in 0..4 {
///     table.push(FeatureRow {
///         project: "P".into(),
///         method_name: format!("m{i}"),
///         release: "1.0".into(),
///         values: vec![(i + 1).to_string(), "0".into()],
///         buggy: i == 0,
///     });
/// }
/// assert_eq!(prune_low_variance_columns(&mut table), ["NAuth"]);
/// assert_eq!(table.header().len(), 5);
/// ```
pub fn prune_low_variance_columns(table: &mut FeatureTable) -> Vec<String> {
    if table.is_empty() {
        return Vec::new();
    }
    let label_at = table.header().len().saturating_sub(1);

    let doomed: Vec<usize> = (IDENTIFIER_COLUMNS..label_at)
        .filter(|&index| zero_ratio(table, index).is_some_and(|r| r >= LOW_VARIANCE_THRESHOLD))
        .collect();
    let names: Vec<String> = doomed
        .iter()
        .map(|&index| table.header()[index].clone())
        .collect();

    if !names.is_empty() {
        tracing::info!(columns = ?names, "dropping low-variance feature columns");
        table.remove_columns(&doomed);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::FeatureRow;

    /// 100-row table with one feature column holding `zeros` zero cells.
    fn table_with_zeros(zeros: usize) -> FeatureTable {
        let mut table = FeatureTable::with_header(
            ["Project", "MethodName", "Release", "NR", "IsBuggy"]
                .map(String::from)
                .to_vec(),
        );
        for i in 0..100 {
            let value = if i < zeros { "0" } else { "3" };
            table.push(FeatureRow {
                project: "P".into(),
                method_name: format!("m{i}"),
                release: "1.0".into(),
                values: vec![value.into()],
                buggy: false,
            });
        }
        table
    }

    #[test]
    fn column_at_threshold_is_dropped() {
        let mut table = table_with_zeros(95);
        assert_eq!(prune_low_variance_columns(&mut table), ["NR"]);
        assert_eq!(table.header(), ["Project", "MethodName", "Release", "IsBuggy"]);
        assert!(table.rows().iter().all(|r| r.len() == 4));
    }

    #[test]
    fn column_just_below_threshold_is_kept() {
        let mut table = table_with_zeros(94);
        assert!(prune_low_variance_columns(&mut table).is_empty());
        assert_eq!(table.header().len(), 5);
    }

    #[test]
    fn empty_and_unparsable_cells_count_as_missing() {
        assert!(is_zero_or_missing(""));
        assert!(is_zero_or_missing("n/a"));
        assert!(is_zero_or_missing("0.00"));
        assert!(is_zero_or_missing(" 0 "));
        assert!(!is_zero_or_missing("0.01"));
        assert!(!is_zero_or_missing("-2"));
    }

    #[test]
    fn non_finite_cells_count_as_missing() {
        assert!(is_zero_or_missing("NaN"));
        assert!(is_zero_or_missing("inf"));
        assert!(is_zero_or_missing("-infinity"));

        let mut table = FeatureTable::with_header(
            ["Project", "MethodName", "Release", "NR", "IsBuggy"]
                .map(String::from)
                .to_vec(),
        );
        for i in 0..100 {
            let value = match i {
                0..=89 => "0",
                90..=94 => "NaN",
                _ => "3",
            };
            let name = format!("m{i}");
            table.push_record(["P", name.as_str(), "1.0", value, "no"].map(String::from).to_vec());
        }
        assert_eq!(prune_low_variance_columns(&mut table), ["NR"]);
    }

    #[test]
    fn identifier_and_label_columns_are_never_dropped() {
        let mut table = FeatureTable::with_header(
            ["Project", "MethodName", "Release", "NR", "IsBuggy"]
                .map(String::from)
                .to_vec(),
        );
        for i in 0..20 {
            table.push_record(vec![
                String::new(),
                "0".into(),
                "0".into(),
                (i + 1).to_string(),
                "no".into(),
            ]);
        }
        assert!(prune_low_variance_columns(&mut table).is_empty());
        assert_eq!(table.header().len(), 5);
    }

    #[test]
    fn empty_table_is_untouched() {
        let mut table = FeatureTable::new();
        let width = table.header().len();
        assert!(prune_low_variance_columns(&mut table).is_empty());
        assert_eq!(table.header().len(), width);
    }

    #[test]
    fn zero_ratio_of_empty_table_is_none() {
        assert_eq!(zero_ratio(&FeatureTable::new(), 3), None);
    }
}
