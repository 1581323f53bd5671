//! The assembled feature table and its CSV / ARFF renditions.

use std::path::{Path, PathBuf};

use faultline_core::{feature, FaultlineError, TableFormat};

/// Project identifier column.
pub const PROJECT_COLUMN: &str = "Project";
/// Method identifier column (`filepath/signature`).
pub const METHOD_COLUMN: &str = "MethodName";
/// Release identifier column.
pub const RELEASE_COLUMN: &str = "Release";
/// Label column; always last.
pub const LABEL_COLUMN: &str = "IsBuggy";
/// Number of leading identifier columns.
pub const IDENTIFIER_COLUMNS: usize = 3;

/// Label text for a buggy method.
pub const BUGGY: &str = "yes";
/// Label text for a clean method.
pub const CLEAN: &str = "no";

/// One dataset row before it is flattened into the table.
///
/// # Examples
///
/// ```
/// use faultline_dataset::table::FeatureRow;
///
/// let row = FeatureRow {
///     project: "AVRO".into(),
///     method_name: "A.java/f()".into(),
///     release: "1.0".into(),
///     values: vec!["3".into(), "0.50".into()],
///     buggy: true,
/// };
/// assert_eq!(row.into_record(), ["AVRO", "A.java/f()", "1.0", "3", "0.50", "yes"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRow {
    /// Project name.
    pub project: String,
    /// `filepath/signature`.
    pub method_name: String,
    /// Release name.
    pub release: String,
    /// Feature values, already formatted, in header order.
    pub values: Vec<String>,
    /// Defect label.
    pub buggy: bool,
}

impl FeatureRow {
    /// Flatten into table cells, label last.
    pub fn into_record(self) -> Vec<String> {
        let mut record = Vec::with_capacity(self.values.len() + IDENTIFIER_COLUMNS + 1);
        record.push(self.project);
        record.push(self.method_name);
        record.push(self.release);
        record.extend(self.values);
        record.push(if self.buggy { BUGGY } else { CLEAN }.to_string());
        record
    }
}

/// A rectangular table of text cells with a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Default for FeatureTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureTable {
    /// Empty table with the standard dataset header.
    pub fn new() -> Self {
        let header = [PROJECT_COLUMN, METHOD_COLUMN, RELEASE_COLUMN]
            .into_iter()
            .chain(feature::ALL)
            .chain([LABEL_COLUMN])
            .map(str::to_string)
            .collect();
        Self::with_header(header)
    }

    /// Empty table with a custom header.
    pub fn with_header(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Append a row.
    pub fn push(&mut self, row: FeatureRow) {
        self.push_record(row.into_record());
    }

    /// Append raw cells; the record must match the header width.
    pub fn push_record(&mut self, record: Vec<String>) {
        debug_assert_eq!(record.len(), self.header.len(), "row width mismatch");
        self.rows.push(record);
    }

    /// Column names.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Data rows.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Cells of column `index`, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |row| row.get(index).map_or("", String::as_str))
    }

    /// Remove the columns at `indices` from the header and every row.
    pub fn remove_columns(&mut self, indices: &[usize]) {
        let keep = |i: &usize| !indices.contains(i);
        self.header = retain_indexed(std::mem::take(&mut self.header), keep);
        for row in &mut self.rows {
            *row = retain_indexed(std::mem::take(row), keep);
        }
    }

    /// Render as CSV with every field quoted.
    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        for record in std::iter::once(&self.header).chain(&self.rows) {
            let line: Vec<String> = record.iter().map(|f| quote_csv(f)).collect();
            output.push_str(&line.join(","));
            output.push('\n');
        }
        output
    }

    /// Render as a Weka ARFF relation named `relation`.
    ///
    /// Identifier columns become string attributes, the label a nominal
    /// `{yes,no}` attribute, everything else numeric.
    pub fn to_arff(&self, relation: &str) -> String {
        let label_at = self.header.len().saturating_sub(1);
        let mut output = format!("@relation {}\n\n", quote_arff(relation));

        for (i, name) in self.header.iter().enumerate() {
            let kind = if i < IDENTIFIER_COLUMNS {
                "string".to_string()
            } else if i == label_at && name == LABEL_COLUMN {
                format!("{{{BUGGY},{CLEAN}}}")
            } else {
                "numeric".to_string()
            };
            output.push_str(&format!("@attribute {} {kind}\n", quote_arff(name)));
        }

        output.push_str("\n@data\n");
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    if cell.is_empty() {
                        "?".to_string()
                    } else if i < IDENTIFIER_COLUMNS {
                        quote_arff(cell)
                    } else {
                        cell.clone()
                    }
                })
                .collect();
            output.push_str(&cells.join(","));
            output.push('\n');
        }
        output
    }

    /// Render in `format`.
    pub fn render(&self, format: TableFormat, relation: &str) -> String {
        match format {
            TableFormat::Csv => self.to_csv(),
            TableFormat::Arff => self.to_arff(relation),
        }
    }
}

fn retain_indexed(values: Vec<String>, keep: impl Fn(&usize) -> bool) -> Vec<String> {
    values
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep(i))
        .map(|(_, v)| v)
        .collect()
}

fn quote_csv(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn quote_arff(field: &str) -> String {
    format!("'{}'", field.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Path for `format` under `base`: `<base>.<ext>`.
pub fn output_path(base: &Path, format: TableFormat) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(format.extension());
    PathBuf::from(name)
}

/// Write `content` to `path` through a sibling temporary file.
///
/// The target is replaced by a rename only after the full content is on
/// disk; on failure the temporary file is removed and the target untouched.
///
/// # Errors
///
/// Returns [`FaultlineError::Io`] if any filesystem step fails.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), FaultlineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let result = std::fs::write(&tmp, content).and_then(|()| std::fs::rename(&tmp, path));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
