//! Method snapshots supplied by the external static analyzer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use faultline_core::{AnalyzedMethod, FaultlineError, Release};

/// Supplies the analyzed methods of one release.
pub trait MethodSource {
    /// Methods measured in `release`.
    ///
    /// `Ok(None)` means no snapshot could be resolved for the release; the
    /// assembler skips it. Errors abort the generation run.
    fn methods_for_release(
        &mut self,
        release: &Release,
    ) -> Result<Option<Vec<AnalyzedMethod>>, FaultlineError>;
}

/// In-memory snapshots keyed by release name.
impl MethodSource for BTreeMap<String, Vec<AnalyzedMethod>> {
    fn methods_for_release(
        &mut self,
        release: &Release,
    ) -> Result<Option<Vec<AnalyzedMethod>>, FaultlineError> {
        Ok(self.get(&release.name).cloned())
    }
}

/// Reads `<dir>/<release>.json` snapshots written by the analyzer.
///
/// Path separators in release names are replaced with `_`, so the tag
/// `release/4.2` maps to `release_4.2.json`.
///
/// # Examples
///
/// ```
/// use faultline_dataset::source::JsonMethodSource;
///
/// let source = JsonMethodSource::new("metrics");
/// assert_eq!(
///     source.snapshot_path("release/4.2"),
///     std::path::PathBuf::from("metrics/release_4.2.json"),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct JsonMethodSource {
    dir: PathBuf,
}

impl JsonMethodSource {
    /// Source reading snapshots from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory snapshots are read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot file for the release called `release_name`.
    pub fn snapshot_path(&self, release_name: &str) -> PathBuf {
        let file_stem: String = release_name
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        self.dir.join(format!("{file_stem}.json"))
    }
}

impl MethodSource for JsonMethodSource {
    fn methods_for_release(
        &mut self,
        release: &Release,
    ) -> Result<Option<Vec<AnalyzedMethod>>, FaultlineError> {
        let path = self.snapshot_path(&release.name);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let methods: Vec<AnalyzedMethod> = serde_json::from_str(&content).map_err(|e| {
            FaultlineError::Snapshot(format!("{}: {e}", path.display()))
        })?;
        Ok(Some(methods))
    }
}
