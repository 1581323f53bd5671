use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FaultlineError;

/// Top-level configuration loaded from `.faultline.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use faultline_core::FaultlineConfig;
///
/// let config = FaultlineConfig::default();
/// assert_eq!(config.dataset.cutoff_fraction, 0.5);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaultlineConfig {
    /// Where the project's inputs live.
    #[serde(default)]
    pub project: ProjectConfig,
    /// Dataset shaping and output settings.
    #[serde(default)]
    pub dataset: DatasetConfig,
}

impl FaultlineConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FaultlineError::Io`] if the file cannot be read, or
    /// [`FaultlineError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use faultline_core::FaultlineConfig;
    /// use std::path::Path;
    ///
    /// let config = FaultlineConfig::from_file(Path::new(".faultline.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, FaultlineError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`FaultlineError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use faultline_core::FaultlineConfig;
    ///
    /// let toml = r#"
    /// [dataset]
    /// cutoff_fraction = 0.75
    /// "#;
    /// let config = FaultlineConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.dataset.cutoff_fraction, 0.75);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, FaultlineError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Check value ranges that TOML typing cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`FaultlineError::Config`] naming the offending key.
    pub fn validate(&self) -> Result<(), FaultlineError> {
        let cutoff = self.dataset.cutoff_fraction;
        if !(cutoff > 0.0 && cutoff <= 1.0) {
            return Err(FaultlineError::Config(format!(
                "dataset.cutoff_fraction must be in (0, 1], got {cutoff}"
            )));
        }
        if self.project.name.trim().is_empty() {
            return Err(FaultlineError::Config("project.name must not be empty".into()));
        }
        if self.dataset.formats.is_empty() {
            return Err(FaultlineError::Config(
                "dataset.formats must name at least one format".into(),
            ));
        }
        Ok(())
    }
}

/// Project inputs.
///
/// # Examples
///
/// ```
/// use faultline_core::ProjectConfig;
///
/// let config = ProjectConfig::default();
/// assert_eq!(config.tickets.to_str(), Some("tickets.json"));
/// assert_eq!(config.metrics_dir.to_str(), Some("metrics"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name; written into every row.
    #[serde(default = "default_project_name")]
    pub name: String,
    /// Path to the git repository.
    #[serde(default = "default_repo")]
    pub repo: PathBuf,
    /// Tracker export with the project's defect tickets.
    #[serde(default = "default_tickets")]
    pub tickets: PathBuf,
    /// Directory holding one `<release>.json` method snapshot per release.
    #[serde(default = "default_metrics_dir")]
    pub metrics_dir: PathBuf,
}

fn default_project_name() -> String {
    "project".into()
}

fn default_repo() -> PathBuf {
    PathBuf::from(".")
}

fn default_tickets() -> PathBuf {
    PathBuf::from("tickets.json")
}

fn default_metrics_dir() -> PathBuf {
    PathBuf::from("metrics")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            repo: default_repo(),
            tickets: default_tickets(),
            metrics_dir: default_metrics_dir(),
        }
    }
}

/// Dataset shaping and output configuration.
///
/// # Examples
///
/// ```
/// use faultline_core::{DatasetConfig, TableFormat};
///
/// let config = DatasetConfig::default();
/// assert_eq!(config.cutoff_fraction, 0.5);
/// assert_eq!(config.formats, vec![TableFormat::Csv]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Fraction of the release timeline to analyze, oldest first (default: 0.5).
    #[serde(default = "default_cutoff_fraction")]
    pub cutoff_fraction: f64,
    /// Output base path; each format appends its extension (default: `dataset`).
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Formats to write (default: csv).
    #[serde(default = "default_formats")]
    pub formats: Vec<TableFormat>,
}

fn default_cutoff_fraction() -> f64 {
    0.5
}

fn default_output() -> PathBuf {
    PathBuf::from("dataset")
}

fn default_formats() -> Vec<TableFormat> {
    vec![TableFormat::Csv]
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            cutoff_fraction: default_cutoff_fraction(),
            output: default_output(),
            formats: default_formats(),
        }
    }
}

/// On-disk dataset format.
///
/// # Examples
///
/// ```
/// use faultline_core::TableFormat;
///
/// let f: TableFormat = "arff".parse().unwrap();
/// assert_eq!(f, TableFormat::Arff);
/// assert_eq!(f.extension(), "arff");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// Comma-separated values, every field quoted.
    Csv,
    /// Weka attribute-relation file.
    Arff,
}

impl TableFormat {
    /// File extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Arff => "arff",
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TableFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(TableFormat::Csv),
            "arff" => Ok(TableFormat::Arff),
            other => Err(format!("unknown table format: {other} (expected csv or arff)")),
        }
    }
}
