use std::path::PathBuf;

/// Errors that can occur while generating a defect dataset.
///
/// Library crates return this type directly; the binary renders it through
/// `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use faultline_core::FaultlineError;
///
/// let err = FaultlineError::Config("cutoff_fraction must be in (0, 1]".into());
/// assert!(err.to_string().contains("cutoff_fraction"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum FaultlineError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(help("check the [project] and [dataset] tables of .faultline.toml"))]
    Config(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    Git(String),

    /// Release timeline that is not consistently ordered.
    #[error("invalid release timeline: {0}")]
    Timeline(String),

    /// A method snapshot could not be read or decoded.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Terminal failure of a whole dataset-generation run.
    #[error("dataset generation failed for project {project}")]
    Generation {
        /// Project whose run failed.
        project: String,
        /// Underlying cause.
        #[source]
        source: Box<FaultlineError>,
    },
}

impl FaultlineError {
    /// Wrap `self` as the terminal failure of `project`'s generation run.
    ///
    /// Already-wrapped errors are returned unchanged.
    pub fn for_project(self, project: &str) -> Self {
        match self {
            err @ FaultlineError::Generation { .. } => err,
            other => FaultlineError::Generation {
                project: project.to_string(),
                source: Box::new(other),
            },
        }
    }
}
