//! Git history collaborators for bug attribution.
//!
//! Mines git history using git2 to discover the release timeline from tags,
//! link defect tickets to the commits that fixed them, and find the methods
//! each fix touched.

pub mod fixes;
pub mod mining;
pub mod releases;
