//! Bug attribution and dataset assembly.
//!
//! Estimates the release in which each defect was introduced, labels methods
//! buggy or clean per release, and assembles the labeled method table used
//! for defect-prediction modeling, pruning quasi-constant feature columns.

pub mod assembler;
pub mod indexer;
pub mod labeler;
pub mod pipeline;
pub mod proportion;
pub mod source;
pub mod table;
pub mod variance;
