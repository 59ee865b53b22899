//! Matching and result assembly for a QIDO-RS search endpoint backed by a
//! relational DICOM archive.
//!
//! The store indexes a four-level hierarchy (Patient → Study → Series →
//! Instance) with denormalized matching columns plus an encoded attribute
//! blob per row. Given a [`QueryContext`] (matching keys, query-retrieve
//! level, ordering and paging), a [`Query`]:
//!
//! 1. translates the keys into a predicate tree scoped to the hierarchy
//!    aliases, preserving DICOM matching semantics (universal matching,
//!    wildcards, ranges, combined date/time, case folding rules),
//! 2. runs a count or a paged list execution through a swappable
//!    [`store::QueryExecutor`], and
//! 3. reconstructs, per row, one merged attribute set spanning all ancestor
//!    levels plus the computed query-retrieve attributes.
//!
//! <https://dicom.nema.org/medical/dicom/current/output/chtml/part18/sect_10.6.html>

pub mod attributes;
pub mod config;
pub mod context;
pub mod error;
pub mod predicate;
pub mod projection;
pub mod query;
pub mod store;
pub mod types;

pub use config::EngineConfig;
pub use context::{ArchiveIds, PatientId, QueryContext};
pub use error::QueryError;
pub use query::Query;
pub use types::{OrderByTag, QueryRetrieveLevel, SortDirection};
