//! The seam between the matching engine and whatever holds the rows.
//!
//! The engine builds a [`QuerySpec`] (predicate tree, ordering, projection,
//! paging) and hands it to a [`QueryExecutor`]. Two realizations ship with
//! the crate: [`memory::MemoryStore`] evaluates the predicate tree directly
//! over in-process records, and [`crate::predicate::sql`] lowers the same
//! spec to a parameterized SELECT for a relational database.

pub mod memory;

use crate::predicate::QuerySpec;
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// One projected column value of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
	Null,
	Int(i64),
	Str(String),
	Blob(Vec<u8>),
}

impl CellValue {
	pub const fn as_int(&self) -> Option<i64> {
		match self {
			Self::Int(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Str(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_blob(&self) -> Option<&[u8]> {
		match self {
			Self::Blob(value) => Some(value),
			_ => None,
		}
	}
}

/// A flat, positional result row. Columns follow the projection-path list of
/// the executed spec; trailing optional columns may be missing.
pub type Row = Vec<CellValue>;

/// Forward-only stream of result rows. Single pass; dropped to release.
pub type RowStream = BoxStream<'static, Result<Row, DataAccessError>>;

/// Patient part of an instance-level ancestor lookup.
#[derive(Debug, Clone, Default)]
pub struct PatientSnapshot {
	pub encoded_attributes: Vec<u8>,
	pub number_of_studies: i64,
}

/// Study part of an instance-level ancestor lookup.
#[derive(Debug, Clone, Default)]
pub struct StudySnapshot {
	pub encoded_attributes: Vec<u8>,
	pub number_of_study_related_instances: i64,
	pub number_of_study_related_series: i64,
	pub modalities_in_study: String,
	pub sop_classes_in_study: String,
}

/// Series part of an instance-level ancestor lookup.
#[derive(Debug, Clone, Default)]
pub struct SeriesSnapshot {
	pub encoded_attributes: Vec<u8>,
	pub number_of_series_related_instances: i64,
	pub available_transfer_syntax_uid: String,
	pub scan_id: Option<String>,
}

/// The full ancestor chain of a series, resolved by primary key for
/// instance-level reconstruction.
#[derive(Debug, Clone, Default)]
pub struct SeriesAncestry {
	pub patient: PatientSnapshot,
	pub study: StudySnapshot,
	pub series: SeriesSnapshot,
}

/// Failures raised by the backing store. Always fatal to the request that
/// triggered them.
#[derive(Debug, Error)]
pub enum DataAccessError {
	#[error("backing store failure: {source}")]
	Backend {
		source: Box<dyn std::error::Error + Send + Sync>,
	},

	/// A result row references a series the store no longer resolves.
	/// Skipping it would silently drop ancestor attributes from merged
	/// results, so it propagates as corruption instead.
	#[error("series {0} is referenced by a result row but absent from the store")]
	MissingAncestor(i64),
}

/// Executes count and list queries against the four-level hierarchy.
///
/// Count and list executions are independent round trips: no snapshot is
/// shared between them, and a count may disagree with the rows a later list
/// streams back if the store is written to in between.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
	/// Total number of rows matching the spec's predicates. Ignores the
	/// spec's offset/limit.
	async fn count(&self, spec: &QuerySpec) -> Result<u64, DataAccessError>;

	/// Opens a forward-only stream over the projected, ordered, paged rows.
	async fn list(&self, spec: &QuerySpec) -> Result<RowStream, DataAccessError>;

	/// Resolves a series primary key to its series/study/patient chain.
	/// `None` means the key no longer resolves (see
	/// [`DataAccessError::MissingAncestor`]).
	async fn series_ancestry(
		&self,
		series_pk: i64,
	) -> Result<Option<SeriesAncestry>, DataAccessError>;
}
