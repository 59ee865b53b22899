//! Fixed, per-level projection-path lists and the positional mapping from a
//! flat result row back to named values.

use crate::predicate::Path;
use crate::store::{CellValue, Row};
use crate::types::QueryRetrieveLevel;
use std::collections::HashMap;

pub const PATIENT_PROJECTION: &[Path] = &[
	"patient.id",
	"patient.subject_id",
	"patient.number_of_studies",
	"patient.encoded_attributes",
];

pub const STUDY_PROJECTION: &[Path] = &[
	"study.id",
	"study.session_id",
	"study.number_of_study_related_instances",
	"study.number_of_study_related_series",
	"study.modalities_in_study",
	"study.sop_classes_in_study",
	"study.encoded_attributes",
];

pub const SERIES_PROJECTION: &[Path] = &[
	"series.id",
	"series.scan_id",
	"series.number_of_series_related_instances",
	"series.available_transfer_syntax_uid",
	"series.sop_classes_in_series",
	"series.encoded_attributes",
];

pub const INSTANCE_PROJECTION: &[Path] = &[
	"instance.id",
	"instance.encoded_attributes",
	// Parent identity, for the ancestor-attribute lookup.
	"series.id",
];

/// The exact column list a query at the given level fetches, in order.
/// Deeper levels prepend their ancestors' columns; instance queries fetch
/// only their own columns plus the parent identity.
pub fn projection_for(level: QueryRetrieveLevel) -> Vec<Path> {
	let parts: &[&[Path]] = match level {
		QueryRetrieveLevel::Patient => &[PATIENT_PROJECTION],
		QueryRetrieveLevel::Study => &[PATIENT_PROJECTION, STUDY_PROJECTION],
		QueryRetrieveLevel::Series => {
			&[PATIENT_PROJECTION, STUDY_PROJECTION, SERIES_PROJECTION]
		}
		QueryRetrieveLevel::Image => &[INSTANCE_PROJECTION],
	};
	parts.iter().flat_map(|paths| paths.iter().copied()).collect()
}

/// A result row keyed by projection path.
#[derive(Debug)]
pub struct PathValues {
	values: HashMap<Path, CellValue>,
}

impl PathValues {
	/// Zips a flat row with the active path list. Rows shorter than the
	/// path list are padded with nulls, so queries whose join structure
	/// omits trailing optional columns still map cleanly.
	pub fn from_row(row: Row, paths: &[Path]) -> Self {
		let mut row = row.into_iter();
		let values = paths
			.iter()
			.map(|path| (*path, row.next().unwrap_or(CellValue::Null)))
			.collect();
		Self { values }
	}

	pub fn int(&self, path: Path) -> Option<i64> {
		self.values.get(path).and_then(CellValue::as_int)
	}

	pub fn str(&self, path: Path) -> Option<&str> {
		self.values.get(path).and_then(CellValue::as_str)
	}

	pub fn blob(&self, path: Path) -> Option<&[u8]> {
		self.values.get(path).and_then(CellValue::as_blob)
	}

	pub fn is_null(&self, path: Path) -> bool {
		matches!(self.values.get(path), None | Some(CellValue::Null))
	}
}
