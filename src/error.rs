use crate::store::DataAccessError;
use crate::types::QueryRetrieveLevel;
use thiserror::Error;

/// Errors surfaced by a search query.
///
/// Malformed matching values are deliberately *not* represented here: bad
/// numerics, degenerate wildcard patterns and unrecognized order-by tags
/// widen the match instead of failing it.
#[derive(Debug, Error)]
pub enum QueryError {
	/// The caller requested a query retrieve level this engine has no
	/// reconstructor for. Surfaced before any store access.
	#[error("unsupported query retrieve level {0}")]
	UnsupportedLevel(QueryRetrieveLevel),

	/// The backing store failed during execution or ancestor lookup.
	#[error(transparent)]
	DataAccess(#[from] DataAccessError),

	/// A stored attribute blob could not be decoded.
	#[error("failed to decode stored attributes: {0}")]
	Decode(#[from] dicom::object::ReadError),
}
