//! The per-request input bundle assembled by the (out-of-scope) request
//! parsing layer.

use crate::types::{OrderByTag, QueryRetrieveLevel};
use dicom::core::Tag;
use dicom::object::InMemDicomObject;

/// Private creator reserving block `0x10` of group `0x7777` for archive
/// identity elements.
pub const PRIVATE_CREATOR: &str = "QIDO-SEARCH ARCHIVE";

/// (7777,0010) VR=LO. The private creator element itself.
pub const PRIVATE_CREATOR_TAG: Tag = Tag(0x7777, 0x0010);

/// (7777,1010) VR=LO VM=1 Archive Collection ID
pub const COLLECTION_ID: Tag = Tag(0x7777, 0x1010);

/// (7777,1011) VR=LO VM=1 Archive Subject ID
pub const SUBJECT_ID: Tag = Tag(0x7777, 0x1011);

/// (7777,1012) VR=LO VM=1 Archive Session ID
pub const SESSION_ID: Tag = Tag(0x7777, 0x1012);

/// (7777,1013) VR=LO VM=1 Archive Scan ID
pub const SCAN_ID: Tag = Tag(0x7777, 0x1013);

/// A patient identifier with its optional issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientId {
	pub id: String,
	pub issuer: Option<String>,
}

impl PatientId {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			issuer: None,
		}
	}

	pub fn with_issuer(id: impl Into<String>, issuer: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			issuer: Some(issuer.into()),
		}
	}
}

/// Identity of the archive scope a request runs under. These values come
/// from the hosting platform, not from DICOM data, and are stamped onto
/// every reconstructed match as the extrinsic identifier block.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIds {
	pub collection: Option<String>,
	/// A collection the session is shared into. Takes precedence over
	/// `collection` wherever a single collection id is reported.
	pub shared_collection: Option<String>,
	pub subject: Option<String>,
	pub session: Option<String>,
}

impl ArchiveIds {
	/// The collection id reported to callers: the shared collection when
	/// present, the primary collection otherwise.
	pub fn reported_collection(&self) -> Option<&str> {
		self.shared_collection
			.as_deref()
			.or(self.collection.as_deref())
	}
}

/// Everything the engine needs to run one search request.
///
/// Created fresh per request; the engine never mutates it.
#[derive(Debug)]
pub struct QueryContext {
	pub query_retrieve_level: QueryRetrieveLevel,
	/// The matching keys (query identifier) supplied by the caller.
	pub matching_keys: InMemDicomObject,
	/// Explicit return keys; `None` returns the full merged set.
	pub return_keys: Option<InMemDicomObject>,
	pub order_by_tags: Vec<OrderByTag>,
	pub patient_ids: Vec<PatientId>,
	pub offset: usize,
	/// Caller-requested page size; `0` asks for an unbounded listing. The
	/// hosting service passes the effective value (possibly capped) to
	/// [`crate::query::Query::execute_query`].
	pub limit: usize,
	pub archive_ids: ArchiveIds,
}

impl QueryContext {
	pub fn new(level: QueryRetrieveLevel) -> Self {
		Self {
			query_retrieve_level: level,
			matching_keys: InMemDicomObject::new_empty(),
			return_keys: None,
			order_by_tags: Vec::new(),
			patient_ids: Vec::new(),
			offset: 0,
			limit: 0,
			archive_ids: ArchiveIds::default(),
		}
	}
}
