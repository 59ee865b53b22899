//! The query template shared by all levels: a small state machine around
//! one count or one paged list execution, a single-pass forward cursor, and
//! the return-key adjustment applied to every reconstructed match.

mod instance;
mod series;
mod study;

use crate::config::EngineConfig;
use crate::context::{
	QueryContext, COLLECTION_ID, PRIVATE_CREATOR, PRIVATE_CREATOR_TAG, SCAN_ID, SESSION_ID,
	SUBJECT_ID,
};
use crate::error::QueryError;
use crate::predicate::builder::{self, MatchingOptions};
use crate::predicate::{EntityAlias, Path, Predicate, QuerySpec, SortKey};
use crate::projection::{projection_for, PathValues};
use crate::store::{QueryExecutor, RowStream};
use crate::types::QueryRetrieveLevel;
use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;
use futures::stream::{Peekable, StreamExt};
use std::pin::Pin;
use tracing::debug;

/// Value of InstanceAvailability on every match; the store only indexes
/// online objects.
const AVAILABILITY_ONLINE: &str = "ONLINE";

/// Execution state of one query instance.
enum State {
	/// Constructed, nothing executed yet.
	Idle,
	/// A count-only execution has run.
	Counting,
	/// A list execution has opened a forward cursor.
	Listing(Peekable<RowStream>),
	/// The cursor has been released.
	Closed,
}

/// Per-level reconstructor state. The level set is closed, so dispatch is a
/// plain `match`.
enum Level {
	Study(study::StudyLevel),
	Series(series::SeriesLevel),
	Instance(instance::InstanceLevel),
}

/// One search request against the store: predicates, ordering, projection
/// and per-row attribute reconstruction for a single query-retrieve level.
///
/// Created fresh per request and not meant to be shared: the cursor, the
/// match count and the ancestor-attribute caches are single-writer state
/// owned by the request task.
pub struct Query {
	context: QueryContext,
	options: MatchingOptions,
	fetch_size: usize,
	fallback_aet: String,
	projection: Vec<Path>,
	level: Level,
	state: State,
	count: u64,
}

impl Query {
	/// Builds the reconstructor for the context's query-retrieve level.
	///
	/// # Errors
	/// [`QueryError::UnsupportedLevel`] for levels without a reconstructor
	/// (PATIENT); a configuration error, surfaced before any store access.
	pub fn new(context: QueryContext, config: &EngineConfig) -> Result<Self, QueryError> {
		let level = match context.query_retrieve_level {
			QueryRetrieveLevel::Study => Level::Study(study::StudyLevel::default()),
			QueryRetrieveLevel::Series => Level::Series(series::SeriesLevel::default()),
			QueryRetrieveLevel::Image => Level::Instance(instance::InstanceLevel::default()),
			unsupported @ QueryRetrieveLevel::Patient => {
				return Err(QueryError::UnsupportedLevel(unsupported));
			}
		};
		let projection = projection_for(context.query_retrieve_level);

		Ok(Self {
			context,
			options: config.matching_options(),
			fetch_size: config.query.fetch_size,
			fallback_aet: config.retrieve.aet.clone(),
			projection,
			level,
			state: State::Idle,
			count: 0,
		})
	}

	/// Runs the count-only execution and stores the scalar result. Offset
	/// and limit never apply here.
	pub async fn execute_count_query(
		&mut self,
		executor: &dyn QueryExecutor,
	) -> Result<u64, QueryError> {
		// The patient alias costs a join; skip it when nothing restricts it.
		let query_patient = match self.level {
			Level::Study(_) => builder::has_patient_level_criteria(
				&self.context.patient_ids,
				&self.context.matching_keys,
			),
			_ => true,
		};
		let spec = QuerySpec::count_of(self.root(), self.restrict(query_patient));

		debug!(
			level = %self.context.query_retrieve_level,
			predicates = spec.predicates.len(),
			"executing count query"
		);
		self.count = executor.count(&spec).await?;
		if matches!(self.state, State::Idle) {
			self.state = State::Counting;
		}
		Ok(self.count)
	}

	/// Releases any prior cursor and opens a fresh forward-only cursor over
	/// the ordered, projected, paged result rows. `limit == 0` streams
	/// unbounded.
	pub async fn execute_query(
		&mut self,
		executor: &dyn QueryExecutor,
		limit: usize,
	) -> Result<(), QueryError> {
		self.close();

		let spec = QuerySpec {
			root: self.root(),
			predicates: self.restrict(true),
			order: self.order(),
			projection: self.projection.clone(),
			offset: self.context.offset,
			limit,
			fetch_size: self.fetch_size,
		};

		debug!(
			level = %self.context.query_retrieve_level,
			predicates = spec.predicates.len(),
			offset = spec.offset,
			limit,
			"executing list query"
		);
		let stream = executor.list(&spec).await?;
		self.state = State::Listing(stream.peekable());
		Ok(())
	}

	/// Whether the cursor has another row. `false` on an unopened or closed
	/// cursor.
	pub async fn has_more_matches(&mut self) -> bool {
		match &mut self.state {
			State::Listing(cursor) => Pin::new(cursor).peek().await.is_some(),
			_ => false,
		}
	}

	/// Advances the cursor and reconstructs the merged attribute set of the
	/// next row. `Ok(None)` means either the cursor is exhausted (or not
	/// open) or the row was discarded as orphaned.
	pub async fn next_match(
		&mut self,
		executor: &dyn QueryExecutor,
	) -> Result<Option<InMemDicomObject>, QueryError> {
		let row = match &mut self.state {
			State::Listing(cursor) => cursor.next().await,
			_ => None,
		};
		let Some(row) = row else {
			return Ok(None);
		};
		let values = PathValues::from_row(row?, &self.projection);

		match &mut self.level {
			Level::Study(_) => study::to_attributes(&self.context, &values, &self.fallback_aet),
			Level::Series(level) => {
				series::to_attributes(level, &self.context, &values, &self.fallback_aet)
			}
			Level::Instance(level) => {
				instance::to_attributes(
					level,
					&self.context,
					executor,
					&values,
					&self.fallback_aet,
				)
				.await
			}
		}
	}

	/// Applies the caller's explicit return keys: the match is filtered down
	/// to exactly those keys, with requested-but-absent keys supplemented as
	/// empty values. Without return keys the match passes through unchanged;
	/// an absent match always passes through as absent.
	pub fn adjust(&self, matched: Option<InMemDicomObject>) -> Option<InMemDicomObject> {
		let matched = matched?;
		let Some(return_keys) = &self.context.return_keys else {
			return Some(matched);
		};

		let mut filtered = InMemDicomObject::new_empty();
		for tag in return_keys.tags() {
			match matched.element(tag) {
				Ok(element) => {
					filtered.put(element.clone());
				}
				Err(_) => {
					let vr = return_keys
						.element(tag)
						.map_or(VR::UN, |element| element.vr());
					filtered.put(DataElement::new(tag, vr, PrimitiveValue::Empty));
				}
			}
		}
		Some(filtered)
	}

	/// Releases the cursor. Idempotent; safe on an unopened cursor.
	pub fn close(&mut self) {
		self.state = State::Closed;
	}

	/// The result of the last count execution.
	pub const fn count(&self) -> u64 {
		self.count
	}

	pub const fn context(&self) -> &QueryContext {
		&self.context
	}

	const fn root(&self) -> EntityAlias {
		match self.level {
			Level::Study(_) => EntityAlias::Study,
			Level::Series(_) => EntityAlias::Series,
			Level::Instance(_) => EntityAlias::Instance,
		}
	}

	fn restrict(&self, query_patient: bool) -> Vec<Predicate> {
		let pids = &self.context.patient_ids;
		let keys = &self.context.matching_keys;
		match self.level {
			Level::Study(_) => builder::study_predicates(pids, keys, query_patient, self.options),
			Level::Series(_) => builder::series_predicates(pids, keys, self.options),
			Level::Instance(_) => builder::instance_predicates(pids, keys, self.options),
		}
	}

	fn order(&self) -> Vec<SortKey> {
		let order_by = &self.context.order_by_tags;
		match self.level {
			Level::Study(_) => builder::order_studies(order_by),
			Level::Series(_) => builder::order_series(order_by),
			Level::Instance(_) => builder::order_instances(order_by),
		}
	}
}

/// The extrinsic identifier block stamped onto every match: retrieve AE
/// title, availability, and the archive identity elements. The scan id is
/// only attached at series level and below, when the row provides one.
fn add_extra_attributes(
	context: &QueryContext,
	fallback_aet: &str,
	scan_id: Option<&str>,
	attrs: &mut InMemDicomObject,
) {
	let ids = &context.archive_ids;
	let collection = ids.reported_collection();

	attrs.put(DataElement::new(
		tags::RETRIEVE_AE_TITLE,
		VR::AE,
		PrimitiveValue::from(collection.unwrap_or(fallback_aet)),
	));
	attrs.put(DataElement::new(
		tags::INSTANCE_AVAILABILITY,
		VR::CS,
		PrimitiveValue::from(AVAILABILITY_ONLINE),
	));

	attrs.put(DataElement::new(
		PRIVATE_CREATOR_TAG,
		VR::LO,
		PrimitiveValue::from(PRIVATE_CREATOR),
	));
	attrs.put(DataElement::new(
		COLLECTION_ID,
		VR::LO,
		optional_value(collection),
	));
	attrs.put(DataElement::new(
		SUBJECT_ID,
		VR::LO,
		optional_value(ids.subject.as_deref()),
	));
	attrs.put(DataElement::new(
		SESSION_ID,
		VR::LO,
		optional_value(ids.session.as_deref()),
	));
	if let Some(scan_id) = scan_id {
		attrs.put(DataElement::new(
			SCAN_ID,
			VR::LO,
			PrimitiveValue::from(scan_id),
		));
	}
}

fn optional_value(value: Option<&str>) -> PrimitiveValue {
	value.map_or(PrimitiveValue::Empty, PrimitiveValue::from)
}

/// Splits a backslash-delimited stored multi-value into element values.
fn split_multi(value: &str) -> PrimitiveValue {
	if value.is_empty() {
		return PrimitiveValue::Empty;
	}
	PrimitiveValue::Strs(
		value
			.split('\\')
			.map(str::to_owned)
			.collect::<Vec<_>>()
			.into(),
	)
}
