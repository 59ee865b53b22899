//! Instance-level row reconstruction. Instance rows project only their own
//! columns plus the parent series key; the merged series/study/patient
//! attributes come from a separate ancestor lookup, memoized per series for
//! the lifetime of the request.

use super::study;
use crate::attributes;
use crate::context::QueryContext;
use crate::error::QueryError;
use crate::projection::PathValues;
use crate::store::{DataAccessError, QueryExecutor, SeriesAncestry};
use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Default)]
pub(super) struct InstanceLevel {
	/// Merged patient+study+series attributes, keyed by series primary key.
	/// Entries are never invalidated within the request.
	cached_series_attributes: HashMap<i64, InMemDicomObject>,
}

pub(super) async fn to_attributes(
	level: &mut InstanceLevel,
	context: &QueryContext,
	executor: &dyn QueryExecutor,
	values: &PathValues,
	fallback_aet: &str,
) -> Result<Option<InMemDicomObject>, QueryError> {
	let Some(series_pk) = values.int("series.id") else {
		warn!("discarding instance row without series identity");
		return Ok(None);
	};

	let mut series_attrs = match level.cached_series_attributes.get(&series_pk) {
		Some(cached) => cached.clone(),
		None => {
			let ancestry = executor
				.series_ancestry(series_pk)
				.await?
				.ok_or(DataAccessError::MissingAncestor(series_pk))?;
			let merged = merge_ancestry(context, &ancestry, fallback_aet)?;
			level
				.cached_series_attributes
				.insert(series_pk, merged.clone());
			merged
		}
	};

	let mut instance_attrs = attributes::decode(
		values
			.blob("instance.encoded_attributes")
			.unwrap_or_default(),
	)?;
	attributes::unify_character_sets(&mut [&mut series_attrs, &mut instance_attrs]);

	let mut attrs = InMemDicomObject::new_empty();
	attributes::overlay(&mut attrs, &series_attrs);
	attributes::overlay(&mut attrs, &instance_attrs);
	Ok(Some(attrs))
}

/// Merges a freshly fetched ancestor chain: attribute blobs ancestor-first,
/// then the computed query-retrieve attributes of each level, then the
/// extrinsic identifier block (with the series' scan id).
fn merge_ancestry(
	context: &QueryContext,
	ancestry: &SeriesAncestry,
	fallback_aet: &str,
) -> Result<InMemDicomObject, QueryError> {
	let mut patient_attrs = attributes::decode(&ancestry.patient.encoded_attributes)?;
	let mut study_attrs = attributes::decode(&ancestry.study.encoded_attributes)?;
	let mut series_attrs = attributes::decode(&ancestry.series.encoded_attributes)?;
	attributes::unify_character_sets(&mut [
		&mut patient_attrs,
		&mut study_attrs,
		&mut series_attrs,
	]);

	let mut attrs = InMemDicomObject::new_empty();
	attributes::overlay(&mut attrs, &patient_attrs);
	attributes::overlay(&mut attrs, &study_attrs);
	attributes::overlay(&mut attrs, &series_attrs);

	if ancestry.patient.number_of_studies > 0 {
		attrs.put(DataElement::new(
			tags::NUMBER_OF_PATIENT_RELATED_STUDIES,
			VR::IS,
			PrimitiveValue::from(ancestry.patient.number_of_studies.to_string()),
		));
	}
	if ancestry.study.number_of_study_related_instances > 0 {
		study::add_study_qr_attrs(
			ancestry.study.number_of_study_related_instances,
			ancestry.study.number_of_study_related_series,
			&ancestry.study.modalities_in_study,
			&ancestry.study.sop_classes_in_study,
			&mut attrs,
		);
	}
	if ancestry.series.number_of_series_related_instances > 0 {
		attrs.put(DataElement::new(
			tags::NUMBER_OF_SERIES_RELATED_INSTANCES,
			VR::IS,
			PrimitiveValue::from(
				ancestry
					.series
					.number_of_series_related_instances
					.to_string(),
			),
		));
		attrs.put(DataElement::new(
			tags::AVAILABLE_TRANSFER_SYNTAX_UID,
			VR::UI,
			PrimitiveValue::from(ancestry.series.available_transfer_syntax_uid.as_str()),
		));
	}

	super::add_extra_attributes(
		context,
		fallback_aet,
		ancestry.series.scan_id.as_deref(),
		&mut attrs,
	);
	Ok(attrs)
}
