//! Series-level row reconstruction. The study/patient part of every row is
//! merged once per distinct study and memoized for the lifetime of the
//! request.

use super::study;
use crate::attributes;
use crate::context::QueryContext;
use crate::error::QueryError;
use crate::projection::PathValues;
use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Default)]
pub(super) struct SeriesLevel {
	/// Merged patient+study attributes, keyed by study primary key. Entries
	/// are never invalidated within the request.
	cached_study_attributes: HashMap<i64, InMemDicomObject>,
}

pub(super) fn to_attributes(
	level: &mut SeriesLevel,
	context: &QueryContext,
	values: &PathValues,
	fallback_aet: &str,
) -> Result<Option<InMemDicomObject>, QueryError> {
	let Some(number_of_instances) = values.int("series.number_of_series_related_instances")
	else {
		return Ok(None);
	};
	if number_of_instances == 0 {
		warn!(
			series = values.int("series.id"),
			"discarding series row without related instances"
		);
		return Ok(None);
	}
	let Some(study_pk) = values.int("study.id") else {
		warn!("discarding series row without study identity");
		return Ok(None);
	};

	let mut study_attrs = match level.cached_study_attributes.get(&study_pk) {
		Some(cached) => cached.clone(),
		None => {
			let merged = study_attributes(values)?;
			level
				.cached_study_attributes
				.insert(study_pk, merged.clone());
			merged
		}
	};

	let mut series_attrs =
		attributes::decode(values.blob("series.encoded_attributes").unwrap_or_default())?;
	attributes::unify_character_sets(&mut [&mut study_attrs, &mut series_attrs]);

	let mut attrs = InMemDicomObject::new_empty();
	attributes::overlay(&mut attrs, &study_attrs);
	attributes::overlay(&mut attrs, &series_attrs);

	add_series_qr_attrs(values, number_of_instances, &mut attrs);

	let scan_id = values.str("series.scan_id").map(str::to_owned);
	super::add_extra_attributes(context, fallback_aet, scan_id.as_deref(), &mut attrs);
	Ok(Some(attrs))
}

/// Series-level computed query-retrieve attributes.
pub(super) fn add_series_qr_attrs(
	values: &PathValues,
	number_of_instances: i64,
	attrs: &mut InMemDicomObject,
) {
	attrs.put(DataElement::new(
		tags::NUMBER_OF_SERIES_RELATED_INSTANCES,
		VR::IS,
		PrimitiveValue::from(number_of_instances.to_string()),
	));
	let transfer_syntax_uid = values
		.str("series.available_transfer_syntax_uid")
		.unwrap_or_default();
	attrs.put(DataElement::new(
		tags::AVAILABLE_TRANSFER_SYNTAX_UID,
		VR::UI,
		PrimitiveValue::from(transfer_syntax_uid),
	));
}

/// The patient+study part of a series row, merged the same way a
/// study-level query would merge it. A study whose counts are missing
/// still merges (with zeroed computed attributes); the orphan guard
/// applies to the series row itself, not its ancestors.
fn study_attributes(values: &PathValues) -> Result<InMemDicomObject, QueryError> {
	let (number_of_instances, number_of_series, modalities_in_study, sop_classes_in_study) =
		match values.int("study.number_of_study_related_instances") {
			Some(number_of_instances) => (
				number_of_instances,
				values
					.int("study.number_of_study_related_series")
					.unwrap_or(0),
				values.str("study.modalities_in_study").unwrap_or_default(),
				values.str("study.sop_classes_in_study").unwrap_or_default(),
			),
			None => (0, 0, "", ""),
		};

	let mut study_attrs =
		attributes::decode(values.blob("study.encoded_attributes").unwrap_or_default())?;
	let mut patient_attrs =
		attributes::decode(values.blob("patient.encoded_attributes").unwrap_or_default())?;
	attributes::unify_character_sets(&mut [&mut patient_attrs, &mut study_attrs]);

	let mut attrs = InMemDicomObject::new_empty();
	attributes::overlay(&mut attrs, &patient_attrs);
	attributes::overlay(&mut attrs, &study_attrs);

	study::add_patient_qr_attrs(values, &mut attrs);
	study::add_study_qr_attrs(
		number_of_instances,
		number_of_series,
		modalities_in_study,
		sop_classes_in_study,
		&mut attrs,
	);
	Ok(attrs)
}
