//! Study-level row reconstruction: patient and study attributes come from
//! the same projected row, so no ancestor lookups are needed.

use crate::attributes;
use crate::context::QueryContext;
use crate::error::QueryError;
use crate::projection::PathValues;
use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;
use tracing::warn;

#[derive(Debug, Default)]
pub(super) struct StudyLevel;

pub(super) fn to_attributes(
	context: &QueryContext,
	values: &PathValues,
	fallback_aet: &str,
) -> Result<Option<InMemDicomObject>, QueryError> {
	let Some(number_of_instances) = values.int("study.number_of_study_related_instances") else {
		return Ok(None);
	};
	if number_of_instances == 0 {
		warn!(
			study = values.int("study.id"),
			"discarding study row without related instances"
		);
		return Ok(None);
	}
	let number_of_series = values
		.int("study.number_of_study_related_series")
		.unwrap_or(0);
	let modalities_in_study = values.str("study.modalities_in_study").unwrap_or_default();
	let sop_classes_in_study = values.str("study.sop_classes_in_study").unwrap_or_default();

	let mut study_attrs =
		attributes::decode(values.blob("study.encoded_attributes").unwrap_or_default())?;
	let mut patient_attrs =
		attributes::decode(values.blob("patient.encoded_attributes").unwrap_or_default())?;
	attributes::unify_character_sets(&mut [&mut patient_attrs, &mut study_attrs]);

	let mut attrs = InMemDicomObject::new_empty();
	attributes::overlay(&mut attrs, &patient_attrs);
	attributes::overlay(&mut attrs, &study_attrs);

	add_patient_qr_attrs(values, &mut attrs);
	add_study_qr_attrs(
		number_of_instances,
		number_of_series,
		modalities_in_study,
		sop_classes_in_study,
		&mut attrs,
	);

	super::add_extra_attributes(context, fallback_aet, None, &mut attrs);
	Ok(Some(attrs))
}

/// Patient-level computed query-retrieve attributes.
pub(super) fn add_patient_qr_attrs(values: &PathValues, attrs: &mut InMemDicomObject) {
	if let Some(number_of_studies) = values.int("patient.number_of_studies") {
		if number_of_studies > 0 {
			attrs.put(DataElement::new(
				tags::NUMBER_OF_PATIENT_RELATED_STUDIES,
				VR::IS,
				PrimitiveValue::from(number_of_studies.to_string()),
			));
		}
	}
}

/// Study-level computed query-retrieve attributes.
pub(super) fn add_study_qr_attrs(
	number_of_instances: i64,
	number_of_series: i64,
	modalities_in_study: &str,
	sop_classes_in_study: &str,
	attrs: &mut InMemDicomObject,
) {
	attrs.put(DataElement::new(
		tags::MODALITIES_IN_STUDY,
		VR::CS,
		super::split_multi(modalities_in_study),
	));
	attrs.put(DataElement::new(
		tags::SOP_CLASSES_IN_STUDY,
		VR::UI,
		super::split_multi(sop_classes_in_study),
	));
	attrs.put(DataElement::new(
		tags::NUMBER_OF_STUDY_RELATED_SERIES,
		VR::IS,
		PrimitiveValue::from(number_of_series.to_string()),
	));
	attrs.put(DataElement::new(
		tags::NUMBER_OF_STUDY_RELATED_INSTANCES,
		VR::IS,
		PrimitiveValue::from(number_of_instances.to_string()),
	));
}
