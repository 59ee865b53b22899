//! Attribute-set plumbing: the stored-blob codec, the ancestor→descendant
//! overlay merge, character-set unification, and read access to matching-key
//! values.

use crate::types::{DateRange, RangeKind};
use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::tags;
use dicom::object::{InMemDicomObject, ReadError, WriteError};
use dicom::transfer_syntax::entries::EXPLICIT_VR_LITTLE_ENDIAN;

/// Character set every attribute set is re-declared with when merged sets
/// disagree. Values are held as decoded Rust strings, so declaring the
/// merged set as UTF-8 is lossless.
const UNIFIED_CHARACTER_SET: &str = "ISO_IR 192";

/// Decodes a stored attribute blob. An empty blob is an empty set.
pub fn decode(blob: &[u8]) -> Result<InMemDicomObject, ReadError> {
	if blob.is_empty() {
		return Ok(InMemDicomObject::new_empty());
	}
	InMemDicomObject::read_dataset_with_ts(blob, &EXPLICIT_VR_LITTLE_ENDIAN.erased())
}

/// Encodes an attribute set into the stored blob form.
pub fn encode(obj: &InMemDicomObject) -> Result<Vec<u8>, WriteError> {
	let mut blob = Vec::new();
	obj.write_dataset_with_ts(&mut blob, &EXPLICIT_VR_LITTLE_ENDIAN.erased())?;
	Ok(blob)
}

/// Copies every element of `source` into `target`, replacing elements that
/// already exist there. Merges therefore run ancestor first, descendants
/// after, so the descendant wins on tag collision.
pub fn overlay(target: &mut InMemDicomObject, source: &InMemDicomObject) {
	for tag in source.tags() {
		if let Ok(element) = source.element(tag) {
			target.put(element.clone());
		}
	}
}

/// Aligns the declared character set of attribute sets that are about to be
/// merged. If the declarations already agree (or at most one set declares
/// anything), nothing changes; otherwise every set is re-declared with
/// [`UNIFIED_CHARACTER_SET`].
pub fn unify_character_sets(sets: &mut [&mut InMemDicomObject]) {
	let mut declared: Option<String> = None;
	let mut conflicting = false;
	for set in sets.iter() {
		if let Some(charset) = charset_of(set) {
			match &declared {
				None => declared = Some(charset),
				Some(seen) if *seen == charset => {}
				Some(_) => {
					conflicting = true;
					break;
				}
			}
		}
	}
	if !conflicting {
		return;
	}
	for set in sets.iter_mut() {
		set.put(DataElement::new(
			tags::SPECIFIC_CHARACTER_SET,
			VR::CS,
			PrimitiveValue::from(UNIFIED_CHARACTER_SET),
		));
	}
}

fn charset_of(set: &InMemDicomObject) -> Option<String> {
	let value = set
		.element(tags::SPECIFIC_CHARACTER_SET)
		.ok()?
		.to_str()
		.ok()?
		.trim()
		.to_owned();
	(!value.is_empty()).then_some(value)
}

/// All values of a matching-key element. `None` when the tag is absent.
pub fn strings_of(keys: &InMemDicomObject, tag: Tag) -> Option<Vec<String>> {
	let element = keys.element(tag).ok()?;
	let primitive = element.value().primitive()?;
	Some(
		primitive
			.to_multi_str()
			.iter()
			.map(|value| value.trim().to_owned())
			.collect(),
	)
}

/// The first value of a matching-key element.
pub fn string_of(keys: &InMemDicomObject, tag: Tag) -> Option<String> {
	strings_of(keys, tag)?.into_iter().next()
}

/// The range form of a matching-key element value, e.g.
/// `"20200101-20200131"`. `None` when the tag is absent.
pub fn range_of(keys: &InMemDicomObject, tag: Tag, kind: RangeKind) -> Option<DateRange> {
	string_of(keys, tag).map(|raw| DateRange::parse(&raw, kind))
}
