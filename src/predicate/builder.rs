//! Translates DICOM matching keys into the predicate tree and caller-
//! requested sort tags into concrete sort keys.
//!
//! Everything here is pure: the builder never touches the store and never
//! fails. Malformed values (bad numerics, degenerate wildcard patterns,
//! unrecognized order-by tags) widen the match instead of erroring.

use crate::attributes;
use crate::context::{PatientId, SESSION_ID};
use crate::predicate::{EntityAlias, Predicate, SortKey, Subquery, Value};
use crate::types::{
	DateRange, DateTimeRange, OrderByTag, QueryRetrieveLevel, RangeKind, END_OF_DAY, START_OF_DAY,
};
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;
use tracing::trace;

/// Escape character used in translated LIKE patterns.
pub const LIKE_ESCAPE: char = '!';

/// Matching toggles, sourced from [`crate::config::EngineConfig`].
#[derive(Debug, Clone, Copy)]
pub struct MatchingOptions {
	/// Build a combined predicate when both the date range and the time
	/// range of a date/time attribute pair are non-universal.
	pub combined_datetime: bool,
	/// Match patients without indexed studies at PATIENT predicate level.
	pub patients_without_studies: bool,
}

impl Default for MatchingOptions {
	fn default() -> Self {
		Self {
			combined_datetime: true,
			patients_without_studies: false,
		}
	}
}

/// A value matches everything iff it is absent, empty or the literal `"*"`.
pub fn is_universal_matching(value: Option<&str>) -> bool {
	matches!(value, None | Some("") | Some("*"))
}

/// Array form: universal iff empty or the first element is universal.
pub fn is_universal_values(values: Option<&[String]>) -> bool {
	match values {
		None => true,
		Some(values) => values.is_empty() || is_universal_matching(Some(&values[0])),
	}
}

/// Attribute-set form: universal iff absent or empty.
pub fn is_universal_keys(keys: Option<&InMemDicomObject>) -> bool {
	keys.is_none_or(|keys| keys.tags().next().is_none())
}

/// Patient-identifier form: universal iff every id is universal.
pub fn is_universal_pids(pids: &[PatientId]) -> bool {
	pids.iter()
		.all(|pid| is_universal_matching(Some(&pid.id)))
}

fn is_universal_range(range: Option<&DateRange>) -> bool {
	range.is_none_or(DateRange::is_universal)
}

/// True iff the request restricts the patient alias at all: an explicit
/// patient-identifier list, or any non-universal patient demographic key.
pub fn has_patient_level_criteria(pids: &[PatientId], keys: &InMemDicomObject) -> bool {
	if !is_universal_pids(pids) {
		return true;
	}

	[tags::PATIENT_NAME, tags::PATIENT_SEX, tags::PATIENT_BIRTH_DATE]
		.iter()
		.any(|tag| !is_universal_matching(attributes::string_of(keys, *tag).as_deref()))
}

/// Full predicate list for a study-rooted execution. `query_patient` skips
/// the patient alias entirely when the request has no patient criteria.
pub fn study_predicates(
	pids: &[PatientId],
	keys: &InMemDicomObject,
	query_patient: bool,
	options: MatchingOptions,
) -> Vec<Predicate> {
	let mut predicates = Vec::new();
	if query_patient {
		patient_level_predicates(
			&mut predicates,
			pids,
			keys,
			QueryRetrieveLevel::Study,
			options,
		);
	}
	study_level_predicates(&mut predicates, keys, QueryRetrieveLevel::Study, options);
	predicates
}

/// Full predicate list for a series-rooted execution.
pub fn series_predicates(
	pids: &[PatientId],
	keys: &InMemDicomObject,
	options: MatchingOptions,
) -> Vec<Predicate> {
	let mut predicates = Vec::new();
	patient_level_predicates(
		&mut predicates,
		pids,
		keys,
		QueryRetrieveLevel::Series,
		options,
	);
	study_level_predicates(&mut predicates, keys, QueryRetrieveLevel::Series, options);
	series_level_predicates(&mut predicates, keys, options);
	predicates
}

/// Full predicate list for an instance-rooted execution.
pub fn instance_predicates(
	pids: &[PatientId],
	keys: &InMemDicomObject,
	options: MatchingOptions,
) -> Vec<Predicate> {
	let mut predicates = Vec::new();
	patient_level_predicates(
		&mut predicates,
		pids,
		keys,
		QueryRetrieveLevel::Image,
		options,
	);
	study_level_predicates(&mut predicates, keys, QueryRetrieveLevel::Image, options);
	series_level_predicates(&mut predicates, keys, options);
	instance_level_predicates(&mut predicates, keys, options);
	predicates
}

pub fn patient_level_predicates(
	predicates: &mut Vec<Predicate>,
	pids: &[PatientId],
	keys: &InMemDicomObject,
	level: QueryRetrieveLevel,
	options: MatchingOptions,
) {
	if level == QueryRetrieveLevel::Patient && !options.patients_without_studies {
		predicates.push(Predicate::gt("patient.number_of_studies", 0));
	}

	let patient_ids: Vec<String> = pids.iter().map(|pid| pid.id.clone()).collect();
	any_of(predicates, "patient.patient_id", Some(patient_ids), true);
	any_of(
		predicates,
		"patient.patient_name",
		attributes::strings_of(keys, tags::PATIENT_NAME),
		true,
	);
	any_of(
		predicates,
		"patient.patient_sex",
		to_upper(attributes::strings_of(keys, tags::PATIENT_SEX)),
		false,
	);
	date_range_predicates(
		predicates,
		"patient.patient_birth_date",
		attributes::range_of(keys, tags::PATIENT_BIRTH_DATE, RangeKind::Date).as_ref(),
		RangeKind::Date,
	);
}

pub fn study_level_predicates(
	predicates: &mut Vec<Predicate>,
	keys: &InMemDicomObject,
	level: QueryRetrieveLevel,
	options: MatchingOptions,
) {
	// Archive-session anchor: present iff the host scoped the request to a
	// single imaging session.
	uids_predicate(
		predicates,
		"study.session_id",
		attributes::string_of(keys, SESSION_ID).as_deref(),
	);

	any_of(
		predicates,
		"study.study_instance_uid",
		attributes::strings_of(keys, tags::STUDY_INSTANCE_UID),
		false,
	);
	any_of(
		predicates,
		"study.study_id",
		attributes::strings_of(keys, tags::STUDY_ID),
		false,
	);
	date_time_range(
		predicates,
		"study.study_date",
		"study.study_time",
		tags::STUDY_DATE,
		tags::STUDY_TIME,
		keys,
		options,
	);
	any_of(
		predicates,
		"study.study_description",
		attributes::strings_of(keys, tags::STUDY_DESCRIPTION),
		true,
	);

	let accession = attributes::string_of(keys, tags::ACCESSION_NUMBER)
		.unwrap_or_else(|| "*".to_owned());
	any_of(
		predicates,
		"study.accession_number",
		Some(vec![accession]),
		false,
	);

	let modalities_in_study = attributes::strings_of(keys, tags::MODALITIES_IN_STUDY);
	series_attributes_in_study(predicates, keys, level, modalities_in_study);
}

pub fn series_level_predicates(
	predicates: &mut Vec<Predicate>,
	keys: &InMemDicomObject,
	options: MatchingOptions,
) {
	any_of(
		predicates,
		"series.series_instance_uid",
		attributes::strings_of(keys, tags::SERIES_INSTANCE_UID),
		false,
	);
	number_predicate(
		predicates,
		"series.series_number",
		attributes::string_of(keys, tags::SERIES_NUMBER).as_deref(),
	);
	any_of(
		predicates,
		"series.modality",
		to_upper(attributes::strings_of(keys, tags::MODALITY)),
		false,
	);
	any_of(
		predicates,
		"series.body_part_examined",
		to_upper(attributes::strings_of(keys, tags::BODY_PART_EXAMINED)),
		false,
	);
	any_of(
		predicates,
		"series.laterality",
		to_upper(attributes::strings_of(keys, tags::LATERALITY)),
		false,
	);
	date_time_range(
		predicates,
		"series.performed_procedure_step_start_date",
		"series.performed_procedure_step_start_time",
		tags::PERFORMED_PROCEDURE_STEP_START_DATE,
		tags::PERFORMED_PROCEDURE_STEP_START_TIME,
		keys,
		options,
	);
	any_of(
		predicates,
		"series.series_description",
		attributes::strings_of(keys, tags::SERIES_DESCRIPTION),
		true,
	);
	any_of(
		predicates,
		"series.station_name",
		attributes::strings_of(keys, tags::STATION_NAME),
		true,
	);
	any_of(
		predicates,
		"series.institutional_department_name",
		attributes::strings_of(keys, tags::INSTITUTIONAL_DEPARTMENT_NAME),
		true,
	);
	any_of(
		predicates,
		"series.institution_name",
		attributes::strings_of(keys, tags::INSTITUTION_NAME),
		true,
	);
}

pub fn instance_level_predicates(
	predicates: &mut Vec<Predicate>,
	keys: &InMemDicomObject,
	options: MatchingOptions,
) {
	any_of(
		predicates,
		"instance.sop_instance_uid",
		attributes::strings_of(keys, tags::SOP_INSTANCE_UID),
		false,
	);
	any_of(
		predicates,
		"instance.sop_class_uid",
		attributes::strings_of(keys, tags::SOP_CLASS_UID),
		false,
	);
	number_predicate(
		predicates,
		"instance.instance_number",
		attributes::string_of(keys, tags::INSTANCE_NUMBER).as_deref(),
	);
	date_time_range(
		predicates,
		"instance.content_date",
		"instance.content_time",
		tags::CONTENT_DATE,
		tags::CONTENT_TIME,
		keys,
		options,
	);
}

/// Series-scoped filters applied at the study alias through a correlated
/// EXISTS sub-predicate. Institution/station/description/body-part/
/// laterality filters only propagate when the study itself is the query
/// root; at deeper levels they restrict the series alias directly.
fn series_attributes_in_study(
	study_predicates: &mut Vec<Predicate>,
	keys: &InMemDicomObject,
	level: QueryRetrieveLevel,
	modalities_in_study: Option<Vec<String>>,
) {
	let mut predicates = Vec::new();

	any_of(
		&mut predicates,
		"series.modality",
		to_upper(modalities_in_study),
		false,
	);
	let cuids_in_study = attributes::strings_of(keys, tags::SOP_CLASSES_IN_STUDY);
	if !is_universal_values(cuids_in_study.as_deref()) {
		let values = cuids_in_study
			.unwrap_or_default()
			.into_iter()
			.map(Value::Str)
			.collect();
		predicates.push(Predicate::In {
			path: "series.sop_class_uid",
			values,
		});
	}
	if level == QueryRetrieveLevel::Study {
		any_of(
			&mut predicates,
			"series.institution_name",
			attributes::strings_of(keys, tags::INSTITUTION_NAME),
			true,
		);
		any_of(
			&mut predicates,
			"series.institutional_department_name",
			attributes::strings_of(keys, tags::INSTITUTIONAL_DEPARTMENT_NAME),
			true,
		);
		any_of(
			&mut predicates,
			"series.station_name",
			attributes::strings_of(keys, tags::STATION_NAME),
			true,
		);
		any_of(
			&mut predicates,
			"series.series_description",
			attributes::strings_of(keys, tags::SERIES_DESCRIPTION),
			true,
		);
		any_of(
			&mut predicates,
			"series.body_part_examined",
			to_upper(attributes::strings_of(keys, tags::BODY_PART_EXAMINED)),
			false,
		);
		any_of(
			&mut predicates,
			"series.laterality",
			to_upper(attributes::strings_of(keys, tags::LATERALITY)),
			false,
		);
	}
	if !predicates.is_empty() {
		study_predicates.push(Predicate::Exists(Box::new(Subquery {
			entity: EntityAlias::Series,
			correlation: ("series.study_fk", "study.id"),
			predicates,
		})));
	}
}

/// Exact-equality predicate for unique-identifier values; universal values
/// emit nothing.
pub fn uids_predicate(predicates: &mut Vec<Predicate>, path: super::Path, value: Option<&str>) {
	if !is_universal_matching(value) {
		predicates.push(Predicate::eq(path, value.unwrap_or_default()));
	}
}

/// OR-combination of per-value wildcard/exact predicates. Returns whether a
/// predicate was emitted; a universal value list emits nothing.
fn any_of(
	predicates: &mut Vec<Predicate>,
	path: super::Path,
	values: Option<Vec<String>>,
	ignore_case: bool,
) -> bool {
	if is_universal_values(values.as_deref()) {
		return false;
	}
	let values = values.unwrap_or_default();

	if values.len() == 1 {
		return wild_card(predicates, path, &values[0], ignore_case);
	}

	let mut alternatives = Vec::with_capacity(values.len());
	for value in &values {
		if !wild_card(&mut alternatives, path, value, ignore_case) {
			// One universal alternative makes the whole disjunction
			// universal.
			return false;
		}
	}
	predicates.push(Predicate::Or(alternatives));
	true
}

fn wild_card(
	predicates: &mut Vec<Predicate>,
	path: super::Path,
	value: &str,
	ignore_case: bool,
) -> bool {
	if is_universal_matching(Some(value)) {
		return false;
	}

	if contains_wildcard(value) {
		let pattern = to_like_pattern(value);
		if pattern == "%" {
			return false;
		}
		predicates.push(Predicate::Like {
			path,
			pattern,
			escape: LIKE_ESCAPE,
			ignore_case,
		});
	} else {
		predicates.push(Predicate::eq(path, value));
	}

	true
}

fn contains_wildcard(s: &str) -> bool {
	s.contains('*') || s.contains('?')
}

/// DICOM wildcards to LIKE: `*`→`%` (runs collapse), `?`→`_`; literal `%`,
/// `_` and the escape character are escaped.
fn to_like_pattern(s: &str) -> String {
	let mut like = String::with_capacity(s.len());
	let mut previous = '\0';
	for c in s.chars() {
		match c {
			'*' => {
				if c != previous {
					like.push('%');
				}
			}
			'?' => like.push('_'),
			'_' | '%' => {
				like.push(LIKE_ESCAPE);
				like.push(c);
			}
			LIKE_ESCAPE => {
				like.push(LIKE_ESCAPE);
				like.push(c);
			}
			_ => like.push(c),
		}
		previous = c;
	}
	like
}

/// Exact-equality predicate on a parsed integer; unparseable values emit
/// nothing.
fn number_predicate(predicates: &mut Vec<Predicate>, path: super::Path, value: Option<&str>) {
	if is_universal_matching(value) {
		return;
	}
	let value = value.unwrap_or_default();
	match value.parse::<i64>() {
		Ok(number) => predicates.push(Predicate::eq(path, number)),
		Err(_) => trace!(path, value, "discarding unparseable numeric matching value"),
	}
}

/// Independent range predicate, paired with a "not the literal wildcard"
/// guard so stored `"*"` placeholders never satisfy a range.
fn date_range_predicates(
	predicates: &mut Vec<Predicate>,
	path: super::Path,
	range: Option<&DateRange>,
	kind: RangeKind,
) {
	if is_universal_range(range) {
		return;
	}
	let range = range.cloned().unwrap_or_default();
	predicates.push(range_predicate(path, &range, kind));
	predicates.push(Predicate::ne(path, "*"));
}

fn range_predicate(path: super::Path, range: &DateRange, kind: RangeKind) -> Predicate {
	match (&range.start, &range.end) {
		(None, Some(end)) => Predicate::le(path, end.clone()),
		(Some(start), None) => Predicate::ge(path, start.clone()),
		(Some(start), Some(end)) if start == end => Predicate::eq(path, start.clone()),
		(Some(start), Some(end)) => {
			if kind == RangeKind::Time && range.start_exceeds_end() {
				// The span crosses midnight: match the tail of the day and
				// the head of the next.
				Predicate::Or(vec![
					Predicate::between(path, start.clone(), END_OF_DAY),
					Predicate::between(path, START_OF_DAY, end.clone()),
				])
			} else {
				Predicate::between(path, start.clone(), end.clone())
			}
		}
		// Unreachable: universal ranges never get here.
		(None, None) => Predicate::And(Vec::new()),
	}
}

/// Date/time matching for a (date tag, time tag) pair: a combined predicate
/// when both ranges are bounded and combining is enabled, independent range
/// predicates otherwise.
fn date_time_range(
	predicates: &mut Vec<Predicate>,
	date_path: super::Path,
	time_path: super::Path,
	date_tag: Tag,
	time_tag: Tag,
	keys: &InMemDicomObject,
	options: MatchingOptions,
) {
	let date_range = attributes::range_of(keys, date_tag, RangeKind::Date);
	let time_range = attributes::range_of(keys, time_tag, RangeKind::Time);

	if options.combined_datetime
		&& !is_universal_range(date_range.as_ref())
		&& !is_universal_range(time_range.as_ref())
	{
		let combined = DateTimeRange::combine(
			&date_range.unwrap_or_default(),
			&time_range.unwrap_or_default(),
		);
		predicates.push(combined_range(date_path, time_path, &combined));
		predicates.push(Predicate::ne(date_path, "*"));
	} else {
		date_range_predicates(predicates, date_path, date_range.as_ref(), RangeKind::Date);
		date_range_predicates(predicates, time_path, time_range.as_ref(), RangeKind::Time);
	}
}

fn combined_range(
	date_path: super::Path,
	time_path: super::Path,
	range: &DateTimeRange,
) -> Predicate {
	match (&range.start, &range.end) {
		(None, Some(end)) => combined_range_end(date_path, time_path, &end.date, &end.time),
		(Some(start), None) => {
			combined_range_start(date_path, time_path, &start.date, &start.time)
		}
		(Some(start), Some(end)) if start.date == end.date => Predicate::And(vec![
			Predicate::eq(date_path, start.date.clone()),
			Predicate::ge(time_path, start.time.clone()),
			Predicate::le(time_path, end.time.clone()),
		]),
		(Some(start), Some(end)) => Predicate::And(vec![
			combined_range_start(date_path, time_path, &start.date, &start.time),
			combined_range_end(date_path, time_path, &end.date, &end.time),
		]),
		(None, None) => Predicate::And(Vec::new()),
	}
}

/// "On or after": any later day, or the start day itself at or past the
/// start time. A stored literal-wildcard time satisfies the equality arm.
fn combined_range_start(
	date_path: super::Path,
	time_path: super::Path,
	start_date: &str,
	start_time: &str,
) -> Predicate {
	Predicate::Or(vec![
		Predicate::gt(date_path, start_date),
		Predicate::And(vec![
			Predicate::eq(date_path, start_date),
			Predicate::Or(vec![
				Predicate::ge(time_path, start_time),
				Predicate::eq(time_path, "*"),
			]),
		]),
	])
}

/// "On or before": the mirror of [`combined_range_start`].
fn combined_range_end(
	date_path: super::Path,
	time_path: super::Path,
	end_date: &str,
	end_time: &str,
) -> Predicate {
	Predicate::Or(vec![
		Predicate::lt(date_path, end_date),
		Predicate::And(vec![
			Predicate::eq(date_path, end_date),
			Predicate::Or(vec![
				Predicate::le(time_path, end_time),
				Predicate::eq(time_path, "*"),
			]),
		]),
	])
}

fn to_upper(values: Option<Vec<String>>) -> Option<Vec<String>> {
	values.map(|values| values.into_iter().map(|v| v.to_uppercase()).collect())
}

/// Sort keys for a study-rooted execution; unrecognized tags are dropped.
pub fn order_studies(order_by_tags: &[OrderByTag]) -> Vec<SortKey> {
	collect_order(order_by_tags, study_order_term)
}

/// Sort keys for a series-rooted execution; unrecognized tags are dropped.
pub fn order_series(order_by_tags: &[OrderByTag]) -> Vec<SortKey> {
	collect_order(order_by_tags, series_order_term)
}

/// Sort keys for an instance-rooted execution; unrecognized tags are
/// dropped.
pub fn order_instances(order_by_tags: &[OrderByTag]) -> Vec<SortKey> {
	collect_order(order_by_tags, instance_order_term)
}

fn collect_order(
	order_by_tags: &[OrderByTag],
	term: fn(Tag) -> Option<super::Path>,
) -> Vec<SortKey> {
	let mut keys = Vec::with_capacity(order_by_tags.len());
	for order_by in order_by_tags {
		match term(order_by.tag) {
			Some(path) => keys.push(SortKey {
				path,
				direction: order_by.direction,
			}),
			None => trace!(tag = %order_by.tag, "discarding unrecognized order-by tag"),
		}
	}
	keys
}

fn patient_order_term(tag: Tag) -> Option<super::Path> {
	match tag {
		tags::PATIENT_NAME => Some("patient.patient_name"),
		tags::PATIENT_SEX => Some("patient.patient_sex"),
		tags::PATIENT_BIRTH_DATE => Some("patient.patient_birth_date"),
		_ => None,
	}
}

fn study_order_term(tag: Tag) -> Option<super::Path> {
	patient_order_term(tag).or(match tag {
		tags::STUDY_INSTANCE_UID => Some("study.study_instance_uid"),
		tags::STUDY_ID => Some("study.study_id"),
		tags::STUDY_DATE => Some("study.study_date"),
		tags::STUDY_TIME => Some("study.study_time"),
		tags::STUDY_DESCRIPTION => Some("study.study_description"),
		tags::ACCESSION_NUMBER => Some("study.accession_number"),
		_ => None,
	})
}

fn series_order_term(tag: Tag) -> Option<super::Path> {
	study_order_term(tag).or(match tag {
		tags::SERIES_INSTANCE_UID => Some("series.series_instance_uid"),
		tags::SERIES_NUMBER => Some("series.series_number"),
		tags::MODALITY => Some("series.modality"),
		tags::BODY_PART_EXAMINED => Some("series.body_part_examined"),
		tags::LATERALITY => Some("series.laterality"),
		tags::PERFORMED_PROCEDURE_STEP_START_DATE => {
			Some("series.performed_procedure_step_start_date")
		}
		tags::PERFORMED_PROCEDURE_STEP_START_TIME => {
			Some("series.performed_procedure_step_start_time")
		}
		tags::SERIES_DESCRIPTION => Some("series.series_description"),
		tags::STATION_NAME => Some("series.station_name"),
		tags::INSTITUTION_NAME => Some("series.institution_name"),
		tags::INSTITUTIONAL_DEPARTMENT_NAME => Some("series.institutional_department_name"),
		_ => None,
	})
}

fn instance_order_term(tag: Tag) -> Option<super::Path> {
	series_order_term(tag).or(match tag {
		tags::SOP_INSTANCE_UID => Some("instance.sop_instance_uid"),
		tags::SOP_CLASS_UID => Some("instance.sop_class_uid"),
		tags::INSTANCE_NUMBER => Some("instance.instance_number"),
		tags::CONTENT_DATE => Some("instance.content_date"),
		tags::CONTENT_TIME => Some("instance.content_time"),
		_ => None,
	})
}
