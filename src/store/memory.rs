//! An in-process realization of the backing-store seam.
//!
//! Holds plain vectors of hierarchy records and evaluates the predicate
//! tree directly over joined record tuples. Exists so the whole engine can
//! be exercised end-to-end without a database; small embedded deployments
//! can use it as-is.

use super::{
	CellValue, DataAccessError, PatientSnapshot, QueryExecutor, Row, RowStream, SeriesAncestry,
	SeriesSnapshot, StudySnapshot,
};
use crate::predicate::{EntityAlias, Predicate, QuerySpec, Value};
use crate::types::SortDirection;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::cmp::Ordering;

/// Denormalized patient row, mirroring the store's patient table.
#[derive(Debug, Clone, Default)]
pub struct PatientRecord {
	pub id: i64,
	pub subject_id: String,
	pub patient_id: String,
	pub patient_name: String,
	pub patient_sex: String,
	pub patient_birth_date: String,
	pub number_of_studies: i64,
	pub encoded_attributes: Vec<u8>,
}

/// Denormalized study row.
#[derive(Debug, Clone, Default)]
pub struct StudyRecord {
	pub id: i64,
	pub patient_fk: i64,
	pub session_id: String,
	pub study_instance_uid: String,
	pub study_id: String,
	pub study_date: String,
	pub study_time: String,
	pub accession_number: String,
	pub study_description: String,
	pub number_of_study_related_instances: i64,
	pub number_of_study_related_series: i64,
	pub modalities_in_study: String,
	pub sop_classes_in_study: String,
	pub encoded_attributes: Vec<u8>,
}

/// Denormalized series row.
#[derive(Debug, Clone, Default)]
pub struct SeriesRecord {
	pub id: i64,
	pub study_fk: i64,
	pub scan_id: Option<String>,
	pub series_instance_uid: String,
	pub series_number: Option<i64>,
	pub modality: String,
	pub sop_class_uid: String,
	pub body_part_examined: String,
	pub laterality: String,
	pub performed_procedure_step_start_date: String,
	pub performed_procedure_step_start_time: String,
	pub series_description: String,
	pub station_name: String,
	pub institution_name: String,
	pub institutional_department_name: String,
	pub number_of_series_related_instances: i64,
	pub available_transfer_syntax_uid: String,
	pub sop_classes_in_series: String,
	pub encoded_attributes: Vec<u8>,
}

/// Denormalized instance row.
#[derive(Debug, Clone, Default)]
pub struct InstanceRecord {
	pub id: i64,
	pub series_fk: i64,
	pub sop_instance_uid: String,
	pub sop_class_uid: String,
	pub instance_number: Option<i64>,
	pub content_date: String,
	pub content_time: String,
	pub encoded_attributes: Vec<u8>,
}

/// The whole four-level hierarchy, in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
	patients: Vec<PatientRecord>,
	studies: Vec<StudyRecord>,
	series: Vec<SeriesRecord>,
	instances: Vec<InstanceRecord>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_patient(&mut self, record: PatientRecord) {
		self.patients.push(record);
	}

	pub fn add_study(&mut self, record: StudyRecord) {
		self.studies.push(record);
	}

	pub fn add_series(&mut self, record: SeriesRecord) {
		self.series.push(record);
	}

	pub fn add_instance(&mut self, record: InstanceRecord) {
		self.instances.push(record);
	}

	/// Inner-joined record tuples for the given query root. Rows whose
	/// ancestors do not resolve simply do not join.
	fn join_tuples(&self, root: EntityAlias) -> Vec<Tuple<'_>> {
		match root {
			EntityAlias::Patient => self
				.patients
				.iter()
				.map(|patient| Tuple {
					patient: Some(patient),
					..Tuple::default()
				})
				.collect(),
			EntityAlias::Study => self
				.studies
				.iter()
				.filter_map(|study| {
					Some(Tuple {
						patient: Some(self.patient_by_id(study.patient_fk)?),
						study: Some(study),
						..Tuple::default()
					})
				})
				.collect(),
			EntityAlias::Series => self
				.series
				.iter()
				.filter_map(|series| {
					let study = self.study_by_id(series.study_fk)?;
					Some(Tuple {
						patient: Some(self.patient_by_id(study.patient_fk)?),
						study: Some(study),
						series: Some(series),
						..Tuple::default()
					})
				})
				.collect(),
			EntityAlias::Instance => self
				.instances
				.iter()
				.filter_map(|instance| {
					let series = self.series_by_id(instance.series_fk)?;
					let study = self.study_by_id(series.study_fk)?;
					Some(Tuple {
						patient: Some(self.patient_by_id(study.patient_fk)?),
						study: Some(study),
						series: Some(series),
						instance: Some(instance),
					})
				})
				.collect(),
		}
	}

	fn matching_tuples(&self, spec: &QuerySpec) -> Vec<Tuple<'_>> {
		self.join_tuples(spec.root)
			.into_iter()
			.filter(|tuple| {
				spec.predicates
					.iter()
					.all(|predicate| self.eval(*tuple, predicate))
			})
			.collect()
	}

	fn eval(&self, tuple: Tuple<'_>, predicate: &Predicate) -> bool {
		match predicate {
			Predicate::Eq { path, value } => {
				compare(&tuple.resolve(path), value) == Some(Ordering::Equal)
			}
			Predicate::Ne { path, value } => matches!(
				compare(&tuple.resolve(path), value),
				Some(Ordering::Less | Ordering::Greater)
			),
			Predicate::Gt { path, value } => {
				compare(&tuple.resolve(path), value) == Some(Ordering::Greater)
			}
			Predicate::Ge { path, value } => matches!(
				compare(&tuple.resolve(path), value),
				Some(Ordering::Greater | Ordering::Equal)
			),
			Predicate::Lt { path, value } => {
				compare(&tuple.resolve(path), value) == Some(Ordering::Less)
			}
			Predicate::Le { path, value } => matches!(
				compare(&tuple.resolve(path), value),
				Some(Ordering::Less | Ordering::Equal)
			),
			Predicate::Between { path, low, high } => {
				let cell = tuple.resolve(path);
				matches!(
					compare(&cell, low),
					Some(Ordering::Greater | Ordering::Equal)
				) && matches!(compare(&cell, high), Some(Ordering::Less | Ordering::Equal))
			}
			Predicate::Like {
				path,
				pattern,
				escape,
				ignore_case,
			} => match tuple.resolve(path) {
				CellValue::Str(text) => {
					if *ignore_case {
						let pattern: Vec<char> =
							pattern.to_lowercase().chars().collect();
						let text: Vec<char> = text.to_lowercase().chars().collect();
						like_match(&pattern, &text, *escape)
					} else {
						let pattern: Vec<char> = pattern.chars().collect();
						let text: Vec<char> = text.chars().collect();
						like_match(&pattern, &text, *escape)
					}
				}
				_ => false,
			},
			Predicate::In { path, values } => {
				let cell = tuple.resolve(path);
				values
					.iter()
					.any(|value| compare(&cell, value) == Some(Ordering::Equal))
			}
			Predicate::And(all) => all.iter().all(|p| self.eval(tuple, p)),
			Predicate::Or(any) => any.iter().any(|p| self.eval(tuple, p)),
			Predicate::Exists(subquery) => match subquery.entity {
				EntityAlias::Series => self.series.iter().any(|candidate| {
					let mut inner = tuple;
					inner.series = Some(candidate);
					let correlated = inner.resolve(subquery.correlation.0)
						== inner.resolve(subquery.correlation.1);
					correlated
						&& subquery
							.predicates
							.iter()
							.all(|predicate| self.eval(inner, predicate))
				}),
				// The builder only emits series sub-queries.
				_ => false,
			},
		}
	}

	fn patient_by_id(&self, id: i64) -> Option<&PatientRecord> {
		self.patients.iter().find(|record| record.id == id)
	}

	fn study_by_id(&self, id: i64) -> Option<&StudyRecord> {
		self.studies.iter().find(|record| record.id == id)
	}

	fn series_by_id(&self, id: i64) -> Option<&SeriesRecord> {
		self.series.iter().find(|record| record.id == id)
	}
}

#[async_trait]
impl QueryExecutor for MemoryStore {
	async fn count(&self, spec: &QuerySpec) -> Result<u64, DataAccessError> {
		Ok(self.matching_tuples(spec).len() as u64)
	}

	async fn list(&self, spec: &QuerySpec) -> Result<RowStream, DataAccessError> {
		let mut tuples = self.matching_tuples(spec);

		tuples.sort_by(|a, b| {
			spec.order
				.iter()
				.map(|key| {
					let ordering = cell_order(&a.resolve(key.path), &b.resolve(key.path));
					match key.direction {
						SortDirection::Ascending => ordering,
						SortDirection::Descending => ordering.reverse(),
					}
				})
				.find(|ordering| *ordering != Ordering::Equal)
				.unwrap_or(Ordering::Equal)
		});

		let selected = tuples
			.into_iter()
			.skip(spec.offset)
			.take(if spec.limit == 0 {
				usize::MAX
			} else {
				spec.limit
			});

		let rows: Vec<Row> = selected
			.map(|tuple| {
				spec.projection
					.iter()
					.map(|path| tuple.resolve(path))
					.collect()
			})
			.collect();

		Ok(stream::iter(rows.into_iter().map(Ok::<Row, DataAccessError>)).boxed())
	}

	async fn series_ancestry(
		&self,
		series_pk: i64,
	) -> Result<Option<SeriesAncestry>, DataAccessError> {
		let Some(series) = self.series_by_id(series_pk) else {
			return Ok(None);
		};
		let Some(study) = self.study_by_id(series.study_fk) else {
			return Ok(None);
		};
		let Some(patient) = self.patient_by_id(study.patient_fk) else {
			return Ok(None);
		};

		Ok(Some(SeriesAncestry {
			patient: PatientSnapshot {
				encoded_attributes: patient.encoded_attributes.clone(),
				number_of_studies: patient.number_of_studies,
			},
			study: StudySnapshot {
				encoded_attributes: study.encoded_attributes.clone(),
				number_of_study_related_instances: study.number_of_study_related_instances,
				number_of_study_related_series: study.number_of_study_related_series,
				modalities_in_study: study.modalities_in_study.clone(),
				sop_classes_in_study: study.sop_classes_in_study.clone(),
			},
			series: SeriesSnapshot {
				encoded_attributes: series.encoded_attributes.clone(),
				number_of_series_related_instances: series.number_of_series_related_instances,
				available_transfer_syntax_uid: series.available_transfer_syntax_uid.clone(),
				scan_id: series.scan_id.clone(),
			},
		}))
	}
}

/// One joined row: the record of each alias the query root reaches.
#[derive(Debug, Clone, Copy, Default)]
struct Tuple<'a> {
	patient: Option<&'a PatientRecord>,
	study: Option<&'a StudyRecord>,
	series: Option<&'a SeriesRecord>,
	instance: Option<&'a InstanceRecord>,
}

impl Tuple<'_> {
	fn resolve(&self, path: &str) -> CellValue {
		match path {
			"patient.id" => int_cell(self.patient.map(|r| r.id)),
			"patient.subject_id" => str_cell(self.patient.map(|r| &r.subject_id)),
			"patient.patient_id" => str_cell(self.patient.map(|r| &r.patient_id)),
			"patient.patient_name" => str_cell(self.patient.map(|r| &r.patient_name)),
			"patient.patient_sex" => str_cell(self.patient.map(|r| &r.patient_sex)),
			"patient.patient_birth_date" => str_cell(self.patient.map(|r| &r.patient_birth_date)),
			"patient.number_of_studies" => int_cell(self.patient.map(|r| r.number_of_studies)),
			"patient.encoded_attributes" => blob_cell(self.patient.map(|r| &r.encoded_attributes)),

			"study.id" => int_cell(self.study.map(|r| r.id)),
			"study.session_id" => str_cell(self.study.map(|r| &r.session_id)),
			"study.study_instance_uid" => str_cell(self.study.map(|r| &r.study_instance_uid)),
			"study.study_id" => str_cell(self.study.map(|r| &r.study_id)),
			"study.study_date" => str_cell(self.study.map(|r| &r.study_date)),
			"study.study_time" => str_cell(self.study.map(|r| &r.study_time)),
			"study.accession_number" => str_cell(self.study.map(|r| &r.accession_number)),
			"study.study_description" => str_cell(self.study.map(|r| &r.study_description)),
			"study.number_of_study_related_instances" => {
				int_cell(self.study.map(|r| r.number_of_study_related_instances))
			}
			"study.number_of_study_related_series" => {
				int_cell(self.study.map(|r| r.number_of_study_related_series))
			}
			"study.modalities_in_study" => str_cell(self.study.map(|r| &r.modalities_in_study)),
			"study.sop_classes_in_study" => str_cell(self.study.map(|r| &r.sop_classes_in_study)),
			"study.encoded_attributes" => blob_cell(self.study.map(|r| &r.encoded_attributes)),

			"series.id" => int_cell(self.series.map(|r| r.id)),
			"series.study_fk" => int_cell(self.series.map(|r| r.study_fk)),
			"series.scan_id" => str_cell(self.series.and_then(|r| r.scan_id.as_ref())),
			"series.series_instance_uid" => str_cell(self.series.map(|r| &r.series_instance_uid)),
			"series.series_number" => int_cell(self.series.and_then(|r| r.series_number)),
			"series.modality" => str_cell(self.series.map(|r| &r.modality)),
			"series.sop_class_uid" => str_cell(self.series.map(|r| &r.sop_class_uid)),
			"series.body_part_examined" => str_cell(self.series.map(|r| &r.body_part_examined)),
			"series.laterality" => str_cell(self.series.map(|r| &r.laterality)),
			"series.performed_procedure_step_start_date" => {
				str_cell(self.series.map(|r| &r.performed_procedure_step_start_date))
			}
			"series.performed_procedure_step_start_time" => {
				str_cell(self.series.map(|r| &r.performed_procedure_step_start_time))
			}
			"series.series_description" => str_cell(self.series.map(|r| &r.series_description)),
			"series.station_name" => str_cell(self.series.map(|r| &r.station_name)),
			"series.institution_name" => str_cell(self.series.map(|r| &r.institution_name)),
			"series.institutional_department_name" => {
				str_cell(self.series.map(|r| &r.institutional_department_name))
			}
			"series.number_of_series_related_instances" => {
				int_cell(self.series.map(|r| r.number_of_series_related_instances))
			}
			"series.available_transfer_syntax_uid" => {
				str_cell(self.series.map(|r| &r.available_transfer_syntax_uid))
			}
			"series.sop_classes_in_series" => str_cell(self.series.map(|r| &r.sop_classes_in_series)),
			"series.encoded_attributes" => blob_cell(self.series.map(|r| &r.encoded_attributes)),

			"instance.id" => int_cell(self.instance.map(|r| r.id)),
			"instance.series_fk" => int_cell(self.instance.map(|r| r.series_fk)),
			"instance.sop_instance_uid" => str_cell(self.instance.map(|r| &r.sop_instance_uid)),
			"instance.sop_class_uid" => str_cell(self.instance.map(|r| &r.sop_class_uid)),
			"instance.instance_number" => int_cell(self.instance.and_then(|r| r.instance_number)),
			"instance.content_date" => str_cell(self.instance.map(|r| &r.content_date)),
			"instance.content_time" => str_cell(self.instance.map(|r| &r.content_time)),
			"instance.encoded_attributes" => blob_cell(self.instance.map(|r| &r.encoded_attributes)),

			_ => CellValue::Null,
		}
	}
}

fn int_cell(value: Option<i64>) -> CellValue {
	value.map_or(CellValue::Null, CellValue::Int)
}

fn str_cell(value: Option<&String>) -> CellValue {
	value.map_or(CellValue::Null, |v| CellValue::Str(v.clone()))
}

fn blob_cell(value: Option<&Vec<u8>>) -> CellValue {
	value.map_or(CellValue::Null, |v| CellValue::Blob(v.clone()))
}

/// Three-valued comparison of a column value against an operand: `None`
/// stands for SQL unknown (null column or type mismatch) and fails every
/// predicate it reaches.
fn compare(cell: &CellValue, value: &Value) -> Option<Ordering> {
	match (cell, value) {
		(CellValue::Str(cell), Value::Str(value)) => Some(cell.cmp(value)),
		(CellValue::Int(cell), Value::Int(value)) => Some(cell.cmp(value)),
		_ => None,
	}
}

/// Total order for sorting projected cells; nulls sort first.
fn cell_order(a: &CellValue, b: &CellValue) -> Ordering {
	match (a, b) {
		(CellValue::Null, CellValue::Null) => Ordering::Equal,
		(CellValue::Null, _) => Ordering::Less,
		(_, CellValue::Null) => Ordering::Greater,
		(CellValue::Int(a), CellValue::Int(b)) => a.cmp(b),
		(CellValue::Str(a), CellValue::Str(b)) => a.cmp(b),
		(CellValue::Blob(a), CellValue::Blob(b)) => a.cmp(b),
		(CellValue::Int(_), _) => Ordering::Less,
		(_, CellValue::Int(_)) => Ordering::Greater,
		(CellValue::Str(_), _) => Ordering::Less,
		(_, CellValue::Str(_)) => Ordering::Greater,
	}
}

/// SQL LIKE over chars with an explicit escape character.
fn like_match(pattern: &[char], text: &[char], escape: char) -> bool {
	let Some((&head, rest)) = pattern.split_first() else {
		return text.is_empty();
	};
	if head == escape {
		return match rest.split_first() {
			Some((&literal, rest)) => {
				text.first() == Some(&literal) && like_match(rest, &text[1..], escape)
			}
			None => text.is_empty(),
		};
	}
	match head {
		'%' => (0..=text.len()).any(|skip| like_match(rest, &text[skip..], escape)),
		'_' => !text.is_empty() && like_match(rest, &text[1..], escape),
		_ => text.first() == Some(&head) && like_match(rest, &text[1..], escape),
	}
}
