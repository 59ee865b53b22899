//! End-to-end search scenarios against the in-memory store: predicate
//! scoping, pagination, attribute merge and the computed query-retrieve
//! attributes, all through the public engine surface.

use async_trait::async_trait;
use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;
use qido_search::attributes;
use qido_search::config::EngineConfig;
use qido_search::context::{ArchiveIds, QueryContext, SCAN_ID, SESSION_ID};
use qido_search::predicate::QuerySpec;
use qido_search::query::Query;
use qido_search::store::memory::{
	InstanceRecord, MemoryStore, PatientRecord, SeriesRecord, StudyRecord,
};
use qido_search::store::{DataAccessError, QueryExecutor, RowStream, SeriesAncestry};
use qido_search::types::{OrderByTag, QueryRetrieveLevel};
use qido_search::QueryError;

fn init_tracing() {
	use tracing_subscriber::EnvFilter;
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.try_init();
}

fn dataset(entries: &[(Tag, VR, &str)]) -> InMemDicomObject {
	let mut obj = InMemDicomObject::new_empty();
	for (tag, vr, value) in entries {
		obj.put(DataElement::new(*tag, *vr, PrimitiveValue::from(*value)));
	}
	obj
}

fn blob(entries: &[(Tag, VR, &str)]) -> Vec<u8> {
	attributes::encode(&dataset(entries)).expect("fixture dataset encodes")
}

/// Two patients; study 10 (Jan 2020, CT+MR) and study 11 (Jan 2020, CT)
/// are healthy, study 12 is stale with an orphaned zero-instance series.
fn demo_store() -> MemoryStore {
	init_tracing();
	let mut store = MemoryStore::new();

	store.add_patient(PatientRecord {
		id: 1,
		subject_id: "SUBJ1".into(),
		patient_id: "P1".into(),
		patient_name: "DOE^JANE".into(),
		patient_sex: "F".into(),
		patient_birth_date: "19800101".into(),
		number_of_studies: 1,
		encoded_attributes: blob(&[
			(tags::PATIENT_NAME, VR::PN, "DOE^JANE"),
			(tags::PATIENT_ID, VR::LO, "P1"),
			(tags::PATIENT_SEX, VR::CS, "F"),
			(tags::PATIENT_BIRTH_DATE, VR::DA, "19800101"),
		]),
	});
	store.add_patient(PatientRecord {
		id: 2,
		subject_id: "SUBJ2".into(),
		patient_id: "P2".into(),
		patient_name: "ROE^RICHARD".into(),
		patient_sex: "M".into(),
		patient_birth_date: "19751130".into(),
		number_of_studies: 2,
		encoded_attributes: blob(&[
			(tags::PATIENT_NAME, VR::PN, "ROE^RICHARD"),
			(tags::PATIENT_ID, VR::LO, "P2"),
			(tags::PATIENT_SEX, VR::CS, "M"),
			(tags::PATIENT_BIRTH_DATE, VR::DA, "19751130"),
		]),
	});

	store.add_study(StudyRecord {
		id: 10,
		patient_fk: 1,
		session_id: "SESSION1".into(),
		study_instance_uid: "1.2.3.10".into(),
		study_id: "ST10".into(),
		study_date: "20200115".into(),
		study_time: "110000.000".into(),
		accession_number: "ACC10".into(),
		study_description: "NECK CT AND MR".into(),
		number_of_study_related_instances: 5,
		number_of_study_related_series: 2,
		modalities_in_study: "CT\\MR".into(),
		sop_classes_in_study: "1.2.840.10008.5.1.4.1.1.2\\1.2.840.10008.5.1.4.1.1.4".into(),
		encoded_attributes: blob(&[
			(tags::STUDY_INSTANCE_UID, VR::UI, "1.2.3.10"),
			(tags::STUDY_ID, VR::SH, "ST10"),
			(tags::STUDY_DATE, VR::DA, "20200115"),
			(tags::STUDY_DESCRIPTION, VR::LO, "NECK CT AND MR"),
		]),
	});
	store.add_study(StudyRecord {
		id: 11,
		patient_fk: 2,
		session_id: "SESSION2".into(),
		study_instance_uid: "1.2.3.11".into(),
		study_id: "ST11".into(),
		study_date: "20200120".into(),
		study_time: "083000.000".into(),
		accession_number: "ACC11".into(),
		study_description: "CHEST CT".into(),
		number_of_study_related_instances: 1,
		number_of_study_related_series: 1,
		modalities_in_study: "CT".into(),
		sop_classes_in_study: "1.2.840.10008.5.1.4.1.1.2".into(),
		encoded_attributes: blob(&[
			(tags::STUDY_INSTANCE_UID, VR::UI, "1.2.3.11"),
			(tags::STUDY_ID, VR::SH, "ST11"),
			(tags::STUDY_DATE, VR::DA, "20200120"),
			(tags::STUDY_DESCRIPTION, VR::LO, "CHEST CT"),
		]),
	});
	store.add_study(StudyRecord {
		id: 12,
		patient_fk: 2,
		session_id: "SESSION3".into(),
		study_instance_uid: "1.2.3.12".into(),
		study_id: "ST12".into(),
		study_date: "20190601".into(),
		study_time: "120000.000".into(),
		accession_number: "ACC12".into(),
		study_description: "STALE".into(),
		number_of_study_related_instances: 0,
		number_of_study_related_series: 1,
		modalities_in_study: "CT".into(),
		sop_classes_in_study: "1.2.840.10008.5.1.4.1.1.2".into(),
		encoded_attributes: blob(&[(tags::STUDY_INSTANCE_UID, VR::UI, "1.2.3.12")]),
	});

	store.add_series(SeriesRecord {
		id: 100,
		study_fk: 10,
		scan_id: Some("2".into()),
		series_instance_uid: "1.2.3.10.1".into(),
		series_number: Some(1),
		modality: "CT".into(),
		sop_class_uid: "1.2.840.10008.5.1.4.1.1.2".into(),
		body_part_examined: "NECK".into(),
		laterality: String::new(),
		performed_procedure_step_start_date: "20200115".into(),
		performed_procedure_step_start_time: "110500.000".into(),
		series_description: "CT SPIRAL".into(),
		station_name: "CT01".into(),
		institution_name: "GENERAL HOSPITAL".into(),
		institutional_department_name: "RADIOLOGY".into(),
		number_of_series_related_instances: 3,
		available_transfer_syntax_uid: "1.2.840.10008.1.2.1".into(),
		sop_classes_in_series: "1.2.840.10008.5.1.4.1.1.2".into(),
		encoded_attributes: blob(&[
			(tags::SERIES_INSTANCE_UID, VR::UI, "1.2.3.10.1"),
			(tags::MODALITY, VR::CS, "CT"),
			(tags::SERIES_NUMBER, VR::IS, "1"),
		]),
	});
	store.add_series(SeriesRecord {
		id: 101,
		study_fk: 10,
		scan_id: Some("3".into()),
		series_instance_uid: "1.2.3.10.2".into(),
		series_number: Some(2),
		modality: "MR".into(),
		sop_class_uid: "1.2.840.10008.5.1.4.1.1.4".into(),
		body_part_examined: "NECK".into(),
		laterality: String::new(),
		performed_procedure_step_start_date: "20200115".into(),
		performed_procedure_step_start_time: "113000.000".into(),
		series_description: "MR T2".into(),
		station_name: "MR01".into(),
		institution_name: "GENERAL HOSPITAL".into(),
		institutional_department_name: "RADIOLOGY".into(),
		number_of_series_related_instances: 2,
		available_transfer_syntax_uid: "1.2.840.10008.1.2.1".into(),
		sop_classes_in_series: "1.2.840.10008.5.1.4.1.1.4".into(),
		encoded_attributes: blob(&[
			(tags::SERIES_INSTANCE_UID, VR::UI, "1.2.3.10.2"),
			(tags::MODALITY, VR::CS, "MR"),
			(tags::SERIES_NUMBER, VR::IS, "2"),
		]),
	});
	store.add_series(SeriesRecord {
		id: 102,
		study_fk: 11,
		scan_id: Some("1".into()),
		series_instance_uid: "1.2.3.11.1".into(),
		series_number: Some(1),
		modality: "CT".into(),
		sop_class_uid: "1.2.840.10008.5.1.4.1.1.2".into(),
		body_part_examined: "CHEST".into(),
		laterality: String::new(),
		performed_procedure_step_start_date: "20200120".into(),
		performed_procedure_step_start_time: "083500.000".into(),
		series_description: "CT THORAX".into(),
		station_name: "CT02".into(),
		institution_name: "GENERAL HOSPITAL".into(),
		institutional_department_name: "RADIOLOGY".into(),
		number_of_series_related_instances: 1,
		available_transfer_syntax_uid: "1.2.840.10008.1.2".into(),
		sop_classes_in_series: "1.2.840.10008.5.1.4.1.1.2".into(),
		encoded_attributes: blob(&[
			(tags::SERIES_INSTANCE_UID, VR::UI, "1.2.3.11.1"),
			(tags::MODALITY, VR::CS, "CT"),
			(tags::SERIES_NUMBER, VR::IS, "1"),
		]),
	});
	// Orphaned: all instances of this series were removed.
	store.add_series(SeriesRecord {
		id: 103,
		study_fk: 12,
		scan_id: None,
		series_instance_uid: "1.2.3.12.1".into(),
		series_number: Some(1),
		modality: "CT".into(),
		sop_class_uid: "1.2.840.10008.5.1.4.1.1.2".into(),
		body_part_examined: "CHEST".into(),
		laterality: String::new(),
		performed_procedure_step_start_date: "20190601".into(),
		performed_procedure_step_start_time: "120500.000".into(),
		series_description: "STALE".into(),
		station_name: "CT02".into(),
		institution_name: "GENERAL HOSPITAL".into(),
		institutional_department_name: "RADIOLOGY".into(),
		number_of_series_related_instances: 0,
		available_transfer_syntax_uid: "1.2.840.10008.1.2.1".into(),
		sop_classes_in_series: "1.2.840.10008.5.1.4.1.1.2".into(),
		encoded_attributes: blob(&[(tags::SERIES_INSTANCE_UID, VR::UI, "1.2.3.12.1")]),
	});

	let mut instance_id = 1000;
	for (series_fk, sop_uids) in [
		(100, vec!["1.2.3.10.1.1", "1.2.3.10.1.2", "1.2.3.10.1.3"]),
		(101, vec!["1.2.3.10.2.1", "1.2.3.10.2.2"]),
		(102, vec!["1.2.3.11.1.1"]),
	] {
		for (index, sop_uid) in sop_uids.into_iter().enumerate() {
			let number = (index + 1).to_string();
			store.add_instance(InstanceRecord {
				id: instance_id,
				series_fk,
				sop_instance_uid: sop_uid.to_owned(),
				sop_class_uid: "1.2.840.10008.5.1.4.1.1.2".into(),
				instance_number: Some(index as i64 + 1),
				content_date: "20200115".into(),
				content_time: "110000.000".into(),
				encoded_attributes: blob(&[
					(tags::SOP_INSTANCE_UID, VR::UI, sop_uid),
					(tags::INSTANCE_NUMBER, VR::IS, number.as_str()),
				]),
			});
			instance_id += 1;
		}
	}

	store
}

fn context(level: QueryRetrieveLevel) -> QueryContext {
	let mut context = QueryContext::new(level);
	context.archive_ids = ArchiveIds {
		collection: Some("PROJ1".into()),
		shared_collection: None,
		subject: Some("SUBJ1".into()),
		session: Some("SESSION1".into()),
	};
	context
}

async fn collect(query: &mut Query, store: &dyn QueryExecutor) -> Vec<InMemDicomObject> {
	let mut results = Vec::new();
	while query.has_more_matches().await {
		if let Some(matched) = query.next_match(store).await.expect("reconstruction") {
			results.push(matched);
		}
	}
	results
}

fn element_str(obj: &InMemDicomObject, tag: Tag) -> String {
	obj.element(tag)
		.unwrap_or_else(|_| panic!("missing element {tag}"))
		.to_str()
		.expect("string value")
		.to_string()
}

#[tokio::test]
async fn series_query_merges_all_levels() {
	let store = demo_store();
	let mut keys = dataset(&[(tags::MODALITY, VR::CS, "CT")]);
	keys.put(DataElement::new(
		tags::PATIENT_ID,
		VR::LO,
		PrimitiveValue::from("*"),
	));
	let mut context = context(QueryRetrieveLevel::Series);
	context.matching_keys = keys;

	let mut query = Query::new(context, &EngineConfig::default()).unwrap();

	// Counts all predicate matches, including the orphan the list later
	// discards.
	let count = query.execute_count_query(&store).await.unwrap();
	assert_eq!(count, 3);

	query.execute_query(&store, 0).await.unwrap();
	let results = collect(&mut query, &store).await;
	assert_eq!(results.len(), 2);

	let ct_spiral = results
		.iter()
		.find(|r| element_str(r, tags::SERIES_INSTANCE_UID) == "1.2.3.10.1")
		.expect("series 1.2.3.10.1 in results");

	// Patient, study and series attributes in one set.
	assert_eq!(element_str(ct_spiral, tags::PATIENT_NAME), "DOE^JANE");
	assert_eq!(element_str(ct_spiral, tags::STUDY_INSTANCE_UID), "1.2.3.10");
	assert_eq!(element_str(ct_spiral, tags::MODALITY), "CT");

	// Computed query-retrieve attributes.
	assert_eq!(
		element_str(ct_spiral, tags::NUMBER_OF_SERIES_RELATED_INSTANCES),
		"3"
	);
	assert_eq!(
		element_str(ct_spiral, tags::AVAILABLE_TRANSFER_SYNTAX_UID),
		"1.2.840.10008.1.2.1"
	);
	assert_eq!(
		element_str(ct_spiral, tags::NUMBER_OF_STUDY_RELATED_SERIES),
		"2"
	);

	// Extrinsic identifier block.
	assert_eq!(element_str(ct_spiral, tags::RETRIEVE_AE_TITLE), "PROJ1");
	assert_eq!(element_str(ct_spiral, tags::INSTANCE_AVAILABILITY), "ONLINE");
	assert_eq!(element_str(ct_spiral, SCAN_ID), "2");

	query.close();
	query.close();
}

#[tokio::test]
async fn study_query_by_date_range_ignores_universal_time() {
	let store = demo_store();
	let mut context = context(QueryRetrieveLevel::Study);
	context.matching_keys = dataset(&[(tags::STUDY_DATE, VR::DA, "20200101-20200131")]);

	let mut query = Query::new(context, &EngineConfig::default()).unwrap();
	assert_eq!(query.execute_count_query(&store).await.unwrap(), 2);

	query.execute_query(&store, 0).await.unwrap();
	let results = collect(&mut query, &store).await;
	let mut uids: Vec<String> = results
		.iter()
		.map(|r| element_str(r, tags::STUDY_INSTANCE_UID))
		.collect();
	uids.sort();
	assert_eq!(uids, vec!["1.2.3.10", "1.2.3.11"]);

	let study = &results[0];
	assert!(study.element(tags::MODALITIES_IN_STUDY).is_ok());
	assert!(study
		.element(tags::NUMBER_OF_STUDY_RELATED_INSTANCES)
		.is_ok());
}

#[tokio::test]
async fn combined_datetime_restricts_within_the_day() {
	let store = demo_store();

	let mut matching = context(QueryRetrieveLevel::Study);
	matching.matching_keys = dataset(&[
		(tags::STUDY_DATE, VR::DA, "20200115"),
		(tags::STUDY_TIME, VR::TM, "1000-1230"),
	]);
	let mut query = Query::new(matching, &EngineConfig::default()).unwrap();
	assert_eq!(query.execute_count_query(&store).await.unwrap(), 1);

	let mut missing = context(QueryRetrieveLevel::Study);
	missing.matching_keys = dataset(&[
		(tags::STUDY_DATE, VR::DA, "20200115"),
		(tags::STUDY_TIME, VR::TM, "1200-1400"),
	]);
	let mut query = Query::new(missing, &EngineConfig::default()).unwrap();
	assert_eq!(query.execute_count_query(&store).await.unwrap(), 0);
}

#[tokio::test]
async fn orphaned_series_is_discarded_not_matched() {
	let store = demo_store();
	let mut context = context(QueryRetrieveLevel::Series);
	context.matching_keys = dataset(&[(tags::SERIES_INSTANCE_UID, VR::UI, "1.2.3.12.1")]);

	let mut query = Query::new(context, &EngineConfig::default()).unwrap();
	query.execute_query(&store, 0).await.unwrap();

	// The row matches the predicates but reconstructs to nothing.
	assert!(query.has_more_matches().await);
	let matched = query.next_match(&store).await.unwrap();
	assert!(matched.is_none());
	assert!(!query.has_more_matches().await);
}

#[tokio::test]
async fn pagination_slices_the_ordered_listing() {
	let store = demo_store();

	let full = {
		let mut context = context(QueryRetrieveLevel::Image);
		context.order_by_tags = vec![OrderByTag::asc(tags::SOP_INSTANCE_UID)];
		let mut query = Query::new(context, &EngineConfig::default()).unwrap();
		query.execute_query(&store, 0).await.unwrap();
		collect(&mut query, &store).await
	};
	assert_eq!(full.len(), 6);

	let page = {
		let mut context = context(QueryRetrieveLevel::Image);
		context.order_by_tags = vec![OrderByTag::asc(tags::SOP_INSTANCE_UID)];
		context.offset = 2;
		let mut query = Query::new(context, &EngineConfig::default()).unwrap();

		// Count still reports the whole result set.
		assert_eq!(query.execute_count_query(&store).await.unwrap(), 6);

		query.execute_query(&store, 2).await.unwrap();
		collect(&mut query, &store).await
	};

	let expected: Vec<String> = full[2..4]
		.iter()
		.map(|r| element_str(r, tags::SOP_INSTANCE_UID))
		.collect();
	let paged: Vec<String> = page
		.iter()
		.map(|r| element_str(r, tags::SOP_INSTANCE_UID))
		.collect();
	assert_eq!(paged, expected);
}

#[tokio::test]
async fn instance_query_reuses_cached_series_ancestry() {
	let store = demo_store();
	let mut context = context(QueryRetrieveLevel::Image);
	context.matching_keys = dataset(&[(tags::SERIES_INSTANCE_UID, VR::UI, "1.2.3.10.1")]);
	context.order_by_tags = vec![OrderByTag::desc(tags::INSTANCE_NUMBER)];

	let mut query = Query::new(context, &EngineConfig::default()).unwrap();
	query.execute_query(&store, 0).await.unwrap();
	let results = collect(&mut query, &store).await;
	assert_eq!(results.len(), 3);

	let numbers: Vec<String> = results
		.iter()
		.map(|r| element_str(r, tags::INSTANCE_NUMBER))
		.collect();
	assert_eq!(numbers, vec!["3", "2", "1"]);

	for result in &results {
		// Every instance carries the full ancestor merge.
		assert_eq!(element_str(result, tags::PATIENT_NAME), "DOE^JANE");
		assert_eq!(element_str(result, tags::STUDY_INSTANCE_UID), "1.2.3.10");
		assert_eq!(element_str(result, tags::SERIES_INSTANCE_UID), "1.2.3.10.1");
		assert_eq!(element_str(result, SCAN_ID), "2");
	}
}

#[tokio::test]
async fn session_anchor_scopes_series_to_one_study() {
	let store = demo_store();
	let mut context = context(QueryRetrieveLevel::Series);
	context.matching_keys = dataset(&[(SESSION_ID, VR::LO, "SESSION1")]);

	let mut query = Query::new(context, &EngineConfig::default()).unwrap();
	assert_eq!(query.execute_count_query(&store).await.unwrap(), 2);
}

#[tokio::test]
async fn return_keys_filter_and_supplement() {
	let store = demo_store();
	let mut context = context(QueryRetrieveLevel::Study);
	context.matching_keys = dataset(&[(tags::STUDY_INSTANCE_UID, VR::UI, "1.2.3.10")]);
	context.return_keys = Some(dataset(&[
		(tags::STUDY_DATE, VR::DA, ""),
		(tags::PATIENT_WEIGHT, VR::DS, ""),
	]));

	let mut query = Query::new(context, &EngineConfig::default()).unwrap();
	query.execute_query(&store, 0).await.unwrap();

	assert!(query.has_more_matches().await);
	let matched = query.next_match(&store).await.unwrap();
	let adjusted = query.adjust(matched).expect("an adjusted match");

	assert_eq!(adjusted.tags().count(), 2);
	assert_eq!(element_str(&adjusted, tags::STUDY_DATE), "20200115");
	// Requested but never stored: supplemented as an empty value.
	assert!(adjusted.element(tags::PATIENT_WEIGHT).is_ok());
	assert!(query.adjust(None).is_none());
}

#[tokio::test]
async fn differing_character_sets_unify_in_the_merge() {
	let mut store = MemoryStore::new();
	store.add_patient(PatientRecord {
		id: 1,
		subject_id: "SUBJ1".into(),
		patient_id: "P1".into(),
		patient_name: "MULLER^ERIKA".into(),
		patient_sex: "F".into(),
		patient_birth_date: "19800101".into(),
		number_of_studies: 1,
		encoded_attributes: blob(&[
			(tags::SPECIFIC_CHARACTER_SET, VR::CS, "ISO_IR 100"),
			(tags::PATIENT_NAME, VR::PN, "MULLER^ERIKA"),
		]),
	});
	store.add_study(StudyRecord {
		id: 10,
		patient_fk: 1,
		session_id: "SESSION1".into(),
		study_instance_uid: "1.2.3.10".into(),
		study_id: "ST10".into(),
		study_date: "20200115".into(),
		study_time: "110000.000".into(),
		accession_number: "ACC10".into(),
		study_description: "CT".into(),
		number_of_study_related_instances: 1,
		number_of_study_related_series: 1,
		modalities_in_study: "CT".into(),
		sop_classes_in_study: "1.2.840.10008.5.1.4.1.1.2".into(),
		encoded_attributes: blob(&[
			(tags::SPECIFIC_CHARACTER_SET, VR::CS, "ISO_IR 144"),
			(tags::STUDY_INSTANCE_UID, VR::UI, "1.2.3.10"),
		]),
	});

	let mut context = context(QueryRetrieveLevel::Study);
	context.matching_keys = dataset(&[(tags::STUDY_INSTANCE_UID, VR::UI, "1.2.3.10")]);
	let mut query = Query::new(context, &EngineConfig::default()).unwrap();
	query.execute_query(&store, 0).await.unwrap();
	let results = collect(&mut query, &store).await;
	assert_eq!(results.len(), 1);
	assert_eq!(
		element_str(&results[0], tags::SPECIFIC_CHARACTER_SET),
		"ISO_IR 192"
	);
	assert_eq!(element_str(&results[0], tags::PATIENT_NAME), "MULLER^ERIKA");
}

#[tokio::test]
async fn matches_render_as_dicom_json() {
	let store = demo_store();
	let mut context = context(QueryRetrieveLevel::Study);
	context.matching_keys = dataset(&[(tags::STUDY_INSTANCE_UID, VR::UI, "1.2.3.10")]);

	let mut query = Query::new(context, &EngineConfig::default()).unwrap();
	query.execute_query(&store, 0).await.unwrap();
	let results = collect(&mut query, &store).await;
	assert_eq!(results.len(), 1);

	let json: serde_json::Value =
		dicom_json::to_value(results[0].clone()).expect("DICOM JSON rendering");
	let object = json.as_object().expect("a JSON object");
	// StudyInstanceUID is (0020,000D).
	assert!(object.contains_key("0020000D"));
}

#[test]
fn patient_level_is_a_configuration_error() {
	let context = QueryContext::new(QueryRetrieveLevel::Patient);
	let result = Query::new(context, &EngineConfig::default());
	assert!(matches!(result, Err(QueryError::UnsupportedLevel(_))));
}

/// Delegates executions to the in-memory store but refuses every ancestor
/// lookup, simulating referential corruption between list rows and the
/// series table.
struct SeveredStore {
	inner: MemoryStore,
}

#[async_trait]
impl QueryExecutor for SeveredStore {
	async fn count(&self, spec: &QuerySpec) -> Result<u64, DataAccessError> {
		self.inner.count(spec).await
	}

	async fn list(&self, spec: &QuerySpec) -> Result<RowStream, DataAccessError> {
		self.inner.list(spec).await
	}

	async fn series_ancestry(
		&self,
		_series_pk: i64,
	) -> Result<Option<SeriesAncestry>, DataAccessError> {
		Ok(None)
	}
}

#[tokio::test]
async fn missing_ancestor_propagates_as_corruption() {
	let store = SeveredStore {
		inner: demo_store(),
	};
	let context = context(QueryRetrieveLevel::Image);
	let mut query = Query::new(context, &EngineConfig::default()).unwrap();
	query.execute_query(&store, 0).await.unwrap();

	assert!(query.has_more_matches().await);
	let result = query.next_match(&store).await;
	assert!(matches!(
		result,
		Err(QueryError::DataAccess(DataAccessError::MissingAncestor(_)))
	));
}
