use crate::predicate::builder::MatchingOptions;
use serde::Deserialize;

/// Engine configuration, layered the usual way: embedded defaults, then an
/// optional `qido-search.toml` next to the process, then environment
/// variables prefixed with `QIDO_SEARCH` (e.g.
/// `QIDO_SEARCH__QUERY__FETCH_SIZE=500`).
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
	pub matching: MatchingConfig,
	pub query: QueryConfig,
	pub retrieve: RetrieveConfig,
}

impl EngineConfig {
	pub fn new() -> Result<Self, config::ConfigError> {
		use config::Config;
		let s = Config::builder()
			.add_source(config::File::from_str(
				include_str!("defaults.toml"),
				config::FileFormat::Toml,
			))
			.add_source(config::File::with_name("qido-search.toml").required(false))
			.add_source(config::Environment::with_prefix("QIDO_SEARCH").separator("__"))
			.build()?;

		s.try_deserialize()
	}

	/// The toggles the predicate builder needs.
	pub const fn matching_options(&self) -> MatchingOptions {
		MatchingOptions {
			combined_datetime: self.matching.combined_datetime,
			patients_without_studies: self.matching.patients_without_studies,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
	/// See [`MatchingOptions::combined_datetime`].
	pub combined_datetime: bool,
	/// See [`MatchingOptions::patients_without_studies`].
	pub patients_without_studies: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
	/// Fetch-size hint forwarded to the store with every list execution.
	pub fetch_size: usize,
	/// Advisory result cap for the hosting service's paging logic. Carried
	/// here for parity with the device configuration; the engine itself
	/// never truncates below the caller-supplied limit.
	pub max_results: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveConfig {
	/// Fallback retrieve AE title when the query context provides no
	/// collection identifier.
	pub aet: String,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			matching: MatchingConfig {
				combined_datetime: true,
				patients_without_studies: false,
			},
			query: QueryConfig {
				fetch_size: 100,
				max_results: 1000,
			},
			retrieve: RetrieveConfig {
				aet: "QIDO-SEARCH".to_owned(),
			},
		}
	}
}
