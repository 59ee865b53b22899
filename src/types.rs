use dicom::core::{PrimitiveValue, Tag};
use std::fmt::{Display, Formatter};

/// UI (Unique Identifier) value representation.
pub type UI = String;

/// UL (Unsigned Long) value representation.
pub type UL = u32;

/// IS (Integer String) values are stored as parsed integers.
pub type IS = i64;

/// AE (Application Entity) value representation.
pub type AE = String;

/// The lexicographic floor of a TM value, used when a combined date/time
/// bound carries no time component.
pub const START_OF_DAY: &str = "000000.000";

/// The lexicographic ceiling of a TM value.
pub const END_OF_DAY: &str = "235959.999";

/// The hierarchy depth at which a search is anchored.
///
/// <https://dicom.nema.org/medical/dicom/current/output/chtml/part04/sect_C.3.html>
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum QueryRetrieveLevel {
	Patient,
	Study,
	Series,
	Image,
}

impl Display for QueryRetrieveLevel {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Patient => write!(f, "PATIENT"),
			Self::Study => write!(f, "STUDY"),
			Self::Series => write!(f, "SERIES"),
			Self::Image => write!(f, "IMAGE"),
		}
	}
}

impl From<QueryRetrieveLevel> for PrimitiveValue {
	fn from(level: QueryRetrieveLevel) -> Self {
		Self::Str(level.to_string())
	}
}

/// Sort direction of a single ordering term.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SortDirection {
	Ascending,
	Descending,
}

/// A caller-requested ordering term: a DICOM tag plus direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OrderByTag {
	pub tag: Tag,
	pub direction: SortDirection,
}

impl OrderByTag {
	pub const fn asc(tag: Tag) -> Self {
		Self {
			tag,
			direction: SortDirection::Ascending,
		}
	}

	pub const fn desc(tag: Tag) -> Self {
		Self {
			tag,
			direction: SortDirection::Descending,
		}
	}
}

/// Which padding rules apply when normalizing the bounds of a range value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RangeKind {
	/// DA values ("YYYYMMDD", possibly truncated to year or month).
	Date,
	/// TM values ("HHMMSS.FFF", possibly truncated; ACR-NEMA colons allowed).
	Time,
}

/// A date or time range with either bound open.
///
/// Bounds are kept as normalized DA/TM strings. Stored date/time columns hold
/// the same formats, so every range comparison downstream is lexicographic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
	pub start: Option<String>,
	pub end: Option<String>,
}

impl DateRange {
	/// Parses a DICOM range matching value such as `"20200101-20200131"`,
	/// `"20200101-"`, `"-20200131"` or the single-value form `"20200101"`.
	///
	/// Truncated bounds are padded to full precision: the start bound floors
	/// (first day of the year/month, start of the second), the end bound
	/// ceils. An empty value yields the universal range.
	pub fn parse(raw: &str, kind: RangeKind) -> Self {
		let raw = raw.trim();
		if raw.is_empty() {
			return Self::default();
		}

		let (start, end) = match raw.find('-') {
			None => (Some(raw), Some(raw)),
			Some(0) => (None, Some(&raw[1..])),
			Some(at) if at == raw.len() - 1 => (Some(&raw[..at]), None),
			Some(at) => (Some(&raw[..at]), Some(&raw[at + 1..])),
		};

		Self {
			start: start.map(|bound| normalize_bound(bound, kind, false)),
			end: end.map(|bound| normalize_bound(bound, kind, true)),
		}
	}

	/// A range matches everything iff both bounds are open.
	pub const fn is_universal(&self) -> bool {
		self.start.is_none() && self.end.is_none()
	}

	/// True iff both bounds are present and the start orders after the end.
	/// Only meaningful for time ranges, where it indicates a span that
	/// crosses midnight.
	pub fn start_exceeds_end(&self) -> bool {
		match (&self.start, &self.end) {
			(Some(start), Some(end)) => start > end,
			_ => false,
		}
	}
}

/// One bound of a combined date/time range: a DA value paired with a TM
/// value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimeBound {
	pub date: String,
	pub time: String,
}

/// A combined date/time range assembled from independent DA and TM ranges.
///
/// A side of the combined range exists iff the date range has that bound;
/// a missing time component floors to the start of the day on the start
/// side and ceils to the end of the day on the end side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateTimeRange {
	pub start: Option<DateTimeBound>,
	pub end: Option<DateTimeBound>,
}

impl DateTimeRange {
	pub fn combine(date: &DateRange, time: &DateRange) -> Self {
		Self {
			start: date.start.as_ref().map(|day| DateTimeBound {
				date: day.clone(),
				time: time
					.start
					.clone()
					.unwrap_or_else(|| START_OF_DAY.to_owned()),
			}),
			end: date.end.as_ref().map(|day| DateTimeBound {
				date: day.clone(),
				time: time.end.clone().unwrap_or_else(|| END_OF_DAY.to_owned()),
			}),
		}
	}
}

fn normalize_bound(bound: &str, kind: RangeKind, ceil: bool) -> String {
	match kind {
		RangeKind::Date => normalize_da(bound, ceil),
		RangeKind::Time => normalize_tm(bound, ceil),
	}
}

fn normalize_da(bound: &str, ceil: bool) -> String {
	let mut out = String::with_capacity(8);
	out.push_str(bound);
	while out.len() < 8 {
		let pad = match (out.len(), ceil) {
			// Month component.
			(4 | 5, false) => "01",
			(4, true) => "12",
			(5, true) => "2",
			// Day component. "31" compares correctly against any stored day
			// of the month, which is all a lexicographic ceiling needs.
			(_, false) => "0",
			(6, true) => "31",
			(_, true) => "1",
		};
		out.push_str(pad);
		out.truncate(8);
	}
	out
}

fn normalize_tm(bound: &str, ceil: bool) -> String {
	// ACR-NEMA permitted "HH:MM:SS" formatting in query values.
	let cleaned: String = bound.chars().filter(|c| *c != ':').collect();
	let (clock, fraction) = match cleaned.find('.') {
		Some(at) => (&cleaned[..at], Some(&cleaned[at + 1..])),
		None => (cleaned.as_str(), None),
	};

	let mut out = String::with_capacity(10);
	out.push_str(clock);
	while out.len() < 6 {
		out.push_str(if ceil { "59" } else { "00" });
		out.truncate(6);
	}
	out.push('.');
	let mut fraction = fraction.unwrap_or_default().to_owned();
	while fraction.len() < 3 {
		fraction.push(if ceil && clock.len() >= 6 { '9' } else { '0' });
	}
	// A truncated clock already ceils through its seconds component.
	if ceil && clock.len() < 6 {
		fraction = "999".to_owned();
	}
	fraction.truncate(3);
	out.push_str(&fraction);
	out
}
