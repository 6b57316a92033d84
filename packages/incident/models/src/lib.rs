#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime incident record types shared by every stage of the pipeline.
//!
//! Raw exports arrive as text with human-readable headers (`"Case Number"`).
//! The normalizer turns them into [`CanonicalIncident`] rows, and the loader
//! converts those into typed [`StoredIncident`] rows for the store. Column
//! naming for all three shapes is defined once by [`Column`].

use chrono::{Datelike as _, NaiveDateTime, Timelike as _};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Timestamp format used by the raw exports (`01/15/2015 02:30:00 PM`).
pub const RAW_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

/// Timestamp format written to the canonical file (`2015-01-15 14:30:00`).
pub const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The canonical column set, in output order.
///
/// `Display`/`AsRef<str>` yield the store name (whitespace-free), and
/// [`Column::raw_name`] yields the header used by the raw exports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr,
)]
pub enum Column {
    /// Numeric record identifier.
    #[strum(serialize = "ID")]
    Id,
    /// Case reference, the business key.
    CaseNumber,
    /// When the incident occurred.
    Date,
    /// Primary classification (e.g. `THEFT`).
    PrimaryType,
    /// Free-text secondary description.
    Description,
    /// Kind of location (e.g. `STREET`).
    LocationDescription,
    /// Whether an arrest was made.
    Arrest,
    /// Whether the incident was domestic-related.
    Domestic,
    /// Police beat.
    Beat,
    /// Police district.
    District,
    /// City council ward.
    Ward,
    /// Community area number.
    CommunityArea,
    /// FBI offense classification code.
    #[strum(serialize = "FBICode")]
    FbiCode,
    /// WGS84 latitude.
    Latitude,
    /// WGS84 longitude.
    Longitude,
    /// Derived calendar year.
    Year,
    /// Derived calendar month (1-12).
    Month,
    /// Derived day of month.
    Day,
    /// Derived hour of day (0-23).
    Hour,
    /// State plane X coordinate.
    XCoordinate,
    /// State plane Y coordinate.
    YCoordinate,
    /// Geocoded point string, e.g. `(41.88, -87.63)`.
    Location,
}

impl Column {
    /// Every canonical column in output order.
    pub const ALL: [Self; 22] = [
        Self::Id,
        Self::CaseNumber,
        Self::Date,
        Self::PrimaryType,
        Self::Description,
        Self::LocationDescription,
        Self::Arrest,
        Self::Domestic,
        Self::Beat,
        Self::District,
        Self::Ward,
        Self::CommunityArea,
        Self::FbiCode,
        Self::Latitude,
        Self::Longitude,
        Self::Year,
        Self::Month,
        Self::Day,
        Self::Hour,
        Self::XCoordinate,
        Self::YCoordinate,
        Self::Location,
    ];

    /// Header name used by the raw city exports.
    #[must_use]
    pub const fn raw_name(self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::CaseNumber => "Case Number",
            Self::Date => "Date",
            Self::PrimaryType => "Primary Type",
            Self::Description => "Description",
            Self::LocationDescription => "Location Description",
            Self::Arrest => "Arrest",
            Self::Domestic => "Domestic",
            Self::Beat => "Beat",
            Self::District => "District",
            Self::Ward => "Ward",
            Self::CommunityArea => "Community Area",
            Self::FbiCode => "FBI Code",
            Self::Latitude => "Latitude",
            Self::Longitude => "Longitude",
            Self::Year => "Year",
            Self::Month => "Month",
            Self::Day => "Day",
            Self::Hour => "Hour",
            Self::XCoordinate => "X Coordinate",
            Self::YCoordinate => "Y Coordinate",
            Self::Location => "Location",
        }
    }

    /// Whether the normalizer computes this column from the timestamp
    /// instead of reading it from the input.
    #[must_use]
    pub const fn is_derived(self) -> bool {
        matches!(self, Self::Year | Self::Month | Self::Day | Self::Hour)
    }

    /// Resolves a header (raw or store spelling) to its column.
    #[must_use]
    pub fn from_header(header: &str) -> Option<Self> {
        normalize_header(header).parse().ok()
    }
}

/// Normalizes a header name into its store spelling by trimming it and
/// removing all internal whitespace (`" Case Number "` -> `"CaseNumber"`).
#[must_use]
pub fn normalize_header(header: &str) -> String {
    header.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Parses a raw export timestamp. Returns `None` for anything that does
/// not match [`RAW_TIMESTAMP_FORMAT`].
#[must_use]
pub fn parse_raw_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), RAW_TIMESTAMP_FORMAT).ok()
}

/// Parses a canonical-file timestamp, also accepting the `T`-separated ISO
/// form and the raw export form.
#[must_use]
pub fn parse_any_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, ISO_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| parse_raw_timestamp(s))
}

/// Calendar fields derived from a parsed timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CalendarParts {
    /// Calendar year.
    pub year: i32,
    /// Month, 1-12.
    pub month: u32,
    /// Day of month, 1-31.
    pub day: u32,
    /// Hour of day, 0-23.
    pub hour: u32,
}

impl From<&NaiveDateTime> for CalendarParts {
    fn from(dt: &NaiveDateTime) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
        }
    }
}

/// A cleaned, schema-conformant incident row as written by the normalizer.
///
/// Source values are carried verbatim (trimmed) so that exact-duplicate
/// detection compares what the export actually contained. Only the
/// timestamp is parsed, and the calendar fields are derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalIncident {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "CaseNumber")]
    pub case_number: String,
    #[serde(rename = "Date", with = "canonical_timestamp")]
    pub occurred_at: NaiveDateTime,
    #[serde(rename = "PrimaryType")]
    pub primary_type: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "LocationDescription")]
    pub location_description: String,
    #[serde(rename = "Arrest")]
    pub arrest: String,
    #[serde(rename = "Domestic")]
    pub domestic: String,
    #[serde(rename = "Beat")]
    pub beat: String,
    #[serde(rename = "District")]
    pub district: String,
    #[serde(rename = "Ward")]
    pub ward: String,
    #[serde(rename = "CommunityArea")]
    pub community_area: String,
    #[serde(rename = "FBICode")]
    pub fbi_code: String,
    #[serde(rename = "Latitude")]
    pub latitude: String,
    #[serde(rename = "Longitude")]
    pub longitude: String,
    #[serde(rename = "Year", default)]
    pub year: i32,
    #[serde(rename = "Month", default)]
    pub month: u32,
    #[serde(rename = "Day", default)]
    pub day: u32,
    #[serde(rename = "Hour", default)]
    pub hour: u32,
    #[serde(rename = "XCoordinate")]
    pub x_coordinate: String,
    #[serde(rename = "YCoordinate")]
    pub y_coordinate: String,
    #[serde(rename = "Location")]
    pub location: String,
}

impl CanonicalIncident {
    /// Returns the calendar fields derived from the timestamp.
    #[must_use]
    pub fn calendar(&self) -> CalendarParts {
        CalendarParts::from(&self.occurred_at)
    }
}

mod canonical_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize as _, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&dt.format(super::ISO_TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_any_timestamp(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unparseable timestamp {s:?}")))
    }
}

/// Error returned when a boolean-like field holds a value outside the
/// strict mapping table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {column} value {value:?}: expected true/false/1/0 or empty")]
pub struct InvalidFlagError {
    /// Column that held the value.
    pub column: Column,
    /// The offending value.
    pub value: String,
}

/// Maps a boolean-like field to `true`/`false` using a strict table.
///
/// `true`, `1` and `1.0` map to `true`; `false`, `0`, `0.0` and the empty
/// string map to `false`. Matching ignores case and surrounding whitespace.
///
/// # Errors
///
/// Returns [`InvalidFlagError`] for any other value.
pub fn parse_flag(column: Column, value: &str) -> Result<bool, InvalidFlagError> {
    let v = value.trim();
    if v.eq_ignore_ascii_case("true") || v == "1" || v == "1.0" {
        Ok(true)
    } else if v.is_empty() || v.eq_ignore_ascii_case("false") || v == "0" || v == "0.0" {
        Ok(false)
    } else {
        Err(InvalidFlagError {
            column,
            value: value.to_string(),
        })
    }
}

/// Parses an administrative code such as a beat or ward number.
///
/// Accepts integer text and integral float text (`"12.0"`, as written by
/// spreadsheet tools). Returns `None` when empty or unparseable.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_code(s: &str) -> Option<i32> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i32>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    if f.fract() == 0.0 && f >= f64::from(i32::MIN) && f <= f64::from(i32::MAX) {
        Some(f as i32)
    } else {
        None
    }
}

/// Parses a record identifier. Same leniency as [`parse_code`].
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_id(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Some(f as i64)
    } else {
        None
    }
}

/// Parses a coordinate. Returns `None` when empty, unparseable, or
/// non-finite.
#[must_use]
pub fn parse_coordinate(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// A row of the persistent `ChicagoCrimes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredIncident {
    /// Case reference (primary key).
    pub case_number: String,
    /// Numeric record identifier.
    pub id: Option<i64>,
    /// When the incident occurred.
    pub occurred_at: NaiveDateTime,
    pub primary_type: Option<String>,
    pub description: Option<String>,
    pub location_description: Option<String>,
    /// Stored as `1`/`0`.
    pub arrest: bool,
    /// Stored as `1`/`0`.
    pub domestic: bool,
    pub beat: Option<i32>,
    pub district: Option<i32>,
    pub ward: Option<i32>,
    pub community_area: Option<i32>,
    pub fbi_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub x_coordinate: Option<f64>,
    pub y_coordinate: Option<f64>,
    pub location: Option<String>,
}

impl TryFrom<&CanonicalIncident> for StoredIncident {
    type Error = InvalidFlagError;

    /// Converts a canonical row, re-deriving the calendar fields from the
    /// timestamp and coercing the flags strictly.
    fn try_from(c: &CanonicalIncident) -> Result<Self, Self::Error> {
        let cal = c.calendar();

        Ok(Self {
            case_number: c.case_number.trim().to_string(),
            id: parse_id(&c.id),
            occurred_at: c.occurred_at,
            primary_type: non_empty(&c.primary_type),
            description: non_empty(&c.description),
            location_description: non_empty(&c.location_description),
            arrest: parse_flag(Column::Arrest, &c.arrest)?,
            domestic: parse_flag(Column::Domestic, &c.domestic)?,
            beat: parse_code(&c.beat),
            district: parse_code(&c.district),
            ward: parse_code(&c.ward),
            community_area: parse_code(&c.community_area),
            fbi_code: non_empty(&c.fbi_code),
            latitude: parse_coordinate(&c.latitude),
            longitude: parse_coordinate(&c.longitude),
            year: cal.year,
            month: cal.month,
            day: cal.day,
            hour: cal.hour,
            x_coordinate: parse_coordinate(&c.x_coordinate),
            y_coordinate: parse_coordinate(&c.y_coordinate),
            location: non_empty(&c.location),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> CanonicalIncident {
        CanonicalIncident {
            id: "10000092".to_string(),
            case_number: "HY189866".to_string(),
            occurred_at: NaiveDate::from_ymd_opt(2015, 3, 18)
                .unwrap()
                .and_hms_opt(19, 44, 0)
                .unwrap(),
            primary_type: "BATTERY".to_string(),
            description: "AGGRAVATED: OTHER DANG WEAPON".to_string(),
            location_description: "STREET".to_string(),
            arrest: "False".to_string(),
            domestic: "True".to_string(),
            beat: "1111".to_string(),
            district: "11.0".to_string(),
            ward: "28.0".to_string(),
            community_area: "25.0".to_string(),
            fbi_code: "04B".to_string(),
            latitude: "41.891398861".to_string(),
            longitude: "-87.744384567".to_string(),
            year: 2015,
            month: 3,
            day: 18,
            hour: 19,
            x_coordinate: "1144606.0".to_string(),
            y_coordinate: "1903566.0".to_string(),
            location: "(41.891398861, -87.744384567)".to_string(),
        }
    }

    #[test]
    fn column_names_strip_whitespace() {
        for column in Column::ALL {
            assert_eq!(normalize_header(column.raw_name()), column.as_ref());
            assert_eq!(Column::from_header(column.raw_name()), Some(column));
        }
        assert_eq!(Column::from_header(" FBI Code "), Some(Column::FbiCode));
        assert_eq!(Column::from_header("Block"), None);
    }

    #[test]
    fn raw_timestamp_round_trips_through_calendar() {
        let dt = parse_raw_timestamp("07/04/2012 11:05:00 PM").unwrap();
        let cal = CalendarParts::from(&dt);
        assert_eq!(
            cal,
            CalendarParts {
                year: 2012,
                month: 7,
                day: 4,
                hour: 23
            }
        );
        let rebuilt = NaiveDate::from_ymd_opt(cal.year, cal.month, cal.day).unwrap();
        assert_eq!(rebuilt, dt.date());
        assert_eq!(
            dt.format(RAW_TIMESTAMP_FORMAT).to_string(),
            "07/04/2012 11:05:00 PM"
        );
    }

    #[test]
    fn midnight_and_noon_hours() {
        assert_eq!(
            parse_raw_timestamp("01/01/2010 12:00:00 AM").unwrap().format("%H").to_string(),
            "00"
        );
        assert_eq!(
            parse_raw_timestamp("01/01/2010 12:00:00 PM").unwrap().format("%H").to_string(),
            "12"
        );
    }

    #[test]
    fn rejects_malformed_raw_timestamps() {
        assert!(parse_raw_timestamp("").is_none());
        assert!(parse_raw_timestamp("2015-01-01 10:00:00").is_none());
        assert!(parse_raw_timestamp("13/01/2015 10:00:00 AM").is_none());
        assert!(parse_raw_timestamp("01/01/2015 10:00 AM").is_none());
    }

    #[test]
    fn parses_canonical_timestamp_forms() {
        let expected = NaiveDate::from_ymd_opt(2016, 2, 29)
            .unwrap()
            .and_hms_opt(8, 15, 30)
            .unwrap();
        assert_eq!(parse_any_timestamp("2016-02-29 08:15:30"), Some(expected));
        assert_eq!(parse_any_timestamp("2016-02-29T08:15:30"), Some(expected));
        assert_eq!(parse_any_timestamp("02/29/2016 08:15:30 AM"), Some(expected));
        assert_eq!(parse_any_timestamp("yesterday"), None);
    }

    #[test]
    fn strict_flag_mapping() {
        for v in ["true", "True", "TRUE", "1", "1.0", " true "] {
            assert_eq!(parse_flag(Column::Arrest, v), Ok(true), "{v:?}");
        }
        for v in ["false", "False", "0", "0.0", "", "  "] {
            assert_eq!(parse_flag(Column::Arrest, v), Ok(false), "{v:?}");
        }
        let err = parse_flag(Column::Domestic, "Y").unwrap_err();
        assert_eq!(err.column, Column::Domestic);
        assert_eq!(err.value, "Y");
        assert!(parse_flag(Column::Arrest, "2").is_err());
    }

    #[test]
    fn invalid_flag_error_names_column_and_value() {
        let err = parse_flag(Column::Arrest, "maybe").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid Arrest value \"maybe\": expected true/false/1/0 or empty"
        );
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn lenient_numeric_parsing() {
        assert_eq!(parse_code("25"), Some(25));
        assert_eq!(parse_code("25.0"), Some(25));
        assert_eq!(parse_code("25.5"), None);
        assert_eq!(parse_code(""), None);
        assert_eq!(parse_code("n/a"), None);
        assert_eq!(parse_id("10000092"), Some(10_000_092));
        assert_eq!(parse_coordinate(" -87.5 "), Some(-87.5));
        assert_eq!(parse_coordinate("NaN"), None);
    }

    #[test]
    fn converts_canonical_to_stored() {
        let stored = StoredIncident::try_from(&sample()).unwrap();
        assert_eq!(stored.case_number, "HY189866");
        assert_eq!(stored.id, Some(10_000_092));
        assert!(!stored.arrest);
        assert!(stored.domestic);
        assert_eq!(stored.district, Some(11));
        assert_eq!(stored.ward, Some(28));
        assert_eq!(stored.year, 2015);
        assert_eq!(stored.hour, 19);
        assert_eq!(stored.fbi_code.as_deref(), Some("04B"));
    }

    #[test]
    fn conversion_rederives_calendar_and_nulls_empty_text() {
        let mut c = sample();
        c.year = 0;
        c.month = 0;
        c.location_description = "   ".to_string();
        c.latitude = String::new();
        let stored = StoredIncident::try_from(&c).unwrap();
        assert_eq!((stored.year, stored.month, stored.day), (2015, 3, 18));
        assert_eq!(stored.location_description, None);
        assert_eq!(stored.latitude, None);
    }

    #[test]
    fn conversion_rejects_unknown_flag() {
        let mut c = sample();
        c.arrest = "maybe".to_string();
        let err = StoredIncident::try_from(&c).unwrap_err();
        assert_eq!(err.column, Column::Arrest);
    }

    #[test]
    fn canonical_csv_header_matches_column_order() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(sample()).unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let header = text.lines().next().unwrap();
        let expected: Vec<&str> = Column::ALL.iter().map(AsRef::as_ref).collect();
        assert_eq!(header, expected.join(","));
        assert!(text.contains("2015-03-18 19:44:00"));
    }

    #[test]
    fn canonical_csv_reads_back() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(sample()).unwrap();
        let bytes = writer.into_inner().unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let row: CanonicalIncident = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(row, sample());
    }
}
