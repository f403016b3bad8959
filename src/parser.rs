// 🏗️ Source Parsers - one CSV format per epidemic data source
//
// Each source implements `SourceParser` (field contract + record → row).
// `parse_file` drives any parser over a file: header skipped, short or
// malformed rows counted and logged, never fatal for the pass.

use crate::error::{EtlError, EtlResult, RowError};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

// ============================================================================
// SOURCE KIND
// ============================================================================

/// The four supported sources, in import order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Worldometer,
    CovidComplete,
    FullGrouped,
    UsaCounty,
}

impl SourceKind {
    pub const IMPORT_ORDER: [SourceKind; 4] = [
        SourceKind::Worldometer,
        SourceKind::CovidComplete,
        SourceKind::FullGrouped,
        SourceKind::UsaCounty,
    ];

    /// Human-readable name for display
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Worldometer => "Worldometer",
            SourceKind::CovidComplete => "COVID-19 clean complete",
            SourceKind::FullGrouped => "Full grouped",
            SourceKind::UsaCounty => "USA county",
        }
    }

    /// Expected file name inside the data directory
    pub fn file_name(&self) -> &'static str {
        match self {
            SourceKind::Worldometer => "worldometer_data.csv",
            SourceKind::CovidComplete => "covid_19_clean_complete.csv",
            SourceKind::FullGrouped => "full_grouped.csv",
            SourceKind::UsaCounty => "usa_county_wise.csv",
        }
    }
}

/// Identify a source from its file name
pub fn detect_source(file_path: &Path) -> Option<SourceKind> {
    let filename = file_path.file_name()?.to_str()?.to_lowercase();

    if filename.contains("worldometer") {
        return Some(SourceKind::Worldometer);
    }
    if filename.contains("clean_complete") {
        return Some(SourceKind::CovidComplete);
    }
    if filename.contains("full_grouped") {
        return Some(SourceKind::FullGrouped);
    }
    if filename.contains("usa_county") {
        return Some(SourceKind::UsaCounty);
    }
    None
}

// ============================================================================
// ROWS (parser output, before any cache lookup)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldometerRow {
    pub country: String,
    pub continent: Option<String>,
    pub population: Option<i64>,
    pub total_cases: i64,
    pub total_deaths: i64,
    pub total_recovered: i64,
    pub active_cases: i64,
    pub who_region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CovidCompleteRow {
    pub province: Option<String>,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub date: NaiveDate,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: i64,
    pub active: i64,
    pub who_region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullGroupedRow {
    pub date: NaiveDate,
    pub country: String,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: i64,
    pub active: i64,
    pub who_region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsaCountyRow {
    pub county: Option<String>,
    pub province: Option<String>,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub date: NaiveDate,
    pub confirmed: i64,
    pub deaths: i64,
}

// ============================================================================
// PARSER TRAIT
// ============================================================================

/// One implementation per source format
pub trait SourceParser {
    type Row;

    fn source_kind(&self) -> SourceKind;

    /// Records shorter than this are rejected
    fn min_fields(&self) -> usize;

    /// `line` is the 1-based file line (header = line 1)
    fn parse_record(&self, record: &StringRecord, line: usize) -> Result<Self::Row, RowError>;

    /// Drop exact duplicate lines before mapping
    fn deduplicate(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct ParseOutcome<R> {
    pub rows: Vec<R>,
    pub lines_read: usize,
    pub line_errors: usize,
    pub duplicates: usize,
}

/// Read a source file with any parser
pub fn parse_file<P: SourceParser>(parser: &P, path: &Path) -> EtlResult<ParseOutcome<P::Row>> {
    let kind = parser.source_kind();
    if !path.is_file() {
        return Err(EtlError::DataFileNotFound {
            file_name: kind.file_name().to_string(),
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut outcome = ParseOutcome {
        rows: Vec::new(),
        lines_read: 0,
        line_errors: 0,
        duplicates: 0,
    };
    let mut seen: HashSet<String> = HashSet::new();

    for (index, result) in reader.records().enumerate() {
        let line = index + 2; // 1-indexed + header row
        outcome.lines_read += 1;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(source = kind.name(), line, error = %e, "unreadable line skipped");
                outcome.line_errors += 1;
                continue;
            }
        };

        if record.len() < parser.min_fields() {
            let err = RowError::InsufficientFields {
                expected: parser.min_fields(),
                got: record.len(),
            };
            warn!(source = kind.name(), line, error = %err, "line skipped");
            outcome.line_errors += 1;
            continue;
        }

        if parser.deduplicate() && !seen.insert(record_hash(&record)) {
            outcome.duplicates += 1;
            continue;
        }

        match parser.parse_record(&record, line) {
            Ok(row) => outcome.rows.push(row),
            Err(err) => {
                warn!(source = kind.name(), line, error = %err, "line skipped");
                outcome.line_errors += 1;
            }
        }
    }

    info!(
        source = kind.name(),
        lines = outcome.lines_read,
        rows = outcome.rows.len(),
        errors = outcome.line_errors,
        duplicates = outcome.duplicates,
        "file parsed"
    );
    Ok(outcome)
}

/// SHA-256 over the trimmed fields (unit-separator joined)
pub fn record_hash(record: &StringRecord) -> String {
    let mut hasher = Sha256::new();
    for (i, field) in record.iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f_u8]);
        }
        hasher.update(field.trim().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

fn field<'r>(record: &'r StringRecord, index: usize) -> &'r str {
    record.get(index).map(str::trim).unwrap_or("")
}

fn optional(record: &StringRecord, index: usize) -> Option<String> {
    let value = field(record, index);
    (!value.is_empty()).then(|| value.to_string())
}

fn required(record: &StringRecord, index: usize, name: &'static str) -> Result<String, RowError> {
    optional(record, index).ok_or_else(|| RowError::Malformed(format!("empty {}", name)))
}

/// Empty → 0; integral floats ("12.0") accepted, fractional ones rejected
fn parse_count(raw: &str, name: &'static str) -> Result<i64, RowError> {
    if raw.is_empty() {
        return Ok(0);
    }
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(value);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.fract() == 0.0)
        .map(|v| v as i64)
        .ok_or_else(|| RowError::InvalidNumber {
            field: name,
            value: raw.to_string(),
        })
}

fn parse_coord(raw: &str, name: &'static str) -> Result<f64, RowError> {
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse::<f64>().map_err(|_| RowError::InvalidNumber {
        field: name,
        value: raw.to_string(),
    })
}

fn parse_date(raw: &str, format: &'static str) -> Result<NaiveDate, RowError> {
    NaiveDate::parse_from_str(raw, format).map_err(|_| RowError::InvalidDate {
        value: raw.to_string(),
        format,
    })
}

/// Worldometer prints thousands separators ("5,032,179")
fn strip_separators(raw: &str) -> String {
    raw.replace(',', "")
}

const ISO_DATE: &str = "%Y-%m-%d";
const US_DATE: &str = "%m/%d/%y";

// ============================================================================
// WORLDOMETER
// ============================================================================

pub struct WorldometerParser;

impl SourceParser for WorldometerParser {
    type Row = WorldometerRow;

    fn source_kind(&self) -> SourceKind {
        SourceKind::Worldometer
    }

    fn min_fields(&self) -> usize {
        16
    }

    fn parse_record(&self, record: &StringRecord, _line: usize) -> Result<WorldometerRow, RowError> {
        let number = |index: usize, name: &'static str| parse_count(&strip_separators(field(record, index)), name);

        let population = match field(record, 2) {
            "" => None,
            raw => Some(parse_count(&strip_separators(raw), "population")?),
        };

        Ok(WorldometerRow {
            country: required(record, 0, "country")?,
            continent: optional(record, 1),
            population,
            total_cases: number(3, "total_cases")?,
            total_deaths: number(5, "total_deaths")?,
            total_recovered: number(7, "total_recovered")?,
            active_cases: number(9, "active_cases")?,
            who_region: optional(record, 15),
        })
    }

    fn deduplicate(&self) -> bool {
        true
    }
}

// ============================================================================
// COVID-19 CLEAN COMPLETE
// ============================================================================

pub struct CovidCompleteParser;

impl SourceParser for CovidCompleteParser {
    type Row = CovidCompleteRow;

    fn source_kind(&self) -> SourceKind {
        SourceKind::CovidComplete
    }

    fn min_fields(&self) -> usize {
        10
    }

    fn parse_record(&self, record: &StringRecord, _line: usize) -> Result<CovidCompleteRow, RowError> {
        Ok(CovidCompleteRow {
            province: optional(record, 0),
            country: required(record, 1, "country")?,
            lat: parse_coord(field(record, 2), "lat")?,
            lon: parse_coord(field(record, 3), "long")?,
            date: parse_date(field(record, 4), ISO_DATE)?,
            confirmed: parse_count(field(record, 5), "confirmed")?,
            deaths: parse_count(field(record, 6), "deaths")?,
            recovered: parse_count(field(record, 7), "recovered")?,
            active: parse_count(field(record, 8), "active")?,
            who_region: optional(record, 9),
        })
    }
}

// ============================================================================
// FULL GROUPED
// ============================================================================

pub struct FullGroupedParser;

impl SourceParser for FullGroupedParser {
    type Row = FullGroupedRow;

    fn source_kind(&self) -> SourceKind {
        SourceKind::FullGrouped
    }

    fn min_fields(&self) -> usize {
        10
    }

    fn parse_record(&self, record: &StringRecord, _line: usize) -> Result<FullGroupedRow, RowError> {
        Ok(FullGroupedRow {
            date: parse_date(field(record, 0), ISO_DATE)?,
            country: required(record, 1, "country")?,
            confirmed: parse_count(field(record, 2), "confirmed")?,
            deaths: parse_count(field(record, 3), "deaths")?,
            recovered: parse_count(field(record, 4), "recovered")?,
            active: parse_count(field(record, 5), "active")?,
            who_region: optional(record, 9),
        })
    }

    fn deduplicate(&self) -> bool {
        true
    }
}

// ============================================================================
// USA COUNTY
// ============================================================================

/// Lenient: bad coordinates/counters become 0, only the date is mandatory
pub struct UsaCountyParser;

impl UsaCountyParser {
    fn lenient_coord(record: &StringRecord, index: usize, name: &'static str, line: usize) -> f64 {
        parse_coord(field(record, index), name).unwrap_or_else(|err| {
            warn!(line, error = %err, "coordinate defaulted to 0");
            0.0
        })
    }

    fn lenient_count(record: &StringRecord, index: usize, name: &'static str, line: usize) -> i64 {
        parse_count(field(record, index), name).unwrap_or_else(|err| {
            warn!(line, error = %err, "counter defaulted to 0");
            0
        })
    }
}

impl SourceParser for UsaCountyParser {
    type Row = UsaCountyRow;

    fn source_kind(&self) -> SourceKind {
        SourceKind::UsaCounty
    }

    fn min_fields(&self) -> usize {
        14
    }

    fn parse_record(&self, record: &StringRecord, line: usize) -> Result<UsaCountyRow, RowError> {
        let row = UsaCountyRow {
            county: optional(record, 5),
            province: optional(record, 6),
            country: required(record, 7, "country")?,
            lat: Self::lenient_coord(record, 8, "lat", line),
            lon: Self::lenient_coord(record, 9, "long", line),
            date: parse_date(field(record, 11), US_DATE)?,
            confirmed: Self::lenient_count(record, 12, "confirmed", line),
            deaths: Self::lenient_count(record, 13, "deaths", line),
        };
        debug!(line, country = %row.country, "usa county row parsed");
        Ok(row)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn test_source_kind_file_names() {
        assert_eq!(SourceKind::Worldometer.file_name(), "worldometer_data.csv");
        assert_eq!(SourceKind::UsaCounty.file_name(), "usa_county_wise.csv");
        assert_eq!(SourceKind::IMPORT_ORDER[0], SourceKind::Worldometer);
        assert_eq!(SourceKind::IMPORT_ORDER[3], SourceKind::UsaCounty);
    }

    #[test]
    fn test_detect_source() {
        assert_eq!(detect_source(Path::new("data/full_grouped.csv")), Some(SourceKind::FullGrouped));
        assert_eq!(
            detect_source(Path::new("covid_19_clean_complete.csv")),
            Some(SourceKind::CovidComplete)
        );
        assert_eq!(detect_source(Path::new("bank_statement.csv")), None);
    }

    #[test]
    fn test_worldometer_record() {
        let row = WorldometerParser
            .parse_record(
                &record(&[
                    "USA", "North America", "331,198,130", "5,032,179", "", "162,804", "", "2,576,668",
                    "", "2,292,707", "18296", "15194", "492", "63139605", "190640", "Americas",
                ]),
                2,
            )
            .unwrap();

        assert_eq!(row.country, "USA");
        assert_eq!(row.population, Some(331_198_130));
        assert_eq!(row.total_cases, 5_032_179);
        assert_eq!(row.total_deaths, 162_804);
        assert_eq!(row.total_recovered, 2_576_668);
        assert_eq!(row.active_cases, 2_292_707);
        assert_eq!(row.who_region.as_deref(), Some("Americas"));
    }

    #[test]
    fn test_worldometer_empty_population_is_absent() {
        let mut fields = vec![""; 16];
        fields[0] = "Holy See";
        let row = WorldometerParser.parse_record(&record(&fields), 2).unwrap();

        assert_eq!(row.population, None);
        assert_eq!(row.total_cases, 0);
        assert_eq!(row.continent, None);
    }

    #[test]
    fn test_covid_complete_record() {
        let row = CovidCompleteParser
            .parse_record(
                &record(&[
                    "", "Afghanistan", "33.93911", "67.709953", "2020-01-22", "0", "0", "0", "0",
                    "Eastern Mediterranean",
                ]),
                2,
            )
            .unwrap();

        assert_eq!(row.province, None);
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2020, 1, 22).unwrap());
        assert!((row.lat - 33.93911).abs() < 1e-9);
    }

    #[test]
    fn test_covid_complete_rejects_bad_date_and_number() {
        let mut fields = vec!["", "France", "0", "0", "22/01/2020", "1", "0", "0", "1", "Europe"];
        let err = CovidCompleteParser.parse_record(&record(&fields), 5).unwrap_err();
        assert!(matches!(err, RowError::InvalidDate { .. }));

        fields[4] = "2020-01-22";
        fields[5] = "many";
        let err = CovidCompleteParser.parse_record(&record(&fields), 5).unwrap_err();
        assert_eq!(
            err,
            RowError::InvalidNumber {
                field: "confirmed",
                value: "many".to_string()
            }
        );
    }

    #[test]
    fn test_count_accepts_integral_floats_only() {
        assert_eq!(parse_count("", "deaths"), Ok(0));
        assert_eq!(parse_count("12", "deaths"), Ok(12));
        assert_eq!(parse_count("12.0", "deaths"), Ok(12));
        assert_eq!(
            parse_count("12.7", "deaths"),
            Err(RowError::InvalidNumber {
                field: "deaths",
                value: "12.7".to_string()
            })
        );
        assert!(parse_count("NaN", "deaths").is_err());
    }

    #[test]
    fn test_usa_county_is_lenient() {
        let row = UsaCountyParser
            .parse_record(
                &record(&[
                    "84001001", "US", "USA", "840", "1001.0", "Autauga", "Alabama", "US", "n/a",
                    "-86.64", "Autauga, Alabama, US", "1/22/20", "oops", "0",
                ]),
                2,
            )
            .unwrap();

        assert_eq!(row.county.as_deref(), Some("Autauga"));
        assert_eq!(row.province.as_deref(), Some("Alabama"));
        assert_eq!(row.lat, 0.0);
        assert_eq!(row.confirmed, 0);
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2020, 1, 22).unwrap());
    }

    #[test]
    fn test_parse_file_counts_errors_and_duplicates() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "full_grouped.csv",
            "Date,Country/Region,Confirmed,Deaths,Recovered,Active,New cases,New deaths,New recovered,WHO Region\n\
             2020-01-22,Afghanistan,0,0,0,0,0,0,0,Eastern Mediterranean\n\
             2020-01-22,Afghanistan,0,0,0,0,0,0,0,Eastern Mediterranean\n\
             2020-01-22,Albania,0,0\n\
             not-a-date,Algeria,0,0,0,0,0,0,0,Africa\n\
             2020-01-23,Algeria,1,0,0,1,1,0,0,Africa\n",
        );

        let outcome = parse_file(&FullGroupedParser, &path).unwrap();

        assert_eq!(outcome.lines_read, 5);
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.line_errors, 2);
    }

    #[test]
    fn test_parse_file_handles_quoted_commas() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "covid_19_clean_complete.csv",
            "Province/State,Country/Region,Lat,Long,Date,Confirmed,Deaths,Recovered,Active,WHO Region\n\
             \"Bonaire, Sint Eustatius and Saba\",Netherlands,12.17,-68.24,2020-07-27,13,0,7,6,Europe\n",
        );

        let outcome = parse_file(&CovidCompleteParser, &path).unwrap();

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(
            outcome.rows[0].province.as_deref(),
            Some("Bonaire, Sint Eustatius and Saba")
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = parse_file(&WorldometerParser, &dir.path().join("worldometer_data.csv")).unwrap_err();

        match err {
            EtlError::DataFileNotFound { file_name, .. } => assert_eq!(file_name, "worldometer_data.csv"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_record_hash_is_stable() {
        let a = record_hash(&record(&["2020-01-22", "Peru", "1"]));
        let b = record_hash(&record(&[" 2020-01-22", "Peru ", "1"]));
        let c = record_hash(&record(&["2020-01-22", "Peru", "2"]));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
