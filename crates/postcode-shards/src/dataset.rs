//! Dataset ingest: turns the raw postcode table into records.
//!
//! The input is CSV text with a header row. Only the columns named by the
//! [`ColumnMap`] are read; everything else is ignored. Quoted fields may contain
//! commas and doubled quotes but not line breaks.

use std::io::BufRead;

use postcode_shards_core::{Record, RecordFields};

use crate::config::ColumnMap;
use crate::error::{Result, ShardsError};

/// Counts from reading one dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetReport {
    /// Data rows seen (excluding the header and blank lines).
    pub rows: usize,
    /// Rows turned into records.
    pub accepted: usize,
    /// Rows dropped for an unusable key or coordinate.
    pub skipped: usize,
}

/// Positions of the mapped columns within a row.
struct ColumnIndex {
    key: usize,
    easting: usize,
    northing: usize,
    region: usize,
}

impl ColumnIndex {
    fn resolve(header: &[String], columns: &ColumnMap) -> Result<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ShardsError::MissingColumn(name.to_string()))
        };
        Ok(Self {
            key: find(&columns.key)?,
            easting: find(&columns.easting)?,
            northing: find(&columns.northing)?,
            region: find(&columns.region)?,
        })
    }
}

/// Read every usable record from CSV text.
///
/// Rows with an unusable key or an unparseable coordinate are skipped and
/// counted. A missing header or column, or a malformed line, is an error.
pub fn read_records<R: BufRead>(reader: R, columns: &ColumnMap) -> Result<(Vec<Record>, DatasetReport)> {
    let mut lines = reader.lines().enumerate();

    let header = loop {
        match lines.next() {
            Some((n, line)) => {
                let line = line.map_err(|e| dataset_error(n, e.to_string()))?;
                if !line.trim().is_empty() {
                    break split_line(&line).map_err(|msg| dataset_error(n, msg))?;
                }
            }
            None => return Err(ShardsError::Dataset { line: 0, message: "missing header row".into() }),
        }
    };
    let index = ColumnIndex::resolve(&header, columns)?;

    let mut records = Vec::new();
    let mut report = DatasetReport::default();

    for (n, line) in lines {
        let line = line.map_err(|e| dataset_error(n, e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        report.rows += 1;

        let fields = split_line(&line).map_err(|msg| dataset_error(n, msg))?;
        match row_to_record(&fields, &index) {
            Ok(record) => {
                records.push(record);
                report.accepted += 1;
            }
            Err(reason) => {
                report.skipped += 1;
                tracing::debug!(line = n + 1, %reason, "skipping dataset row");
            }
        }
    }

    if report.skipped > 0 {
        tracing::warn!(skipped = report.skipped, rows = report.rows, "dataset rows skipped");
    }
    tracing::info!(accepted = report.accepted, "dataset read");

    Ok((records, report))
}

fn dataset_error(zero_based_line: usize, message: String) -> ShardsError {
    ShardsError::Dataset {
        line: zero_based_line + 1,
        message,
    }
}

fn row_to_record(fields: &[String], index: &ColumnIndex) -> std::result::Result<Record, String> {
    let column = |i: usize| fields.get(i).map(String::as_str).ok_or("row too short");

    let easting = parse_coordinate(column(index.easting)?)?;
    let northing = parse_coordinate(column(index.northing)?)?;
    let region = column(index.region)?.trim().to_string();

    Record::new(
        column(index.key)?,
        RecordFields {
            easting,
            northing,
            region,
        },
    )
    .map_err(|e| e.to_string())
}

fn parse_coordinate(raw: &str) -> std::result::Result<Option<i64>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| format!("bad coordinate {raw:?}"))
}

/// Split one CSV line into fields.
fn split_line(line: &str) -> std::result::Result<Vec<String>, String> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match (in_quotes, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            (true, '"') => in_quotes = false,
            (true, c) => field.push(c),
            (false, '"') if field.is_empty() => in_quotes = true,
            (false, ',') => fields.push(std::mem::take(&mut field)),
            (false, c) => field.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".into());
    }
    fields.push(field);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
pcd,pcd2,oseast1m,osnrth1m,rgn
AB1 0AA,AB1  0AA,385386,801193,S99999999
\"AB1 0AB\",\"AB1  0AB\",385177,801314,S99999999

ZE3 9JZ,ZE3  9JZ,,,S99999999
";

    #[test]
    fn test_reads_mapped_columns() {
        let (records, report) = read_records(SAMPLE.as_bytes(), &ColumnMap::default()).unwrap();

        assert_eq!(report, DatasetReport { rows: 3, accepted: 3, skipped: 0 });
        assert_eq!(records[0].key().as_str(), "AB10AA");
        assert_eq!(records[0].fields.easting, Some(385386));
        assert_eq!(records[1].key().as_str(), "AB10AB");
        assert_eq!(records[2].fields.easting, None);
        assert_eq!(records[2].fields.region, "S99999999");
    }

    #[test]
    fn test_skips_unusable_rows() {
        let csv = "pcd,oseast1m,osnrth1m,rgn\n ,1,2,X\nAB1 2CD,east,2,X\nAB1 2CE,1,2,X\n";
        let (records, report) = read_records(csv.as_bytes(), &ColumnMap::default()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.rows, 3);
    }

    #[test]
    fn test_missing_column_is_error() {
        let csv = "pcd,oseast1m,rgn\nAB1 2CD,1,X\n";
        let err = read_records(csv.as_bytes(), &ColumnMap::default()).unwrap_err();
        assert!(matches!(err, ShardsError::MissingColumn(ref c) if c == "osnrth1m"));
    }

    #[test]
    fn test_missing_header_is_error() {
        assert!(matches!(
            read_records("".as_bytes(), &ColumnMap::default()),
            Err(ShardsError::Dataset { .. })
        ));
    }

    #[test]
    fn test_unterminated_quote_reports_line() {
        let csv = "pcd,oseast1m,osnrth1m,rgn\n\"AB1 2CD,1,2,X\n";
        let err = read_records(csv.as_bytes(), &ColumnMap::default()).unwrap_err();
        assert!(matches!(err, ShardsError::Dataset { line: 2, .. }));
    }

    #[test]
    fn test_quoted_field_spanning_lines_is_rejected() {
        let csv = "pcd,oseast1m,osnrth1m,rgn\nAB1 2CD,1,2,X\nZZ9 9ZZ,3,4,\"North\nEast\"\n";
        let err = read_records(csv.as_bytes(), &ColumnMap::default()).unwrap_err();
        assert!(matches!(err, ShardsError::Dataset { line: 3, .. }));
    }

    #[test]
    fn test_split_line_quoting() {
        assert_eq!(
            split_line(r#"a,"b,c","say ""hi""",,e"#).unwrap(),
            vec!["a", "b,c", r#"say "hi""#, "", "e"]
        );
        assert_eq!(split_line("x,y\r").unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn test_custom_columns() {
        let columns = ColumnMap {
            key: "postcode".into(),
            easting: "x".into(),
            northing: "y".into(),
            region: "area".into(),
        };
        let csv = "area,y,x,postcode\nR1,20,10,zz9 9zz\n";
        let (records, _) = read_records(csv.as_bytes(), &columns).unwrap();

        assert_eq!(records[0].key().as_str(), "ZZ99ZZ");
        assert_eq!(records[0].fields.easting, Some(10));
        assert_eq!(records[0].fields.northing, Some(20));
    }
}
