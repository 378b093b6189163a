//! Tabular persistence of a [`TimeSet`].
//!
//! One `timestamp` column (RFC 3339) plus one column per segment holding
//! standalone seconds. Missing segments are empty cells. `min_best` is a
//! property of the task, not of the table, so callers pass it back in on load.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Local};

use crate::error::{Result, SplitError};
use crate::time_set::{TimeSet, TIMESTAMP_COLUMN};

fn format_cell(seconds: f64) -> String {
    if seconds.is_nan() {
        String::new()
    } else {
        seconds.to_string()
    }
}

fn parse_cell(cell: &str) -> Result<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>()
        .map_err(|_| SplitError::Schema(format!("cannot read \"{cell}\" as seconds")))
}

pub fn write_time_set<W: Write>(time_set: &TimeSet, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(
        std::iter::once(TIMESTAMP_COLUMN).chain(time_set.segments().iter().map(String::as_str)),
    )?;
    for (timestamp, run) in time_set.timestamps().iter().zip(time_set.standalone_times()) {
        csv_writer.write_record(
            std::iter::once(timestamp.to_rfc3339()).chain(run.iter().map(|&time| format_cell(time))),
        )?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn read_time_set<R: Read>(reader: R, min_best: bool) -> Result<TimeSet> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let timestamp_position = headers
        .iter()
        .position(|header| header == TIMESTAMP_COLUMN)
        .ok_or_else(|| {
            SplitError::Schema(format!("\"{TIMESTAMP_COLUMN}\" column not found"))
        })?;
    let segments: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|&(position, _)| position != timestamp_position)
        .map(|(_, header)| header.to_string())
        .collect();
    if segments.is_empty() {
        return Err(SplitError::Schema("no segment columns found".into()));
    }

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let timestamp =
            DateTime::parse_from_rfc3339(&record[timestamp_position])?.with_timezone(&Local);
        let times = record
            .iter()
            .enumerate()
            .filter(|&(position, _)| position != timestamp_position)
            .map(|(_, cell)| parse_cell(cell))
            .collect::<Result<Vec<f64>>>()?;
        rows.push((timestamp, times));
    }

    TimeSet::from_rows(segments, rows, min_best)
}

pub fn load<P: AsRef<Path>>(path: P, min_best: bool) -> Result<TimeSet> {
    read_time_set(File::open(path)?, min_best)
}

/// Writes the table next to `path` first and renames it into place, so an
/// interrupted save never truncates existing history.
pub fn save<P: AsRef<Path>>(time_set: &TimeSet, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = path.with_extension("csv.tmp");
    write_time_set(time_set, File::create(&staging)?)?;
    fs::rename(&staging, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_set::tests::{at, fixture, segments};
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("times.csv");
        let time_set = fixture();

        save(&time_set, &path).unwrap();
        let loaded = load(&path, true).unwrap();

        assert_eq!(loaded, time_set);
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn roundtrip_keeps_missing_and_fractional_values() {
        let time_set = TimeSet::from_rows(
            segments(&["a", "b", "c"]),
            vec![
                (at(0), vec![0.1 + 0.2, f64::NAN, 1e-3]),
                (at(5), vec![12.345678901234, 2.5, f64::NAN]),
            ],
            false,
        )
        .unwrap();

        let mut buffer = Vec::new();
        write_time_set(&time_set, &mut buffer).unwrap();
        let loaded = read_time_set(buffer.as_slice(), false).unwrap();

        assert_eq!(loaded, time_set);
    }

    #[test]
    fn written_table_layout() {
        let time_set = TimeSet::from_rows(
            segments(&["a", "b"]),
            vec![(at(0), vec![1.5, f64::NAN])],
            true,
        )
        .unwrap();
        let mut buffer = Vec::new();
        write_time_set(&time_set, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "timestamp,a,b");
        assert!(lines[1].ends_with(",1.5,"));
    }

    #[test]
    fn empty_store_roundtrips_its_segments() {
        let time_set = TimeSet::create_empty(segments(&["x", "y"]), true).unwrap();
        let mut buffer = Vec::new();
        write_time_set(&time_set, &mut buffer).unwrap();
        let loaded = read_time_set(buffer.as_slice(), true).unwrap();
        assert_eq!(loaded, time_set);
    }

    #[test]
    fn timestamp_column_can_be_anywhere() {
        let text = "first,timestamp,second\n1,2024-03-01T12:00:00+00:00,2\n";
        let loaded = read_time_set(text.as_bytes(), true).unwrap();
        assert_eq!(loaded.segments(), &["first".to_string(), "second".to_string()]);
        assert_eq!(loaded.standalone_times(), &[vec![1., 2.]]);
    }

    #[test]
    fn missing_timestamp_column_is_a_schema_error() {
        let text = "first,second\n1,2\n";
        assert_matches!(read_time_set(text.as_bytes(), true), Err(SplitError::Schema(_)));
    }

    #[test]
    fn timestamp_only_is_a_schema_error() {
        let text = "timestamp\n2024-03-01T12:00:00+00:00\n";
        assert_matches!(read_time_set(text.as_bytes(), true), Err(SplitError::Schema(_)));
        assert_matches!(read_time_set("".as_bytes(), true), Err(SplitError::Schema(_)));
    }

    #[test]
    fn malformed_cells_are_rejected() {
        let text = "timestamp,a\n2024-03-01T12:00:00+00:00,fast\n";
        assert_matches!(read_time_set(text.as_bytes(), true), Err(SplitError::Schema(_)));

        let text = "timestamp,a\nyesterday,1\n";
        assert_matches!(read_time_set(text.as_bytes(), true), Err(SplitError::Timestamp(_)));

        let text = "timestamp,a\n2024-03-01T12:00:00+00:00,1,2\n";
        assert_matches!(read_time_set(text.as_bytes(), true), Err(SplitError::Csv(_)));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        assert_matches!(load(dir.path().join("absent.csv"), true), Err(SplitError::Io(_)));
    }
}
