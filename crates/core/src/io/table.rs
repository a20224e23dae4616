//! Delimited point-table reading and tabular output
//!
//! The point dataset arrives as a header-first delimited text file
//! (comma, tab, or whitespace separated) with at least `X` and `Y`
//! columns plus any number of named numeric attribute columns.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::io::atomic_write;
use crate::vector::PointSet;

/// Options for reading a point table
#[derive(Debug, Clone)]
pub struct TableOptions {
    /// Field delimiter. `None` sniffs the header line: comma if present,
    /// then tab, otherwise any run of whitespace.
    pub delimiter: Option<char>,
    /// Lines starting with this character are skipped
    pub comment: Option<char>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            comment: Some('#'),
        }
    }
}

/// Read a delimited point table into a [`PointSet`].
///
/// The first non-comment line is the header. Coordinate columns are
/// matched case-insensitively against `X` and `Y`; every other column is
/// kept as a named attribute.
///
/// # Errors
/// [`Error::Schema`] if the coordinate columns are absent, a row has the
/// wrong number of fields, or a field fails to parse as a number.
pub fn read_point_table(path: &Path, options: &TableOptions) -> Result<PointSet> {
    let text = fs::read_to_string(path)?;

    let mut lines = text.lines().enumerate().filter(|(_, line)| {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return false;
        }
        match options.comment {
            Some(c) => !trimmed.starts_with(c),
            None => true,
        }
    });

    let (_, header_line) = lines.next().ok_or_else(|| {
        Error::Schema(format!("{}: empty point table", path.display()))
    })?;

    let delimiter = options.delimiter.or_else(|| sniff_delimiter(header_line));
    let headers = split_fields(header_line, delimiter);

    let x_idx = find_column(&headers, "x").ok_or_else(|| {
        Error::Schema(format!(
            "{}: required column 'X' not found in header [{}]",
            path.display(),
            headers.join(", ")
        ))
    })?;
    let y_idx = find_column(&headers, "y").ok_or_else(|| {
        Error::Schema(format!(
            "{}: required column 'Y' not found in header [{}]",
            path.display(),
            headers.join(", ")
        ))
    })?;

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut columns: Vec<(String, Vec<f64>)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != x_idx && *i != y_idx)
        .map(|(_, name)| (name.clone(), Vec::new()))
        .collect();
    let attr_indices: Vec<usize> = (0..headers.len())
        .filter(|i| *i != x_idx && *i != y_idx)
        .collect();

    for (line_no, line) in lines {
        let fields = split_fields(line, delimiter);
        if fields.len() != headers.len() {
            return Err(Error::Schema(format!(
                "{}:{}: expected {} fields, found {}",
                path.display(),
                line_no + 1,
                headers.len(),
                fields.len()
            )));
        }

        xs.push(parse_field(path, line_no, &headers[x_idx], &fields[x_idx])?);
        ys.push(parse_field(path, line_no, &headers[y_idx], &fields[y_idx])?);
        for (slot, &idx) in columns.iter_mut().zip(attr_indices.iter()) {
            slot.1
                .push(parse_field(path, line_no, &headers[idx], &fields[idx])?);
        }
    }

    PointSet::new(xs, ys, columns)
}

/// Write a tab-delimited table with a header row.
///
/// Staged through a temporary file; the destination is only replaced once
/// the full table has been written.
pub fn write_table<I>(path: &Path, headers: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<f64>>,
{
    let mut out = String::new();
    out.push_str(&headers.join("\t"));
    out.push('\n');
    for row in rows {
        let mut first = true;
        for value in row {
            if !first {
                out.push('\t');
            }
            first = false;
            out.push_str(&format_value(value));
        }
        out.push('\n');
    }
    atomic_write(path, out.as_bytes())
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else {
        format!("{}", value)
    }
}

fn sniff_delimiter(header: &str) -> Option<char> {
    if header.contains(',') {
        Some(',')
    } else if header.contains('\t') {
        Some('\t')
    } else {
        None
    }
}

fn split_fields(line: &str, delimiter: Option<char>) -> Vec<String> {
    match delimiter {
        Some(d) => line.split(d).map(|f| f.trim().to_string()).collect(),
        None => line
            .split_whitespace()
            .map(|f| f.to_string())
            .collect(),
    }
}

fn find_column(headers: &[String], name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
}

fn parse_field(path: &Path, line_no: usize, column: &str, field: &str) -> Result<f64> {
    field.parse::<f64>().map_err(|_| {
        Error::Schema(format!(
            "{}:{}: column '{}': cannot parse '{}' as a number",
            path.display(),
            line_no + 1,
            column,
            field
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.txt");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_read_whitespace_table() {
        let (_dir, path) = write_fixture("X Y layer5\n1.0 2.0 10.5\n3.0 4.0 11.5\n");
        let points = read_point_table(&path, &TableOptions::default()).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points.xs(), &[1.0, 3.0]);
        assert_eq!(points.column("layer5").unwrap(), &[10.5, 11.5]);
    }

    #[test]
    fn test_read_comma_table_sniffed() {
        let (_dir, path) = write_fixture("x,y,zinc\n181072,333611,1022\n181025,333558,1141\n");
        let points = read_point_table(&path, &TableOptions::default()).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points.column("zinc").unwrap(), &[1022.0, 1141.0]);
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let (_dir, path) =
            write_fixture("# sampled 2019\n\nX Y layer5\n1 2 3\n# trailing note\n4 5 6\n");
        let points = read_point_table(&path, &TableOptions::default()).unwrap();
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn test_missing_coordinate_column() {
        let (_dir, path) = write_fixture("lon lat layer5\n1 2 3\n");
        let err = read_point_table(&path, &TableOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Schema(_)), "got {err:?}");
    }

    #[test]
    fn test_bad_field_count() {
        let (_dir, path) = write_fixture("X Y layer5\n1 2\n");
        assert!(read_point_table(&path, &TableOptions::default()).is_err());
    }

    #[test]
    fn test_unparsable_value() {
        let (_dir, path) = write_fixture("X Y layer5\n1 2 abc\n");
        let err = read_point_table(&path, &TableOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_write_table_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        write_table(
            &path,
            &["x", "y", "pred"],
            vec![vec![1.0, 2.0, 3.5], vec![4.0, 5.0, f64::NAN]],
        )
        .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "x\ty\tpred");
        assert_eq!(lines.next().unwrap(), "1\t2\t3.5");
        assert_eq!(lines.next().unwrap(), "4\t5\tNA");
    }
}
