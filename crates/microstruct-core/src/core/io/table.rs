use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Column '{name}' has {len} rows, expected {expected}")]
    RaggedColumn {
        name: String,
        len: usize,
        expected: usize,
    },
    #[error("Got {columns} columns but {headers} headers")]
    HeaderMismatch { columns: usize, headers: usize },
}

/// Writes equally long numeric columns as a CSV table with a header row.
pub fn write_columns<W: Write>(
    writer: W,
    headers: &[&str],
    columns: &[&[f64]],
) -> Result<(), TableError> {
    if headers.len() != columns.len() {
        return Err(TableError::HeaderMismatch {
            columns: columns.len(),
            headers: headers.len(),
        });
    }
    let rows = columns.first().map_or(0, |c| c.len());
    if let Some((i, c)) = columns.iter().enumerate().find(|(_, c)| c.len() != rows) {
        return Err(TableError::RaggedColumn {
            name: headers[i].to_string(),
            len: c.len(),
            expected: rows,
        });
    }

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(headers)?;
    for row in 0..rows {
        csv_writer.write_record(columns.iter().map(|c| c[row].to_string()))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_columns_to_path<P: AsRef<Path>>(
    path: P,
    headers: &[&str],
    columns: &[&[f64]],
) -> Result<(), TableError> {
    let file = std::fs::File::create(path)?;
    write_columns(io::BufWriter::new(file), headers, columns)
}

/// Reads a numeric CSV table written by [`write_columns`], returning headers and columns.
pub fn read_columns<P: AsRef<Path>>(path: P) -> Result<(Vec<String>, Vec<Vec<f64>>), TableError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut columns = vec![Vec::new(); headers.len()];
    for record in reader.deserialize::<Vec<f64>>() {
        for (column, value) in columns.iter_mut().zip(record?) {
            column.push(value);
        }
    }
    Ok((headers, columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_header_and_rows() {
        let mut out = Vec::new();
        write_columns(&mut out, &["r", "g(r)"], &[&[0.5, 1.5], &[0.0, 2.25]]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "r,g(r)\n0.5,0\n1.5,2.25\n");
    }

    #[test]
    fn rejects_ragged_columns() {
        let result = write_columns(Vec::new(), &["a", "b"], &[&[1.0], &[1.0, 2.0]]);
        assert!(matches!(result, Err(TableError::RaggedColumn { .. })));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("curve.csv");
        write_columns_to_path(&path, &["k", "S(k)"], &[&[0.1, 0.2, 0.3], &[3.0, 2.0, 1.0]]).unwrap();
        let (headers, columns) = read_columns(&path).unwrap();
        assert_eq!(headers, vec!["k", "S(k)"]);
        assert_eq!(columns[1], vec![3.0, 2.0, 1.0]);
    }
}
