use nalgebra::DMatrix;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Invalid number '{value}' on row {row} of '{path}'")]
    InvalidNumber {
        path: String,
        row: usize,
        value: String,
    },
    #[error("Row {row} of '{path}' has {found} columns, expected {expected}")]
    RaggedRow {
        path: String,
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("Table '{path}' is empty")]
    Empty { path: String },
}

fn read_rows(path: &Path) -> Result<Vec<Vec<f64>>, TableError> {
    let path_str = path.to_string_lossy().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| TableError::Csv {
            path: path_str.clone(),
            source: e,
        })?;

    let mut rows = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| TableError::Csv {
            path: path_str.clone(),
            source: e,
        })?;
        let values = record
            .iter()
            .map(|field| {
                field.parse::<f64>().map_err(|_| TableError::InvalidNumber {
                    path: path_str.clone(),
                    row: row + 1,
                    value: field.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(values);
    }
    Ok(rows)
}

/// Loads an embedding table (one row per frame, one column per latent dimension).
pub fn load_embeddings(path: &Path) -> Result<DMatrix<f64>, TableError> {
    let rows = read_rows(path)?;
    let path_str = path.to_string_lossy().to_string();
    let Some(first) = rows.first() else {
        return Err(TableError::Empty { path: path_str });
    };
    let width = first.len();
    if let Some((row, bad)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(TableError::RaggedRow {
            path: path_str,
            row: row + 1,
            found: bad.len(),
            expected: width,
        });
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Ok(DMatrix::from_row_slice(flat.len() / width, width, &flat))
}

/// Loads a loss curve. Values may be laid out one per row or all on one row.
pub fn load_series(path: &Path) -> Result<Vec<f64>, TableError> {
    let series: Vec<f64> = read_rows(path)?.into_iter().flatten().collect();
    if series.is_empty() {
        return Err(TableError::Empty {
            path: path.to_string_lossy().to_string(),
        });
    }
    Ok(series)
}

/// Writes an embedding table; used by tests and by tooling that converts collaborator output.
pub fn write_embeddings(path: &Path, embeddings: &DMatrix<f64>) -> Result<(), TableError> {
    let path_str = path.to_string_lossy().to_string();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| TableError::Csv {
            path: path_str.clone(),
            source: e,
        })?;
    for row in embeddings.row_iter() {
        let fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writer.write_record(&fields).map_err(|e| TableError::Csv {
            path: path_str.clone(),
            source: e,
        })?;
    }
    writer.flush().map_err(|e| TableError::Csv {
        path: path_str,
        source: e.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn embeddings_are_loaded_row_major() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("embeddings-0.csv");
        fs::write(&path, "0.0,1.0,2.0\n3.0, 4.0 ,5.0\n").unwrap();

        let matrix = load_embeddings(&path).unwrap();
        assert_eq!(matrix.shape(), (2, 3));
        assert_eq!(matrix[(1, 1)], 4.0);
    }

    #[test]
    fn ragged_embedding_rows_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("embeddings-0.csv");
        fs::write(&path, "0.0,1.0\n3.0\n").unwrap();

        assert!(matches!(
            load_embeddings(&path),
            Err(TableError::Csv { .. }) | Err(TableError::RaggedRow { .. })
        ));
    }

    #[test]
    fn written_embeddings_load_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("embeddings-1.csv");
        let matrix = DMatrix::from_row_slice(2, 2, &[0.5, -1.0, 2.25, 3.0]);

        write_embeddings(&path, &matrix).unwrap();
        assert_eq!(load_embeddings(&path).unwrap(), matrix);
    }

    #[test]
    fn series_accepts_column_or_row_layout() {
        let dir = tempdir().unwrap();
        let column = dir.path().join("column.csv");
        let row = dir.path().join("row.csv");
        fs::write(&column, "0.9\n0.5\n0.4\n").unwrap();
        fs::write(&row, "0.9,0.5,0.4\n").unwrap();

        assert_eq!(load_series(&column).unwrap(), vec![0.9, 0.5, 0.4]);
        assert_eq!(load_series(&row).unwrap(), vec![0.9, 0.5, 0.4]);
    }

    #[test]
    fn non_numeric_values_are_reported_with_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "0.1\nnope\n").unwrap();

        assert!(matches!(
            load_series(&path),
            Err(TableError::InvalidNumber { row: 2, .. })
        ));
    }
}
