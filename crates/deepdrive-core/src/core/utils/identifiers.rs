//! Helpers for file names of the form `<path><prefix><id><ext>`, e.g. `md/output-3.pdb` or
//! `ml/weight-1.h5`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("File name '{filename}' does not contain prefix '{prefix}'")]
    MissingPrefix { filename: String, prefix: String },
    #[error("File name '{filename}' does not end with '{ext}'")]
    MissingExtension { filename: String, ext: String },
}

/// Extracts the identifier between the last occurrence of `prefix` before the trailing `ext` and
/// that extension.
///
/// The identifier itself must not contain `prefix`, otherwise the split is ambiguous.
pub fn extract_id<'a>(filename: &'a str, prefix: &str, ext: &str) -> Result<&'a str, IdError> {
    let stem = filename
        .strip_suffix(ext)
        .ok_or_else(|| IdError::MissingExtension {
            filename: filename.to_string(),
            ext: ext.to_string(),
        })?;
    let start = stem
        .rfind(prefix)
        .map(|pos| pos + prefix.len())
        .ok_or_else(|| IdError::MissingPrefix {
            filename: filename.to_string(),
            prefix: prefix.to_string(),
        })?;
    Ok(&stem[start..])
}

/// Inverse of [`extract_id`].
pub fn insert_id(path: &str, prefix: &str, id: &str, ext: &str) -> String {
    format!("{path}{prefix}{id}{ext}")
}

/// Parses the identifier as an integer index, as used for simulation and model numbering.
pub fn extract_index(filename: &str, prefix: &str, ext: &str) -> Option<usize> {
    extract_id(filename, prefix, ext).ok()?.parse().ok()
}
