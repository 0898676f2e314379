use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EpsilonRecordError {
    #[error("I/O error for epsilon record '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed epsilon record '{path}': {source}", path = path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Last accepted clustering radius per model identity, shared by all rounds of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpsilonRecord {
    entries: BTreeMap<String, f64>,
}

impl EpsilonRecord {
    /// Reads the record at `path`. A missing or blank file is an empty record.
    pub fn load(path: &Path) -> Result<Self, EpsilonRecordError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(EpsilonRecordError::Io {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content).map_err(|e| EpsilonRecordError::Json {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Writes the record so that readers see either the previous or the new content: the JSON
    /// goes to a sibling temporary file, which is synced and then renamed over `path`.
    pub fn save(&self, path: &Path) -> Result<(), EpsilonRecordError> {
        let io_err = |source| EpsilonRecordError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| EpsilonRecordError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = File::create(&tmp_path).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        fs::rename(&tmp_path, path).map_err(io_err)
    }

    pub fn get(&self, model: &str) -> Option<f64> {
        self.entries.get(model).copied()
    }

    pub fn set(&mut self, model: impl Into<String>, eps: f64) {
        self.entries.insert(model.into(), eps);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
