use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Named values a task manager exposes to its subscribers, typically the directories where its
/// artifacts land.
///
/// Values are captured once at subscription time, so they must be stable references (root
/// directories, fixed file names) rather than per-round values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Output {
    entries: BTreeMap<String, String>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn with_path(self, key: impl Into<String>, path: &Path) -> Self {
        let value = path.display().to_string();
        self.with(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Outputs of the producers a manager subscribed to, keyed by producer name.
pub type Inputs = BTreeMap<String, Output>;

/// Finds the first value for `key` across all subscribed producers.
pub fn lookup_input_path(inputs: &Inputs, key: &str) -> Option<PathBuf> {
    inputs.values().find_map(|output| output.path(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_is_empty() {
        let output = Output::default();
        assert!(output.is_empty());
        assert_eq!(output.get("anything"), None);
    }

    #[test]
    fn lookup_input_path_searches_all_producers() {
        let mut inputs = Inputs::new();
        inputs.insert("A".into(), Output::new().with("md_root", "/data/md"));
        inputs.insert("B".into(), Output::new().with("ml_root", "/data/ml"));

        assert_eq!(
            lookup_input_path(&inputs, "ml_root"),
            Some(PathBuf::from("/data/ml"))
        );
        assert_eq!(lookup_input_path(&inputs, "preproc_root"), None);
    }
}
