use std::path::Path;

use crate::error::ConfigError;
use crate::model::Document;

/// Reads and merges one or more TOML configuration files into a single
/// [`Document`] (§6 "Configuration file": later files win per key).
pub fn load_documents(paths: &[impl AsRef<Path>]) -> Result<Document, ConfigError> {
    let mut document = Document::default();
    for path in paths {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path_str.clone(), source: e })?;
        let parsed: Document = toml::from_str(&text).map_err(|e| ConfigError::Parse { path: path_str, source: e })?;
        document.merge(parsed);
    }
    Ok(document)
}
