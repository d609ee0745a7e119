//! Schema directory loading
//!
//! Reads content-type definitions stored as one JSON document per file.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use store_object::{ContentTypeSchema, SchemaRegistry};

use crate::errors::EntityHausError;

/// Parse one schema file; the identifier comes from its `uid` key or, failing that, the file stem
pub fn load_schema_file(path: &Path) -> Result<ContentTypeSchema, EntityHausError> {
    let content = fs::read_to_string(path).map_err(|source| EntityHausError::SchemaIo {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value =
        serde_json::from_str(&content).map_err(|source| EntityHausError::SchemaJson {
            path: path.to_path_buf(),
            source,
        })?;

    let schema = if value.get("uid").is_some() {
        ContentTypeSchema::from_json(&value)?
    } else {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        ContentTypeSchema::from_json_with_uid(stem, &value)?
    };
    Ok(schema)
}

/// Build a registry from every `*.json` file directly inside `dir`, in file-name order
pub fn load_schema_dir(dir: impl AsRef<Path>) -> Result<SchemaRegistry, EntityHausError> {
    let dir = dir.as_ref();
    let io_err = |source| EntityHausError::SchemaIo {
        path: dir.to_path_buf(),
        source,
    };

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();

    let mut builder = SchemaRegistry::builder();
    for path in &files {
        crate::debug_log!(path = %path.display(), "Loading content-type schema");
        builder = builder.register(load_schema_file(path)?);
    }
    let registry = builder.build()?;

    tracing::info!(
        content_types = registry.len(),
        dir = %dir.display(),
        "Schema registry loaded"
    );
    Ok(registry)
}
