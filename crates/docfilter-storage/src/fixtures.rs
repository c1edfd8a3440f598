use crate::mem::InMemoryStore;
use docfilter_core::FilterError;
use serde_json::Value as JsonValue;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Reserved source keys naming a document's id and target index.
pub const ID_KEY: &str = "_id";
pub const INDEX_KEY: &str = "_index";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: expected a JSON object")]
    NotAnObject { line: usize },
    #[error(transparent)]
    Store(#[from] FilterError),
}

/// Loads newline-delimited JSON documents into `store`.
///
/// Each line is one document source. `_id` and `_index` are stripped from
/// the source; documents without `_index` land in `default_index`. Blank
/// lines are skipped. Returns the number of documents loaded.
pub fn load_ndjson<R: Read>(
    store: &InMemoryStore,
    reader: R,
    default_index: &str,
) -> Result<usize, LoadError> {
    let mut loaded = 0;
    for (n, line) in BufReader::new(reader).lines().enumerate() {
        let line_no = n + 1;
        let line = line.map_err(|source| LoadError::Io {
            path: PathBuf::from(format!("<line {line_no}>")),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let value: JsonValue = serde_json::from_str(&line).map_err(|source| LoadError::Line {
            line: line_no,
            source,
        })?;
        let JsonValue::Object(mut source) = value else {
            return Err(LoadError::NotAnObject { line: line_no });
        };
        let id = source.remove(ID_KEY).map(|v| match v {
            JsonValue::String(s) => s,
            other => other.to_string(),
        });
        let index = match source.remove(INDEX_KEY) {
            Some(JsonValue::String(s)) => s,
            _ => default_index.to_string(),
        };
        store.index(&index, id, JsonValue::Object(source))?;
        loaded += 1;
    }
    Ok(loaded)
}

/// Loads an NDJSON file; the default index is the file stem
/// (`books.ndjson` loads into `books`).
pub fn load_file(store: &InMemoryStore, path: &Path) -> Result<usize, LoadError> {
    let fh = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let default_index = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("default");
    let loaded = load_ndjson(store, fh, default_index)?;
    info!(path = %path.display(), loaded, "loaded fixtures");
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_and_indices_are_stripped() {
        let store = InMemoryStore::new();
        let data = r#"
{"_id": "1", "title": "Django for Beginners"}

{"_id": 2, "_index": "authors", "name": "Eric Matthes"}
{"title": "Python Crash Course"}
"#;
        assert_eq!(load_ndjson(&store, data.as_bytes(), "books").unwrap(), 3);
        assert_eq!(store.len("books"), 2);
        assert_eq!(
            store.get("books", "1").unwrap().source,
            json!({"title": "Django for Beginners"})
        );
        assert_eq!(
            store.get("authors", "2").unwrap().source,
            json!({"name": "Eric Matthes"})
        );
    }

    #[test]
    fn bad_lines_report_their_number() {
        let store = InMemoryStore::new();
        let err = load_ndjson(&store, "{}\n{oops\n".as_bytes(), "x").unwrap_err();
        assert!(matches!(err, LoadError::Line { line: 2, .. }));
        let err = load_ndjson(&store, "[1]\n".as_bytes(), "x").unwrap_err();
        assert!(matches!(err, LoadError::NotAnObject { line: 1 }));
    }

    #[test]
    fn missing_file() {
        let store = InMemoryStore::new();
        let err = load_file(&store, Path::new("/nonexistent/books.ndjson")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
