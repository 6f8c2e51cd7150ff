//! Atomic JSON file creation via tempfile + persist.
//!
//! The default analyzer configuration lives next to the jar and may be read
//! by a concurrently running analyzer, so it is never written in place.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::{BslError, BslResult};

/// Pretty-print `value` as JSON and atomically place it at `path`.
///
/// The temporary file is created in the target's directory so the final
/// rename never crosses a filesystem boundary.
pub fn atomic_write_json(path: &Path, value: &impl Serialize) -> BslResult<()> {
    let io_err = |source| BslError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = path.parent().ok_or_else(|| {
        io_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no parent directory",
        ))
    })?;

    let body = serde_json::to_string_pretty(value)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(body.as_bytes()).map_err(io_err)?;
    tmp.write_all(b"\n").map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_pretty_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join(".bsl-language-server.json");

        atomic_write_json(&target, &serde_json::json!({"language": "ru"})).expect("write");

        let text = std::fs::read_to_string(&target).expect("read");
        assert!(text.contains("\"language\": \"ru\""));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("cfg.json");
        std::fs::write(&target, "garbage").expect("seed");

        atomic_write_json(&target, &serde_json::json!([1, 2])).expect("write");

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&target).expect("read")).expect("json");
        assert_eq!(parsed, serde_json::json!([1, 2]));
    }
}
