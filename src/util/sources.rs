//! BSL/OS source discovery.

use std::path::Path;

use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, warn};

use crate::error::{BslError, BslResult};

/// Extensions the analyzer accepts, compared case-insensitively.
pub const SOURCE_EXTENSIONS: [&str; 2] = ["bsl", "os"];

/// Maximum recursion depth for the source walker.
const MAX_WALK_DEPTH: usize = 50;

/// Whether `path` carries a recognized source extension.
pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

fn source_matcher() -> BslResult<GlobMatcher> {
    let glob = GlobBuilder::new("*.{bsl,os}")
        .case_insensitive(true)
        .build()
        .map_err(|e| BslError::InvalidConfig(e.to_string()))?;
    Ok(glob.compile_matcher())
}

/// Count recognized source files under `dir`.
///
/// Hidden entries are counted like any other, since the analyzer scans
/// them too. Symlinks are never followed. Subdirectories that cannot be
/// read are skipped with a warning; only an unreadable `dir` is an error.
pub fn count_source_files(dir: &Path) -> BslResult<usize> {
    let matcher = source_matcher()?;
    let mut count = 0;
    walk(dir, &matcher, &mut count, 0)?;
    debug!(dir = %dir.display(), count, "counted source files");
    Ok(count)
}

fn walk(dir: &Path, matcher: &GlobMatcher, count: &mut usize, depth: usize) -> BslResult<()> {
    if depth > MAX_WALK_DEPTH {
        return Ok(());
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if depth > 0 => {
            warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
            return Ok(());
        }
        Err(source) => {
            return Err(BslError::Io {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let Ok(ft) = entry.file_type() else {
            continue;
        };

        if ft.is_dir() {
            walk(&path, matcher, count, depth + 1)?;
        } else if ft.is_file() && matcher.is_match(name) {
            *count += 1;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(is_source_file(Path::new("Module.bsl")));
        assert!(is_source_file(Path::new("Module.BSL")));
        assert!(is_source_file(Path::new("script.os")));
        assert!(!is_source_file(Path::new("notes.txt")));
        assert!(!is_source_file(Path::new("bsl")));
    }

    #[test]
    fn counts_nested_sources_including_hidden() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        std::fs::write(root.join("a.bsl"), "").expect("write");
        std::fs::write(root.join("b.txt"), "").expect("write");
        std::fs::create_dir_all(root.join("nested/deeper")).expect("mkdir");
        std::fs::write(root.join("nested/c.os"), "").expect("write");
        std::fs::write(root.join("nested/deeper/D.Bsl"), "").expect("write");
        std::fs::create_dir_all(root.join(".git")).expect("mkdir");
        std::fs::write(root.join(".git/e.bsl"), "").expect("write");

        assert_eq!(count_source_files(root).expect("count"), 4);
    }

    #[test]
    fn sources_only_under_dot_directory_are_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(".config/src")).expect("mkdir");
        std::fs::write(dir.path().join(".config/src/Module.bsl"), "").expect("write");

        assert_eq!(count_source_files(dir.path()).expect("count"), 1);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = count_source_files(&dir.path().join("gone")).expect_err("missing root");
        assert!(matches!(err, BslError::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        std::fs::write(root.join("a.bsl"), "").expect("write");
        let locked = root.join("locked");
        std::fs::create_dir_all(&locked).expect("mkdir");
        std::fs::write(locked.join("b.bsl"), "").expect("write");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).expect("chmod");

        // Privileged users can still read the directory.
        let expected = if std::fs::read_dir(&locked).is_ok() { 2 } else { 1 };
        let counted = count_source_files(root);

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        assert_eq!(counted.expect("count"), expected);
    }

    #[test]
    fn empty_directory_counts_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(count_source_files(dir.path()).expect("count"), 0);
    }
}
