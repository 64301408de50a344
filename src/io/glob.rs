//! Glob expansion for multi-file inputs.
//!
//! ```no_run
//! use ironbasket::io::glob::{expand_glob, is_glob_pattern};
//!
//! assert!(is_glob_pattern("baskets/part-*"));
//! let files = expand_glob("baskets/part-*")?;
//! # Ok::<(), ironbasket::MiningError>(())
//! ```

use crate::error::{MiningError, MiningResult};
use glob::glob;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

static GLOB_META: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*?\[]").expect("valid glob regex"));

/// Whether `path` contains glob metacharacters.
#[must_use]
pub fn is_glob_pattern(path: &str) -> bool {
    GLOB_META.is_match(path)
}

/// Expand a glob pattern into the matching regular files, sorted.
///
/// Directories are skipped. No match is an empty vector, not an error.
///
/// # Errors
///
/// [`MiningError::Configuration`] for an invalid pattern and
/// [`MiningError::Io`] when a matched entry cannot be read.
pub fn expand_glob(pattern: &str) -> MiningResult<Vec<PathBuf>> {
    let paths = glob(pattern)
        .map_err(|e| MiningError::configuration(format!("invalid glob pattern `{pattern}`: {e}")))?;

    let mut result = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            MiningError::io(path, e.into_error())
        })?;
        if path.is_file() {
            result.push(path);
        }
    }

    result.sort();
    Ok(result)
}

/// [`expand_glob`], but zero matches is a configuration error.
///
/// # Errors
///
/// Same as [`expand_glob`], plus the empty case.
pub fn expand_glob_required(pattern: &str) -> MiningResult<Vec<PathBuf>> {
    let files = expand_glob(pattern)?;
    if files.is_empty() {
        return Err(MiningError::configuration(format!(
            "no files found matching pattern: {pattern}"
        )));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn detects_metacharacters() {
        assert!(is_glob_pattern("in/*.txt"));
        assert!(is_glob_pattern("in/part-?"));
        assert!(is_glob_pattern("in/[ab].txt"));
        assert!(!is_glob_pattern("in/baskets.txt"));
    }

    #[test]
    fn expands_sorted_files_only() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("part-2"), "c\n")?;
        fs::write(dir.path().join("part-1"), "a b\n")?;
        fs::create_dir(dir.path().join("part-dir"))?;

        let pattern = format!("{}/part-*", dir.path().display());
        let files = expand_glob(&pattern)?;
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["part-1", "part-2"]);
        Ok(())
    }

    #[test]
    fn required_variant_rejects_empty_matches() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let pattern = format!("{}/nothing-*", dir.path().display());
        assert!(expand_glob(&pattern)?.is_empty());
        assert!(matches!(
            expand_glob_required(&pattern),
            Err(MiningError::Configuration(_))
        ));
        Ok(())
    }
}
