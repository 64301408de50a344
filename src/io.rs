//! Record source and line sink.
//!
//! Input is one transaction per line. The input path may be a single file, a
//! directory (every visible regular file in it, by name) or a glob pattern.
//! Reports are written as plain text lines.

pub mod glob;

use crate::error::{MiningError, MiningResult};
use std::fs::{File, create_dir_all, read_dir};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve an input path to the files it stands for.
///
/// Inside a directory, hidden files and files starting with `_` (job markers
/// such as `_SUCCESS`) are ignored.
///
/// # Errors
///
/// [`MiningError::Io`] if the path does not exist or cannot be listed, and
/// [`MiningError::Configuration`] for a glob that matches nothing.
pub fn resolve_inputs(input: &Path) -> MiningResult<Vec<PathBuf>> {
    if let Some(pattern) = input.to_str()
        && glob::is_glob_pattern(pattern)
        && !input.exists()
    {
        return glob::expand_glob_required(pattern);
    }

    let meta = std::fs::metadata(input).map_err(|e| MiningError::io(input, e))?;
    if meta.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in read_dir(input).map_err(|e| MiningError::io(input, e))? {
        let entry = entry.map_err(|e| MiningError::io(input, e))?;
        let path = entry.path();
        let visible = entry
            .file_name()
            .to_str()
            .is_some_and(|name| !name.starts_with('.') && !name.starts_with('_'));
        if visible && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read every line of every input file, in file order.
///
/// # Errors
///
/// See [`resolve_inputs`]; read failures carry the offending file path.
pub fn read_records(input: &Path) -> MiningResult<Vec<String>> {
    let files = resolve_inputs(input)?;
    let mut records = Vec::new();
    for file in &files {
        let f = File::open(file).map_err(|e| MiningError::io(file, e))?;
        let before = records.len();
        for line in BufReader::new(f).lines() {
            records.push(line.map_err(|e| MiningError::io(file, e))?);
        }
        debug!(file = %file.display(), lines = records.len() - before, "read input file");
    }
    Ok(records)
}

/// Write `lines` to `path`, one per line, creating parent directories.
///
/// # Errors
///
/// [`MiningError::Io`] on any filesystem failure.
pub fn write_lines<I, S>(path: &Path, lines: I) -> MiningResult<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).map_err(|e| MiningError::io(parent, e))?;
    }
    let f = File::create(path).map_err(|e| MiningError::io(path, e))?;
    let mut w = BufWriter::new(f);
    let mut written = 0usize;
    for line in lines {
        w.write_all(line.as_ref().as_bytes())
            .and_then(|()| w.write_all(b"\n"))
            .map_err(|e| MiningError::io(path, e))?;
        written += 1;
    }
    w.flush().map_err(|e| MiningError::io(path, e))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn directory_input_skips_hidden_and_marker_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("b.txt"), "x y\n")?;
        fs::write(dir.path().join("a.txt"), "a b\nc\n")?;
        fs::write(dir.path().join("_SUCCESS"), "")?;
        fs::write(dir.path().join(".hidden"), "zzz\n")?;

        let records = read_records(dir.path())?;
        assert_eq!(records, vec!["a b", "c", "x y"]);
        Ok(())
    }

    #[test]
    fn single_file_and_glob_inputs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("part-0"), "a\n\nb\n")?;
        fs::write(dir.path().join("part-1"), "c\n")?;

        assert_eq!(read_records(&dir.path().join("part-0"))?, vec!["a", "", "b"]);
        let pattern = dir.path().join("part-*");
        assert_eq!(read_records(&pattern)?, vec!["a", "", "b", "c"]);
        Ok(())
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let err = read_records(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, MiningError::Io { .. }));
    }

    #[test]
    fn write_lines_creates_parents() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/deeper/out.txt");
        let n = write_lines(&path, ["one", "two"])?;
        assert_eq!(n, 2);
        assert_eq!(fs::read_to_string(&path)?, "one\ntwo\n");
        Ok(())
    }
}
