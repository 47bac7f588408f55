//! Filesystem helpers for working areas.

use std::io;
use std::path::{Path, PathBuf};

use stegstream_core::toolkit::{Toolkit, TABLES_DIR_NAME};

/// Recursively copy `src` into `dst`, creating `dst` and any missing
/// parents. Existing files in `dst` are overwritten.
pub async fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(src.to_path_buf(), dst.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        tokio::fs::create_dir_all(&to).await?;
        let mut entries = tokio::fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                tokio::fs::copy(entry.path(), &target).await?;
            }
        }
    }
    Ok(())
}

/// Replicate the toolkit's lookup tables into `dir` if it needs them and
/// they are not there yet.
///
/// A missing source directory is not an error here; the tool itself reports
/// it when run.
pub async fn ensure_tables(toolkit: &Toolkit, dir: &Path) -> io::Result<()> {
    let Some(source) = toolkit.tables_dir() else {
        return Ok(());
    };
    let target = dir.join(TABLES_DIR_NAME);
    if tokio::fs::try_exists(&target).await? {
        return Ok(());
    }
    if !tokio::fs::try_exists(source).await? {
        tracing::warn!(source = %source.display(), "Lookup tables not found, skipping copy");
        return Ok(());
    }
    copy_dir_all(source, &target).await
}

/// Reduce an uploaded file name to its final path component.
///
/// Both `/` and `\` are treated as separators. Names that reduce to nothing,
/// `.` or `..` are replaced with `fallback`.
pub fn sanitize_file_name(name: &str, fallback: &str) -> String {
    let last = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    match last {
        "" | "." | ".." => fallback.to_string(),
        other => other.to_string(),
    }
}

/// The extension of `name` including its leading dot, or an empty string.
pub fn dotted_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}
