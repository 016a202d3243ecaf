//! Literal search-and-replace over project files.
//!
//! A missing search string is always an error: it means the configuration
//! has drifted from the files it describes. Multi-file updates run in two
//! passes. [`plan_edits`] reads and checks every file without touching
//! disk, then [`apply_edits`] writes them all, restoring the files it already
//! wrote if a later write fails.
//!
//! Writes go through a temporary file in the same directory that is renamed
//! over the original, carrying the original permission bits.

use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::template::RenderedFile;
use crate::version::SemanticVersion;

/// Errors from search-and-replace.
#[derive(Error, Debug)]
pub enum ReplaceError {
    /// The search text does not occur in the file.
    #[error("could not find {search:?} in {path}")]
    SearchTextNotFound {
        /// The file that was searched.
        path: Utf8PathBuf,
        /// The literal text that was looked for.
        search: String,
    },

    /// An empty search string would match everywhere.
    #[error("search text for {path} is empty")]
    EmptySearch {
        /// The file the rule points at.
        path: Utf8PathBuf,
    },

    /// The file could not be read (or is not UTF-8).
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// The file being written.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Result alias for replace operations.
pub type ReplaceResult<T> = Result<T, ReplaceError>;

/// A checked, not-yet-written change to one file.
///
/// Several rules may target the same file; they are folded into one edit
/// and applied in declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedEdit {
    /// Resolved path on disk.
    pub target: Utf8PathBuf,
    /// The rules contributing to this edit, in order.
    pub rules: Vec<RenderedFile>,
    /// Total occurrences replaced across all rules.
    pub occurrences: usize,
    /// Set when this edit also records the new version in the config file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_version: Option<SemanticVersion>,
    /// File content before the edit.
    #[serde(skip)]
    pub original: String,
    /// File content after the edit.
    #[serde(skip)]
    pub updated: String,
}

impl PlannedEdit {
    /// Whether applying this edit would change the file.
    pub fn changes_content(&self) -> bool {
        self.original != self.updated
    }
}

/// Replace every occurrence of `search` with `replace` in the file at `path`.
///
/// Returns the number of occurrences replaced. If `search` is absent the
/// file is left untouched and [`ReplaceError::SearchTextNotFound`] is
/// returned.
#[instrument(skip(search, replace))]
pub fn replace(path: &Utf8Path, search: &str, replace: &str) -> ReplaceResult<usize> {
    let original = read(path)?;
    let (updated, occurrences) = substitute(path, &original, search, replace)?;
    write_preserving_permissions(path, &updated)?;
    debug!(occurrences, "replaced");
    Ok(occurrences)
}

/// Check every rule against its file and compute the new contents.
///
/// Nothing is written. The first rule whose search text is missing fails
/// the whole plan.
#[instrument(skip(files), fields(count = files.len()))]
pub fn plan_edits(root: &Utf8Path, files: &[RenderedFile]) -> ReplaceResult<Vec<PlannedEdit>> {
    let mut edits: Vec<PlannedEdit> = Vec::new();

    for file in files {
        let edit = edit_for(&mut edits, &root.join(&file.path))?;
        let (updated, occurrences) =
            substitute(&edit.target, &edit.updated, &file.search, &file.replace)?;
        edit.updated = updated;
        edit.occurrences += occurrences;
        edit.rules.push(file.clone());
        debug!(path = %file.path, occurrences, "containment check passed");
    }

    Ok(edits)
}

/// The edit for `target` within `edits`, adding an unchanged one if the file
/// has none yet.
///
/// Paths naming the same file through different spellings share one edit.
pub fn edit_for<'a>(
    edits: &'a mut Vec<PlannedEdit>,
    target: &Utf8Path,
) -> ReplaceResult<&'a mut PlannedEdit> {
    let index = match edits.iter().position(|edit| same_file(&edit.target, target)) {
        Some(index) => index,
        None => {
            let original = read(target)?;
            edits.push(PlannedEdit {
                target: target.to_path_buf(),
                rules: Vec::new(),
                occurrences: 0,
                records_version: None,
                updated: original.clone(),
                original,
            });
            edits.len() - 1
        }
    };
    Ok(&mut edits[index])
}

/// Write planned edits, restoring already-written files if one fails.
#[instrument(skip(edits), fields(count = edits.len()))]
pub fn apply_edits(edits: &[PlannedEdit]) -> ReplaceResult<()> {
    for (index, edit) in edits.iter().enumerate() {
        if let Err(err) = write_preserving_permissions(&edit.target, &edit.updated) {
            for written in edits[..index].iter().rev() {
                if let Err(restore) = write_preserving_permissions(&written.target, &written.original)
                {
                    warn!(path = %written.target, error = %restore, "failed to restore file");
                }
            }
            return Err(err);
        }
        debug!(path = %edit.target, occurrences = edit.occurrences, "file updated");
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Internal helpers
// ──────────────────────────────────────────────

fn read(path: &Utf8Path) -> ReplaceResult<String> {
    fs::read_to_string(path).map_err(|source| ReplaceError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn same_file(a: &Utf8Path, b: &Utf8Path) -> bool {
    a == b
        || matches!(
            (a.canonicalize_utf8(), b.canonicalize_utf8()),
            (Ok(a), Ok(b)) if a == b
        )
}

fn substitute(
    path: &Utf8Path,
    content: &str,
    search: &str,
    replace: &str,
) -> ReplaceResult<(String, usize)> {
    if search.is_empty() {
        return Err(ReplaceError::EmptySearch {
            path: path.to_path_buf(),
        });
    }
    let occurrences = content.matches(search).count();
    if occurrences == 0 {
        return Err(ReplaceError::SearchTextNotFound {
            path: path.to_path_buf(),
            search: search.to_string(),
        });
    }
    Ok((content.replace(search, replace), occurrences))
}

fn write_preserving_permissions(path: &Utf8Path, contents: &str) -> ReplaceResult<()> {
    let write_error = |source: io::Error| ReplaceError::Write {
        path: path.to_path_buf(),
        source,
    };

    let permissions = fs::metadata(path).map_err(write_error)?.permissions();
    let dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir).map_err(write_error)?;
    staged
        .write_all(contents.as_bytes())
        .map_err(write_error)?;
    staged
        .as_file()
        .set_permissions(permissions)
        .map_err(write_error)?;
    staged
        .persist(path)
        .map_err(|err| write_error(err.error))?;
    Ok(())
}
