//! Safe Output Path Derivation
//!
//! Generated artifacts are named `<stem>_<YYYYMMDD_HHMMSS>.key` and `.csr`,
//! where the stem is derived from the sanitized Common Name:
//!
//! - `*` becomes the literal `wildcard`
//! - every character outside `[A-Za-z0-9_-]` becomes `_`
//! - the stem is capped at [`MAX_STEM_LEN`] characters
//!
//! Two requests for the same Common Name within the same second share a base
//! filename and the later one overwrites the earlier artifacts.
//!
//! Every derived path is checked against the resolved output directory by
//! [`ensure_contained`], even though the stem is already filtered.

use crate::error::PathError;
use crate::sanitizer::SanitizedField;
use chrono::NaiveDateTime;
use std::path::{Component, Path, PathBuf};

pub const MAX_STEM_LEN: usize = 200;
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const WILDCARD_MARKER: &str = "wildcard";

/// Key and CSR locations for one generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifactPaths {
    pub base_filename: String,
    pub key_path: PathBuf,
    pub csr_path: PathBuf,
}

impl OutputArtifactPaths {
    pub fn key_filename(&self) -> String {
        format!("{}.key", self.base_filename)
    }

    pub fn csr_filename(&self) -> String {
        format!("{}.csr", self.base_filename)
    }
}

/// Filesystem-safe stem for a Common Name.
pub fn file_stem(common_name: &SanitizedField) -> String {
    let mut stem = String::with_capacity(common_name.as_str().len());
    for c in common_name.as_str().chars() {
        match c {
            '*' => stem.push_str(WILDCARD_MARKER),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => stem.push(c),
            _ => stem.push('_'),
        }
    }
    stem.chars().take(MAX_STEM_LEN).collect()
}

pub fn base_filename(common_name: &SanitizedField, timestamp: NaiveDateTime) -> String {
    format!(
        "{}_{}",
        file_stem(common_name),
        timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Derive the key and CSR paths for a request and prove they stay inside
/// `output_dir`.
///
/// # Arguments
/// * `common_name` - Sanitized Common Name
/// * `timestamp` - Request time, second resolution is used
/// * `output_dir` - Configured output directory (must exist)
///
/// # Returns
/// * `Ok(OutputArtifactPaths)` - Absolute paths directly inside `output_dir`
/// * `Err(PathError)` - The directory cannot be resolved or a path escapes it
pub fn derive_paths(
    common_name: &SanitizedField,
    timestamp: NaiveDateTime,
    output_dir: &Path,
) -> Result<OutputArtifactPaths, PathError> {
    let root = resolve_output_dir(output_dir)?;
    let base = base_filename(common_name, timestamp);

    let key_path = ensure_contained(&root, &root.join(format!("{}.key", base)))?;
    let csr_path = ensure_contained(&root, &root.join(format!("{}.csr", base)))?;

    Ok(OutputArtifactPaths {
        base_filename: base,
        key_path,
        csr_path,
    })
}

/// Canonical absolute form of the output directory.
pub fn resolve_output_dir(output_dir: &Path) -> Result<PathBuf, PathError> {
    let resolved = output_dir
        .canonicalize()
        .map_err(|_| PathError::InvalidOutputDir(output_dir.to_path_buf()))?;
    if !resolved.is_dir() {
        return Err(PathError::InvalidOutputDir(output_dir.to_path_buf()));
    }
    Ok(resolved)
}

/// Check that `candidate` resolves to a file directly inside `root`.
///
/// `root` must already be absolute and canonical. Relative candidates are
/// taken relative to `root`. The comparison is done on path components, so
/// `/srv/output-other/x` is not inside `/srv/output`.
pub fn ensure_contained(root: &Path, candidate: &Path) -> Result<PathBuf, PathError> {
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let normalized = normalize_lexically(&joined);

    let inside = normalized.starts_with(root) && normalized.parent() == Some(root);
    if !inside {
        return Err(PathError::Escapes(candidate.to_path_buf()));
    }
    Ok(normalized)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
