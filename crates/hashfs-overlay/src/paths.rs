//! Logical path normalization and splitting.
//!
//! Logical paths are `/`-separated, carry no leading or trailing slash, and
//! `""` denotes the root directory.

use crate::error::{FsError, FsResult};

/// Normalize a logical path: drop empty and `.` segments, resolve `..`,
/// strip leading and trailing slashes.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Split a normalized path into `(parent, leaf)`.
///
/// `"a/b/x"` becomes `("a/b", "x")`, `"x"` becomes `("", "x")` and the root
/// splits into `("", "")`.
pub fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", path),
    }
}

/// Join a parent path and a child name.
pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else if child.is_empty() {
        parent.to_string()
    } else {
        format!("{parent}/{child}")
    }
}

/// Join storage key segments, eliding empty ones.
///
/// The identity algorithm hashes the root path to `""`, so key joining must
/// not produce a leading slash.
pub fn key_join(parts: &[&str]) -> String {
    let mut out = String::new();
    for part in parts.iter().filter(|p| !p.is_empty()) {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(part);
    }
    out
}

/// Reject names that would break the line-oriented persisted index format.
pub fn validate_name(path: &str) -> FsResult<()> {
    if path.contains('\n') {
        return Err(FsError::InvalidName(path.to_string()));
    }
    Ok(())
}
