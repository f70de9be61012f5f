//! Path validation shared by every path-accepting tool.
//!
//! Extends the workspace-containment check with a systemic blacklist of
//! root directories that must never be reachable regardless of workspace
//! configuration (spec §4.3).

use std::path::{Component, Path, PathBuf};

/// Root directories no tool may ever resolve a path into, even if a
/// misconfigured workspace root would otherwise permit it.
const BLACKLISTED_ROOTS: &[&str] = &[
    "/bin", "/sbin", "/usr", "/etc", "/proc", "/sys", "/dev", "/boot", "/run", "/var/run",
    "/lib", "/lib64",
];

/// Validate and resolve a requested path within a workspace root.
///
/// 1. Rejects absolute paths and raw `..` components in the input.
/// 2. Joins onto the workspace root and resolves symlinks via
///    canonicalization (of the target, or its nearest existing ancestor).
/// 3. Rejects a resolved path outside the workspace root or under a
///    [`BLACKLISTED_ROOTS`] entry.
pub fn validate_path(workspace_root: &Path, requested: &str) -> Result<PathBuf, String> {
    let requested_path = Path::new(requested);
    if requested_path.is_absolute() {
        return Err(format!(
            "absolute paths are not allowed; use a path relative to the workspace root (got '{requested}')"
        ));
    }

    for component in requested_path.components() {
        if matches!(component, Component::ParentDir) {
            return Err("path must not contain '..' components".to_owned());
        }
    }

    let canonical_root = workspace_root
        .canonicalize()
        .map_err(|e| format!("cannot resolve workspace root '{}': {e}", workspace_root.display()))?;

    let candidate = canonical_root.join(requested_path);

    let resolved = if candidate.exists() {
        candidate
            .canonicalize()
            .map_err(|e| format!("cannot resolve path '{}': {e}", candidate.display()))?
    } else {
        let mut existing = candidate.as_path();
        let mut tail_parts: Vec<&std::ffi::OsStr> = Vec::new();
        loop {
            if existing.exists() {
                break;
            }
            match existing.parent() {
                Some(parent) => {
                    if let Some(file_name) = existing.file_name() {
                        tail_parts.push(file_name);
                    }
                    existing = parent;
                }
                None => break,
            }
        }
        let mut resolved = existing
            .canonicalize()
            .map_err(|e| format!("cannot resolve ancestor of '{}': {e}", candidate.display()))?;
        for part in tail_parts.into_iter().rev() {
            resolved.push(part);
        }
        resolved
    };

    if !resolved.starts_with(&canonical_root) {
        return Err(format!(
            "path '{}' resolves outside workspace root '{}'",
            requested,
            canonical_root.display()
        ));
    }

    for root in BLACKLISTED_ROOTS {
        if resolved.starts_with(root) {
            return Err(format!("path '{}' resolves into blacklisted root '{root}'", resolved.display()));
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_workspace() -> tempfile::TempDir {
        tempfile::TempDir::new().expect("failed to create temp dir")
    }

    #[test]
    fn rejects_parent_traversal() {
        let ws = tmp_workspace();
        let result = validate_path(ws.path(), "../etc/passwd");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_absolute_path() {
        let ws = tmp_workspace();
        let abs_path = if cfg!(windows) { "C:\\Windows\\System32" } else { "/etc/passwd" };
        let result = validate_path(ws.path(), abs_path);
        assert!(result.is_err());
    }

    #[test]
    fn accepts_valid_path() {
        let ws = tmp_workspace();
        std::fs::write(ws.path().join("hello.txt"), "hi").unwrap();
        let result = validate_path(ws.path(), "hello.txt");
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_symlink_escaping_into_blacklisted_root() {
        let ws = tmp_workspace();
        #[cfg(unix)]
        {
            let link = ws.path().join("escape");
            std::os::unix::fs::symlink("/etc", &link).unwrap();
            let result = validate_path(ws.path(), "escape/passwd");
            assert!(result.is_err());
        }
    }
}
