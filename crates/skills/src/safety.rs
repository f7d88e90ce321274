//! Path containment checks for caller-supplied paths inside a skill directory.

use std::path::{Component, Path, PathBuf};

/// Returns `true` if `candidate` stays inside `base_dir`.
///
/// The check is lexical first (`..` may not climb above `base_dir`). When the
/// base exists on disk, the deepest existing ancestor of `candidate` is also
/// canonicalized and must stay under the canonical base, so a symlink leaving
/// the skill directory is rejected even when the leaf does not exist yet.
pub fn is_within_base(candidate: &Path, base_dir: &Path) -> bool {
    let Some(base) = normalize(base_dir) else {
        return false;
    };
    let Some(target) = normalize(candidate) else {
        return false;
    };
    if !target.starts_with(&base) {
        return false;
    }

    let Ok(real_base) = std::fs::canonicalize(&base) else {
        // Nothing on disk to follow yet, the lexical answer stands.
        return true;
    };
    canonicalize_existing(&target).is_some_and(|real| real.starts_with(real_base))
}

/// Canonicalize the deepest ancestor of `path` that exists and re-append the
/// missing tail. A dangling symlink anywhere on the way yields `None`.
fn canonicalize_existing(path: &Path) -> Option<PathBuf> {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        match std::fs::canonicalize(current) {
            Ok(mut real) => {
                real.extend(missing.iter().rev());
                return Some(real);
            },
            Err(_) if current.symlink_metadata().is_ok() => return None,
            Err(_) => {
                missing.push(current.file_name()?);
                current = current.parent()?;
            },
        }
    }
}

/// Join a relative, caller-supplied sub-path onto `base_dir`, rejecting
/// absolute paths and anything escaping the base.
pub fn join_within(base_dir: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative.is_absolute() || relative.has_root() {
        return None;
    }
    let candidate = base_dir.join(relative);
    is_within_base(&candidate, base_dir).then(|| normalize(&candidate).unwrap_or(candidate))
}

/// Lexically resolve `.` and `..`. Returns `None` when `..` climbs past the root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            },
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}
