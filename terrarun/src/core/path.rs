//! Lexical path helpers: normalization and the shared display root.

use std::path::{Component, Path, PathBuf};

const SEP: char = '/';

/// Fold `.` and `..` components without touching the filesystem.
///
/// `..` above the root is dropped; leading `..` of a relative path is kept.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Directory part of a `/`-separated path, cleaned (`/a/b/` -> `/a/b`, `/a/b` -> `/a`).
fn dirname(path: &str) -> String {
    let dir = match path.rfind(SEP) {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => ".",
    };
    normalize(Path::new(dir)).to_string_lossy().into_owned()
}

/// Fold `path` into the running common root `current`.
///
/// The first path seeds the root with its directory. Later paths shrink it to
/// the longest shared segment prefix, collapsing to `/` when nothing beyond
/// the volume is shared.
pub fn update_common_root(current: &str, path: &str) -> String {
    if current.is_empty() {
        let dir = dirname(path);
        if dir.ends_with(SEP) {
            return dir;
        }
        return format!("{dir}{SEP}");
    }

    let current_segments: Vec<&str> = current.split(SEP).collect();
    if current_segments.len() < 2 {
        return current.to_string();
    }
    let path_segments: Vec<&str> = path.split(SEP).collect();
    let shared = current_segments
        .iter()
        .zip(&path_segments)
        .take_while(|(a, b)| a == b)
        .count();

    if shared <= 1 {
        return SEP.to_string();
    }
    let joined = path_segments[..shared].join("/");
    if path_segments[shared - 1].is_empty() {
        joined
    } else {
        format!("{joined}{SEP}")
    }
}
