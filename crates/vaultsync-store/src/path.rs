//! Document paths.
//!
//! Paths are `/`-delimited with a leading `/` and no empty components, for
//! example `/notes/today` or `/push/000000000000001/notes/today`. The first
//! component is the document's root collection.

use crate::error::{Result, StoreError};

/// Normalize a path: leading `/`, empty components dropped.
///
/// A path with no components is invalid.
pub fn normalize(path: &str) -> Result<String> {
    let components = components(path);
    if components.is_empty() {
        return Err(StoreError::InvalidPath("/".to_string()));
    }
    Ok(join(&components))
}

/// Non-empty components of a path.
pub fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// Join components into a path. Components may themselves contain `/`.
pub fn join<S: AsRef<str>>(parts: &[S]) -> String {
    let mut out = String::new();
    for part in parts {
        for c in components(part.as_ref()) {
            out.push('/');
            out.push_str(c);
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// The path with its first `n` components removed.
///
/// `path_from("/push/000000000000001/notes/a", 2)` is `/notes/a`.
pub fn path_from(path: &str, n: usize) -> String {
    let rest: Vec<&str> = components(path).into_iter().skip(n).collect();
    join(&rest)
}

/// First component, or `""` for the root.
pub fn first(path: &str) -> &str {
    path.split('/').find(|c| !c.is_empty()).unwrap_or("")
}

/// Component at `n`, if present.
pub fn nth(path: &str, n: usize) -> Option<&str> {
    path.split('/').filter(|c| !c.is_empty()).nth(n)
}
