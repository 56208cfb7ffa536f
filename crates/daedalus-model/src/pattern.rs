//! Path pattern utilities.
//!
//! Patterns use `{name}` for path variables and are normalized before they
//! reach the compiler so that equivalent spellings produce identical unit
//! names.

/// Normalizes a path pattern.
///
/// - a leading `/` is added when missing
/// - runs of `/` collapse into one, except inside a `{name:regex}` variable
/// - a trailing `/` is removed (except for the root pattern)
///
/// ```
/// use daedalus_model::pattern::normalize_pattern;
///
/// assert_eq!(normalize_pattern("pets//{id}/"), "/pets/{id}");
/// assert_eq!(normalize_pattern("/files/{p:a//b}"), "/files/{p:a//b}");
/// assert_eq!(normalize_pattern(""), "/");
/// ```
#[must_use]
pub fn normalize_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 1);
    out.push('/');
    let mut depth = 0usize;
    for ch in pattern.chars() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '/' if depth == 0 && out.ends_with('/') => continue,
            _ => {}
        }
        out.push(ch);
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Joins a controller-level prefix with a method-level path and normalizes
/// the result.
///
/// ```
/// use daedalus_model::pattern::join_patterns;
///
/// assert_eq!(join_patterns("/api/", "/pets"), "/api/pets");
/// assert_eq!(join_patterns("", "pets"), "/pets");
/// assert_eq!(join_patterns("/api", ""), "/api");
/// ```
#[must_use]
pub fn join_patterns(prefix: &str, path: &str) -> String {
    normalize_pattern(&format!("{prefix}/{path}"))
}
