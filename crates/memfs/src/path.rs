/// Splits a path at its last `/` into the directory portion and the leaf.
///
/// The separator itself belongs to neither half. A path without a
/// separator is all leaf; a trailing separator leaves an empty leaf.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(index) => (&path[..index], &path[index + 1..]),
        None => ("", path),
    }
}

/// True if the path starts at the root rather than the working directory
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// The non-empty segments of a directory portion, in walk order.
///
/// Repeated separators produce empty segments, which are skipped.
pub fn segments(dir_path: &str) -> impl Iterator<Item = &str> {
    dir_path.split('/').filter(|s| !s.is_empty())
}
