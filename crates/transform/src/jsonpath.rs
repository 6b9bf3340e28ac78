//! Dot-separated paths into JSON documents.
//!
//! Segments are joined with `.`; a literal `.` or `\` inside a key is escaped
//! with a backslash, so `a\.b.c` addresses key `c` under key `a.b`.

/// Joins key segments into a path string.
///
/// ```
/// use brain_transform::jsonpath::{join, split};
///
/// let path = join(["mcpServers", "brain.dev"]);
/// assert_eq!(path, r"mcpServers.brain\.dev");
/// assert_eq!(split(&path), ["mcpServers", "brain.dev"]);
/// ```
pub fn join<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, segment) in segments.into_iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        for ch in segment.as_ref().chars() {
            if ch == '.' || ch == '\\' {
                out.push('\\');
            }
            out.push(ch);
        }
    }
    out
}

/// Splits a path string into its key segments.
pub fn split(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '.' => segments.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    segments.push(current);
    segments
}

/// Returns true when `ancestor` equals `path` or is a strict prefix of it.
pub fn covers(ancestor: &[String], path: &[String]) -> bool {
    ancestor.len() <= path.len() && ancestor.iter().zip(path).all(|(a, b)| a == b)
}
