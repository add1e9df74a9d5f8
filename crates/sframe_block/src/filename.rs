//! Segment filename codec.
//!
//! One logical column inside a (possibly multi-column) segment file is
//! addressed as `path` or `path:N`, where `N` is the column's index within
//! the file. The same convention is used in index files' `segment_files`
//! entries and in [`crate::BlockManager::open_column`] requests.

/// Splits a segment filename into its path and optional column index.
///
/// The column suffix is recognized only if the text after the *last* `:`
/// parses entirely as a base-10 unsigned integer; otherwise the whole
/// (trimmed) string is the path and no column index is present.
///
/// ```
/// use sframe_block::parse_segment_filename;
///
/// assert_eq!(parse_segment_filename("seg-0000:3"), ("seg-0000".to_string(), Some(3)));
/// assert_eq!(parse_segment_filename("s3://bucket/seg"), ("s3://bucket/seg".to_string(), None));
/// ```
#[must_use]
pub fn parse_segment_filename(name: &str) -> (String, Option<usize>) {
    let trimmed = name.trim();

    if let Some(pos) = trimmed.rfind(':') {
        let suffix = &trimmed[pos + 1..];
        if !suffix.is_empty() {
            if let Ok(column) = suffix.parse::<usize>() {
                // parse::<usize> rejects signs, whitespace and trailing
                // garbage, which is exactly the "entire substring is the
                // numeral" rule.
                return (trimmed[..pos].to_string(), Some(column));
            }
        }
    }

    (trimmed.to_string(), None)
}

/// Builds a segment filename from a path and optional column index.
///
/// Returns `path` unchanged when no column index is given; the round-trip
/// `parse_segment_filename(&format_segment_filename(p, Some(n)))`
/// reproduces `(p, Some(n))`.
#[must_use]
pub fn format_segment_filename(path: &str, column: Option<usize>) -> String {
    match column {
        Some(column) => format!("{path}:{column}"),
        None => path.to_string(),
    }
}
