//! Query marker scanning.
//!
//! sqlc query-definition files introduce each query with a comment of the
//! form `-- name: GetUser :one`. The text of a query runs from its marker up
//! to the next marker or the end of the file.

use crate::error::LookupError;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-- name:[ \t]*(\w+)").expect("marker pattern is valid")
});

/// One `-- name: <identifier>` marker in a query-definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMarker {
    /// The query name.
    pub name: String,
    /// Byte offset of the start of the marker.
    pub offset: usize,
}

/// Scan text for query markers, in file order.
pub fn scan_markers(text: &str) -> Vec<QueryMarker> {
    MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            Some(QueryMarker {
                name: name.as_str().to_string(),
                offset: whole.start(),
            })
        })
        .collect()
}

/// Read a query-definition file and scan it for markers.
///
/// Returns the file text alongside the markers so callers can slice query
/// bodies without reading the file twice.
pub fn read_markers(path: &Path) -> Result<(String, Vec<QueryMarker>), LookupError> {
    let text = fs::read_to_string(path).map_err(|e| LookupError::io(path, e))?;
    let markers = scan_markers(&text);
    Ok((text, markers))
}

/// Find the first marker with the given name.
pub fn find_marker<'a>(markers: &'a [QueryMarker], name: &str) -> Option<(usize, &'a QueryMarker)> {
    markers.iter().enumerate().find(|(_, m)| m.name == name)
}

/// The text of the query introduced by `markers[index]`.
///
/// Runs from the marker to the next marker, or to the end of the text.
pub fn query_text<'a>(text: &'a str, markers: &[QueryMarker], index: usize) -> Option<&'a str> {
    let start = markers.get(index)?.offset;
    let end = markers.get(index + 1).map_or(text.len(), |m| m.offset);
    text.get(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const USERS_SQL: &str =
        "-- name: GetUser\nSELECT * FROM users;\n-- name: ListUsers\nSELECT * FROM users ORDER BY id;";

    #[test]
    fn test_scan_markers_in_order() {
        let markers = scan_markers(USERS_SQL);
        assert_eq!(
            markers,
            vec![
                QueryMarker {
                    name: "GetUser".to_string(),
                    offset: 0
                },
                QueryMarker {
                    name: "ListUsers".to_string(),
                    offset: 38
                },
            ]
        );
        assert!(USERS_SQL[38..].starts_with("-- name: ListUsers"));
    }

    #[test]
    fn test_query_text_runs_to_next_marker() {
        let markers = scan_markers(USERS_SQL);
        let (index, _) = find_marker(&markers, "GetUser").unwrap();
        assert_eq!(
            query_text(USERS_SQL, &markers, index),
            Some("-- name: GetUser\nSELECT * FROM users;\n")
        );
    }

    #[test]
    fn test_query_text_last_runs_to_eof() {
        let markers = scan_markers(USERS_SQL);
        let (index, _) = find_marker(&markers, "ListUsers").unwrap();
        assert_eq!(
            query_text(USERS_SQL, &markers, index),
            Some("-- name: ListUsers\nSELECT * FROM users ORDER BY id;")
        );
    }

    #[test]
    fn test_sqlc_annotations_after_name() {
        let sql = "-- name: CreateAuthor :one\nINSERT INTO authors (name) VALUES ($1) RETURNING *;\n";
        let markers = scan_markers(sql);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].name, "CreateAuthor");
    }

    #[test]
    fn test_case_sensitive() {
        assert!(scan_markers("-- NAME: GetUser\n-- Name: Other").is_empty());
    }

    #[test]
    fn test_marker_does_not_span_lines() {
        assert!(scan_markers("-- name:\nGetUser").is_empty());
    }

    #[test]
    fn test_duplicate_names_first_wins() {
        let sql = "-- name: A\nSELECT 1;\n-- name: A\nSELECT 2;\n";
        let markers = scan_markers(sql);
        let (index, marker) = find_marker(&markers, "A").unwrap();
        assert_eq!(index, 0);
        assert_eq!(marker.offset, 0);
    }

    #[test]
    fn test_read_markers_missing_file() {
        let err = read_markers(Path::new("/nonexistent/queries/users.sql")).unwrap_err();
        assert!(matches!(err, LookupError::Io { .. }));
    }

    proptest! {
        #[test]
        fn prop_one_marker_per_query(
            names in prop::collection::vec("[A-Za-z][A-Za-z0-9_]{0,12}", 0..8),
            body in "[a-z ]{0,20}",
        ) {
            let mut text = String::new();
            let mut expected = Vec::new();
            for name in &names {
                expected.push(text.len());
                text.push_str(&format!("-- name: {name} :many\nSELECT {body};\n\n"));
            }

            let markers = scan_markers(&text);
            prop_assert_eq!(markers.len(), names.len());
            for ((marker, name), offset) in markers.iter().zip(&names).zip(&expected) {
                prop_assert_eq!(&marker.name, name);
                prop_assert_eq!(marker.offset, *offset);
                prop_assert!(text[marker.offset..].starts_with("-- name:"));
            }
        }
    }
}
