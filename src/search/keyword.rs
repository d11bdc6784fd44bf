//! Keyword scanning over the displayed body text.
//!
//! Positions are counted in characters, not bytes, so a renderer can map
//! them straight onto what it shows.

use crate::error::{ForensicError, Result};
use crate::model::evidence::SearchHit;

/// Matching options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    /// Compare lower-cased characters on both sides.
    pub ignore_case: bool,
}

/// Find every non-overlapping occurrence of `query` in `text`.
///
/// The query is trimmed first; an empty query is an error. Scanning moves
/// forward and resumes at the end of each match, so `"aa"` in `"aaa"` is a
/// single hit `[0, 2)`. No occurrence is `Ok(vec![])`.
pub fn find_keyword(text: &str, query: &str, options: SearchOptions) -> Result<Vec<SearchHit>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ForensicError::EmptyQuery);
    }

    let fold = |c: char| {
        if options.ignore_case {
            fold_char(c)
        } else {
            c
        }
    };
    let haystack: Vec<char> = text.chars().map(fold).collect();
    let needle: Vec<char> = query.chars().map(fold).collect();

    let mut hits = Vec::new();
    let mut pos = 0;
    while pos + needle.len() <= haystack.len() {
        if haystack[pos..pos + needle.len()] == needle[..] {
            hits.push(SearchHit {
                start: pos,
                end: pos + needle.len(),
            });
            pos += needle.len();
        } else {
            pos += 1;
        }
    }

    tracing::debug!(query, hits = hits.len(), "Keyword search");
    Ok(hits)
}

/// One-to-one lower-case mapping; characters whose lowercase form expands
/// to several characters are left alone so positions stay aligned.
fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(text: &str, query: &str) -> Vec<(usize, usize)> {
        find_keyword(text, query, SearchOptions::default())
            .unwrap()
            .into_iter()
            .map(|h| (h.start, h.end))
            .collect()
    }

    #[test]
    fn test_repeated_characters_do_not_overlap() {
        assert_eq!(find("aaa", "aa"), vec![(0, 2)]);
        assert_eq!(find("aaaa", "aa"), vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn test_multiple_hits_forward() {
        assert_eq!(
            find("the cat sat on the mat", "the"),
            vec![(0, 3), (15, 18)]
        );
    }

    #[test]
    fn test_no_hits_is_ok() {
        assert!(find("hello world", "absent").is_empty());
        assert!(find("", "x").is_empty());
    }

    #[test]
    fn test_case_sensitive_by_default() {
        assert!(find("Invoice attached", "invoice").is_empty());
        let hits = find_keyword(
            "Invoice attached",
            "invoice",
            SearchOptions { ignore_case: true },
        )
        .unwrap();
        assert_eq!(hits, vec![SearchHit { start: 0, end: 7 }]);
    }

    #[test]
    fn test_query_trimmed() {
        assert_eq!(find("pay now", "  now \n"), vec![(4, 7)]);
    }

    #[test]
    fn test_empty_query_rejected() {
        for q in ["", "   ", "\t\n"] {
            assert!(matches!(
                find_keyword("text", q, SearchOptions::default()),
                Err(ForensicError::EmptyQuery)
            ));
        }
    }

    #[test]
    fn test_positions_are_characters() {
        assert_eq!(find("café café", "café"), vec![(0, 4), (5, 9)]);
    }

    #[test]
    fn test_hits_are_ordered_and_disjoint() {
        let text = "abababababa aba ab";
        let hits = find_keyword(text, "aba", SearchOptions::default()).unwrap();
        assert!(!hits.is_empty());
        for pair in hits.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        let chars: Vec<char> = text.chars().collect();
        for hit in &hits {
            let s: String = chars[hit.start..hit.end].iter().collect();
            assert_eq!(s, "aba");
        }
    }
}
