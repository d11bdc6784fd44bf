//! Keyword search over a resolved body.

pub mod keyword;

use crate::model::evidence::{ResolvedBody, SearchHit};

pub use self::keyword::{find_keyword, SearchOptions};

/// Search the text a user sees for this body (rendered text for HTML).
pub fn search_body(
    body: &ResolvedBody,
    query: &str,
    options: SearchOptions,
) -> crate::error::Result<Vec<SearchHit>> {
    find_keyword(body.display_text(), query, options)
}
