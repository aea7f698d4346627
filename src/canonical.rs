//! URL canonicalization and the deduplication gate.
//!
//! Alert emails wrap every article link in a redirect URL that carries the
//! real target as a query parameter, followed by tracking parameters. The
//! canonical form strips both so the same story linked from two emails
//! collapses into one entry.

use crate::models::Article;
use itertools::Itertools;

const SCHEME_PREFIX: &str = "http";
const TRACKING_MARKER: &str = "&ct=ga&";

/// Reduce a raw link to its canonical form.
///
/// 1. Drop every `<` and `>`.
/// 2. If `http` occurs more than once, keep the text from the last
///    occurrence onward (unwraps the redirect).
/// 3. Cut at the first `&ct=ga&`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(
///     canonicalize_url("http://wrap.example/r?u=http://real.example/p"),
///     "http://real.example/p"
/// );
/// ```
pub fn canonicalize_url(raw: &str) -> String {
    let unbracketed: String = raw.chars().filter(|c| !matches!(c, '<' | '>')).collect();

    let unwrapped = match (
        unbracketed.find(SCHEME_PREFIX),
        unbracketed.rfind(SCHEME_PREFIX),
    ) {
        (Some(first), Some(last)) if first != last => &unbracketed[last..],
        _ => unbracketed.as_str(),
    };

    match unwrapped.find(TRACKING_MARKER) {
        Some(cut) => unwrapped[..cut].to_string(),
        None => unwrapped.to_string(),
    }
}

/// Keep the first article for each URL, preserving discovery order.
///
/// Articles are expected to carry canonical URLs already.
pub fn dedup_articles(articles: Vec<Article>) -> Vec<Article> {
    articles
        .into_iter()
        .unique_by(|a| a.url.clone())
        .collect()
}
