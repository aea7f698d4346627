//! Article extraction from alert digest emails.
//!
//! Alert digests follow a fixed plain-text template: a few top-level
//! sections separated by `===` or `- - - ` rules, with the article list in
//! a known section. Inside that section articles are separated by blank
//! lines, and each article is one or more summary lines followed by a URL
//! line.
//!
//! ```text
//! <header> === <intro> - - - <articles...> === <footer>
//! ```
//!
//! The layout is captured by [`ALERT_DIGEST_LAYOUT`]; a body that does not
//! match it yields an [`ExtractError`] so the caller can skip that message
//! without aborting the run.

use crate::models::Article;
use once_cell::sync::Lazy;
use regex::Regex;

/// Structural description of a digest email body.
#[derive(Debug, Clone, Copy)]
pub struct DigestLayout {
    /// Template name and revision, reported in errors.
    pub name: &'static str,
    /// Section rules, matched as literal substrings.
    pub delimiters: &'static [&'static str],
    /// Index of the article list in the delimiter-inclusive split
    /// (sections and rules alternate, so even indices are sections).
    pub article_section: usize,
}

/// The alert digest template observed in the wild.
pub const ALERT_DIGEST_LAYOUT: DigestLayout = DigestLayout {
    name: "alert-digest/v1",
    delimiters: &["===", "- - - "],
    article_section: 4,
};

static SECTION_RULE: Lazy<Regex> = Lazy::new(|| {
    let alternatives = ALERT_DIGEST_LAYOUT
        .delimiters
        .iter()
        .map(|d| regex::escape(d))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternatives).unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("body does not match layout {layout}: expected section #{expected}, found {found} pieces")]
    MissingSection {
        layout: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Split `text` on `re`, keeping each match as its own piece.
fn split_inclusive<'a>(re: &Regex, text: &'a str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for m in re.find_iter(text) {
        pieces.push(&text[last..m.start()]);
        pieces.push(m.as_str());
        last = m.end();
    }
    pieces.push(&text[last..]);
    pieces
}

/// Turn one blank-line separated block into an article.
///
/// The last line is the URL; every line before it is summary text, joined
/// without separators.
fn parse_block(block: &str) -> Option<Article> {
    let lines: Vec<&str> = block.split('\n').collect();
    let (url_line, summary_lines) = lines.split_last()?;
    let url = url_line.trim();
    if url.is_empty() {
        return None;
    }
    Some(Article {
        summary_text: summary_lines.concat().trim().to_string(),
        url: url.to_string(),
    })
}

/// Extract the articles of one digest email body, in template order.
///
/// URLs are returned as written in the email; canonicalization happens in
/// [`crate::canonical`].
///
/// # Errors
///
/// [`ExtractError::MissingSection`] when the body has fewer sections than
/// [`ALERT_DIGEST_LAYOUT`] requires.
pub fn extract_articles(body: &str) -> Result<Vec<Article>, ExtractError> {
    extract_with_layout(body, &ALERT_DIGEST_LAYOUT, &SECTION_RULE)
}

fn extract_with_layout(
    body: &str,
    layout: &DigestLayout,
    rule: &Regex,
) -> Result<Vec<Article>, ExtractError> {
    let body = body.replace("\r\n", "\n");
    let pieces = split_inclusive(rule, &body);
    let section = pieces
        .get(layout.article_section)
        .ok_or(ExtractError::MissingSection {
            layout: layout.name,
            expected: layout.article_section,
            found: pieces.len(),
        })?;

    let chunks: Vec<&str> = section.split("\n\n").collect();
    if chunks.len() < 3 {
        return Ok(Vec::new());
    }

    Ok(chunks[1..chunks.len() - 1]
        .iter()
        .filter_map(|block| parse_block(block))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a body in the digest template around the given article blocks.
    fn digest_body(blocks: &[(&str, &str)], eol: &str) -> String {
        let articles = blocks
            .iter()
            .map(|(summary, url)| format!("{summary}{eol}{url}"))
            .collect::<Vec<_>>()
            .join(&format!("{eol}{eol}"));
        format!(
            "Alert header{eol}==={eol}Weekly update{eol}- - - {eol}NEWS{eol}{eol}{articles}{eol}{eol}See more results{eol}==={eol}Unsubscribe{eol}"
        )
    }

    #[test]
    fn test_extracts_every_block_crlf() {
        let blocks = [
            ("AWS launches a thing", "<https://a.example/1>"),
            ("Lambda gets faster", "https://b.example/2"),
            ("S3 news", "https://c.example/3"),
        ];
        let body = digest_body(&blocks, "\r\n");
        let articles = extract_articles(&body).unwrap();
        assert_eq!(articles.len(), 3);
        for (article, (summary, url)) in articles.iter().zip(blocks.iter()) {
            assert_eq!(article.summary_text, *summary);
            assert_eq!(article.url, *url);
        }
    }

    #[test]
    fn test_extracts_every_block_lf() {
        let blocks = [("One", "https://x.example/1"), ("Two", "https://x.example/2")];
        let articles = extract_articles(&digest_body(&blocks, "\n")).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[1].url, "https://x.example/2");
    }

    #[test]
    fn test_multiline_summary_is_joined() {
        let blocks = [("Title line\r\n snippet line ", "  https://a.example/p  ")];
        let articles = extract_articles(&digest_body(&blocks, "\r\n")).unwrap();
        assert_eq!(articles[0].summary_text, "Title line snippet line");
        assert_eq!(articles[0].url, "https://a.example/p");
    }

    #[test]
    fn test_block_with_blank_url_line_is_dropped() {
        let blocks = [
            ("Kept before", "https://a.example/1"),
            ("Orphan summary", "   "),
            ("Kept after", "https://a.example/2"),
        ];
        let articles = extract_articles(&digest_body(&blocks, "\r\n")).unwrap();
        let urls: Vec<&str> = articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example/1", "https://a.example/2"]);
        assert_eq!(articles[1].summary_text, "Kept after");
    }

    #[test]
    fn test_missing_section_is_an_error() {
        let err = extract_articles("Hello\r\n===\r\nno articles here").unwrap_err();
        assert_eq!(
            err,
            ExtractError::MissingSection {
                layout: "alert-digest/v1",
                expected: 4,
                found: 3,
            }
        );
    }

    #[test]
    fn test_section_without_interior_blocks_is_empty() {
        let body = "a\n===\nb\n- - - \nonly one chunk\n===\nfooter";
        assert!(extract_articles(body).unwrap().is_empty());
    }

    #[test]
    fn test_split_inclusive_keeps_delimiters() {
        let pieces = split_inclusive(&SECTION_RULE, "a===b- - - c");
        assert_eq!(pieces, vec!["a", "===", "b", "- - - ", "c"]);
    }
}
