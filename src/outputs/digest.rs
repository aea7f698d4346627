//! Raw and formatted digest files.
//!
//! The raw digest is a header naming the window followed by every kept
//! article as `summary\nurl\n\n`. The formatted digest is the LLM reply,
//! written byte for byte.

use crate::models::{Article, DigestWindow};
use std::error::Error;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Render the deduplicated articles as the raw digest text.
pub fn render_raw_digest(window: &DigestWindow, articles: &[Article]) -> String {
    let mut body = String::new();
    for article in articles {
        write!(body, "{}\n{}\n\n", article.summary_text, article.url).unwrap();
    }
    format!("###### News period\n\n{window}\n\n###### News articles\n{body}\n")
}

/// Write the raw digest under `output_dir`, returning its path.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_raw_digest(
    output_dir: &Path,
    window: &DigestWindow,
    text: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let path = output_dir.join(window.raw_filename());
    fs::write(&path, text).await?;
    info!(path = %path.display(), bytes = text.len(), "Wrote raw digest");
    Ok(path)
}

/// Write the LLM-formatted digest next to the raw one.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_formatted_digest(
    output_dir: &Path,
    window: &DigestWindow,
    text: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let path = output_dir.join(window.formatted_filename());
    fs::write(&path, text).await?;
    info!(path = %path.display(), bytes = text.len(), "Wrote formatted digest");
    Ok(path)
}
