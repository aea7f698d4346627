//! End-to-end digest run.
//!
//! Retrieval → extraction → canonicalization → deduplication → raw digest
//! → summarization → formatted digest. Every stage is sequential; the only
//! mutable state is the article accumulator owned by [`collect_articles`].

use crate::api::{AskAsync, summarize};
use crate::canonical::{canonicalize_url, dedup_articles};
use crate::extract::extract_articles;
use crate::mail::MailSource;
use crate::models::{Article, DigestWindow, MailMessage};
use crate::outputs::digest::{render_raw_digest, write_formatted_digest, write_raw_digest};
use std::error::Error;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

/// Inputs for one run, resolved once at startup.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub window: DigestWindow,
    pub subject_filter: String,
    pub max_results: u32,
    pub output_dir: PathBuf,
}

/// Articles gathered from a batch of messages.
#[derive(Debug, Default)]
pub struct Collected {
    /// Deduplicated articles in discovery order.
    pub articles: Vec<Article>,
    /// Ids of messages whose body did not match the digest layout.
    pub skipped: Vec<String>,
}

/// What a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub message_count: usize,
    pub article_count: usize,
    pub skipped_messages: Vec<String>,
    pub raw_path: PathBuf,
    pub formatted_path: PathBuf,
    pub formatted: String,
}

/// Extract, canonicalize and deduplicate articles from newest-first messages.
///
/// A message that does not follow the digest layout is logged and skipped;
/// the rest still contribute.
pub fn collect_articles(messages: &[MailMessage]) -> Collected {
    let mut found = Vec::new();
    let mut skipped = Vec::new();

    for message in messages {
        match extract_articles(&message.body) {
            Ok(articles) => {
                debug!(id = %message.id, count = articles.len(), "Extracted articles");
                found.extend(
                    articles
                        .into_iter()
                        .map(|a| Article {
                            url: canonicalize_url(&a.url),
                            ..a
                        })
                        .filter(|a| !a.url.is_empty()),
                );
            }
            Err(e) => {
                warn!(
                    id = %message.id,
                    subject = %message.subject,
                    error = %e,
                    "Message does not match digest layout; skipping"
                );
                skipped.push(message.id.clone());
            }
        }
    }

    let before = found.len();
    let articles = dedup_articles(found);
    info!(
        extracted = before,
        kept = articles.len(),
        skipped_messages = skipped.len(),
        "Collected articles"
    );
    Collected { articles, skipped }
}

/// Run the whole digest for `settings.window`.
///
/// The raw digest is written before the LLM call, so it survives a
/// summarization failure.
#[instrument(level = "info", skip_all, fields(window = %settings.window))]
pub async fn run<M, A>(
    mail: &M,
    asker: &A,
    settings: &RunSettings,
) -> Result<RunOutcome, Box<dyn Error>>
where
    M: MailSource,
    A: AskAsync<Response = String>,
{
    let query = settings.window.query(&settings.subject_filter);
    info!(%query, max_results = settings.max_results, "Searching mailbox");
    let messages = mail.fetch(&query, settings.max_results).await?;
    if messages.is_empty() {
        warn!("No digest emails in window; the digest will be empty");
    }

    let collected = collect_articles(&messages);
    let raw = render_raw_digest(&settings.window, &collected.articles);
    let raw_path = write_raw_digest(&settings.output_dir, &settings.window, &raw).await?;

    let formatted = summarize(asker, &settings.window, &raw).await?;
    let formatted_path =
        write_formatted_digest(&settings.output_dir, &settings.window, &formatted).await?;

    Ok(RunOutcome {
        message_count: messages.len(),
        article_count: collected.articles.len(),
        skipped_messages: collected.skipped,
        raw_path,
        formatted_path,
        formatted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::normalize_date;
    use crate::mail::gmail::sort_newest_first;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use tempfile::tempdir;

    struct FakeMailbox {
        messages: Vec<MailMessage>,
        queries: RefCell<Vec<(String, u32)>>,
    }

    impl MailSource for FakeMailbox {
        async fn fetch(
            &self,
            query: &str,
            max_results: u32,
        ) -> Result<Vec<MailMessage>, Box<dyn Error>> {
            self.queries
                .borrow_mut()
                .push((query.to_string(), max_results));
            let mut messages = self.messages.clone();
            sort_newest_first(&mut messages);
            Ok(messages)
        }
    }

    struct CannedAsk(&'static str);

    impl AskAsync for CannedAsk {
        type Response = String;

        async fn ask(&self, _text: &str) -> Result<String, Box<dyn Error>> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenAsk;

    impl AskAsync for BrokenAsk {
        type Response = String;

        async fn ask(&self, _text: &str) -> Result<String, Box<dyn Error>> {
            Err("model endpoint unreachable".into())
        }
    }

    fn digest_body(blocks: &[(&str, &str)]) -> String {
        let articles = blocks
            .iter()
            .map(|(summary, url)| format!("{summary}\r\n{url}"))
            .collect::<Vec<_>>()
            .join("\r\n\r\n");
        format!(
            "Alert\r\n===\r\nWeekly\r\n- - - \r\nNEWS\r\n\r\n{articles}\r\n\r\nMore\r\n===\r\nFooter\r\n"
        )
    }

    fn message(id: &str, date: &str, body: String) -> MailMessage {
        MailMessage {
            id: id.to_string(),
            subject: "Alert - AWS".to_string(),
            sender: "alerts@example.com".to_string(),
            timestamp: normalize_date(date),
            body,
        }
    }

    fn settings(dir: &std::path::Path) -> RunSettings {
        RunSettings {
            window: DigestWindow::new(NaiveDate::from_ymd_opt(2025, 5, 5).unwrap()),
            subject_filter: "Alert".to_string(),
            max_results: 30,
            output_dir: dir.to_path_buf(),
        }
    }

    fn two_message_mailbox() -> FakeMailbox {
        let older = message(
            "older",
            "Mon, 5 May 2025 09:00:00 +0000 (UTC)",
            digest_body(&[(
                "Old copy of the launch",
                "<https://www.google.com/url?url=https://aws.example/launch&ct=ga&cd=1>",
            )]),
        );
        let newer = message(
            "newer",
            "Thu, 8 May 2025 09:00:00 +0000 (UTC)",
            digest_body(&[
                (
                    "AWS launch",
                    "<https://www.google.com/url?url=https://aws.example/launch&ct=ga&cd=2>",
                ),
                ("Lambda update", "<https://aws.example/lambda>"),
            ]),
        );
        FakeMailbox {
            messages: vec![older, newer],
            queries: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn test_collect_skips_malformed_messages() {
        let good = message(
            "good",
            "Mon, 5 May 2025 09:00:00 +0000",
            digest_body(&[("Story", "https://a.example/1")]),
        );
        let promo = message("promo", "Mon, 5 May 2025 10:00:00 +0000", "Buy now!".to_string());
        let collected = collect_articles(&[promo, good]);
        assert_eq!(collected.skipped, vec!["promo".to_string()]);
        assert_eq!(collected.articles.len(), 1);
        assert_eq!(collected.articles[0].url, "https://a.example/1");
    }

    #[test]
    fn test_collect_drops_links_that_canonicalize_to_nothing() {
        let first = message(
            "first",
            "Mon, 5 May 2025 09:00:00 +0000",
            digest_body(&[("Bracket only", "<>"), ("Real", "https://a.example/1")]),
        );
        let second = message(
            "second",
            "Mon, 5 May 2025 08:00:00 +0000",
            digest_body(&[("Also empty", "<>"), ("Other", "https://a.example/2")]),
        );
        let collected = collect_articles(&[first, second]);
        let urls: Vec<&str> = collected.articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example/1", "https://a.example/2"]);
    }

    #[tokio::test]
    async fn test_end_to_end_two_messages() {
        let dir = tempdir().unwrap();
        let mailbox = two_message_mailbox();
        let reply = "● AWS launch - A thing launched https://aws.example/launch";
        let outcome = run(&mailbox, &CannedAsk(reply), &settings(dir.path()))
            .await
            .unwrap();

        assert_eq!(
            mailbox.queries.borrow().as_slice(),
            &[(
                "subject:Alert after:2025/05/05 before:2025/05/11".to_string(),
                30
            )]
        );
        assert_eq!(outcome.message_count, 2);
        assert_eq!(outcome.article_count, 2);
        assert!(outcome.skipped_messages.is_empty());

        let raw = std::fs::read_to_string(&outcome.raw_path).unwrap();
        assert_eq!(outcome.raw_path, dir.path().join("output_20250505-20250511.txt"));
        assert!(raw.contains(
            "AWS launch\nhttps://aws.example/launch\n\nLambda update\nhttps://aws.example/lambda\n\n"
        ));
        assert!(!raw.contains("Old copy"));

        let formatted = std::fs::read_to_string(&outcome.formatted_path).unwrap();
        assert_eq!(formatted, reply);
        assert_eq!(
            outcome.formatted_path,
            dir.path().join("output_20250505-20250511_formatted.txt")
        );
    }

    #[tokio::test]
    async fn test_summarizer_failure_keeps_raw_digest() {
        let dir = tempdir().unwrap();
        let err = run(&two_message_mailbox(), &BrokenAsk, &settings(dir.path()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "model endpoint unreachable");
        assert!(dir.path().join("output_20250505-20250511.txt").exists());
        assert!(!dir.path().join("output_20250505-20250511_formatted.txt").exists());
    }

    #[tokio::test]
    async fn test_empty_mailbox_still_writes_digest() {
        let dir = tempdir().unwrap();
        let mailbox = FakeMailbox {
            messages: Vec::new(),
            queries: RefCell::new(Vec::new()),
        };
        let outcome = run(&mailbox, &CannedAsk(""), &settings(dir.path()))
            .await
            .unwrap();
        assert_eq!(outcome.article_count, 0);
        let raw = std::fs::read_to_string(&outcome.raw_path).unwrap();
        assert!(raw.ends_with("###### News articles\n\n"));
    }
}
