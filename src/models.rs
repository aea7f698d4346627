//! Data models shared by every stage of the digest pipeline.
//!
//! This module defines the core data structures used throughout the application:
//! - [`MailMessage`]: A digest email as returned by the mail retriever
//! - [`MessageTimestamp`]: A normalized `Date` header, flagging degraded parses
//! - [`Article`]: One news item extracted from a digest email
//! - [`DigestWindow`]: The 7-day range that drives the mailbox query and output names

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fmt;

/// Number of days between the first and last day of a digest window.
pub const WINDOW_SPAN_DAYS: i64 = 6;

/// Why a `Date` header could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateFallback {
    /// The header was missing or blank.
    #[error("date header is empty")]
    Empty,
    /// No known format matched the (comment-stripped) header value.
    #[error("unrecognized date format: {0:?}")]
    Unrecognized(String),
}

/// A canonical message instant, remembering whether it was really parsed.
///
/// Fallback timestamps still sort like any other instant; callers that care
/// about degraded entries can tell them apart with [`MessageTimestamp::is_fallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTimestamp {
    Parsed(DateTime<Utc>),
    Fallback {
        at: DateTime<Utc>,
        reason: DateFallback,
    },
}

impl MessageTimestamp {
    /// The instant used for ordering, parsed or not.
    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            MessageTimestamp::Parsed(at) => *at,
            MessageTimestamp::Fallback { at, .. } => *at,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, MessageTimestamp::Fallback { .. })
    }
}

/// A digest email as fetched from the mailbox.
///
/// # Fields
///
/// * `id` - Provider message id
/// * `subject` - `Subject` header, or `"No Subject"`
/// * `sender` - `From` header, or `"Unknown"`
/// * `timestamp` - Normalized `Date` header
/// * `body` - Decoded plain-text body (may be empty)
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub timestamp: MessageTimestamp,
    pub body: String,
}

/// One news item found in a digest email.
///
/// Two articles are "the same" when their canonical `url` matches; the
/// summary text plays no part in deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// Title and snippet lines joined together.
    pub summary_text: String,
    /// The article link, canonicalized before deduplication.
    pub url: String,
}

/// The 7-day date range covered by one run.
///
/// The window is `start ..= start + 6 days`; the same bounds feed the Gmail
/// `after:`/`before:` query and the output filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DigestWindow {
    pub fn new(start: NaiveDate) -> Self {
        Self {
            start,
            end: start + Duration::days(WINDOW_SPAN_DAYS),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Gmail search string for this window.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let w = DigestWindow::new(NaiveDate::from_ymd_opt(2025, 5, 5).unwrap());
    /// assert_eq!(w.query("Alert"), "subject:Alert after:2025/05/05 before:2025/05/11");
    /// ```
    pub fn query(&self, subject_filter: &str) -> String {
        format!(
            "subject:{} after:{} before:{}",
            subject_filter,
            gmail_date(self.start()),
            gmail_date(self.end())
        )
    }

    /// `YYYYMMDD-YYYYMMDD`, shared by both output files.
    pub fn file_stem(&self) -> String {
        format!(
            "{}-{}",
            self.start().format("%Y%m%d"),
            self.end().format("%Y%m%d")
        )
    }

    pub fn raw_filename(&self) -> String {
        format!("output_{}.txt", self.file_stem())
    }

    pub fn formatted_filename(&self) -> String {
        format!("output_{}_formatted.txt", self.file_stem())
    }
}

impl fmt::Display for DigestWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}～{}", gmail_date(self.start), gmail_date(self.end))
    }
}

/// Format a date the way Gmail search operators expect (`YYYY/MM/DD`).
pub fn gmail_date(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}
