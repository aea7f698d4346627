//! Command-line interface definitions for the mail news digest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Secrets and file locations can also come from environment variables (or a
//! `.env` file loaded at startup).

use crate::models::DigestWindow;
use crate::pipeline::RunSettings;
use chrono::{Duration, Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for one digest run.
///
/// # Examples
///
/// ```sh
/// # Last week's alerts into the current directory
/// mail_news_digest
///
/// # A specific week and subject filter
/// mail_news_digest --start-date 2025-05-05 --subject '("Google Alert" -jobs)'
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// First day of the 7-day window (YYYY-MM-DD); defaults to 7 days ago
    #[arg(short, long)]
    pub start_date: Option<NaiveDate>,

    /// Gmail subject filter, inserted verbatim after `subject:`
    #[arg(long, default_value = "(\"Google Alert\")")]
    pub subject: String,

    /// Maximum number of messages to retrieve
    #[arg(long, default_value_t = 30)]
    pub max_results: u32,

    /// Directory that receives the digest files
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// OAuth client secrets downloaded from the Google Cloud console
    #[arg(long, env = "GMAIL_CREDENTIALS", default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Cached OAuth session token, created on first authorization
    #[arg(long, env = "GMAIL_TOKEN_FILE", default_value = "token.json")]
    pub token_file: PathBuf,

    /// Optional path to the LLM client config.yaml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Name of the chat template used for summarization
    #[arg(long, default_value = "aws_digest")]
    pub template: String,

    /// API key for the summarization endpoint; overrides the config file's key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,
}

impl Cli {
    /// The digest window, defaulting to the week that started 7 days ago.
    pub fn window(&self) -> DigestWindow {
        let start = self
            .start_date
            .unwrap_or_else(|| Local::now().date_naive() - Duration::days(7));
        DigestWindow::new(start)
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            window: self.window(),
            subject_filter: self.subject.clone(),
            max_results: self.max_results,
            output_dir: self.output_dir.clone(),
        }
    }
}
