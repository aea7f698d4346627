//! # Mail News Digest
//!
//! Turns a week of news-alert digest emails into a curated news digest.
//!
//! ## Usage
//!
//! ```sh
//! mail_news_digest --start-date 2025-05-05 -o ./digests
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Retrieval**: Search Gmail for the window's digest emails, newest first
//! 2. **Extraction**: Split each email body into article records
//! 3. **Deduplication**: Canonicalize URLs and keep the first occurrence
//! 4. **Output**: Write the raw digest, have the LLM curate it, write the result

use awful_aj::{config, config_dir, template};
use clap::Parser;
use std::error::Error;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod canonical;
mod cli;
mod dates;
mod extract;
mod mail;
mod models;
mod outputs;
mod pipeline;
mod utils;

use api::AskFnWrapper;
use cli::Cli;
use mail::auth::{Authenticator, ClientSecrets, FileTokenStore};
use mail::gmail::GmailClient;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("mail_news_digest starting up");

    if let Err(e) = dotenvy::dotenv() {
        debug!(error = %e, "No .env file loaded");
    }
    let args = Cli::parse();
    let settings = args.run_settings();
    debug!(?settings, "Resolved run settings");

    ensure_writable_dir(&settings.output_dir).await?;

    // ---- Summarizer config & template ----
    let conf_file = match &args.config {
        Some(path) => path.clone(),
        None => config_dir()?.join("config.yaml"),
    };
    let config_path = conf_file
        .to_str()
        .ok_or("LLM config path is not valid UTF-8")?;
    let mut config = config::load_config(config_path)?;
    if let Some(key) = &args.openai_api_key {
        config.api_key = key.clone();
    }
    info!(config_path, "Loaded configuration");
    let template = template::load_template(&args.template).await?;
    info!(template = %args.template, "Loaded template");

    // ---- Mailbox session ----
    let secrets = ClientSecrets::load(&args.credentials)?;
    let auth = Authenticator::new(secrets, FileTokenStore::new(&args.token_file));
    let access_token = auth.session().await?;
    let gmail = GmailClient::new(access_token);

    let asker = AskFnWrapper {
        config: &config,
        template: &template,
    };
    let outcome = pipeline::run(&gmail, &asker, &settings).await?;

    println!("{}", outcome.formatted);

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        messages = outcome.message_count,
        articles = outcome.article_count,
        skipped_messages = outcome.skipped_messages.len(),
        raw = %outcome.raw_path.display(),
        formatted = %outcome.formatted_path.display(),
        "Execution complete"
    );

    Ok(())
}
