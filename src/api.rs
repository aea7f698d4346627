//! LLM summarization of the raw digest.
//!
//! This module sends the assembled digest to an OpenAI-compatible LLM API
//! together with a fixed instruction block, and returns the curated digest
//! text the model produces.
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining async LLM interaction
//! - [`AskFnWrapper`]: Wraps the `awful_aj` library's `ask` function
//! - [`summarize`]: Builds the prompt and makes exactly one request
//!
//! No retries are layered on top of the client; a failed request fails the
//! run, leaving the raw digest file on disk.

use crate::models::DigestWindow;
use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use std::error::Error;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Trait for async LLM interaction.
///
/// Implementors of this trait can send text to an LLM and receive a response.
/// This abstraction allows for different LLM backends, including canned
/// responses in tests.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    ///
    /// # Arguments
    ///
    /// * `text` - The input text to send to the LLM
    ///
    /// # Returns
    ///
    /// The LLM's response, or an error if the request failed.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Wrapper around `awful_aj::api::ask` that implements [`AskAsync`].
///
/// # Lifetime Parameters
///
/// * `'a` - The lifetime of the references to config and template
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    /// Reference to the LLM configuration (API keys, endpoints, model settings).
    pub config: &'a AwfulJadeConfig,
    /// Reference to the chat template defining the conversation structure.
    pub template: &'a ChatTemplate,
}

impl<'a> AskAsync for AskFnWrapper<'a> {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;
        let dt = t0.elapsed();

        match &res {
            Ok(_) => {}
            Err(e) => warn!(elapsed_ms = dt.as_millis() as u128, error = %e, "API call failed"),
        }
        res
    }
}

/// Build the curation prompt for one window.
///
/// The instruction restricts the output to AWS-related articles, asks for
/// same-story articles to be merged and fixes the one-line bullet format.
pub fn build_prompt(window: &DigestWindow, raw_digest: &str) -> String {
    format!(
        "\
Rewrite the news articles below in the following format.

News period: {window}

###### Constraints
- Only include articles related to AWS (Amazon Web Services).
- Merge articles that cover the same story.

###### Output format
● Article title - Article summary Article URL
● Article title - Article summary Article URL

{raw_digest}
"
    )
}

/// Ask the LLM to curate `raw_digest` and return its text unchanged.
#[instrument(level = "info", skip_all, fields(%window))]
pub async fn summarize<A>(
    asker: &A,
    window: &DigestWindow,
    raw_digest: &str,
) -> Result<String, Box<dyn Error>>
where
    A: AskAsync<Response = String>,
{
    let t0 = Instant::now();
    let prompt = build_prompt(window, raw_digest);
    let res = asker.ask(&prompt).await;
    let dt = t0.elapsed();

    match &res {
        Ok(text) => info!(
            elapsed_ms_total = dt.as_millis(),
            bytes = text.len(),
            "summarize succeeded"
        ),
        Err(e) => {
            error!(elapsed_ms_total = dt.as_millis(), error = %e, "summarize failed")
        }
    }
    res
}
