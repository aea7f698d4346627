//! Mailbox access: the Gmail retriever and its OAuth credential boundary.
//!
//! # Submodules
//!
//! - [`auth`]: Client secrets, cached tokens and the installed-app OAuth flow
//! - [`gmail`]: Message search, fetch and plain-text body decoding
//!
//! The pipeline only sees the [`MailSource`] trait, so tests can feed it
//! canned messages without a network.

pub mod auth;
pub mod gmail;

use crate::models::MailMessage;
use std::error::Error;

/// Anything that can answer a mailbox search with full messages.
pub trait MailSource {
    /// Run `query` and return at most `max_results` messages, newest first.
    ///
    /// An empty result is a valid outcome, not an error.
    async fn fetch(&self, query: &str, max_results: u32)
    -> Result<Vec<MailMessage>, Box<dyn Error>>;
}
