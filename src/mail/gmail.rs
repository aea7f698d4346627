//! Gmail REST retriever.
//!
//! Uses two endpoints of the Gmail v1 API:
//! - `users/me/messages?q=..` to list matching message ids
//! - `users/me/messages/{id}?format=full` to fetch headers and MIME parts
//!
//! Messages are fetched one after another, normalized into [`MailMessage`]
//! and returned newest first.

use super::MailSource;
use crate::dates::normalize_date;
use crate::models::MailMessage;
use crate::utils::truncate_for_log;
use base64::{Engine as _, engine::general_purpose};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::error::Error;
use tracing::{debug, info, instrument, warn};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// A message as returned by `messages.get?format=full`.
#[derive(Debug, Deserialize)]
pub struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub payload: Payload,
}

/// One MIME node of a Gmail message.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub body: Option<PartBody>,
    pub parts: Option<Vec<Payload>>,
}

#[derive(Debug, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartBody {
    pub data: Option<String>,
}

impl Payload {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }

    /// The encoded plain-text body, if any.
    ///
    /// Multipart messages use their first `text/plain` part; anything else
    /// uses the top-level body.
    fn plain_text_data(&self) -> Option<&str> {
        match &self.parts {
            Some(parts) => parts
                .iter()
                .find(|p| p.mime_type == "text/plain")
                .and_then(|p| p.body.as_ref())
                .and_then(|b| b.data.as_deref()),
            None => self.body.as_ref().and_then(|b| b.data.as_deref()),
        }
    }
}

/// Decode Gmail's base64url body data into text.
///
/// Padding is optional; invalid UTF-8 is replaced rather than rejected.
pub fn decode_body(data: &str) -> Result<String, base64::DecodeError> {
    let bytes = general_purpose::URL_SAFE_NO_PAD.decode(data.trim_end_matches('='))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Normalize a full Gmail message into a [`MailMessage`].
///
/// Missing headers default to `"No Subject"`, `"Unknown"` and an empty
/// date (which normalizes to a fallback timestamp).
pub fn message_from_gmail(msg: GmailMessage) -> Result<MailMessage, base64::DecodeError> {
    let payload = &msg.payload;
    let subject = payload.header("Subject").unwrap_or("No Subject").to_string();
    let sender = payload.header("From").unwrap_or("Unknown").to_string();
    let timestamp = normalize_date(payload.header("Date").unwrap_or(""));
    let body = match payload.plain_text_data() {
        Some(data) => decode_body(data)?,
        None => String::new(),
    };

    Ok(MailMessage {
        id: msg.id,
        subject,
        sender,
        timestamp,
        body,
    })
}

/// Order messages newest first; equal timestamps keep their input order.
pub fn sort_newest_first(messages: &mut [MailMessage]) {
    messages.sort_by(|a, b| b.timestamp.instant().cmp(&a.timestamp.instant()));
}

/// Authenticated Gmail API client.
#[derive(Debug, Clone)]
pub struct GmailClient {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl GmailClient {
    pub fn new(access_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_token,
            base_url: GMAIL_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(access_token: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::builder().no_proxy().build().unwrap(),
            access_token,
            base_url,
        }
    }

    #[instrument(level = "info", skip(self))]
    async fn list_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>, Box<dyn Error>> {
        let resp: ListResponse = self
            .http
            .get(format!("{}/messages", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[("q", query.to_string()), ("maxResults", max_results.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.messages.into_iter().map(|m| m.id).collect())
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_message(&self, id: &str) -> Result<GmailMessage, Box<dyn Error>> {
        let msg = self
            .http
            .get(format!("{}/messages/{}", self.base_url, id))
            .bearer_auth(&self.access_token)
            .query(&[("format", "full")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(msg)
    }
}

impl MailSource for GmailClient {
    #[instrument(level = "info", skip(self))]
    async fn fetch(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<MailMessage>, Box<dyn Error>> {
        let ids = self.list_ids(query, max_results).await?;
        if ids.is_empty() {
            info!("No matching messages found");
            return Ok(Vec::new());
        }
        info!(count = ids.len(), "Matched messages");

        let fetched: Vec<Result<GmailMessage, Box<dyn Error>>> = stream::iter(ids.iter())
            .then(|id| self.get_message(id))
            .collect()
            .await;

        let mut messages = Vec::with_capacity(fetched.len());
        for msg in fetched {
            let msg = msg?;
            let id = msg.id.clone();
            match message_from_gmail(msg) {
                Ok(message) => {
                    debug!(
                        %id,
                        subject = %message.subject,
                        body_preview = %truncate_for_log(&message.body, 120),
                        "Fetched message"
                    );
                    if message.timestamp.is_fallback() {
                        debug!(%id, "Message sorted with fallback timestamp");
                    }
                    messages.push(message);
                }
                Err(e) => warn!(%id, error = %e, "Undecodable message body; skipping message"),
            }
        }

        sort_newest_first(&mut messages);
        Ok(messages)
    }
}
