use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

use super::is_plausible_email;

/// An email in the send history, either delivered or still queued.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct SentEmail {
    pub id: i64,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub recipient_emails: Vec<String>,
    #[serde(default)]
    pub to: Option<Vec<String>>,
    pub sent_at: Option<String>,
    pub created_at: Option<String>,
    #[serde(default)]
    pub is_sent: bool,
    pub merchant: Option<String>,
    #[serde(rename = "attachmentUrl")]
    pub attachment_url: Option<String>,
    #[serde(default)]
    pub blocked: Option<bool>,
}

impl SentEmail {
    pub fn status_label(&self) -> &'static str {
        match (self.blocked, self.is_sent) {
            (Some(true), _) => "Blocked",
            (_, true) => "Sent",
            _ => "Queued",
        }
    }

    /// Download link for the stored attachment, served under `api_url`.
    pub fn attachment_url(&self, api_url: &str) -> Option<String> {
        let name = self.attachment_url.as_deref().filter(|n| !n.trim().is_empty())?;
        let mut url = reqwest::Url::parse(api_url).ok()?;
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .push("attachments")
            .push(name);
        Some(url.into())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct PageMeta {
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub size: Option<u32>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: PageMeta,
}

impl<T> Page<T> {
    /// Total pages, never less than one.
    pub fn total_pages(&self) -> u32 {
        self.meta.total_pages.unwrap_or(1).max(1)
    }
}

/// A new email for a merchant, sent as multipart form data.
#[derive(Debug, Clone, Default)]
pub struct ComposedEmail {
    pub merchant_id: String,
    /// Salutation name ("Dear ...")
    pub to: String,
    pub subject: String,
    pub recipient_emails: Vec<String>,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

impl ComposedEmail {
    pub fn validate(&self) -> Result<(), String> {
        if self.merchant_id.trim().is_empty() {
            return Err("Please select a merchant".to_string());
        }
        if self.subject.trim().is_empty() {
            return Err("Please enter a subject".to_string());
        }
        if let Some(bad) = self.recipient_emails.iter().find(|e| !is_plausible_email(e)) {
            return Err(format!("Invalid recipient email: {}", bad));
        }
        Ok(())
    }
}
