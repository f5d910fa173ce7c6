//! Settlement transactions and the files they were read from or written to.

use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct Transaction {
    pub id: i64,
    pub original_name: Option<String>,
    pub record_type: Option<String>,
    pub processed_at: Option<String>,
    pub date: Option<String>,
    pub payment_method: Option<String>,
    pub confirmation_code: Option<String>,
    pub currency: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub commission: f64,
    #[serde(default)]
    pub net_amount: f64,
    pub buyer_name: Option<String>,
    pub payment_card_number: Option<String>,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Transaction {
    /// Case-insensitive match against the searchable text columns.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        [
            &self.buyer_name,
            &self.reference,
            &self.confirmation_code,
            &self.description,
            &self.original_name,
            &self.payment_method,
        ]
        .iter()
        .filter_map(|field| field.as_deref())
        .any(|value| value.to_lowercase().contains(&query))
    }
}

/// A settlement upload. `attachments` arrives as a JSON-encoded string array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct UploadRecord {
    pub uploaded_at: String,
    #[serde(default)]
    pub attachments: String,
}

impl UploadRecord {
    /// File names in the upload; empty if the field is not a JSON array.
    pub fn attachment_names(&self) -> Vec<String> {
        serde_json::from_str(&self.attachments).unwrap_or_default()
    }
}

/// A batch of report files generated by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct GeneratedRecord {
    pub generated_at: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Request to queue an email carrying files from a generated record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct QueueGeneratedEmail {
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
    #[serde(rename = "attachmentIndexes")]
    pub attachment_indexes: Vec<usize>,
    pub to: String,
    pub subject: String,
    pub recipient_emails: Vec<String>,
    pub body: String,
}

impl QueueGeneratedEmail {
    /// Check the request against the record it refers to.
    pub fn validate(&self, record: &GeneratedRecord) -> Result<(), String> {
        if self.attachment_indexes.is_empty() {
            return Err("Select at least one attachment".to_string());
        }
        if let Some(idx) = self
            .attachment_indexes
            .iter()
            .find(|&&i| i >= record.attachments.len())
        {
            return Err(format!(
                "Attachment {} is out of range ({} available)",
                idx,
                record.attachments.len()
            ));
        }
        if self.recipient_emails.is_empty() {
            return Err("At least one recipient email is required".to_string());
        }
        if self.subject.trim().is_empty() {
            return Err("Please enter a subject".to_string());
        }
        Ok(())
    }
}
