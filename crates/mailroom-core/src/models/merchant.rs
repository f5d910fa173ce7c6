use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

use super::is_plausible_email;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct Merchant {
    pub id: i64,
    pub merchant_name: String,
    #[serde(default)]
    pub recipient_emails: Vec<String>,
    pub created_at: Option<String>,
}

/// Body for creating or updating a merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct MerchantDraft {
    pub merchant_name: String,
    pub recipient_emails: Vec<String>,
}

impl MerchantDraft {
    pub fn new(merchant_name: &str, recipient_emails: Vec<String>) -> Self {
        Self {
            merchant_name: merchant_name.trim().to_string(),
            recipient_emails: recipient_emails
                .into_iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Check the draft before sending, returning a message for the user.
    pub fn validate(&self) -> Result<(), String> {
        if self.merchant_name.is_empty() {
            return Err("Merchant name is required".to_string());
        }
        if self.recipient_emails.is_empty() {
            return Err("At least one recipient email is required".to_string());
        }
        if let Some(bad) = self.recipient_emails.iter().find(|e| !is_plausible_email(e)) {
            return Err(format!("Invalid recipient email: {}", bad));
        }
        Ok(())
    }
}

impl Merchant {
    pub fn recipients_display(&self) -> String {
        if self.recipient_emails.is_empty() {
            "-".to_string()
        } else {
            self.recipient_emails.join(", ")
        }
    }
}
