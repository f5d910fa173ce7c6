//! Data models for the settlement-mail backend.
//!
//! Shapes follow the backend's JSON bodies:
//!
//! - `Merchant`, `MerchantDraft`: merchant contact lists
//! - `SentEmail`, `ComposedEmail`, `Page`: email history and composition
//! - `Transaction`: processed settlement transactions
//! - `UploadRecord`, `GeneratedRecord`, `QueueGeneratedEmail`: settlement files
//! - `SystemSummary`: public counters shown before login

pub mod email;
pub mod merchant;
pub mod record;

pub use email::{ComposedEmail, Page, PageMeta, SentEmail};
pub use merchant::{Merchant, MerchantDraft};
pub use record::{GeneratedRecord, QueueGeneratedEmail, Transaction, UploadRecord};

use serde::{Deserialize, Serialize};

/// Acknowledgement or error body carrying a human-readable message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiMessage {
    pub message: Option<String>,
}

/// System-wide counters. Public; shown on the login screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemSummary {
    pub total_emails: u64,
    pub total_merchants: u64,
}

/// Loose check that a string could be an email address.
///
/// The backend does the real validation; this only catches typos before a
/// round trip.
pub fn is_plausible_email(s: &str) -> bool {
    let s = s.trim();
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    .unwrap_or(false)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_missing_counts_are_zero() {
        let summary: SystemSummary =
            serde_json::from_str(r#"{"totalEmails": 42, "meta": {}}"#).unwrap();
        assert_eq!(summary.total_emails, 42);
        assert_eq!(summary.total_merchants, 0);
    }

    #[test]
    fn test_is_plausible_email() {
        assert!(is_plausible_email("ops@example.com"));
        assert!(is_plausible_email(" ops@mail.example.co.ke "));
        assert!(!is_plausible_email(""));
        assert!(!is_plausible_email("ops"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("ops@example"));
        assert!(!is_plausible_email("ops@.com"));
        assert!(!is_plausible_email("ops@a@b.com"));
        assert!(!is_plausible_email("o ps@example.com"));
    }
}
