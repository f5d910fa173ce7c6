//! API client for the settlement-mail backend.
//!
//! Login and the public summary are the only unauthenticated calls. Everything else goes through
//! `send`, which takes the token from the session guard, attaches it as a
//! bearer credential and handles rejection before any body is read.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ApiError;
use crate::auth::{Identity, SessionGuard};
use crate::config::Config;
use crate::models::{
    is_plausible_email, ApiMessage, ComposedEmail, GeneratedRecord, Merchant, MerchantDraft, Page,
    QueueGeneratedEmail, SentEmail, SystemSummary, Transaction, UploadRecord,
};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Minimum password length accepted by the login form
const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    /// Token lifetime in seconds
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct DeleteReason<'a> {
    reason: &'a str,
}

/// An attachment read into memory so the form can be rebuilt on retry.
struct LoadedAttachment {
    file_name: String,
    bytes: Vec<u8>,
}

/// API client for the settlement-mail backend.
/// Clone is cheap - reqwest::Client and SessionGuard are both Arc inside.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    api_url: String,
    settlements_url: String,
    session: SessionGuard,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a client for the configured backend.
    pub fn new(config: &Config, session: SessionGuard) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            settlements_url: config.settlements_url.trim_end_matches('/').to_string(),
            session,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Point both base URLs somewhere else (for testing with wiremock).
    pub fn with_base_urls(mut self, api_url: &str, settlements_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self.settlements_url = settlements_url.trim_end_matches('/').to_string();
        self
    }

    /// Override the first rate-limit backoff delay.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn session(&self) -> &SessionGuard {
        &self.session
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn settlements(&self, path: &str) -> String {
        format!("{}{}", self.settlements_url, path)
    }

    // ===== Session =====

    /// Log in and establish a session. Returns the decoded display identity.
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<Identity>, ApiError> {
        let email = email.trim();
        if !is_plausible_email(email) {
            return Err(ApiError::InvalidInput(
                "Please enter a valid email address".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ApiError::InvalidInput(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let response = self
            .client
            .post(self.api("/auth/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiMessage>(&body)
                .ok()
                .and_then(|m| m.message)
                .unwrap_or_else(|| "Authentication failed".to_string());
            warn!(status = %status, "Login rejected");
            return Err(ApiError::LoginFailed(message));
        }

        let auth: LoginResponse = Self::json(response, "login response").await?;
        let identity = Identity::from_token(&auth.token);

        self.session
            .establish(&auth.token, auth.expires_in, identity.as_ref())
            .map_err(|e| ApiError::Storage(format!("{:#}", e)))?;

        info!(ttl_secs = auth.expires_in, "Logged in");
        Ok(identity)
    }

    /// Public system counters. Needs no session and never touches it.
    pub async fn summary(&self) -> Result<SystemSummary, ApiError> {
        let response = self.client.get(self.api("/summary")).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = %status, "Summary unavailable");
            return Err(ApiError::from_status(status, &body));
        }
        Self::json(response, "summary").await
    }

    /// Explicit logout. Only clears local state; the backend keeps no session.
    pub fn logout(&self) {
        self.session.teardown();
        info!("Logged out");
    }

    // ===== Guarded request pipeline =====

    /// Send an authenticated request built by `build`.
    ///
    /// The builder runs once per attempt so the token is re-read (and
    /// re-checked for expiry) before every retry.
    async fn send<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let token = self.session.require_token()?;
            let response = build(&self.client).bearer_auth(&token).send().await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                self.session.reject();
                return Err(ApiError::SessionInvalid);
            }
            if status.is_success() {
                return Ok(response);
            }
            if status == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(
                    url = %response.url(),
                    retry = retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }
    }

    async fn json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    /// Acknowledgement bodies vary; keep the message if there is one.
    async fn ack(response: Response) -> Result<ApiMessage, ApiError> {
        let text = response.text().await?;
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T, ApiError> {
        let response = self.send(|c| c.get(url)).await?;
        Self::json(response, what).await
    }

    // ===== Merchants =====

    pub async fn list_merchants(&self) -> Result<Vec<Merchant>, ApiError> {
        self.get(&self.api("/merchants"), "merchants").await
    }

    pub async fn create_merchant(&self, draft: &MerchantDraft) -> Result<ApiMessage, ApiError> {
        draft.validate().map_err(ApiError::InvalidInput)?;
        let url = self.api("/merchants");
        let response = self.send(|c| c.post(&url).json(draft)).await?;
        debug!(merchant = %draft.merchant_name, "Merchant created");
        Self::ack(response).await
    }

    pub async fn update_merchant(
        &self,
        id: i64,
        draft: &MerchantDraft,
    ) -> Result<ApiMessage, ApiError> {
        draft.validate().map_err(ApiError::InvalidInput)?;
        let url = self.api(&format!("/merchants/{}", id));
        let response = self.send(|c| c.patch(&url).json(draft)).await?;
        Self::ack(response).await
    }

    pub async fn delete_merchant(&self, id: i64, reason: &str) -> Result<ApiMessage, ApiError> {
        let url = self.api(&format!("/merchants/{}", id));
        let body = DeleteReason { reason };
        let response = self.send(|c| c.delete(&url).json(&body)).await?;
        Self::ack(response).await
    }

    // ===== Emails =====

    /// Fetch one page (1-based) of the email history.
    pub async fn list_emails(&self, page: u32, size: u32) -> Result<Page<SentEmail>, ApiError> {
        if page == 0 || size == 0 {
            return Err(ApiError::InvalidInput(
                "Page and size must both be at least 1".to_string(),
            ));
        }
        let url = self.api("/emails");
        let response = self
            .send(|c| c.get(&url).query(&[("page", page), ("size", size)]))
            .await?;
        Self::json(response, "email history").await
    }

    /// Compose and send an email with file attachments.
    pub async fn send_email(&self, email: &ComposedEmail) -> Result<ApiMessage, ApiError> {
        email.validate().map_err(ApiError::InvalidInput)?;

        let mut attachments = Vec::with_capacity(email.attachments.len());
        for path in &email.attachments {
            attachments.push(Self::load_attachment(path).await?);
        }
        let recipients = serde_json::to_string(&email.recipient_emails)
            .map_err(|e| ApiError::InvalidInput(e.to_string()))?;

        let url = self.api("/emails");
        let response = self
            .send(|c| {
                let mut form = Form::new()
                    .text("merchantId", email.merchant_id.clone())
                    .text("to", email.to.clone())
                    .text("subject", email.subject.clone())
                    .text("recipient_emails", recipients.clone())
                    .text("body", email.body.clone());
                for attachment in &attachments {
                    form = form.part(
                        "attachments",
                        Part::bytes(attachment.bytes.clone())
                            .file_name(attachment.file_name.clone()),
                    );
                }
                c.post(&url).multipart(form)
            })
            .await?;

        info!(
            merchant_id = %email.merchant_id,
            attachments = attachments.len(),
            "Email submitted"
        );
        Self::ack(response).await
    }

    async fn load_attachment(path: &Path) -> Result<LoadedAttachment, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::Attachment {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        Ok(LoadedAttachment { file_name, bytes })
    }

    /// Block or unblock a queued email.
    /// Download link for a sent email's attachment.
    pub fn attachment_url(&self, email: &SentEmail) -> Option<String> {
        email.attachment_url(&self.api_url)
    }

    pub async fn set_email_blocked(&self, id: i64, blocked: bool) -> Result<ApiMessage, ApiError> {
        let url = self.api(&format!("/emails/{}", id));
        let value = blocked.to_string();
        let response = self
            .send(|c| c.put(&url).form(&[("blocked", value.as_str())]))
            .await?;
        Self::ack(response).await
    }

    // ===== Transactions and records =====

    pub async fn list_transactions(&self) -> Result<Vec<Transaction>, ApiError> {
        self.get(&self.api("/emails/transactions"), "transactions").await
    }

    pub async fn list_uploaded_records(&self) -> Result<Vec<UploadRecord>, ApiError> {
        self.get(&self.settlements("/app/emails/uploads"), "uploaded records")
            .await
    }

    pub async fn list_generated_records(&self) -> Result<Vec<GeneratedRecord>, ApiError> {
        self.get(
            &self.settlements("/app/emails/generated-records"),
            "generated records",
        )
        .await
    }

    pub async fn queue_generated_email(
        &self,
        request: &QueueGeneratedEmail,
    ) -> Result<ApiMessage, ApiError> {
        let url = self.settlements("/app/emails/generated-records/queue");
        let response = self.send(|c| c.post(&url).json(request)).await?;
        Self::ack(response).await
    }
}

// ============================================================================
// Tests
// ============================================================================
