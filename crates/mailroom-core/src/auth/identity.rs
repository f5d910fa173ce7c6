//! Display identity decoded from the bearer token.
//!
//! The payload segment of the token is decoded without verifying the
//! signature. The result is only ever shown to the user; authorization rests
//! on the opaque token and the server's 401 responses.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "ts")]
use ts_rs::TS;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct Identity {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct Claims {
    name: Option<String>,
    email: Option<String>,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
        }
    }

    /// Best-effort decode of the `name` and `email` claims.
    ///
    /// Returns `None` when the token is not a three-part JWT, the payload is
    /// not base64url JSON, or neither claim is present.
    pub fn from_token(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        let payload = match (parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(payload), Some(_)) => payload,
            _ => return None,
        };

        let bytes = match URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
            Ok(b) => b,
            Err(e) => {
                debug!(error = %e, "Token payload is not base64url");
                return None;
            }
        };

        let claims: Claims = match serde_json::from_slice(&bytes) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "Token payload is not a JSON claims object");
                return None;
            }
        };

        if claims.name.is_none() && claims.email.is_none() {
            return None;
        }

        Some(Self {
            name: claims.name,
            email: claims.email,
        })
    }

    /// Name for headers and prompts, falling back to the email.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("unknown user")
    }
}

#[cfg(test)]
pub(crate) fn token_with_claims(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE;

    #[test]
    fn test_from_token_reads_name_and_email() {
        let token = token_with_claims(&serde_json::json!({
            "sub": 7,
            "name": "Ada Operator",
            "email": "ada@example.com"
        }));
        let identity = Identity::from_token(&token).unwrap();
        assert_eq!(identity.name.as_deref(), Some("Ada Operator"));
        assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_from_token_accepts_padded_payload() {
        // 17 bytes of JSON encodes with padding
        let json = br#"{"email":"a@x.c"}"#;
        let padded = URL_SAFE.encode(json);
        assert!(padded.ends_with('='));
        let token = format!("h.{}.s", padded);

        let identity = Identity::from_token(&token).unwrap();
        assert_eq!(identity.email.as_deref(), Some("a@x.c"));
        assert_eq!(identity.name, None);
    }

    #[test]
    fn test_from_token_rejects_malformed() {
        assert_eq!(Identity::from_token(""), None);
        assert_eq!(Identity::from_token("opaque-token"), None);
        assert_eq!(Identity::from_token("a.b"), None);
        assert_eq!(Identity::from_token("a.!!!.c"), None);
        let not_json = URL_SAFE_NO_PAD.encode("hello");
        assert_eq!(Identity::from_token(&format!("a.{}.c", not_json)), None);
    }

    #[test]
    fn test_from_token_without_display_claims() {
        let token = token_with_claims(&serde_json::json!({ "sub": 7 }));
        assert_eq!(Identity::from_token(&token), None);
    }

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(Identity::new("A", "a@x.com").display_name(), "A");
        let email_only = Identity {
            name: None,
            email: Some("a@x.com".to_string()),
        };
        assert_eq!(email_only.display_name(), "a@x.com");
        assert_eq!(Identity::default().display_name(), "unknown user");
    }
}
