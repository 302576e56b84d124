use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const TOKENINFO_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum GoogleAuthError {
    #[error("Unable to verify Google token")]
    RequestFailed,
    #[error("Google token audience mismatch")]
    AudienceMismatch,
    #[error("Google email is not verified")]
    EmailNotVerified,
    #[error("Google token does not include email")]
    MissingEmail,
}

impl GoogleAuthError {
    pub fn code(&self) -> &'static str {
        match self {
            GoogleAuthError::RequestFailed => "tokeninfo_request_failed",
            GoogleAuthError::AudienceMismatch => "audience_mismatch",
            GoogleAuthError::EmailNotVerified => "email_not_verified",
            GoogleAuthError::MissingEmail => "missing_email",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenInfoPayload {
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Provider-asserted identity, trusted as pre-verified
#[derive(Debug, Clone)]
pub struct GoogleUser {
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub name: String,
}

fn validate_payload(
    payload: TokenInfoPayload,
    expected_client_id: &str,
) -> Result<GoogleUser, GoogleAuthError> {
    if payload.aud.as_deref() != Some(expected_client_id) {
        return Err(GoogleAuthError::AudienceMismatch);
    }

    if payload.email_verified.as_deref() != Some("true") {
        return Err(GoogleAuthError::EmailNotVerified);
    }

    let email = payload
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .unwrap_or_default();
    if email.is_empty() {
        return Err(GoogleAuthError::MissingEmail);
    }

    Ok(GoogleUser {
        email,
        given_name: payload.given_name.unwrap_or_default().trim().to_string(),
        family_name: payload.family_name.unwrap_or_default().trim().to_string(),
        name: payload.name.unwrap_or_default().trim().to_string(),
    })
}

/// Call the Google tokeninfo endpoint and classify the result.
/// Transport failures, timeouts, and malformed payloads all collapse to
/// RequestFailed; the caller reports a rejected login, not a retry.
pub async fn verify_google_id_token(
    id_token: &str,
    expected_client_id: &str,
) -> Result<GoogleUser, GoogleAuthError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(TOKENINFO_TIMEOUT_SECS))
        .build()
        .map_err(|_| GoogleAuthError::RequestFailed)?;

    let payload = client
        .get(GOOGLE_TOKENINFO_URL)
        .query(&[("id_token", id_token)])
        .send()
        .await
        .map_err(|_| GoogleAuthError::RequestFailed)?
        .error_for_status()
        .map_err(|_| GoogleAuthError::RequestFailed)?
        .json::<TokenInfoPayload>()
        .await
        .map_err(|_| GoogleAuthError::RequestFailed)?;

    validate_payload(payload, expected_client_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(aud: &str, email: &str, verified: &str) -> TokenInfoPayload {
        TokenInfoPayload {
            aud: Some(aud.to_string()),
            email: Some(email.to_string()),
            email_verified: Some(verified.to_string()),
            given_name: Some("Ada".to_string()),
            family_name: Some("Lovelace".to_string()),
            name: Some("Ada Lovelace".to_string()),
        }
    }

    #[test]
    fn accepts_matching_verified_payload() {
        let user = validate_payload(payload("client-1", " Ada@Example.Com ", "true"), "client-1")
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.name, "Ada Lovelace");
    }

    #[test]
    fn rejects_audience_mismatch() {
        let err = validate_payload(payload("other-client", "a@b.c", "true"), "client-1")
            .unwrap_err();
        assert_eq!(err.code(), "audience_mismatch");
    }

    #[test]
    fn rejects_unverified_email() {
        let err = validate_payload(payload("client-1", "a@b.c", "false"), "client-1").unwrap_err();
        assert_eq!(err.code(), "email_not_verified");
    }

    #[test]
    fn rejects_missing_email() {
        let mut p = payload("client-1", "  ", "true");
        p.email = None;
        let err = validate_payload(p, "client-1").unwrap_err();
        assert_eq!(err.code(), "missing_email");

        let err = validate_payload(payload("client-1", "   ", "true"), "client-1").unwrap_err();
        assert_eq!(err.code(), "missing_email");
    }
}
