use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// One pending OTP challenge per normalized email (unique index).
/// Only the SHA-256 digest of the code is stored, never the plaintext.
#[derive(Debug, Serialize, Deserialize)]
pub struct OtpChallenge {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub otp_hash: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a verification attempt, surfaced to the auth flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpOutcome {
    Verified,
    NotFound,
    Expired,
    TooManyAttempts,
    Invalid,
}
