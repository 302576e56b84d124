use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Profile attributes embedded in the user document so that creating an
/// identity always and atomically creates its profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub is_verified: bool,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    /// bcrypt hash; absent for federated-only identities
    pub password: Option<String>,
    pub is_staff: bool,
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password: Option<String>, name: String, is_verified: bool) -> Self {
        let now = Utc::now();
        User {
            id: None,
            email,
            password,
            is_staff: false,
            profile: Profile {
                is_verified,
                name,
                phone: None,
            },
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Deserialize)]
pub struct SendOtpRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub otp: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordConfirmRequest {
    pub email: String,
    pub otp: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct GoogleAuthRequest {
    pub id_token: String,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}
