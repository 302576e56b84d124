use crate::database::{DB_NAME, RedisService, is_duplicate_key};
use crate::middleware::auth::{
    TokenPair, decode_refresh_token, issue_token_pair, remaining_seconds,
};
use crate::otp::model::OtpOutcome;
use crate::otp::service::OtpService;
use crate::user::google::verify_google_id_token;
use crate::user::model::User;
use crate::utils::error::CustomError;
use crate::utils::helpers::{is_valid_otp_format, normalize_email};
use crate::utils::{hashing, password_validation};
use chrono::Utc;
use log::{info, warn};
use mongodb::bson::{doc, oid::ObjectId, to_bson};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection};

pub struct UserService {
    collection: Collection<User>,
    otp: OtpService,
}

/// Collapse OTP outcomes the way the API surfaces them: lockout gets its own
/// message, everything else that is not a match stays indistinguishable.
fn otp_rejection(outcome: OtpOutcome) -> CustomError {
    match outcome {
        OtpOutcome::TooManyAttempts => CustomError::BadRequestError(
            "Too many invalid attempts. Please request a new OTP.".to_string(),
        ),
        _ => CustomError::BadRequestError("Invalid or expired OTP".to_string()),
    }
}

impl UserService {
    pub fn new(client: &Client) -> Self {
        let collection = client.database(DB_NAME).collection::<User>("users");
        UserService {
            collection,
            otp: OtpService::new(client),
        }
    }

    async fn email_exists(&self, email: &str) -> Result<bool, CustomError> {
        let count = self
            .collection
            .count_documents(doc! { "email": email })
            .await
            .map_err(|_| {
                CustomError::InternalServerError("Failed to check email existence".to_string())
            })?;
        Ok(count > 0)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, CustomError> {
        self.collection
            .find_one(doc! { "email": email })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))
    }

    /// Registration OTP. When the email already has an account the code is not
    /// issued, but the caller's response is identical either way so that
    /// nothing leaks about which emails exist.
    pub async fn send_registration_otp(&self, email: &str) -> Result<(), CustomError> {
        let email = normalize_email(email);
        if self.email_exists(&email).await? {
            info!("registration OTP suppressed for existing account");
            return Ok(());
        }
        self.otp.issue(&email).await
    }

    /// Verify the OTP and create the account in one flow. Races on the unique
    /// email index are translated to the same generic rejection as the
    /// pre-check, so registration responses never reveal account existence.
    pub async fn register_with_otp(
        &self,
        email: &str,
        otp: &str,
        password: &str,
    ) -> Result<(User, TokenPair), CustomError> {
        let email = normalize_email(email);

        if !is_valid_otp_format(otp) {
            return Err(CustomError::BadRequestError(
                "OTP must be a 6-digit code.".to_string(),
            ));
        }
        password_validation::validate_password(password)?;

        if self.email_exists(&email).await? {
            return Err(CustomError::BadRequestError(
                "Unable to register with provided credentials".to_string(),
            ));
        }

        match self.otp.verify(&email, otp).await? {
            OtpOutcome::Verified => {}
            outcome => return Err(otp_rejection(outcome)),
        }

        let hashed = hashing::hash_password(password)
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        // Profile is embedded, so user + profile creation is one atomic insert
        let mut user = User::new(email.clone(), Some(hashed), email.clone(), true);

        let result = match self.collection.insert_one(&user).await {
            Ok(result) => result,
            Err(e) if is_duplicate_key(&e) => {
                return Err(CustomError::BadRequestError(
                    "Unable to register with provided credentials".to_string(),
                ));
            }
            Err(e) => return Err(CustomError::InternalServerError(e.to_string())),
        };

        let user_id = result.inserted_id.as_object_id().ok_or_else(|| {
            CustomError::InternalServerError("Failed to get inserted ID".to_string())
        })?;
        user.id = Some(user_id);

        self.otp.clear(&email).await?;

        let tokens = issue_token_pair(&user_id.to_hex(), user.is_staff)?;
        Ok((user, tokens))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(User, TokenPair), CustomError> {
        let email = normalize_email(email);

        let user = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| CustomError::UnauthorizedError("Invalid credentials".to_string()))?;

        // Federated-only accounts have no password and cannot log in this way
        let Some(stored_hash) = user.password.as_deref() else {
            return Err(CustomError::UnauthorizedError("Invalid credentials".to_string()));
        };

        if !hashing::verify_password(password, stored_hash)
            .map_err(|_| CustomError::UnauthorizedError("Invalid credentials".to_string()))?
        {
            return Err(CustomError::UnauthorizedError("Invalid credentials".to_string()));
        }

        if !user.profile.is_verified {
            return Err(CustomError::ForbiddenError("Account not verified".to_string()));
        }

        let user_id = user
            .id
            .ok_or_else(|| CustomError::InternalServerError("User ID missing".to_string()))?;

        let tokens = issue_token_pair(&user_id.to_hex(), user.is_staff)?;
        Ok((user, tokens))
    }

    /// Password-reset OTP: issued only for existing accounts, but the caller's
    /// response is the same generic message regardless.
    pub async fn forgot_password_request(&self, email: &str) -> Result<(), CustomError> {
        let email = normalize_email(email);
        if self.email_exists(&email).await? {
            self.otp.issue(&email).await?;
        }
        Ok(())
    }

    pub async fn forgot_password_confirm(
        &self,
        email: &str,
        otp: &str,
        password: &str,
    ) -> Result<(), CustomError> {
        let email = normalize_email(email);

        if !is_valid_otp_format(otp) {
            return Err(CustomError::BadRequestError(
                "OTP must be a 6-digit code.".to_string(),
            ));
        }
        password_validation::validate_password(password)?;

        let user = self.find_by_email(&email).await?.ok_or_else(|| {
            CustomError::BadRequestError(
                "Unable to reset password with provided credentials".to_string(),
            )
        })?;

        match self.otp.verify(&email, otp).await? {
            OtpOutcome::Verified => {}
            outcome => return Err(otp_rejection(outcome)),
        }

        let hashed = hashing::hash_password(password)
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
        let updated_at = to_bson(&Utc::now())
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        self.collection
            .update_one(
                doc! { "_id": user.id },
                doc! { "$set": { "password": hashed, "updated_at": updated_at } },
            )
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        self.otp.clear(&email).await?;
        Ok(())
    }

    /// Federated login. Looks up or creates the identity by the provider's
    /// (already normalized) email; concurrent first logins for the same new
    /// email are serialized by the unique index and the loser gets the same
    /// generic rejection.
    pub async fn google_login(&self, id_token: &str) -> Result<(User, TokenPair), CustomError> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                CustomError::ServiceUnavailableError(
                    "Google auth is not configured on server".to_string(),
                )
            })?;

        let google_user = verify_google_id_token(id_token, &client_id)
            .await
            .map_err(|e| {
                warn!("Google auth verification failed: {} ({})", e, e.code());
                CustomError::BadRequestError("Invalid Google token".to_string())
            })?;

        let full_name = if !google_user.name.is_empty() {
            google_user.name.clone()
        } else {
            format!("{} {}", google_user.given_name, google_user.family_name)
                .trim()
                .to_string()
        };

        let user = match self.find_by_email(&google_user.email).await? {
            Some(existing) => {
                // Re-assert verification and refresh the display name on every
                // federated login, mirroring the provider's claims
                let mut set = doc! { "profile.is_verified": true };
                if !full_name.is_empty() {
                    set.insert("profile.name", full_name.clone());
                }
                self.collection
                    .find_one_and_update(doc! { "_id": existing.id }, doc! { "$set": set })
                    .return_document(ReturnDocument::After)
                    .await
                    .map_err(|e| CustomError::InternalServerError(e.to_string()))?
                    .ok_or_else(|| {
                        CustomError::InternalServerError("User vanished during login".to_string())
                    })?
            }
            None => {
                let name = if full_name.is_empty() {
                    google_user.email.clone()
                } else {
                    full_name
                };
                let mut user = User::new(google_user.email.clone(), None, name, true);

                match self.collection.insert_one(&user).await {
                    Ok(result) => {
                        user.id = result.inserted_id.as_object_id();
                        user
                    }
                    Err(e) if is_duplicate_key(&e) => {
                        return Err(CustomError::BadRequestError(
                            "Unable to login with Google".to_string(),
                        ));
                    }
                    Err(e) => return Err(CustomError::InternalServerError(e.to_string())),
                }
            }
        };

        let user_id = user
            .id
            .ok_or_else(|| CustomError::InternalServerError("User ID missing".to_string()))?;

        let tokens = issue_token_pair(&user_id.to_hex(), user.is_staff)?;
        Ok((user, tokens))
    }

    pub async fn get_by_id(&self, user_id: &str) -> Result<User, CustomError> {
        let object_id = ObjectId::parse_str(user_id)
            .map_err(|_| CustomError::BadRequestError("Invalid user ID".to_string()))?;

        self.collection
            .find_one(doc! { "_id": object_id })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?
            .ok_or_else(|| CustomError::NotFoundError("User not found".to_string()))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        name: Option<String>,
        phone: Option<String>,
    ) -> Result<User, CustomError> {
        let object_id = ObjectId::parse_str(user_id)
            .map_err(|_| CustomError::BadRequestError("Invalid user ID".to_string()))?;

        let mut set = doc! {};
        if let Some(name) = name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CustomError::BadRequestError("Name cannot be empty".to_string()));
            }
            set.insert("profile.name", name);
        }
        if let Some(phone) = phone {
            set.insert("profile.phone", phone.trim().to_string());
        }

        if set.is_empty() {
            return self.get_by_id(user_id).await;
        }

        let updated_at = to_bson(&Utc::now())
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
        set.insert("updated_at", updated_at);

        self.collection
            .find_one_and_update(doc! { "_id": object_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?
            .ok_or_else(|| CustomError::NotFoundError("User not found".to_string()))
    }

    /// Revoke a refresh token by putting its jti on the blacklist for the
    /// token's remaining life.
    pub async fn logout(
        &self,
        refresh_token: &str,
        redis_service: &RedisService,
    ) -> Result<(), CustomError> {
        let claims = decode_refresh_token(refresh_token).map_err(|_| {
            CustomError::BadRequestError("Invalid or expired refresh token".to_string())
        })?;

        let ttl = remaining_seconds(&claims);
        if ttl > 0 {
            redis_service
                .blacklist_token(&claims.jti, ttl)
                .await
                .map_err(CustomError::InternalServerError)?;
        }
        Ok(())
    }

    /// Rotate a refresh token. The blacklist is consulted before the token is
    /// honored; a failing blacklist check fails the refresh rather than
    /// letting a possibly revoked token through.
    pub async fn refresh_tokens(
        &self,
        refresh_token: &str,
        redis_service: &RedisService,
    ) -> Result<TokenPair, CustomError> {
        let claims = decode_refresh_token(refresh_token)?;

        let revoked = redis_service
            .is_token_blacklisted(&claims.jti)
            .await
            .map_err(CustomError::InternalServerError)?;
        if revoked {
            return Err(CustomError::UnauthorizedError(
                "Refresh token has been revoked".to_string(),
            ));
        }

        // Rotation: the old refresh token is retired when the new pair is issued
        let ttl = remaining_seconds(&claims);
        if ttl > 0 {
            redis_service
                .blacklist_token(&claims.jti, ttl)
                .await
                .map_err(CustomError::InternalServerError)?;
        }

        issue_token_pair(&claims.sub, claims.is_staff)
    }
}
