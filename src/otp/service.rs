use crate::database::{DB_NAME, is_duplicate_key};
use crate::otp::model::{OtpChallenge, OtpOutcome};
use crate::utils::email::EmailService;
use crate::utils::error::CustomError;
use crate::utils::helpers::{
    MAX_OTP_ATTEMPTS, OTP_EXPIRY_SECONDS, generate_otp_code, hash_otp, normalize_email,
};
use chrono::{DateTime, Duration, Utc};
use log::info;
use mongodb::bson::doc;
use mongodb::{Client, Collection};

#[derive(Clone)]
pub struct OtpService {
    collection: Collection<OtpChallenge>,
}

/// Decide what a verification attempt does to a stored challenge.
///
/// Expiry is checked before the attempt ceiling so a locked-out challenge
/// unblocks exactly at its TTL boundary. The lockout itself is hard: once
/// attempts reach the ceiling the submitted code is not even hashed, so the
/// correct code cannot break through. Comparison is over the full digest,
/// never a prefix.
fn decide(challenge: &OtpChallenge, submitted: &str, now: DateTime<Utc>) -> OtpOutcome {
    if now >= challenge.expires_at {
        return OtpOutcome::Expired;
    }
    if challenge.attempts >= MAX_OTP_ATTEMPTS {
        return OtpOutcome::TooManyAttempts;
    }
    if hash_otp(submitted) == challenge.otp_hash {
        OtpOutcome::Verified
    } else {
        OtpOutcome::Invalid
    }
}

impl OtpService {
    pub fn new(client: &Client) -> Self {
        let collection = client
            .database(DB_NAME)
            .collection::<OtpChallenge>("otp_challenges");
        OtpService { collection }
    }

    /// Generate a fresh code, overwrite any prior challenge for the email
    /// (attempts reset to 0, new expiry), and mail the plaintext code.
    /// An email delivery failure fails the whole request.
    pub async fn issue(&self, email: &str) -> Result<(), CustomError> {
        let email = normalize_email(email);
        let code = generate_otp_code();
        let now = Utc::now();

        let challenge = OtpChallenge {
            id: None,
            email: email.clone(),
            otp_hash: hash_otp(&code),
            attempts: 0,
            expires_at: now + Duration::seconds(OTP_EXPIRY_SECONDS),
            created_at: now,
            updated_at: now,
        };

        let replaced = self
            .collection
            .replace_one(doc! { "email": &email }, &challenge)
            .upsert(true)
            .await;

        if let Err(e) = replaced {
            if !is_duplicate_key(&e) {
                return Err(CustomError::InternalServerError(e.to_string()));
            }
            // Two concurrent upserts for the same email can both miss the
            // lookup and collide on the unique index. The loser retries once
            // against the now-existing document instead of surfacing the raw
            // duplicate-key fault.
            self.collection
                .replace_one(doc! { "email": &email }, &challenge)
                .upsert(true)
                .await
                .map_err(|retry| {
                    if is_duplicate_key(&retry) {
                        CustomError::InternalServerError(
                            "Failed to store OTP challenge".to_string(),
                        )
                    } else {
                        CustomError::InternalServerError(retry.to_string())
                    }
                })?;
        }

        let email_service = EmailService::new()
            .map_err(|e| CustomError::InternalServerError(format!("Email service error: {}", e)))?;

        email_service.send_otp_email(&email, &code).await.map_err(|e| {
            CustomError::InternalServerError(format!("Failed to send email: {}", e))
        })?;

        info!("OTP issued for {}", email);
        Ok(())
    }

    /// Run the verification state machine for one submitted code.
    ///
    /// Absent challenge is NotFound; an expired one is lazily deleted; a
    /// locked-out one stays in place until overwritten or expired; a match
    /// consumes the challenge; a mismatch costs one attempt.
    pub async fn verify(&self, email: &str, submitted: &str) -> Result<OtpOutcome, CustomError> {
        let email = normalize_email(email);

        let challenge = self
            .collection
            .find_one(doc! { "email": &email })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;

        let Some(challenge) = challenge else {
            return Ok(OtpOutcome::NotFound);
        };

        let outcome = decide(&challenge, submitted, Utc::now());
        match outcome {
            OtpOutcome::Expired | OtpOutcome::Verified => {
                self.collection
                    .delete_one(doc! { "email": &email })
                    .await
                    .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
            }
            OtpOutcome::Invalid => {
                let updated_at = mongodb::bson::to_bson(&Utc::now())
                    .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
                self.collection
                    .update_one(
                        doc! { "email": &email },
                        doc! { "$inc": { "attempts": 1 }, "$set": { "updated_at": updated_at } },
                    )
                    .await
                    .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
            }
            OtpOutcome::TooManyAttempts | OtpOutcome::NotFound => {}
        }

        Ok(outcome)
    }

    /// Delete any challenge for the email so no stale challenge survives a
    /// completed registration or reset flow.
    pub async fn clear(&self, email: &str) -> Result<(), CustomError> {
        let email = normalize_email(email);
        self.collection
            .delete_many(doc! { "email": &email })
            .await
            .map_err(|e| CustomError::InternalServerError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(code: &str, attempts: i32, issued_at: DateTime<Utc>) -> OtpChallenge {
        OtpChallenge {
            id: None,
            email: "user@example.com".to_string(),
            otp_hash: hash_otp(code),
            attempts,
            expires_at: issued_at + Duration::seconds(OTP_EXPIRY_SECONDS),
            created_at: issued_at,
            updated_at: issued_at,
        }
    }

    #[test]
    fn correct_code_verifies() {
        let issued = Utc::now();
        let c = challenge("042137", 0, issued);
        assert_eq!(decide(&c, "042137", issued + Duration::seconds(10)), OtpOutcome::Verified);
    }

    #[test]
    fn wrong_code_is_invalid() {
        let issued = Utc::now();
        let c = challenge("042137", 0, issued);
        assert_eq!(decide(&c, "042138", issued + Duration::seconds(10)), OtpOutcome::Invalid);
    }

    #[test]
    fn lockout_is_absolute_even_with_correct_code() {
        let issued = Utc::now();
        let c = challenge("042137", MAX_OTP_ATTEMPTS, issued);
        assert_eq!(
            decide(&c, "042137", issued + Duration::seconds(10)),
            OtpOutcome::TooManyAttempts
        );
    }

    #[test]
    fn attempts_below_ceiling_still_checked() {
        let issued = Utc::now();
        let c = challenge("042137", MAX_OTP_ATTEMPTS - 1, issued);
        assert_eq!(decide(&c, "042137", issued + Duration::seconds(10)), OtpOutcome::Verified);
    }

    #[test]
    fn expiry_beats_everything() {
        let issued = Utc::now();
        let c = challenge("042137", 0, issued);
        let at_expiry = issued + Duration::seconds(OTP_EXPIRY_SECONDS);
        assert_eq!(decide(&c, "042137", at_expiry), OtpOutcome::Expired);

        // A locked-out challenge also reports expired once past its TTL
        let locked = challenge("042137", MAX_OTP_ATTEMPTS, issued);
        assert_eq!(decide(&locked, "000000", at_expiry), OtpOutcome::Expired);
    }

    #[test]
    fn just_before_expiry_is_still_live() {
        let issued = Utc::now();
        let c = challenge("042137", 0, issued);
        let near_expiry = issued + Duration::seconds(OTP_EXPIRY_SECONDS - 1);
        assert_eq!(decide(&c, "042137", near_expiry), OtpOutcome::Verified);
    }
}
