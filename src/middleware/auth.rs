use std::env;

use crate::utils::error::CustomError;
use actix_web::{Error, HttpMessage, dev::ServiceRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

const ACCESS_TOKEN_HOURS: i64 = 1;
const REFRESH_TOKEN_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub is_staff: bool,
    pub token_type: String,
    pub jti: String,
    pub exp: usize,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

fn jwt_secret() -> Result<String, CustomError> {
    env::var("JWT_SECRET")
        .map_err(|_| CustomError::InternalServerError("JWT_SECRET must be set".to_string()))
}

fn build_claims(user_id: &str, is_staff: bool, token_type: &str, lifetime: chrono::Duration) -> Claims {
    let expiration = chrono::Utc::now()
        .checked_add_signed(lifetime)
        .expect("valid timestamp")
        .timestamp() as usize;

    Claims {
        sub: user_id.to_owned(),
        is_staff,
        token_type: token_type.to_owned(),
        jti: Uuid::new_v4().to_string(),
        exp: expiration,
    }
}

fn encode_with_secret(claims: &Claims, secret: &str) -> Result<String, CustomError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| CustomError::InternalServerError("Token generation failed".to_string()))
}

fn decode_with_secret(token: &str, secret: &str) -> Result<Claims, CustomError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| CustomError::UnauthorizedError("Invalid or expired token".to_string()))
}

/// Issue an access + refresh pair for an identity. The refresh token carries a
/// jti so it can be revoked through the Redis blacklist.
pub fn issue_token_pair(user_id: &str, is_staff: bool) -> Result<TokenPair, CustomError> {
    let secret = jwt_secret()?;

    let access_claims = build_claims(
        user_id,
        is_staff,
        TOKEN_TYPE_ACCESS,
        chrono::Duration::hours(ACCESS_TOKEN_HOURS),
    );
    let refresh_claims = build_claims(
        user_id,
        is_staff,
        TOKEN_TYPE_REFRESH,
        chrono::Duration::days(REFRESH_TOKEN_DAYS),
    );

    Ok(TokenPair {
        access: encode_with_secret(&access_claims, &secret)?,
        refresh: encode_with_secret(&refresh_claims, &secret)?,
    })
}

pub fn decode_access_token(token: &str) -> Result<Claims, CustomError> {
    let claims = decode_with_secret(token, &jwt_secret()?)?;
    if claims.token_type != TOKEN_TYPE_ACCESS {
        return Err(CustomError::UnauthorizedError("Invalid token type".to_string()));
    }
    Ok(claims)
}

pub fn decode_refresh_token(token: &str) -> Result<Claims, CustomError> {
    let claims = decode_with_secret(token, &jwt_secret()?)?;
    if claims.token_type != TOKEN_TYPE_REFRESH {
        return Err(CustomError::UnauthorizedError("Invalid token type".to_string()));
    }
    Ok(claims)
}

/// Seconds until a token expires, for blacklist TTLs
pub fn remaining_seconds(claims: &Claims) -> u64 {
    let now = chrono::Utc::now().timestamp();
    (claims.exp as i64 - now).max(0) as u64
}

/// Bearer validator for protected routes
pub async fn verify_token(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match decode_access_token(credentials.token()) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(req)
        }
        Err(_) => Err((actix_web::error::ErrorUnauthorized("Invalid token"), req)),
    }
}

/// Get caller claims from request extensions (use after auth middleware)
pub fn get_claims(req: &actix_web::HttpRequest) -> Result<Claims, CustomError> {
    req.extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| CustomError::UnauthorizedError("Authentication required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn claims_round_trip() {
        let claims = build_claims("user-1", false, TOKEN_TYPE_ACCESS, chrono::Duration::hours(1));
        let token = encode_with_secret(&claims, SECRET).unwrap();
        let decoded = decode_with_secret(&token, SECRET).unwrap();

        assert_eq!(decoded.sub, "user-1");
        assert_eq!(decoded.token_type, TOKEN_TYPE_ACCESS);
        assert!(!decoded.is_staff);
        assert_eq!(decoded.jti, claims.jti);
    }

    #[test]
    fn refresh_claims_carry_distinct_jti() {
        let a = build_claims("user-1", true, TOKEN_TYPE_REFRESH, chrono::Duration::days(7));
        let b = build_claims("user-1", true, TOKEN_TYPE_REFRESH, chrono::Duration::days(7));
        assert_ne!(a.jti, b.jti);
        assert!(a.is_staff);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = build_claims("user-1", false, TOKEN_TYPE_ACCESS, chrono::Duration::hours(1));
        let token = encode_with_secret(&claims, SECRET).unwrap();
        assert!(decode_with_secret(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = build_claims("user-1", false, TOKEN_TYPE_ACCESS, chrono::Duration::hours(-2));
        let token = encode_with_secret(&claims, SECRET).unwrap();
        assert!(decode_with_secret(&token, SECRET).is_err());
    }

    #[test]
    fn remaining_seconds_never_negative() {
        let expired = build_claims("u", false, TOKEN_TYPE_REFRESH, chrono::Duration::hours(-1));
        assert_eq!(remaining_seconds(&expired), 0);

        let live = build_claims("u", false, TOKEN_TYPE_REFRESH, chrono::Duration::days(7));
        assert!(remaining_seconds(&live) > 0);
    }
}
