use crate::database::RedisService;
use crate::middleware::auth::get_claims;
use crate::user::model::{
    ForgotPasswordConfirmRequest, ForgotPasswordRequest, GoogleAuthRequest, RegisterRequest,
    SendOtpRequest, UpdateProfileRequest, User,
};
use crate::user::service::UserService;
use crate::utils::error::CustomError;
use crate::utils::helpers::{OTP_EXPIRY_SECONDS, normalize_email};
use crate::utils::model::{LoginRequest, RefreshTokenRequest};
use actix_web::{HttpRequest, HttpResponse, web};
use log::warn;
use serde_json::json;

const OTP_RATE_LIMIT: u64 = 5;
const OTP_RATE_WINDOW_SECONDS: u64 = 3600;

fn user_payload(user: &User) -> serde_json::Value {
    json!({
        "id": user.id.map(|id| id.to_hex()),
        "email": user.email,
        "is_staff": user.is_staff,
    })
}

fn profile_payload(user: &User) -> serde_json::Value {
    json!({
        "id": user.id.map(|id| id.to_hex()),
        "email": user.email,
        "is_staff": user.is_staff,
        "name": user.profile.name,
        "phone": user.profile.phone,
        "is_verified": user.profile.is_verified,
    })
}

/// Fixed-window limit on OTP issuance per email. Redis trouble fails open so
/// a cache outage cannot take down registration.
async fn check_otp_rate_limit(redis: &RedisService, email: &str) -> Result<(), CustomError> {
    let key = format!("otp:{}", normalize_email(email));
    match redis
        .is_rate_limited(&key, OTP_RATE_LIMIT, OTP_RATE_WINDOW_SECONDS)
        .await
    {
        Ok(true) => Err(CustomError::TooManyRequestsError(
            "Too many OTP requests. Please try again later.".to_string(),
        )),
        Ok(false) => Ok(()),
        Err(e) => {
            warn!("rate limit check failed, allowing request: {}", e);
            Ok(())
        }
    }
}

pub async fn send_otp(
    user_service: web::Data<UserService>,
    redis_service: web::Data<RedisService>,
    body: web::Json<SendOtpRequest>,
) -> Result<HttpResponse, CustomError> {
    check_otp_rate_limit(&redis_service, &body.email).await?;
    user_service.send_registration_otp(&body.email).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "If eligible, OTP has been sent successfully",
        "otp_expires_in": OTP_EXPIRY_SECONDS,
    })))
}

pub async fn register(
    user_service: web::Data<UserService>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, CustomError> {
    let (user, tokens) = user_service
        .register_with_otp(&body.email, &body.otp, &body.password)
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered and logged in successfully",
        "access": tokens.access,
        "refresh": tokens.refresh,
        "user": user_payload(&user),
    })))
}

pub async fn login(
    user_service: web::Data<UserService>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, CustomError> {
    let (user, tokens) = user_service.login(&body.email, &body.password).await?;

    Ok(HttpResponse::Ok().json(json!({
        "access": tokens.access,
        "refresh": tokens.refresh,
        "user": user_payload(&user),
    })))
}

pub async fn forgot_password(
    user_service: web::Data<UserService>,
    redis_service: web::Data<RedisService>,
    body: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, CustomError> {
    check_otp_rate_limit(&redis_service, &body.email).await?;
    user_service.forgot_password_request(&body.email).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "If eligible, OTP has been sent successfully",
        "otp_expires_in": OTP_EXPIRY_SECONDS,
    })))
}

pub async fn forgot_password_confirm(
    user_service: web::Data<UserService>,
    body: web::Json<ForgotPasswordConfirmRequest>,
) -> Result<HttpResponse, CustomError> {
    user_service
        .forgot_password_confirm(&body.email, &body.otp, &body.password)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Password reset successful" })))
}

pub async fn google_auth(
    user_service: web::Data<UserService>,
    body: web::Json<GoogleAuthRequest>,
) -> Result<HttpResponse, CustomError> {
    let (user, tokens) = user_service.google_login(&body.id_token).await?;

    Ok(HttpResponse::Ok().json(json!({
        "access": tokens.access,
        "refresh": tokens.refresh,
        "user": user_payload(&user),
    })))
}

pub async fn refresh_token(
    user_service: web::Data<UserService>,
    redis_service: web::Data<RedisService>,
    body: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse, CustomError> {
    let tokens = user_service
        .refresh_tokens(&body.refresh, &redis_service)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "access": tokens.access,
        "refresh": tokens.refresh,
    })))
}

pub async fn logout(
    user_service: web::Data<UserService>,
    redis_service: web::Data<RedisService>,
    body: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse, CustomError> {
    user_service.logout(&body.refresh, &redis_service).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Logged out successfully" })))
}

pub async fn me(
    req: HttpRequest,
    user_service: web::Data<UserService>,
) -> Result<HttpResponse, CustomError> {
    let claims = get_claims(&req)?;
    let user = user_service.get_by_id(&claims.sub).await?;

    Ok(HttpResponse::Ok().json(profile_payload(&user)))
}

pub async fn update_me(
    req: HttpRequest,
    user_service: web::Data<UserService>,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, CustomError> {
    let claims = get_claims(&req)?;
    let body = body.into_inner();
    let user = user_service
        .update_profile(&claims.sub, body.name, body.phone)
        .await?;

    Ok(HttpResponse::Ok().json(profile_payload(&user)))
}
