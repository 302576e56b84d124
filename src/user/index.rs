use super::controller::{
    forgot_password, forgot_password_confirm, google_auth, login, logout, me, refresh_token,
    register, send_otp, update_me,
};
use crate::middleware::auth::verify_token;
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

pub fn user_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth/user")
            .route("/send-otp", web::post().to(send_otp))
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/forgot-password", web::post().to(forgot_password))
            .route("/forgot-password/confirm", web::post().to(forgot_password_confirm))
            .route("/google", web::post().to(google_auth))
            .route("/refresh", web::post().to(refresh_token))
            .service(
                web::scope("")
                    .wrap(HttpAuthentication::bearer(verify_token))
                    .route("/logout", web::post().to(logout))
                    .service(
                        web::resource("/me")
                            .route(web::get().to(me))
                            .route(web::patch().to(update_me)),
                    ),
            ),
    );
}
