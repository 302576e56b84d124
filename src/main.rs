use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlers, Logger};
use actix_web::{App, HttpResponse, HttpServer, Responder, get, web};
use dotenv::dotenv;
use env_logger::Env;
use log::info;

mod booking;
mod database;
mod middleware;
mod otp;
mod router;
mod user;
mod utils;

use booking::service::BookingService;
use database::RedisService;
use middleware::error_handler::handle_error;
use middleware::not_found::not_found;
use router::index::routes;
use serde_json::json;
use user::service::UserService;

#[get("/")]
async fn default() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Welcome to the CoolCuts booking API",
        "httpStatusCode": StatusCode::OK.as_u16(),
        "service": std::env::var("SERVICE_NAME").unwrap_or_else(|_| "Unknown".to_string()),
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let host = std::env::var("HOST").unwrap_or_else(|_| "localhost".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8000".to_string())
        .parse()
        .expect("PORT must be a valid number");

    info!("Starting server on http://{}:{}", host, port);

    // Connecting also creates the unique indexes the services rely on
    let mongo_client = database::connect_to_mongo()
        .await
        .expect("Failed to connect to MongoDB");

    let redis_client = database::connect_to_redis()
        .await
        .expect("Failed to connect to Redis");

    let user_service = web::Data::new(UserService::new(&mongo_client));
    let booking_service = web::Data::new(BookingService::new(&mongo_client));
    let redis_service = web::Data::new(RedisService::new(&redis_client));

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(user_service.clone())
            .app_data(booking_service.clone())
            .app_data(redis_service.clone())
            .configure(routes)
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::NOT_FOUND, not_found)
                    .default_handler(handle_error),
            )
            .service(default)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    info!("Server has stopped");

    Ok(())
}
