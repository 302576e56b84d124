pub mod db;
pub mod redis;

pub use db::{DB_NAME, connect_to_mongo, is_duplicate_key};
pub use redis::{RedisClient, RedisService, connect_to_redis};
