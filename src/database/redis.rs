use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::env;

/// Redis connection wrapper
pub struct RedisClient {
    connection: MultiplexedConnection,
}

impl RedisClient {
    /// Initialize Redis connection from environment variable
    pub async fn init() -> Result<Self, String> {
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let client =
            Client::open(redis_url).map_err(|e| format!("Failed to create Redis client: {}", e))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| format!("Failed to connect to Redis: {}", e))?;

        println!("Connected successfully to Redis");

        Ok(Self { connection })
    }

    pub fn get_connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}

/// Redis service for refresh-token revocation and OTP rate limiting
#[derive(Clone)]
pub struct RedisService {
    connection: MultiplexedConnection,
}

impl RedisService {
    pub fn new(client: &RedisClient) -> Self {
        Self {
            connection: client.get_connection(),
        }
    }

    // ============================================
    // Refresh Token Blacklist
    // ============================================

    /// Blacklist a refresh token by its jti for the token's remaining life.
    /// Blacklisted tokens are refused on refresh even if their signature is valid.
    pub async fn blacklist_token(&self, jti: &str, expiry_seconds: u64) -> Result<(), String> {
        let mut conn = self.connection.clone();
        let key = format!("blacklist:{}", jti);

        conn.set_ex::<_, _, ()>(&key, "1", expiry_seconds)
            .await
            .map_err(|e| format!("Failed to blacklist token: {}", e))?;

        Ok(())
    }

    /// Check whether a refresh token jti has been revoked
    pub async fn is_token_blacklisted(&self, jti: &str) -> Result<bool, String> {
        let mut conn = self.connection.clone();
        let key = format!("blacklist:{}", jti);

        let exists: bool = conn
            .exists(&key)
            .await
            .map_err(|e| format!("Failed to check blacklist: {}", e))?;

        Ok(exists)
    }

    // ============================================
    // Rate Limiting (fixed window)
    // ============================================

    /// Increment a rate limit counter
    pub async fn rate_limit_increment(
        &self,
        key: &str,
        window_seconds: u64,
    ) -> Result<u64, String> {
        let mut conn = self.connection.clone();
        let rate_key = format!("ratelimit:{}", key);

        let count: u64 = conn
            .incr(&rate_key, 1)
            .await
            .map_err(|e| format!("Failed to increment rate limit: {}", e))?;

        // Set expiry on first increment
        if count == 1 {
            conn.expire::<_, ()>(&rate_key, window_seconds as i64)
                .await
                .map_err(|e| format!("Failed to set rate limit expiry: {}", e))?;
        }

        Ok(count)
    }

    /// Check if rate limit is exceeded
    pub async fn is_rate_limited(
        &self,
        key: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> Result<bool, String> {
        let count = self.rate_limit_increment(key, window_seconds).await?;
        Ok(count > max_requests)
    }
}

/// Convenience function to connect to Redis
pub async fn connect_to_redis() -> Result<RedisClient, String> {
    RedisClient::init().await
}
