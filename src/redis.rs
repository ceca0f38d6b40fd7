use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, Script};

use crate::config::LockConfig;
use crate::store::LockStore;
use crate::LockError;

/// Lua script for safe lock release.
/// Only deletes the key if the stored value matches the token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Lua script for safe lock refresh.
/// Only resets the TTL if the stored value matches the token.
const REFRESH_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("pexpire", KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// Redis-backed [`LockStore`] for a single authoritative Redis instance.
///
/// Acquisition is a single `SET NX PX` command; release and refresh run as
/// Lua scripts so the token comparison and the mutation execute atomically
/// on the server.
#[derive(Clone)]
pub struct RedisLockStore {
    conn: MultiplexedConnection,
    key_prefix: Option<String>,
    release_script: Script,
    refresh_script: Script,
}

impl RedisLockStore {
    /// Create a new RedisLockStore from a Redis URL.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub async fn new(url: &str) -> Result<Self, LockError> {
        let client = Client::open(url).map_err(map_redis_error)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_error)?;
        Ok(Self::from_connection(conn))
    }

    /// Create a new RedisLockStore from an existing multiplexed connection.
    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            key_prefix: None,
            release_script: Script::new(RELEASE_SCRIPT),
            refresh_script: Script::new(REFRESH_SCRIPT),
        }
    }

    /// Connect using `redis_url` and `key_prefix` from the given config.
    pub async fn from_config(config: &LockConfig) -> Result<Self, LockError> {
        let store = Self::new(&config.redis_url).await?;
        Ok(match &config.key_prefix {
            Some(prefix) => store.with_prefix(prefix.clone()),
            None => store,
        })
    }

    /// Set a key prefix for namespace isolation.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    fn lock_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format_lock_key(prefix, key),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let full_key = self.lock_key(key);

        // Atomic SET key value NX PX milliseconds
        let result: Option<String> = redis::cmd("SET")
            .arg(&full_key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        Ok(result.is_some())
    }

    async fn release(&self, key: &str, token: &str) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let full_key = self.lock_key(key);

        let result: i64 = self
            .release_script
            .key(&full_key)
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        Ok(result == 1)
    }

    async fn refresh(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let full_key = self.lock_key(key);

        let result: i64 = self
            .refresh_script
            .key(&full_key)
            .arg(token)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        Ok(result == 1)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, LockError> {
        let mut conn = self.conn.clone();
        let full_key = self.lock_key(key);
        let millis: i64 = conn.pttl(&full_key).await.map_err(map_redis_error)?;
        Ok(pttl_to_duration(millis))
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// PTTL returns -2 for a missing key and -1 for a key without expiry.
fn pttl_to_duration(millis: i64) -> Option<Duration> {
    u64::try_from(millis).ok().map(Duration::from_millis)
}

fn map_redis_error(err: RedisError) -> LockError {
    LockError::store(err)
}

/// Helper function to format lock keys (exposed for testing without Redis connection).
pub fn format_lock_key(prefix: &str, key: &str) -> String {
    format!("{}:{}", prefix, key)
}
