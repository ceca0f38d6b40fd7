//! k1s0-redislock: Redis を使った分散ロックライブラリ。
//!
//! 単一の Redis インスタンスを調停役として、複数プロセス間でクリティカルリソースへの
//! アクセスを直列化する。取得は `SET NX PX`、解放と延長はトークン一致を条件とする
//! Lua スクリプトで原子的に行い、競合時の再試行は差し替え可能なリトライ戦略で制御する。
//!
//! ```no_run
//! use std::time::Duration;
//! use k1s0_redislock::{limit_retry, linear_backoff, LockClient, ObtainOptions, RedisLockStore};
//!
//! # async fn run() -> Result<(), k1s0_redislock::LockError> {
//! let store = RedisLockStore::new("redis://127.0.0.1:6379").await?;
//! let client = LockClient::new(store);
//!
//! let options = ObtainOptions::new()
//!     .with_retry_strategy(limit_retry(linear_backoff(Duration::from_millis(100)), 3));
//! let lock = client.obtain("orders:42", Duration::from_secs(30), options).await?;
//! // ... クリティカルセクション ...
//! lock.release().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod lock;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod retry;
pub mod store;
pub mod token;

pub use client::{obtain, LockClient, ObtainOptions};
pub use config::{ConfigError, LockConfig, RetryConfig, RetryKind};
pub use error::LockError;
pub use lock::Lock;
pub use memory::InMemoryLockStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisLockStore;
pub use retry::{
    exponential_backoff, limit_retry, linear_backoff, no_retry, ExponentialBackoff,
    LimitRetry, LinearBackoff, NoRetry, RetryStrategy,
};
pub use store::LockStore;
pub use token::generate_token;

#[cfg(feature = "mock")]
pub use store::MockLockStore;
