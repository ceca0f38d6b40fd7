use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{LockConfig, RetryConfig};
use crate::lock::Lock;
use crate::retry::{no_retry, RetryStrategy};
use crate::store::LockStore;
use crate::token::generate_token;
use crate::LockError;

/// `obtain` の動作オプション。
///
/// リトライ戦略は状態を持ちうるため値として受け取り、1 回の取得処理でのみ使う。
pub struct ObtainOptions {
    retry_strategy: Box<dyn RetryStrategy>,
    metadata: String,
    cancellation: Option<CancellationToken>,
    wait_timeout: Option<Duration>,
}

impl Default for ObtainOptions {
    fn default() -> Self {
        Self {
            retry_strategy: Box::new(no_retry()),
            metadata: String::new(),
            cancellation: None,
            wait_timeout: None,
        }
    }
}

impl ObtainOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry_strategy(mut self, strategy: impl RetryStrategy + 'static) -> Self {
        self.retry_strategy = Box::new(strategy);
        self
    }

    /// ロックハンドルに持たせる任意の値。
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// リトライ待機中にキャンセルされると [`LockError::Cancelled`] で中断する。
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// 取得ループ全体の待ち時間の上限。超過すると [`LockError::Cancelled`]。
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for ObtainOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObtainOptions")
            .field("metadata", &self.metadata)
            .field("cancellation", &self.cancellation)
            .field("wait_timeout", &self.wait_timeout)
            .finish_non_exhaustive()
    }
}

/// 共有ストアに対してロックを取得するクライアント。
///
/// [`LockConfig`] の既定 TTL とリトライ設定を保持し、[`LockClient::obtain_default`] で使う。
#[derive(Clone)]
pub struct LockClient {
    store: Arc<dyn LockStore>,
    default_ttl: Duration,
    retry: RetryConfig,
}

impl LockClient {
    pub fn new(store: impl LockStore + 'static) -> Self {
        Self::from_arc(Arc::new(store))
    }

    pub fn from_arc(store: Arc<dyn LockStore>) -> Self {
        let defaults = LockConfig::default();
        Self {
            store,
            default_ttl: defaults.default_ttl(),
            retry: defaults.retry,
        }
    }

    /// 設定の既定 TTL とリトライ設定を適用する。
    pub fn with_config(mut self, config: &LockConfig) -> Self {
        self.default_ttl = config.default_ttl();
        self.retry = config.retry.clone();
        self
    }

    /// 設定から Redis に接続してクライアントを作成する。
    #[cfg(feature = "redis")]
    pub async fn connect(config: &LockConfig) -> Result<Self, LockError> {
        let store = crate::redis::RedisLockStore::from_config(config).await?;
        Ok(Self::new(store).with_config(config))
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 既定 TTL と、設定から新しく生成したリトライ戦略でロックを取得する。
    pub async fn obtain_default(&self, key: &str) -> Result<Lock, LockError> {
        let options = ObtainOptions::new().with_retry_strategy(self.retry.build());
        self.obtain(key, self.default_ttl, options).await
    }

    /// ロックを取得する。
    ///
    /// 取得できなければリトライ戦略に従って待機し、再試行する。戦略が打ち切りを返したら
    /// [`LockError::NotObtained`]、待機中にキャンセルまたはタイムアウトしたら
    /// [`LockError::Cancelled`] を返す。ストアのエラーはリトライせずそのまま返す。
    pub async fn obtain(
        &self,
        key: &str,
        ttl: Duration,
        options: ObtainOptions,
    ) -> Result<Lock, LockError> {
        validate_key(key)?;
        validate_ttl(ttl)?;

        let ObtainOptions {
            mut retry_strategy,
            metadata,
            cancellation,
            wait_timeout,
        } = options;
        let cancellation = cancellation.unwrap_or_default();
        // Instant で表現できない待ち時間は上限なしとみなす
        let deadline = wait_timeout.and_then(|timeout| Instant::now().checked_add(timeout));

        let token = generate_token();
        let mut attempts: u32 = 0;

        loop {
            if cancellation.is_cancelled() {
                tracing::warn!(key = %key, attempts, "ロック取得がキャンセルされました");
                return Err(LockError::Cancelled(key.to_string()));
            }

            attempts += 1;
            let acquired = self
                .store
                .acquire(key, &token, ttl)
                .await
                .inspect_err(|e| {
                    tracing::warn!(key = %key, error = %e, "ロック取得中にストアエラーが発生しました");
                })?;
            if acquired {
                if attempts > 1 {
                    tracing::info!(key = %key, attempts, "リトライ後にロックを取得しました");
                }
                return Ok(Lock::new(self.store.clone(), key, token, metadata));
            }

            // ゼロ待機も打ち切りとして扱う
            let backoff = match retry_strategy.next_backoff() {
                Some(backoff) if !backoff.is_zero() => backoff,
                _ => {
                    tracing::debug!(key = %key, attempts, "ロックを取得できませんでした");
                    return Err(LockError::NotObtained(key.to_string()));
                }
            };

            tracing::debug!(
                key = %key,
                attempts,
                backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                "ロック競合のため待機します"
            );

            tokio::select! {
                biased;
                () = cancellation.cancelled() => {
                    tracing::warn!(key = %key, attempts, "ロック取得がキャンセルされました");
                    return Err(LockError::Cancelled(key.to_string()));
                }
                () = wait_until(deadline) => {
                    tracing::warn!(key = %key, attempts, "ロック取得の待機がタイムアウトしました");
                    return Err(LockError::Cancelled(key.to_string()));
                }
                () = tokio::time::sleep(backoff) => {}
            }
        }
    }
}

/// [`LockClient::obtain`] のショートカット。
pub async fn obtain(
    store: Arc<dyn LockStore>,
    key: &str,
    ttl: Duration,
    options: ObtainOptions,
) -> Result<Lock, LockError> {
    LockClient::from_arc(store).obtain(key, ttl, options).await
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn validate_key(key: &str) -> Result<(), LockError> {
    if key.is_empty() {
        return Err(LockError::InvalidArgument("key must not be empty".into()));
    }
    Ok(())
}

/// ストアはミリ秒単位で期限を扱うため 1ms 未満は受け付けない。
pub(crate) fn validate_ttl(ttl: Duration) -> Result<(), LockError> {
    if ttl < Duration::from_millis(1) {
        return Err(LockError::InvalidArgument(format!(
            "ttl must be at least 1ms: {:?}",
            ttl
        )));
    }
    Ok(())
}
