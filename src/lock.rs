use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::client::validate_ttl;
use crate::store::LockStore;
use crate::LockError;

/// 取得済みロックのハンドル。
///
/// 解放・延長はすべて取得時のトークンを条件にストア側で判定されるため、
/// 期限切れや他者に奪われた後のハンドルを使っても他者のロックを壊すことはない。
/// Drop 時に自動解放はしないので、使い終わったら [`Lock::release`] を呼ぶこと。
/// 1 回の取得につきハンドルは 1 つで、複製はできない。
///
/// ```compile_fail
/// fn assert_clone<T: Clone>() {}
/// assert_clone::<k1s0_redislock::Lock>();
/// ```
pub struct Lock {
    store: Arc<dyn LockStore>,
    key: String,
    token: String,
    metadata: String,
}

impl Lock {
    pub(crate) fn new(
        store: Arc<dyn LockStore>,
        key: impl Into<String>,
        token: impl Into<String>,
        metadata: impl Into<String>,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            token: token.into(),
            metadata: metadata.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// 取得時に指定したメタデータ。ストアには保存されない。
    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    /// ロックを解放する。
    ///
    /// 既に期限切れ、または別のトークンで取得し直されている場合は
    /// [`LockError::LockNotHeld`] を返す（両者は区別しない）。
    pub async fn release(&self) -> Result<(), LockError> {
        if self.store.release(&self.key, &self.token).await? {
            tracing::debug!(key = %self.key, "ロックを解放しました");
            Ok(())
        } else {
            Err(LockError::LockNotHeld(self.key.clone()))
        }
    }

    /// TTL を `ttl` に再設定する。保持していなければ [`LockError::NotObtained`]。
    pub async fn refresh(&self, ttl: Duration) -> Result<(), LockError> {
        validate_ttl(ttl)?;
        if self.store.refresh(&self.key, &self.token, ttl).await? {
            Ok(())
        } else {
            Err(LockError::NotObtained(self.key.clone()))
        }
    }

    /// キーの残り TTL。ある時点のスナップショットで、所有の保証ではない。
    pub async fn ttl(&self) -> Result<Option<Duration>, LockError> {
        self.store.ttl(&self.key).await
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("key", &self.key)
            .field("token", &self.token)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
