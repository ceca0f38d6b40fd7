use async_trait::async_trait;
use std::time::Duration;

use crate::LockError;

/// ロック状態を保持する共有ストアとの境界。
///
/// 書き込み系の 3 操作は、比較と更新をストア側で 1 ステップとして実行しなければならない。
/// クライアント側で GET してから DEL するような実装では相互排他が成立しない。
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait LockStore: Send + Sync {
    /// キーが存在しない場合に限り `key -> token` を TTL 付きで設定する。設定できたら true。
    async fn acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError>;
    /// 値が token と一致する場合に限りキーを削除する。削除したら true。
    async fn release(&self, key: &str, token: &str) -> Result<bool, LockError>;
    /// 値が token と一致する場合に限り TTL を再設定する。延長したら true。
    async fn refresh(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError>;
    /// キーの残り TTL を返す。キーが存在しない、または期限が設定されていなければ None。
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, LockError>;
}
