use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    /// 競合によりロックを取得できなかった（リトライ上限到達、または延長失敗）。
    #[error("ロックを取得できませんでした: {0}")]
    NotObtained(String),
    /// 解放しようとしたロックを保持していない（期限切れ・他者による取得を区別しない）。
    #[error("ロックを保持していません: {0}")]
    LockNotHeld(String),
    #[error("ロック取得がキャンセルされました: {0}")]
    Cancelled(String),
    #[error("不正な引数です: {0}")]
    InvalidArgument(String),
    /// ストア（通信・認証・タイムアウト等）のエラー。元のエラーを source として保持する。
    #[error("ストアエラー: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LockError {
    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(err))
    }
}
