use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::store::LockStore;
use crate::LockError;

struct LockEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl LockEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// プロセス内で完結する [`LockStore`] 実装。
///
/// 各操作は 1 つの Mutex のクリティカルセクション内で比較と更新を行うため、
/// Redis の単一コマンド / Lua スクリプトと同じ原子性を持つ。期限切れは参照時に判定する。
/// `Instant` で表現できないほど長い TTL は期限なしとして扱う。
/// テストや単一プロセス構成向け。
pub struct InMemoryLockStore {
    entries: Mutex<HashMap<String, LockEntry>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// 所有者を確認せずに値を上書きする（他クライアントによる SET 相当）。
    /// `ttl` が None の場合は期限なし。
    pub async fn force_set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            LockEntry {
                value: value.to_string(),
                expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
            },
        );
    }

    /// 期限切れを考慮してキーが存在するかを返す。
    pub async fn contains(&self, key: &str) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .is_some_and(|e| !e.is_expired(Instant::now()))
    }

    fn live_entry<'a>(
        entries: &'a mut HashMap<String, LockEntry>,
        key: &str,
        now: Instant,
    ) -> Option<&'a mut LockEntry> {
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

impl Default for InMemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        // 再利用されないキーが残り続けないよう、取得のたびに期限切れを掃除する
        entries.retain(|_, e| !e.is_expired(now));
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            LockEntry {
                value: token.to_string(),
                expires_at: now.checked_add(ttl),
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str, token: &str) -> Result<bool, LockError> {
        let mut entries = self.entries.lock().await;
        match Self::live_entry(&mut entries, key, Instant::now()) {
            Some(entry) if entry.value == token => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn refresh(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match Self::live_entry(&mut entries, key, now) {
            Some(entry) if entry.value == token => {
                entry.expires_at = now.checked_add(ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, LockError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        Ok(Self::live_entry(&mut entries, key, now)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let store = InMemoryLockStore::new();
        assert!(store.acquire("key1", "t1", Duration::from_secs(10)).await.unwrap());
        assert!(store.contains("key1").await);

        assert!(store.release("key1", "t1").await.unwrap());
        assert!(!store.contains("key1").await);
    }

    #[tokio::test]
    async fn test_double_acquire_fails() {
        let store = InMemoryLockStore::new();
        assert!(store.acquire("key1", "t1", Duration::from_secs(10)).await.unwrap());
        assert!(!store.acquire("key1", "t2", Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_with_wrong_token_keeps_entry() {
        let store = InMemoryLockStore::new();
        store.acquire("key1", "t1", Duration::from_secs(10)).await.unwrap();
        assert!(!store.release("key1", "wrong-token").await.unwrap());
        assert!(store.contains("key1").await);
    }

    #[tokio::test]
    async fn test_refresh_updates_ttl() {
        let store = InMemoryLockStore::new();
        store.acquire("key1", "t1", Duration::from_secs(1)).await.unwrap();
        assert!(store.refresh("key1", "t1", Duration::from_secs(60)).await.unwrap());
        let ttl = store.ttl("key1").await.unwrap().unwrap();
        assert!(ttl > Duration::from_secs(59));
    }

    #[tokio::test]
    async fn test_refresh_with_wrong_token_fails() {
        let store = InMemoryLockStore::new();
        store.acquire("key1", "t1", Duration::from_secs(1)).await.unwrap();
        assert!(!store.refresh("key1", "t2", Duration::from_secs(60)).await.unwrap());
        let ttl = store.ttl("key1").await.unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_acquire_after_expiry() {
        let store = InMemoryLockStore::new();
        store.acquire("key1", "t1", Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!store.contains("key1").await);
        assert_eq!(store.ttl("key1").await.unwrap(), None);
        assert!(store.acquire("key1", "t2", Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_entry_cannot_be_released() {
        let store = InMemoryLockStore::new();
        store.acquire("key1", "t1", Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!store.release("key1", "t1").await.unwrap());
        assert!(!store.refresh("key1", "t1", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_acquire_sweeps_expired_entries() {
        let store = InMemoryLockStore::new();
        for i in 0..10 {
            let key = format!("short-{}", i);
            store.acquire(&key, "t1", Duration::from_millis(1)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(store.acquire("key1", "t1", Duration::from_secs(10)).await.unwrap());
        assert_eq!(store.entries.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_huge_ttl_means_no_expiry() {
        let store = InMemoryLockStore::new();
        assert!(store.acquire("key1", "t1", Duration::MAX).await.unwrap());
        assert!(store.contains("key1").await);
        assert_eq!(store.ttl("key1").await.unwrap(), None);

        assert!(store.refresh("key1", "t1", Duration::MAX).await.unwrap());
        assert!(store.release("key1", "t1").await.unwrap());

        store.force_set("key2", "ABCD", Some(Duration::MAX)).await;
        assert!(store.contains("key2").await);
    }

    #[tokio::test]
    async fn test_force_set_without_ttl_has_no_expiry() {
        let store = InMemoryLockStore::new();
        store.force_set("key1", "ABCD", None).await;
        assert!(store.contains("key1").await);
        assert_eq!(store.ttl("key1").await.unwrap(), None);
        assert!(!store.acquire("key1", "t1", Duration::from_secs(1)).await.unwrap());
    }
}
