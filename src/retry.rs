//! ロック競合時のリトライ戦略。
//!
//! 戦略は呼び出し回数に対する待機時間を返す純粋な状態機械で、`None` は
//! リトライ打ち切りを意味する。状態を持つ戦略（指数バックオフ・回数制限）は
//! `obtain` 呼び出しごとに値として渡し、並行する取得処理間で共有しない。

use std::time::Duration;

/// 次のバックオフ時間を返す。`None` を返したら取得ループは終了する。
pub trait RetryStrategy: Send {
    fn next_backoff(&mut self) -> Option<Duration>;
}

impl<S: RetryStrategy + ?Sized> RetryStrategy for Box<S> {
    fn next_backoff(&mut self) -> Option<Duration> {
        (**self).next_backoff()
    }
}

/// 一度もリトライしない。
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn next_backoff(&mut self) -> Option<Duration> {
        None
    }
}

pub fn no_retry() -> NoRetry {
    NoRetry
}

/// 固定間隔で無制限にリトライする。回数の制限は [`limit_retry`] で合成する。
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    backoff: Duration,
}

impl RetryStrategy for LinearBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        Some(self.backoff)
    }
}

pub fn linear_backoff(backoff: Duration) -> LinearBackoff {
    LinearBackoff { backoff }
}

/// 2 の累乗ミリ秒で増加し、`[min, max]` に収める指数バックオフ。
///
/// n 回目の呼び出しは `2^(n+1)` ms を候補とし、`min` 未満なら `min`、
/// `max` を超えれば `max` を返す。`max` がゼロの場合は上限なし。
/// 10ms/300ms なら 10, 10, 16, 32, 64, 128, 256, 300, 300, ... となる。
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    attempts: u32,
    min: Duration,
    max: Duration,
}

const MAX_EXPONENT: u32 = 25;

impl RetryStrategy for ExponentialBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempts = self.attempts.saturating_add(1);

        let exponent = self.attempts.min(MAX_EXPONENT);
        let candidate = Duration::from_millis(2u64 << exponent);

        if candidate < self.min {
            Some(self.min)
        } else if !self.max.is_zero() && candidate > self.max {
            Some(self.max)
        } else {
            Some(candidate)
        }
    }
}

pub fn exponential_backoff(min: Duration, max: Duration) -> ExponentialBackoff {
    ExponentialBackoff {
        attempts: 0,
        min,
        max,
    }
}

/// 内側の戦略に最初の `max` 回だけ委譲し、以降は常に打ち切りを返す。
#[derive(Debug, Clone)]
pub struct LimitRetry<S> {
    inner: S,
    max: u32,
    calls: u32,
}

impl<S: RetryStrategy> RetryStrategy for LimitRetry<S> {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.calls >= self.max {
            return None;
        }
        self.calls += 1;
        self.inner.next_backoff()
    }
}

pub fn limit_retry<S: RetryStrategy>(inner: S, max: u32) -> LimitRetry<S> {
    LimitRetry {
        inner,
        max,
        calls: 0,
    }
}
