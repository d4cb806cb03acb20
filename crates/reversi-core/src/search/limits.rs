//! 探索の打ち切り条件

use std::time::Duration;

/// 1 回の `evaluate` / `continue_evaluate` で使ってよい訪問数と時間
///
/// どちらも、その呼び出しで新しく増えた分だけを数える。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_visited: u64,
    pub max_time: Duration,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self::infinite()
    }
}

impl SearchLimits {
    /// 根が解けるか止められるまで
    pub const fn infinite() -> Self {
        Self {
            max_visited: u64::MAX,
            max_time: Duration::MAX,
        }
    }

    pub const fn visits(max_visited: u64) -> Self {
        Self {
            max_visited,
            max_time: Duration::MAX,
        }
    }

    pub const fn time(max_time: Duration) -> Self {
        Self {
            max_visited: u64::MAX,
            max_time,
        }
    }

    pub const fn with_visits(self, max_visited: u64) -> Self {
        Self { max_visited, ..self }
    }

    pub const fn with_time(self, max_time: Duration) -> Self {
        Self { max_time, ..self }
    }

    /// 予算の 8 割
    #[inline]
    pub(crate) fn soft_visits(&self) -> f64 {
        0.8 * self.max_visited as f64
    }

    #[inline]
    pub(crate) fn soft_time(&self) -> f64 {
        0.8 * self.max_time.as_secs_f64()
    }
}
