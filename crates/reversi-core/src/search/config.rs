//! 探索の設定
//!
//! TOML から読める。省略した項目は既定値になる。
//!
//! ```toml
//! tree_node_capacity = 400000
//! tt_bits = 22
//! n_threads = 4
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{SearchError, SearchResult};
use crate::tt::DEFAULT_TT_BITS;

/// 置換表のビット数の上限（2^30 スロット）
const MAX_TT_BITS: u32 = 30;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// 探索木のノード数の上限
    pub tree_node_capacity: usize,
    /// 置換表のスロット数（2 の冪）のビット数
    pub tt_bits: u32,
    /// 既定のワーカー数
    pub n_threads: usize,
    /// 葉の確保に失敗したときに待つ時間（マイクロ秒）。0 なら spin のみ
    pub claim_retry_backoff_us: u64,
    /// 探索木で同じ局面のノードを共有する
    pub use_transpositions: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tree_node_capacity: 200_000,
            tt_bits: DEFAULT_TT_BITS,
            n_threads: 1,
            claim_retry_backoff_us: 50,
            use_transpositions: true,
        }
    }
}

impl SearchConfig {
    pub fn from_toml_str(source: &str) -> SearchResult<Self> {
        let config: SearchConfig = toml::from_str(source).map_err(|e| SearchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> SearchResult<String> {
        toml::to_string(self).map_err(|e| SearchError::Config(e.to_string()))
    }

    pub fn validate(&self) -> SearchResult<()> {
        if self.tree_node_capacity < 64 {
            return Err(SearchError::Config(format!(
                "tree_node_capacity must be at least 64, got {}",
                self.tree_node_capacity
            )));
        }
        if self.tree_node_capacity >= (u32::MAX / 4) as usize {
            return Err(SearchError::Config(format!(
                "tree_node_capacity is too large: {}",
                self.tree_node_capacity
            )));
        }
        if !(1..=MAX_TT_BITS).contains(&self.tt_bits) {
            return Err(SearchError::Config(format!(
                "tt_bits must be in 1..={MAX_TT_BITS}, got {}",
                self.tt_bits
            )));
        }
        if self.n_threads == 0 {
            return Err(SearchError::NoThreads);
        }
        Ok(())
    }

    /// 根の停止判定で残しておくノード数
    ///
    /// 1 回の展開で増えるノード数（合法手の数）× ワーカー数より大きく取る。
    pub fn tree_node_margin(&self, n_threads: usize) -> usize {
        self.tree_node_capacity / 40 + 64 * n_threads
    }
}
