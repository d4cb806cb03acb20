//! ノードのスナップショット
//!
//! ロックの外に取り出したノードの統計量と訪問数。根の結果の受け渡しと定跡で使う。

use serde::{Deserialize, Serialize};

use super::stats::NodeStats;
use crate::position::Board;
use crate::types::{Eval, EvalLarge};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    stats: NodeStats,
    n_visited: u64,
}

impl NodeSnapshot {
    pub fn new(stats: NodeStats, n_visited: u64) -> Self {
        Self { stats, n_visited }
    }

    #[inline]
    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    #[inline]
    pub fn stats_mut(&mut self) -> &mut NodeStats {
        &mut self.stats
    }

    #[inline]
    pub fn into_stats(self) -> NodeStats {
        self.stats
    }

    #[inline]
    pub fn n_visited(&self) -> u64 {
        self.n_visited
    }

    pub fn add_descendants(&mut self, n: u64) {
        self.n_visited += n;
    }

    #[inline]
    pub fn board(&self) -> Board {
        self.stats.board()
    }

    #[inline]
    pub fn lower(&self) -> Eval {
        self.stats.lower()
    }

    #[inline]
    pub fn upper(&self) -> Eval {
        self.stats.upper()
    }

    #[inline]
    pub fn leaf_eval(&self) -> EvalLarge {
        self.stats.leaf_eval()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.stats.is_leaf()
    }

    /// 期待値（石数差）
    #[inline]
    pub fn get_eval(&self) -> f64 {
        self.stats.get_eval()
    }

    #[inline]
    pub fn is_solved(&self) -> bool {
        self.stats.lower() == self.stats.upper()
    }
}
