//! ソルバ・探索の訪問数統計
//!
//! ノードの種類ごとに訪問数を数える。ワーカーごとに持ち、探索の終わりに `merge` で集約する。

use std::ops::{Index, IndexMut};

use serde::Serialize;

/// 訪問ノードの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(usize)]
pub enum StatsKind {
    /// 残り 5 マス以下の専用ソルバ
    Last5 = 0,
    VeryQuick = 1,
    Quick1 = 2,
    Quick2 = 3,
    /// 着手可能数・反証数による並べ替え
    MovesOrDisproof = 4,
    Pass = 5,
    /// 探索木のノード
    TreeNode = 6,
    /// 以下は訪問数の合計に含めない
    NextPositionFail = 7,
    NextPositionSuccess = 8,
    SolvedTooEarly = 9,
}

impl StatsKind {
    pub const COUNT: usize = 10;

    pub const ALL: [StatsKind; Self::COUNT] = [
        StatsKind::Last5,
        StatsKind::VeryQuick,
        StatsKind::Quick1,
        StatsKind::Quick2,
        StatsKind::MovesOrDisproof,
        StatsKind::Pass,
        StatsKind::TreeNode,
        StatsKind::NextPositionFail,
        StatsKind::NextPositionSuccess,
        StatsKind::SolvedTooEarly,
    ];

    /// 訪問数の合計に含める種類か
    #[inline]
    pub const fn is_node(self) -> bool {
        (self as usize) <= StatsKind::TreeNode as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            StatsKind::Last5 => "last_5",
            StatsKind::VeryQuick => "very_quick",
            StatsKind::Quick1 => "quick1",
            StatsKind::Quick2 => "quick2",
            StatsKind::MovesOrDisproof => "moves_or_disproof",
            StatsKind::Pass => "pass",
            StatsKind::TreeNode => "tree_node",
            StatsKind::NextPositionFail => "next_position_fail",
            StatsKind::NextPositionSuccess => "next_position_success",
            StatsKind::SolvedTooEarly => "solved_too_early",
        }
    }
}

/// 種類ごとの訪問数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SolverStats {
    n_visited: [u64; StatsKind::COUNT],
}

impl SolverStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.n_visited = [0; StatsKind::COUNT];
    }

    #[inline]
    pub fn add(&mut self, n: u64, kind: StatsKind) {
        self.n_visited[kind as usize] += n;
    }

    #[inline]
    pub fn get(&self, kind: StatsKind) -> u64 {
        self.n_visited[kind as usize]
    }

    pub fn merge(&mut self, other: &SolverStats) {
        for (total, n) in self.n_visited.iter_mut().zip(other.n_visited) {
            *total += n;
        }
    }

    /// 訪問ノード数の合計（`TreeNode` まで）
    #[inline]
    pub fn total(&self) -> u64 {
        StatsKind::ALL
            .iter()
            .filter(|kind| kind.is_node())
            .map(|&kind| self.get(kind))
            .sum()
    }

    /// (種類, 訪問数) の一覧
    pub fn iter(&self) -> impl Iterator<Item = (StatsKind, u64)> + '_ {
        StatsKind::ALL.iter().map(move |&kind| (kind, self.get(kind)))
    }
}

impl Index<StatsKind> for SolverStats {
    type Output = u64;

    fn index(&self, kind: StatsKind) -> &u64 {
        &self.n_visited[kind as usize]
    }
}

impl IndexMut<StatsKind> for SolverStats {
    fn index_mut(&mut self, kind: StatsKind) -> &mut u64 {
        &mut self.n_visited[kind as usize]
    }
}
