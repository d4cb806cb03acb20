//! 探索木のノード（TreeNode）
//!
//! 統計量 `NodeStats` と子・親へのリンクを 1 つの Mutex で守る。訪問数と作業中のスレッド数は
//! ロックの外の atomic で持つ。局面・深さ・評価器の番号（ノードのキー）は生成時に書き、
//! 索引からロックなしで比較できるように atomic に置く。
//!
//! ロックは常に親 → 子の順に取る。子の深さは親 + 1 なので順序は循環しない。
//! 集約中は子のロックを 1 つずつ取って離す。

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::arena::NodeArena;
use super::snapshot::NodeSnapshot;
use super::stats::{board_order, NodeStats};
use super::window::TrackedWindow;
use crate::error::ChildError;
use crate::position::Board;
use crate::types::{Eval, EvalLarge};

/// アリーナ内のノード番号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub(crate) const fn new(index: u32) -> Self {
        NodeId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// 子のリスト。オセロの合法手は大抵 16 手以内
pub type Children = SmallVec<[NodeId; 16]>;
type Fathers = SmallVec<[NodeId; 4]>;

/// `best_child` の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// このノード自身が葉
    Leaf,
    /// 次に降りる子
    Child(NodeId),
    /// 他のスレッドが先に解いたか、窓が変わった
    Blocked,
}

struct NodeState {
    stats: NodeStats,
    children: Children,
    fathers: Fathers,
}

impl NodeState {
    fn new(stats: NodeStats) -> Self {
        Self {
            stats,
            children: Children::new(),
            fathers: Fathers::new(),
        }
    }
}

/// ロック中の統計量を子から計算し直す
fn recompute(stats: &mut NodeStats, children: &[NodeId], arena: &NodeArena) {
    let mut new_upper = stats.begin_update_father();
    for &child in children {
        let child = arena.node(child).state.lock();
        stats.update_with_child(&child.stats, &mut new_upper);
    }
    stats.finish_update_father(new_upper);
}

pub struct TreeNode {
    player: AtomicU64,
    opponent: AtomicU64,
    /// (depth << 8) | evaluator
    tag: AtomicU32,
    state: Mutex<NodeState>,
    descendants: AtomicU64,
    threads: AtomicU32,
}

impl TreeNode {
    pub(crate) fn empty() -> Self {
        Self {
            player: AtomicU64::new(0),
            opponent: AtomicU64::new(0),
            tag: AtomicU32::new(0),
            state: Mutex::new(NodeState::new(NodeStats::new(Board::from_masks(0, 0), 0, 0))),
            descendants: AtomicU64::new(0),
            threads: AtomicU32::new(0),
        }
    }

    /// 未評価の葉として初期化する。索引に載せる前に呼ぶ
    pub(crate) fn reset(&self, board: Board, depth: u32, evaluator: u8) {
        *self.state.lock() = NodeState::new(NodeStats::new(board, depth, evaluator));
        self.player.store(board.player(), Ordering::Relaxed);
        self.opponent.store(board.opponent(), Ordering::Relaxed);
        self.tag.store((depth << 8) | evaluator as u32, Ordering::Relaxed);
        self.descendants.store(0, Ordering::Relaxed);
        self.threads.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub fn board(&self) -> Board {
        Board::from_masks(self.player.load(Ordering::Relaxed), self.opponent.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.tag.load(Ordering::Relaxed) >> 8
    }

    #[inline]
    pub fn evaluator(&self) -> u8 {
        (self.tag.load(Ordering::Relaxed) & 0xFF) as u8
    }

    #[inline]
    pub(crate) fn matches(&self, board: Board, depth: u32, evaluator: u8) -> bool {
        self.player.load(Ordering::Relaxed) == board.player()
            && self.opponent.load(Ordering::Relaxed) == board.opponent()
            && self.tag.load(Ordering::Relaxed) == ((depth << 8) | evaluator as u32)
    }

    /// このノード以下の訪問数
    #[inline]
    pub fn n_visited(&self) -> u64 {
        self.descendants.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn add_descendants(&self, n: u64) {
        self.descendants.fetch_add(n, Ordering::Relaxed);
    }

    /// このノードを通って作業中のスレッド数
    #[inline]
    pub fn threads(&self) -> u32 {
        self.threads.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn increase_threads(&self) {
        self.threads.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn decrease_threads(&self) {
        let previous = self.threads.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0);
    }

    /// ロックして統計量を読む
    pub fn with_stats<R>(&self, f: impl FnOnce(&NodeStats) -> R) -> R {
        f(&self.state.lock().stats)
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        let stats = self.state.lock().stats.clone();
        NodeSnapshot::new(stats, self.n_visited())
    }

    pub fn children(&self) -> Children {
        self.state.lock().children.clone()
    }

    pub fn fathers(&self) -> Vec<NodeId> {
        self.state.lock().fathers.to_vec()
    }

    pub fn is_leaf(&self) -> bool {
        self.state.lock().stats.is_leaf()
    }

    pub fn has_leaf_eval(&self) -> bool {
        self.state.lock().stats.has_leaf_eval()
    }

    /// 葉の初期評価を設定する（既に評価済みなら何もしない）
    pub fn set_leaf_eval(&self, leaf_eval: EvalLarge, eval_depth: u32) {
        self.state.lock().stats.set_leaf_eval(leaf_eval, eval_depth);
    }

    pub fn update_leaf_weak_lower_upper(&self, weak_lower: Eval, weak_upper: Eval) {
        self.state.lock().stats.update_leaf_weak_lower_upper(weak_lower, weak_upper);
    }

    /// 未解決の葉を確保する（作業中スレッド数 0 → 1）
    pub fn try_lock_leaf(&self, lower: Eval, upper: Eval) -> bool {
        let state = self.state.lock();
        if !state.stats.is_leaf() || state.stats.is_solved(lower, upper, false) {
            return false;
        }
        let locked = self.threads.compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire).is_ok();
        debug_assert!(locked || self.threads() >= 1);
        locked
    }

    /// 閾値 `goal` で次に降りる子
    pub fn best_child(&self, goal: Eval, thread_multiplier: f64, arena: &NodeArena) -> Selection {
        let state = self.state.lock();
        let stats = &state.stats;
        if stats.is_leaf() {
            return Selection::Leaf;
        }
        let (weak_lower, weak_upper) = stats.raw_weak_lower_upper();
        if goal < weak_lower || goal > weak_upper || stats.is_solved_at(goal) {
            return Selection::Blocked;
        }
        let child_goal = -goal;
        let mut best_value = -f64::MAX;
        let mut best = None;
        for &id in state.children.iter() {
            let child = arena.node(id);
            let child_state = child.state.lock();
            if !child_state.stats.is_selectable(child_goal) {
                continue;
            }
            let value = child_state.stats.child_value(stats, child_goal, thread_multiplier, child.threads());
            if value > best_value {
                best_value = value;
                best = Some(id);
            }
        }
        best.map_or(Selection::Blocked, Selection::Child)
    }

    /// 厳密解の上下限を反映し、探索全体の窓で統計量を計算し直す
    pub fn set_solved(&self, lower: EvalLarge, upper: EvalLarge, window: &TrackedWindow) {
        let mut state = self.state.lock();
        let (weak_lower, weak_upper) = window.for_depth(self.depth());
        state.stats.set_solved(lower, upper, weak_lower, weak_upper);
    }

    /// 子の集合が合法手と一致するか
    fn check_children(&self, children: &[NodeId], arena: &NodeArena) -> Result<(), ChildError> {
        let mut expected = self.board().successors();
        if children.len() != expected.len() {
            return Err(ChildError::WrongCount {
                expected: expected.len(),
                actual: children.len(),
            });
        }
        let depth = self.depth() + 1;
        let mut seen: SmallVec<[Board; 16]> = SmallVec::new();
        for &id in children {
            let child = arena.node(id);
            if child.depth() != depth {
                return Err(ChildError::WrongDepth {
                    expected: depth,
                    actual: child.depth(),
                });
            }
            let board = child.board();
            if let Some(position) = expected.iter().position(|&b| b == board) {
                expected.swap_remove(position);
                seen.push(board);
            } else if seen.contains(&board) {
                return Err(ChildError::Duplicate {
                    player: board.player(),
                    opponent: board.opponent(),
                });
            } else {
                return Err(ChildError::NotSuccessor {
                    player: board.player(),
                    opponent: board.opponent(),
                });
            }
        }
        Ok(())
    }

    /// 子を付けて内部ノードにする
    ///
    /// 葉の子には探索全体の窓を設定する。更新前の窓を持つ内部ノードの子があれば、
    /// 窓の拡張をやり直すように印を付ける。子の集合が不正なら何も変えずにエラーを返す。
    pub fn set_children(
        &self,
        id: NodeId,
        children: &[NodeId],
        arena: &NodeArena,
        window: &TrackedWindow,
    ) -> Result<(), ChildError> {
        self.check_children(children, arena)?;
        let mut state = self.state.lock();
        debug_assert!(state.stats.is_leaf());
        let (weak_lower, weak_upper) = window.for_depth(self.depth());
        for &child_id in children {
            let mut child = arena.node(child_id).state.lock();
            if child.stats.is_leaf() {
                child.stats.update_leaf_weak_lower_upper(-weak_upper, -weak_lower);
            } else if !child.stats.weak_lower_upper_contains(-weak_upper, -weak_lower) {
                window.mark_extend_failed();
            }
            child.fathers.push(id);
        }
        let NodeState { stats, children: own_children, .. } = &mut *state;
        own_children.extend_from_slice(children);
        // `NodeStats::update_father` と同じ順に畳み込む
        own_children.sort_unstable_by_key(|&child| board_order(arena.node(child).board()));
        stats.set_internal();
        recompute(stats, own_children, arena);
        Ok(())
    }

    /// 子から統計量を計算し直す
    pub fn update_father(&self, arena: &NodeArena) {
        let mut state = self.state.lock();
        if state.stats.is_leaf() {
            return;
        }
        let NodeState { stats, children, .. } = &mut *state;
        recompute(stats, children, arena);
    }

    /// 祖先を全て、葉に近い段から計算し直す
    ///
    /// 転置で共有された子の親は探索経路に無くても古い上下限を持つので、親のリンクを全て辿る。
    /// 親の深さは常に子 - 1 なので、段ごとに重複を除いて進める。
    pub fn update_fathers(&self, arena: &NodeArena) {
        let mut level = self.fathers();
        while !level.is_empty() {
            level.sort_unstable_by_key(|id| id.index());
            level.dedup();
            let mut next = Vec::new();
            for &id in &level {
                let father = arena.node(id);
                father.update_father(arena);
                next.extend(father.fathers());
            }
            level = next;
        }
    }

    /// 窓を [weak_lower, weak_upper] に広げる。子から先に広げる
    pub fn extend_eval(&self, weak_lower: Eval, weak_upper: Eval, arena: &NodeArena, window: &TrackedWindow) {
        loop {
            window.clear_extend_failed();
            self.extend_eval_internal(weak_lower, weak_upper, arena);
            if !window.extend_failed() {
                break;
            }
            log::debug!("extend window retry [{weak_lower}, {weak_upper}]");
        }
    }

    fn extend_eval_internal(&self, weak_lower: Eval, weak_upper: Eval, arena: &NodeArena) {
        let children = {
            let mut state = self.state.lock();
            if state.stats.is_leaf() {
                state.stats.update_leaf_weak_lower_upper(weak_lower, weak_upper);
                return;
            }
            // 新しい閾値が解決済みか、端の確率が飽和していれば子は見なくてよい
            if state.stats.widen_settled_window(weak_lower, weak_upper) {
                return;
            }
            state.children.clone()
        };
        for &child in children.iter() {
            arena.node(child).extend_eval_internal(-weak_upper, -weak_lower, arena);
        }
        let mut state = self.state.lock();
        let NodeState { stats, children, .. } = &mut *state;
        stats.set_weak_lower_upper(weak_lower, weak_upper);
        recompute(stats, children, arena);
    }
}
