//! 探索カーソル（SearchCursor）
//!
//! 根から葉までの経路と、葉で追う閾値・探索窓 [alpha, beta]。経路上のノードには
//! 作業中のスレッドとして登録し、`finalize` で祖先の統計量を下から計算し直して訪問数を加える。

use super::arena::NodeArena;
use super::node::{NodeId, Selection};
use crate::types::{Eval, LESS_THAN_MIN_EVAL};

/// 根の解けている確率がこれを超えたら、直前と同じ閾値も選んでよい
const MIN_SOLVE_PROBABILITY_FOR_NEW_GOAL: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCursor {
    leaf: NodeId,
    parents: Vec<NodeId>,
    goal: Eval,
    alpha: Eval,
    beta: Eval,
}

impl SearchCursor {
    /// 根から最も価値の高い葉まで降りて確保する
    ///
    /// 他のスレッドとの競合で確保できなければ、登録を戻して None。
    pub fn best_descendant(
        arena: &NodeArena,
        root: NodeId,
        thread_multiplier: f64,
        last_goal: Eval,
    ) -> Option<Self> {
        let mut cursor = Self::at_root(arena, root, last_goal)?;
        loop {
            let node = arena.node(cursor.leaf);
            match node.best_child(cursor.goal, thread_multiplier, arena) {
                Selection::Child(child) => cursor.to_child(arena, child),
                Selection::Leaf => {
                    if node.try_lock_leaf(cursor.alpha, cursor.beta) {
                        return Some(cursor);
                    }
                    cursor.release(arena);
                    return None;
                }
                Selection::Blocked => {
                    // 根以外で止まったなら、上下限が子に追いついていない
                    if cursor.leaf != root {
                        node.update_father(arena);
                        node.update_fathers(arena);
                    }
                    cursor.release(arena);
                    return None;
                }
            }
        }
    }

    /// 指定した経路の葉を閾値 `goal` で確保する
    pub fn from_path(arena: &NodeArena, path: &[NodeId], goal: Eval) -> Option<Self> {
        let (&root, rest) = path.split_first()?;
        let mut cursor = arena.node(root).with_stats(|stats| {
            let (alpha, beta) = stats.narrow_alpha_beta(goal, stats.weak_lower(), stats.weak_upper());
            SearchCursor {
                leaf: root,
                parents: Vec::new(),
                goal,
                alpha,
                beta,
            }
        });
        for &child in rest {
            cursor.to_child(arena, child);
        }
        if arena.node(cursor.leaf).try_lock_leaf(cursor.alpha, cursor.beta) {
            Some(cursor)
        } else {
            cursor.release(arena);
            None
        }
    }

    fn at_root(arena: &NodeArena, root: NodeId, last_goal: Eval) -> Option<Self> {
        arena.node(root).with_stats(|stats| {
            let last_goal = if stats.solve_probability(-63, 63) > MIN_SOLVE_PROBABILITY_FOR_NEW_GOAL {
                LESS_THAN_MIN_EVAL
            } else {
                last_goal
            };
            let goal = stats.next_position_eval_goal(0.0, 1.0, last_goal);
            if goal == LESS_THAN_MIN_EVAL {
                return None;
            }
            let (alpha, beta) = stats.narrow_alpha_beta(goal, stats.weak_lower(), stats.weak_upper());
            debug_assert!(alpha <= goal && goal <= beta);
            Some(SearchCursor {
                leaf: root,
                parents: Vec::new(),
                goal,
                alpha,
                beta,
            })
        })
    }

    fn to_child(&mut self, arena: &NodeArena, child: NodeId) {
        arena.node(self.leaf).increase_threads();
        self.parents.push(self.leaf);
        self.leaf = child;
        self.goal = -self.goal;
        (self.alpha, self.beta) = (-self.beta, -self.alpha);
        let (alpha, beta) =
            arena.node(child).with_stats(|stats| stats.narrow_alpha_beta(self.goal, self.alpha, self.beta));
        self.alpha = alpha;
        self.beta = beta;
    }

    /// 経路上の登録を戻す（葉を確保できなかったとき）
    fn release(&self, arena: &NodeArena) {
        for &parent in &self.parents {
            arena.node(parent).decrease_threads();
        }
    }

    /// 葉の処理を終える
    ///
    /// 葉の祖先を全て（経路の外の親も）計算し直し、葉と経路上の祖先に `n_visited` を加えて
    /// 確保を解く。
    pub fn finalize(self, arena: &NodeArena, n_visited: u64) {
        let leaf = arena.node(self.leaf);
        leaf.update_fathers(arena);
        leaf.add_descendants(n_visited);
        leaf.decrease_threads();
        for &parent in &self.parents {
            let parent = arena.node(parent);
            parent.add_descendants(n_visited);
            parent.decrease_threads();
        }
    }

    #[inline]
    pub fn leaf(&self) -> NodeId {
        self.leaf
    }

    #[inline]
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    /// 葉の視点の閾値
    #[inline]
    pub fn goal(&self) -> Eval {
        self.goal
    }

    #[inline]
    pub fn alpha(&self) -> Eval {
        self.alpha
    }

    #[inline]
    pub fn beta(&self) -> Eval {
        self.beta
    }
}
