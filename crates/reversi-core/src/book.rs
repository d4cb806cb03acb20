//! 定跡（opening book）とのインターフェース
//!
//! 探索木の外でノードを保持する側の最小限の契約。ノードはスナップショット（`NodeSnapshot`）で
//! やり取りし、親の統計量は探索木と同じ集約（`NodeStats::update_father`）で計算し直す。
//!
//! - `BookNode`: 定跡のノードが満たすトレイト
//! - `MemoryBook`: メモリ上の実装（永続化はしない）

use std::collections::{HashMap, VecDeque};

use crate::error::ChildError;
use crate::position::Board;
use crate::tree::{NodeSnapshot, NodeStats};

pub trait BookNode {
    fn snapshot(&self) -> NodeSnapshot;

    /// 探索結果で統計量を置き換える（訪問数はそのまま）
    fn update(&mut self, snapshot: &NodeSnapshot);

    fn fathers(&self) -> Vec<Board>;

    fn add_descendants(&mut self, n: u64);
}

#[derive(Debug, Clone)]
pub struct MemoryBookNode {
    snapshot: NodeSnapshot,
    fathers: Vec<Board>,
    children: Vec<Board>,
}

impl MemoryBookNode {
    fn new(snapshot: &NodeSnapshot) -> Self {
        Self {
            snapshot: NodeSnapshot::new(snapshot.stats().enlarge_to_all_evals(), snapshot.n_visited()),
            fathers: Vec::new(),
            children: Vec::new(),
        }
    }

    #[inline]
    pub fn board(&self) -> Board {
        self.snapshot.board()
    }

    #[inline]
    pub fn stats(&self) -> &NodeStats {
        self.snapshot.stats()
    }

    #[inline]
    pub fn n_visited(&self) -> u64 {
        self.snapshot.n_visited()
    }

    #[inline]
    pub fn children(&self) -> &[Board] {
        &self.children
    }

    /// 定跡の中で子を持たない
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl BookNode for MemoryBookNode {
    fn snapshot(&self) -> NodeSnapshot {
        self.snapshot.clone()
    }

    fn update(&mut self, snapshot: &NodeSnapshot) {
        let mut stats = snapshot.stats().enlarge_to_all_evals();
        if !self.children.is_empty() {
            stats.set_internal();
        }
        let n_visited = self.snapshot.n_visited();
        self.snapshot = NodeSnapshot::new(stats, n_visited);
    }

    fn fathers(&self) -> Vec<Board> {
        self.fathers.clone()
    }

    fn add_descendants(&mut self, n: u64) {
        self.snapshot.add_descendants(n);
    }
}

/// メモリ上の定跡
#[derive(Debug, Clone, Default)]
pub struct MemoryBook {
    nodes: HashMap<Board, MemoryBookNode>,
}

impl MemoryBook {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, board: &Board) -> Option<&MemoryBookNode> {
        self.nodes.get(board)
    }

    pub fn get_mut(&mut self, board: &Board) -> Option<&mut MemoryBookNode> {
        self.nodes.get_mut(board)
    }

    /// ノードを追加する。既にあれば統計量を置き換えて親に伝える
    pub fn add(&mut self, snapshot: &NodeSnapshot) {
        let board = snapshot.board();
        match self.nodes.get_mut(&board) {
            Some(node) => {
                node.update(snapshot);
                self.propagate_to_fathers(board);
            }
            None => {
                self.nodes.insert(board, MemoryBookNode::new(snapshot));
            }
        }
    }

    /// 定跡の葉 `father` に子を付ける
    ///
    /// `children` は新しい子と、既にある子の探索結果（訪問数を加える）。全ての合法手（パス含む）が
    /// `children` か定跡のどちらかに無ければならない。親は計算し直し、その先の祖先にも伝える。
    pub fn add_children(&mut self, father: Board, children: &[NodeSnapshot]) -> Result<(), ChildError> {
        // 定跡に無い局面には付けられない
        if !self.nodes.contains_key(&father) {
            return Err(ChildError::NotSuccessor {
                player: father.player(),
                opponent: father.opponent(),
            });
        }
        let successors = father.successors();
        for child in children {
            if !successors.contains(&child.board()) {
                return Err(ChildError::NotSuccessor {
                    player: child.board().player(),
                    opponent: child.board().opponent(),
                });
            }
        }
        let available = successors
            .iter()
            .filter(|board| self.nodes.contains_key(board) || children.iter().any(|c| c.board() == **board))
            .count();
        if available != successors.len() {
            return Err(ChildError::WrongCount {
                expected: successors.len(),
                actual: available,
            });
        }

        for &board in &successors {
            let new_child = children.iter().find(|c| c.board() == board);
            match self.nodes.get_mut(&board) {
                Some(node) => {
                    if let Some(new_child) = new_child {
                        node.add_descendants(new_child.n_visited());
                    }
                    if !node.fathers.contains(&father) {
                        node.fathers.push(father);
                    }
                }
                None => {
                    if let Some(new_child) = new_child {
                        let mut node = MemoryBookNode::new(new_child);
                        node.fathers.push(father);
                        self.nodes.insert(board, node);
                    }
                }
            }
        }
        if let Some(node) = self.nodes.get_mut(&father) {
            node.children = successors;
            node.snapshot.stats_mut().set_internal();
        }
        self.update_father(father);
        self.propagate_to_fathers(father);
        Ok(())
    }

    /// 子から統計量を計算し直す。子が無ければ何もしない
    fn update_father(&mut self, board: Board) -> bool {
        let Some(node) = self.nodes.get(&board) else {
            return false;
        };
        if node.children.is_empty() {
            return false;
        }
        let children: Vec<&NodeStats> = node
            .children
            .iter()
            .filter_map(|child| self.nodes.get(child))
            .map(|child| child.stats())
            .collect();
        if children.len() != node.children.len() {
            log::error!("book node {:#018x} has missing children", board.hash_key());
            return false;
        }
        let mut stats = node.stats().clone();
        stats.update_father(children);
        let changed = &stats != node.stats();
        if let Some(node) = self.nodes.get_mut(&board) {
            *node.snapshot.stats_mut() = stats;
        }
        changed
    }

    /// `board` の祖先を全て計算し直す。変化の無かった親の先には伝えない
    pub fn propagate_to_fathers(&mut self, board: Board) {
        let mut queue: VecDeque<Board> = self.nodes.get(&board).map(|node| node.fathers()).unwrap_or_default().into();
        while let Some(father) = queue.pop_front() {
            if self.update_father(father) {
                if let Some(node) = self.nodes.get(&father) {
                    queue.extend(node.fathers.iter().copied());
                }
            }
        }
    }
}
