//! ノードのアリーナと転置索引
//!
//! - 固定長のノード配列。ノード番号を atomic に払い出す
//! - 局面 + 深さ + 評価器の番号をキーとする閉じたハッシュ索引（2 × 容量、線形探索）
//! - エポックによるリセット（`&mut self` のときだけ）
//!
//! 索引の各スロットは `first_valid_index + ノード番号` を持つ。この範囲外の値は空きとみなすので、
//! リセット時に索引を消す必要はない。

use std::sync::atomic::{AtomicU32, Ordering};

use super::node::{NodeId, TreeNode};
use crate::position::{hash_board, Board};

pub struct NodeArena {
    nodes: Box<[TreeNode]>,
    index: Box<[AtomicU32]>,
    len: AtomicU32,
    first_valid_index: u32,
}

impl NodeArena {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0 && capacity < (u32::MAX / 4) as usize);
        let nodes = (0..capacity).map(|_| TreeNode::empty()).collect();
        let index = (0..2 * capacity).map(|_| AtomicU32::new(0)).collect();
        Self {
            nodes,
            index,
            len: AtomicU32::new(0),
            first_valid_index: 1,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// 使用中のノード数
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.index()]
    }

    #[inline]
    fn is_valid(&self, value: u32) -> bool {
        value >= self.first_valid_index && value - self.first_valid_index < self.len.load(Ordering::Acquire)
    }

    #[inline]
    fn slot(&self, board: Board, depth: u32, evaluator: u8) -> usize {
        let tag = ((depth << 8) | evaluator as u32) as u64;
        let hash = hash_board(board.player(), board.opponent()) ^ tag.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        (hash % self.index.len() as u64) as usize
    }

    /// 登録済みのノード
    pub fn get(&self, board: Board, depth: u32, evaluator: u8) -> Option<NodeId> {
        let mut slot = self.slot(board, depth, evaluator);
        loop {
            let value = self.index[slot].load(Ordering::Acquire);
            if !self.is_valid(value) {
                return None;
            }
            let id = NodeId::new(value - self.first_valid_index);
            if self.node(id).matches(board, depth, evaluator) {
                return Some(id);
            }
            slot = (slot + 1) % self.index.len();
        }
    }

    /// ノードを取得するか新しく作る。2 つ目の値は新しく作ったかどうか
    ///
    /// 容量を使い切っていれば None。同じ局面を複数のスレッドが同時に追加した場合は
    /// 重複したノードができうる（どちらも正しいノードとして扱える）。
    pub fn add(&self, board: Board, depth: u32, evaluator: u8) -> Option<(NodeId, bool)> {
        if let Some(id) = self.get(board, depth, evaluator) {
            return Some((id, false));
        }
        self.push(board, depth, evaluator).map(|id| (id, true))
    }

    /// 登録済みかどうかに関わらず新しいノードを作る。容量を使い切っていれば None
    pub fn push(&self, board: Board, depth: u32, evaluator: u8) -> Option<NodeId> {
        let capacity = self.capacity() as u32;
        let index = self
            .len
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < capacity).then_some(n + 1))
            .ok()?;
        let id = NodeId::new(index);
        self.node(id).reset(board, depth, evaluator);
        self.insert(board, depth, evaluator, index);
        Some(id)
    }

    /// 使用中のノード
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> + '_ {
        self.nodes[..self.len()]
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId::new(index as u32), node))
    }

    /// 索引に挿入する。既存の値は 1 つ後ろのスロットへ押し出す
    fn insert(&self, board: Board, depth: u32, evaluator: u8, index: u32) {
        let mut slot = self.slot(board, depth, evaluator);
        let mut value = self.first_valid_index + index;
        while self.is_valid(value) {
            value = self.index[slot].swap(value, Ordering::AcqRel);
            slot = (slot + 1) % self.index.len();
        }
    }

    /// 全ノードを捨てる
    pub fn reset(&mut self) {
        let len = *self.len.get_mut();
        self.first_valid_index += len;
        if self.first_valid_index >= u32::MAX - self.capacity() as u32 - 1 {
            for slot in self.index.iter_mut() {
                *slot.get_mut() = 0;
            }
            self.first_valid_index = 1;
        }
        *self.len.get_mut() = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let arena = NodeArena::new(16);
        let board = Board::start();
        let (id, added) = arena.add(board, 0, 0).unwrap();
        assert!(added);
        assert_eq!(arena.add(board, 0, 0), Some((id, false)));
        assert_eq!(arena.get(board, 0, 0), Some(id));
        // 深さと評価器もキーに含む
        assert_eq!(arena.get(board, 1, 0), None);
        assert_eq!(arena.get(board, 0, 1), None);
        assert_eq!(arena.node(id).board(), board);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_capacity() {
        let arena = NodeArena::new(4);
        let board = Board::start();
        let successors = board.successors();
        for &child in &successors {
            assert!(arena.add(child, 1, 0).unwrap().1);
        }
        assert!(arena.add(board, 0, 0).is_none());
        for &child in &successors {
            assert!(arena.get(child, 1, 0).is_some());
        }
    }

    #[test]
    fn test_reset_invalidates_index() {
        let mut arena = NodeArena::new(8);
        let board = Board::start();
        arena.add(board, 0, 0).unwrap();
        arena.reset();
        assert!(arena.is_empty());
        assert_eq!(arena.get(board, 0, 0), None);
        let (id, added) = arena.add(board.successors()[0], 1, 0).unwrap();
        assert!(added);
        assert_eq!(id.index(), 0);
        assert_eq!(arena.get(board, 0, 0), None);
    }

    #[test]
    fn test_push_creates_duplicates() {
        let arena = NodeArena::new(8);
        let board = Board::start();
        let a = arena.push(board, 0, 0).unwrap();
        let b = arena.push(board, 0, 0).unwrap();
        assert_ne!(a, b);
        assert!(arena.get(board, 0, 0).is_some());
        let ids: Vec<NodeId> = arena.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_full_arena_lookup() {
        // 索引 4 スロットに 2 ノード
        let arena = NodeArena::new(2);
        let a = Board::start();
        let b = a.successors()[0];
        let (id_a, _) = arena.add(a, 0, 0).unwrap();
        let (id_b, _) = arena.add(b, 1, 0).unwrap();
        assert_eq!(arena.get(a, 0, 0), Some(id_a));
        assert_eq!(arena.get(b, 1, 0), Some(id_b));
    }
}
