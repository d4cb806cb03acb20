//! 探索全体で追跡する閾値の窓
//!
//! 根の視点の [weak_lower, weak_upper]。深さが奇数のノードでは符号を反転して使う。

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::types::Eval;

/// 全ワーカーで共有する窓
#[derive(Debug)]
pub struct TrackedWindow {
    weak_lower: AtomicI32,
    weak_upper: AtomicI32,
    /// 窓の拡張中に、更新前の窓を持つ内部ノードが子として追加された
    extend_failed: AtomicBool,
}

impl TrackedWindow {
    pub fn new(weak_lower: Eval, weak_upper: Eval) -> Self {
        debug_assert!(weak_lower <= weak_upper);
        Self {
            weak_lower: AtomicI32::new(weak_lower),
            weak_upper: AtomicI32::new(weak_upper),
            extend_failed: AtomicBool::new(false),
        }
    }

    /// 根の視点の窓
    #[inline]
    pub fn get(&self) -> (Eval, Eval) {
        (self.weak_lower.load(Ordering::Acquire), self.weak_upper.load(Ordering::Acquire))
    }

    pub fn set(&self, weak_lower: Eval, weak_upper: Eval) {
        debug_assert!(weak_lower <= weak_upper);
        self.weak_lower.store(weak_lower, Ordering::Release);
        self.weak_upper.store(weak_upper, Ordering::Release);
    }

    /// 深さ `depth` のノードから見た窓
    #[inline]
    pub fn for_depth(&self, depth: u32) -> (Eval, Eval) {
        let (weak_lower, weak_upper) = self.get();
        if depth % 2 == 1 {
            (-weak_upper, -weak_lower)
        } else {
            (weak_lower, weak_upper)
        }
    }

    #[inline]
    pub(crate) fn mark_extend_failed(&self) {
        self.extend_failed.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn clear_extend_failed(&self) {
        self.extend_failed.store(false, Ordering::Release);
    }

    #[inline]
    pub(crate) fn extend_failed(&self) -> bool {
        self.extend_failed.load(Ordering::Acquire)
    }
}
