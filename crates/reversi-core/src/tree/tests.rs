//! ノード・アリーナ・カーソルを組み合わせたテスト

use super::*;
use crate::error::ChildError;
use crate::estimators::PROB_STEP;
use crate::position::Board;
use crate::types::{eval_to_large, EvalLarge, LESS_THAN_MIN_EVAL};

struct Fixture {
    arena: NodeArena,
    window: TrackedWindow,
    root: NodeId,
}

impl Fixture {
    fn new(weak_lower: i32, weak_upper: i32) -> Self {
        let arena = NodeArena::new(256);
        let window = TrackedWindow::new(weak_lower, weak_upper);
        let (root, _) = arena.add(Board::start(), 0, 0).unwrap();
        let node = arena.node(root);
        node.set_leaf_eval(0, 1);
        node.update_leaf_weak_lower_upper(weak_lower, weak_upper);
        Self { arena, window, root }
    }

    /// 根の子を初期評価 `evals` で作って付ける
    fn expand_root(&self, evals: &[EvalLarge]) -> Vec<NodeId> {
        let cursor = SearchCursor::best_descendant(&self.arena, self.root, 1.0, LESS_THAN_MIN_EVAL).unwrap();
        assert_eq!(cursor.leaf(), self.root);
        let children = self.add_children(self.root, evals);
        self.arena.node(self.root).set_children(self.root, &children, &self.arena, &self.window).unwrap();
        cursor.finalize(&self.arena, 1);
        children
    }

    fn add_children(&self, father: NodeId, evals: &[EvalLarge]) -> Vec<NodeId> {
        let node = self.arena.node(father);
        let successors = node.board().successors();
        assert_eq!(successors.len(), evals.len());
        successors
            .iter()
            .zip(evals)
            .map(|(&board, &eval)| {
                let (id, added) = self.arena.add(board, node.depth() + 1, 0).unwrap();
                assert!(added);
                self.arena.node(id).set_leaf_eval(eval, 2);
                id
            })
            .collect()
    }
}

fn assert_solved_invariant(stats: &NodeStats) {
    for goal in stats.goals() {
        let solved = goal < stats.lower() || goal > stats.upper();
        assert_eq!(stats.is_solved_at(goal), solved, "goal {goal}");
    }
}

#[test]
fn test_father_equals_fold_of_children() {
    let fixture = Fixture::new(-63, 63);
    let children = fixture.expand_root(&[-40, 0, 24, 64]);

    let child_stats: Vec<NodeStats> =
        children.iter().map(|&id| fixture.arena.node(id).snapshot().into_stats()).collect();
    for stats in &child_stats {
        assert_eq!(stats.raw_weak_lower_upper(), (-63, 63));
        assert_solved_invariant(stats);
    }
    let mut expected = NodeStats::new(Board::start(), 0, 0);
    expected.set_leaf_eval(0, 1);
    expected.update_leaf_weak_lower_upper(-63, 63);
    expected.set_internal();
    expected.update_father(child_stats.iter());

    let root = fixture.arena.node(fixture.root).snapshot();
    assert_eq!(root.stats(), &expected);
    assert_eq!(root.leaf_eval(), 40);
    assert_eq!(root.n_visited(), 1);
    assert!(!root.is_leaf());
    assert_solved_invariant(root.stats());
    for &child in &children {
        assert_eq!(fixture.arena.node(child).fathers(), vec![fixture.root]);
    }
}

#[test]
fn test_claimed_leaf_cannot_be_claimed_twice() {
    let fixture = Fixture::new(-63, 63);
    let cursor = SearchCursor::best_descendant(&fixture.arena, fixture.root, 1.0, LESS_THAN_MIN_EVAL).unwrap();
    assert_eq!(fixture.arena.node(fixture.root).threads(), 1);
    assert!(SearchCursor::best_descendant(&fixture.arena, fixture.root, 1.0, LESS_THAN_MIN_EVAL).is_none());
    cursor.finalize(&fixture.arena, 7);
    assert_eq!(fixture.arena.node(fixture.root).threads(), 0);
    assert_eq!(fixture.arena.node(fixture.root).n_visited(), 7);
}

#[test]
fn test_cursor_credits_path() {
    let fixture = Fixture::new(-63, 63);
    let children = fixture.expand_root(&[-40, 0, 24, 64]);
    let cursor = SearchCursor::best_descendant(&fixture.arena, fixture.root, 1.0, LESS_THAN_MIN_EVAL).unwrap();
    assert_eq!(cursor.parents(), &[fixture.root]);
    assert!(children.contains(&cursor.leaf()));
    assert!(cursor.alpha() <= cursor.goal() && cursor.goal() <= cursor.beta());
    assert_eq!(fixture.arena.node(fixture.root).threads(), 1);
    assert_eq!(fixture.arena.node(cursor.leaf()).threads(), 1);

    let leaf = cursor.leaf();
    cursor.finalize(&fixture.arena, 3);
    assert_eq!(fixture.arena.node(fixture.root).n_visited(), 4);
    assert_eq!(fixture.arena.node(leaf).n_visited(), 3);
    assert_eq!(fixture.arena.node(fixture.root).threads(), 0);
    assert_eq!(fixture.arena.node(leaf).threads(), 0);
}

#[test]
fn test_set_children_errors() {
    let fixture = Fixture::new(-63, 63);
    let board = Board::start();
    let successors = board.successors();
    let ids: Vec<NodeId> = successors
        .iter()
        .map(|&b| {
            let (id, _) = fixture.arena.add(b, 1, 0).unwrap();
            fixture.arena.node(id).set_leaf_eval(0, 1);
            id
        })
        .collect();
    let root = fixture.arena.node(fixture.root);

    let result = root.set_children(fixture.root, &ids[..3], &fixture.arena, &fixture.window);
    assert_eq!(result, Err(ChildError::WrongCount { expected: 4, actual: 3 }));

    let (deep, _) = fixture.arena.add(successors[3], 2, 0).unwrap();
    let result = root.set_children(fixture.root, &[ids[0], ids[1], ids[2], deep], &fixture.arena, &fixture.window);
    assert_eq!(result, Err(ChildError::WrongDepth { expected: 1, actual: 2 }));

    let result = root.set_children(fixture.root, &[ids[0], ids[0], ids[1], ids[2]], &fixture.arena, &fixture.window);
    assert!(matches!(result, Err(ChildError::Duplicate { .. })));

    let (stranger, _) = fixture.arena.add(successors[0].successors()[0], 1, 0).unwrap();
    let result = root.set_children(fixture.root, &[ids[0], ids[1], ids[2], stranger], &fixture.arena, &fixture.window);
    assert!(matches!(result, Err(ChildError::NotSuccessor { .. })));

    // 失敗しても葉のまま
    assert!(root.is_leaf());
    assert!(root.set_children(fixture.root, &ids, &fixture.arena, &fixture.window).is_ok());
    assert!(!root.is_leaf());
}

#[test]
fn test_extend_eval_reaches_children() {
    let fixture = Fixture::new(-5, 5);
    let children = fixture.expand_root(&[-40, 0, 24, 64]);
    fixture.window.set(-9, 7);
    fixture.arena.node(fixture.root).extend_eval(-9, 7, &fixture.arena, &fixture.window);

    let root = fixture.arena.node(fixture.root).snapshot();
    assert_eq!(root.stats().raw_weak_lower_upper(), (-9, 7));
    assert_solved_invariant(root.stats());
    for &child in &children {
        let stats = fixture.arena.node(child).snapshot().into_stats();
        assert_eq!(stats.raw_weak_lower_upper(), (-7, 9));
        assert_solved_invariant(&stats);
    }

    // 子から計算し直した値と一致する
    let child_stats: Vec<NodeStats> =
        children.iter().map(|&id| fixture.arena.node(id).snapshot().into_stats()).collect();
    let mut expected = root.stats().clone();
    expected.update_father(child_stats.iter());
    assert_eq!(root.stats(), &expected);
}

#[test]
fn test_extend_eval_on_solved_boundary_skips_children() {
    let fixture = Fixture::new(-5, 5);
    let children = fixture.expand_root(&[0, 0, 0, 0]);
    for &child in &children {
        fixture.arena.node(child).set_solved(eval_to_large(-2), eval_to_large(-2), &fixture.window);
    }
    fixture.arena.node(fixture.root).update_father(&fixture.arena);
    let before = fixture.arena.node(fixture.root).snapshot();
    assert_eq!((before.lower(), before.upper()), (2, 2));

    fixture.window.set(-7, 7);
    fixture.arena.node(fixture.root).extend_eval(-7, 7, &fixture.arena, &fixture.window);
    let after = fixture.arena.node(fixture.root).snapshot();
    assert_eq!(after.stats().raw_weak_lower_upper(), (-7, 7));
    assert_eq!((after.lower(), after.upper()), (2, 2));
    for &child in &children {
        let stats = fixture.arena.node(child).snapshot().into_stats();
        assert_eq!(stats.raw_weak_lower_upper(), (-5, 5));
    }
}

#[test]
fn test_set_solved_uses_window_parity() {
    let fixture = Fixture::new(-3, 7);
    let children = fixture.expand_root(&[0, 0, 0, 0]);
    let child = fixture.arena.node(children[0]);
    assert_eq!(child.snapshot().stats().raw_weak_lower_upper(), (-7, 3));
    child.set_solved(eval_to_large(-64), eval_to_large(0), &fixture.window);
    let stats = child.snapshot().into_stats();
    assert_eq!(stats.upper(), 0);
    assert_eq!(stats.raw_weak_lower_upper(), (-7, 3));
    assert_solved_invariant(&stats);
}

#[test]
fn test_best_child_blocked_when_goal_solved() {
    let fixture = Fixture::new(-5, 5);
    let children = fixture.expand_root(&[0, 0, 0, 0]);
    for &child in &children {
        fixture.arena.node(child).set_solved(eval_to_large(-2), eval_to_large(-2), &fixture.window);
    }
    fixture.arena.node(fixture.root).update_father(&fixture.arena);
    let root = fixture.arena.node(fixture.root);
    assert_eq!(root.best_child(1, 1.0, &fixture.arena), Selection::Blocked);
    assert!(SearchCursor::best_descendant(&fixture.arena, fixture.root, 1.0, LESS_THAN_MIN_EVAL).is_none());
    assert_eq!(root.threads(), 0);
}

#[test]
fn test_recompute_from_children_is_idempotent() {
    let fixture = Fixture::new(-63, 63);
    fixture.expand_root(&[-40, 0, 24, 64]);
    let root = fixture.arena.node(fixture.root);
    let before = root.snapshot();
    root.update_father(&fixture.arena);
    let once = root.snapshot();
    root.update_father(&fixture.arena);
    assert_eq!(once, before);
    assert_eq!(root.snapshot(), once);
    assert_solved_invariant(once.stats());
}

#[test]
fn test_extend_eval_on_saturated_boundary_skips_children() {
    // 子から見て -64 なので、根の確率は窓の下端で 1
    let fixture = Fixture::new(-5, 5);
    let children = fixture.expand_root(&[-512, -512, -512, -512]);
    let root = fixture.arena.node(fixture.root);
    let before = root.snapshot();
    assert_eq!((before.lower(), before.upper()), (-64, 64));
    assert_eq!(before.stats().estimate(-5).prob_greater_equal(), PROB_STEP);

    fixture.window.set(-9, 5);
    root.extend_eval(-9, 5, &fixture.arena, &fixture.window);
    let after = root.snapshot();
    assert_eq!(after.stats().raw_weak_lower_upper(), (-9, 5));
    assert_eq!(after.stats().estimate(-9).prob_greater_equal(), PROB_STEP);
    assert_eq!(after.stats().estimate(-7).prob_greater_equal(), PROB_STEP);
    assert_eq!(after.stats().estimate(1), before.stats().estimate(1));
    assert_solved_invariant(after.stats());
    for &child in &children {
        let stats = fixture.arena.node(child).snapshot().into_stats();
        assert_eq!(stats.raw_weak_lower_upper(), (-5, 5));
    }
}

#[test]
fn test_extend_eval_on_saturated_upper_boundary_skips_children() {
    // 子から見て +64 なので、根の確率は窓の上端で 0
    let fixture = Fixture::new(-5, 5);
    let children = fixture.expand_root(&[512, 512, 512, 512]);
    let root = fixture.arena.node(fixture.root);
    assert_eq!(root.snapshot().stats().estimate(5).prob_greater_equal(), 0);

    fixture.window.set(-5, 9);
    root.extend_eval(-5, 9, &fixture.arena, &fixture.window);
    let after = root.snapshot();
    assert_eq!(after.stats().raw_weak_lower_upper(), (-5, 9));
    assert_eq!(after.stats().estimate(9).prob_greater_equal(), 0);
    for &child in &children {
        let stats = fixture.arena.node(child).snapshot().into_stats();
        assert_eq!(stats.raw_weak_lower_upper(), (-5, 5));
    }

    // 確率 0 の端から下には決まらないので、子まで広げる
    fixture.window.set(-9, 9);
    root.extend_eval(-9, 9, &fixture.arena, &fixture.window);
    for &child in &children {
        let stats = fixture.arena.node(child).snapshot().into_stats();
        assert_eq!(stats.raw_weak_lower_upper(), (-9, 9));
    }
}

/// `father` の子を全て（既にあれば再利用して）作って付ける
fn expand(fixture: &Fixture, father: NodeId) -> Vec<NodeId> {
    let node = fixture.arena.node(father);
    let children: Vec<NodeId> = node
        .board()
        .successors()
        .into_iter()
        .map(|board| {
            let (id, _) = fixture.arena.add(board, node.depth() + 1, 0).unwrap();
            fixture.arena.node(id).set_leaf_eval(0, 2);
            id
        })
        .collect();
    node.set_children(father, &children, &fixture.arena, &fixture.window).unwrap();
    children
}

/// 3 手目で 2 つの経路から到達する局面の経路（根を除く）
fn transposed_paths() -> ([Board; 3], [Board; 3]) {
    for a in Board::start().successors() {
        for b in a.successors() {
            for c in b.successors() {
                for other_a in Board::start().successors() {
                    for other_b in other_a.successors() {
                        if other_b != b && other_b.successors().contains(&c) {
                            return ([a, b, c], [other_a, other_b, c]);
                        }
                    }
                }
            }
        }
    }
    panic!("no transposition within 3 plies");
}

fn find_child(fixture: &Fixture, father: NodeId, board: Board) -> NodeId {
    let depth = fixture.arena.node(father).depth() + 1;
    fixture.arena.get(board, depth, 0).unwrap()
}

#[test]
fn test_finalize_updates_fathers_off_the_path() {
    let fixture = Fixture::new(-63, 63);
    let (path, other) = transposed_paths();
    expand(&fixture, fixture.root);
    let a = find_child(&fixture, fixture.root, path[0]);
    let other_a = find_child(&fixture, fixture.root, other[0]);
    expand(&fixture, a);
    if other_a != a {
        expand(&fixture, other_a);
    }
    let b = find_child(&fixture, a, path[1]);
    let other_b = find_child(&fixture, other_a, other[1]);
    expand(&fixture, b);
    expand(&fixture, other_b);
    let c = find_child(&fixture, b, path[2]);
    assert_eq!(find_child(&fixture, other_b, other[2]), c);
    let mut fathers = fixture.arena.node(c).fathers();
    fathers.sort_unstable_by_key(|id| id.index());
    let mut expected = vec![b, other_b];
    expected.sort_unstable_by_key(|id| id.index());
    assert_eq!(fathers, expected);

    // b を通る経路で c を確保して解く
    let cursor = SearchCursor::from_path(&fixture.arena, &[fixture.root, a, b, c], 1).unwrap();
    assert_eq!(cursor.leaf(), c);
    assert_eq!(cursor.parents(), &[fixture.root, a, b]);
    assert!(SearchCursor::from_path(&fixture.arena, &[fixture.root, other_a, other_b, c], 1).is_none());
    fixture.arena.node(c).set_solved(eval_to_large(-64), eval_to_large(-64), &fixture.window);
    cursor.finalize(&fixture.arena, 5);

    // 経路の外の親も解けている
    for father in [b, other_b] {
        let stats = fixture.arena.node(father).snapshot();
        assert_eq!((stats.lower(), stats.upper()), (64, 64));
        assert_eq!(fixture.arena.node(father).threads(), 0);
    }
    assert_eq!(fixture.arena.node(other_b).n_visited(), 0);
    assert_eq!(fixture.arena.node(b).n_visited(), 5);
    // 祖先は全て子から計算し直した値と一致する
    for id in [other_a, a, fixture.root] {
        let node = fixture.arena.node(id);
        let before = node.snapshot();
        node.update_father(&fixture.arena);
        assert_eq!(node.snapshot(), before);
    }
}

#[test]
fn test_blocked_selection_refreshes_stale_father() {
    let fixture = Fixture::new(-63, 63);
    let children = expand(&fixture, fixture.root);
    let (child, others) = children.split_first().unwrap();
    let grandchildren = expand(&fixture, *child);
    // 孫を親に伝えずに解く
    for &id in &grandchildren {
        fixture.arena.node(id).set_solved(eval_to_large(12), eval_to_large(12), &fixture.window);
    }
    // 根から降りられるのは古い子だけにする
    for &id in others {
        fixture.arena.node(id).set_solved(eval_to_large(10), eval_to_large(10), &fixture.window);
    }
    fixture.arena.node(fixture.root).update_father(&fixture.arena);
    let stale = fixture.arena.node(*child).snapshot();
    assert_eq!((stale.lower(), stale.upper()), (-64, 64));
    assert_eq!(fixture.arena.node(*child).best_child(-1, 1.0, &fixture.arena), Selection::Blocked);

    // 子で止まったら、その子と祖先を計算し直す
    assert!(SearchCursor::best_descendant(&fixture.arena, fixture.root, 1.0, LESS_THAN_MIN_EVAL).is_none());
    let fresh = fixture.arena.node(*child).snapshot();
    assert_eq!((fresh.lower(), fresh.upper()), (-12, -12));
    let root = fixture.arena.node(fixture.root).snapshot();
    assert_eq!((root.lower(), root.upper()), (12, 12));
    assert!(fixture.arena.iter().all(|(_, node)| node.threads() == 0));
}
