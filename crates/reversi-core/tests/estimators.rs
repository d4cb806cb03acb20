//! 推定器と畳み込みの性質

use proptest::prelude::*;
use reversi_core::estimators::{
    byte_to_probability, byte_to_proof_number, probability_to_byte, proof_number_to_byte, win_probability,
    PROB_STEP, PROOF_NUMBER_STEP,
};
use reversi_core::tree::ScoreEstimate;

const PLAYER: u64 = 0x0000_0008_1000_0000;
const OPPONENT: u64 = 0x0000_0010_0800_0000;

fn fold(children: &[ScoreEstimate]) -> ScoreEstimate {
    let mut father = ScoreEstimate::default();
    father.initialize();
    for child in children {
        father.update_father_with_child(child);
    }
    father.finalize();
    father
}

fn leaf(goal: i32, eval: i32) -> ScoreEstimate {
    let mut estimate = ScoreEstimate::default();
    estimate.set_leaf(PLAYER, OPPONENT, goal, eval, 2, 40);
    estimate
}

proptest! {
    #[test]
    fn prop_probability_quantization_monotone(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(probability_to_byte(lo) <= probability_to_byte(hi));
        let byte = probability_to_byte(lo);
        prop_assert!((0.0..=1.0).contains(&byte_to_probability(byte)));
    }

    #[test]
    fn prop_proof_number_quantization_close(x in 1.0f32..1e20) {
        let byte = proof_number_to_byte(x);
        prop_assert!(byte > 0 && byte < PROOF_NUMBER_STEP);
        let back = byte_to_proof_number(byte);
        // 量子化の底は約 1.25
        prop_assert!(back / x < 1.2 && x / back < 1.2, "x = {x}, back = {back}");
    }

    #[test]
    fn prop_win_probability_monotone_in_eval(
        depth in 1u32..=4,
        n_empties in 0u32..60,
        goal in -63i32..=63,
        eval in -512i32..512,
    ) {
        let goal = 8 * (goal | 1);
        prop_assert!(win_probability(depth, n_empties, goal, eval) <= win_probability(depth, n_empties, goal, eval + 1));
    }

    #[test]
    fn prop_more_children_raise_father_probability(evals in prop::collection::vec(-512i32..=512, 1..8)) {
        // 親の閾値 8 は子の視点で -8
        let children: Vec<ScoreEstimate> = evals.iter().map(|&eval| leaf(-8 * 8, eval)).collect();
        let mut last = 0;
        for n in 1..=children.len() {
            let father = fold(&children[..n]);
            prop_assert!(father.prob_greater_equal() >= last);
            last = father.prob_greater_equal();
        }
        let father = fold(&children);
        let best_child = children.iter().map(|c| c.prob_greater_equal()).min().unwrap_or(PROB_STEP);
        prop_assert!(father.prob_greater_equal() >= PROB_STEP - best_child);
    }

    #[test]
    fn prop_fold_is_order_independent_for_solved_children(flags in prop::collection::vec(any::<bool>(), 1..8)) {
        let children: Vec<ScoreEstimate> = flags
            .iter()
            .map(|&proved| {
                let mut estimate = ScoreEstimate::default();
                if proved { estimate.set_proved() } else { estimate.set_disproved() }
                estimate
            })
            .collect();
        let mut reversed = children.clone();
        reversed.reverse();
        let father = fold(&children);
        prop_assert_eq!(father, fold(&reversed));
        prop_assert!(father.is_solved());
        // 反証済みの子（子の視点で負け）が 1 つでもあれば親は証明済み
        prop_assert_eq!(father.prob_greater_equal() == PROB_STEP, flags.iter().any(|&proved| !proved));
    }
}
