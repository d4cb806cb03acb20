//! 評価値（Eval / EvalLarge）
//!
//! `Eval` は石数差 [-64, 64]。葉の初期評価など細かい値は 8 倍スケールの
//! `EvalLarge`（[-512, 512]）で持つ。閾値（goal）は奇数、確定値の上下限は偶数。

/// 石数差スケールの評価値
pub type Eval = i32;

/// 8 倍スケールの評価値
pub type EvalLarge = i32;

/// 最小評価値
pub const MIN_EVAL: Eval = -64;
/// 最大評価値
pub const MAX_EVAL: Eval = 64;
/// 「値なし」を表す番兵（どの評価値よりも小さい）
pub const LESS_THAN_MIN_EVAL: Eval = -66;

/// 最小評価値（8 倍スケール）
pub const MIN_EVAL_LARGE: EvalLarge = -512;
/// 最大評価値（8 倍スケール）
pub const MAX_EVAL_LARGE: EvalLarge = 512;
/// 「値なし」を表す番兵（8 倍スケール）
pub const LESS_THAN_MIN_EVAL_LARGE: EvalLarge = -528;

/// Eval -> EvalLarge
#[inline]
pub const fn eval_to_large(eval: Eval) -> EvalLarge {
    eval * 8
}

/// EvalLarge -> Eval（四捨五入）
///
/// 負数でも切り捨て方向が揃うように 1000 だけ底上げしてから割る。
#[inline]
pub const fn large_to_eval_round(eval: EvalLarge) -> Eval {
    (eval + 8004) / 8 - 1000
}

/// EvalLarge -> Eval（切り下げ）
#[inline]
pub const fn large_to_eval_lower(eval: EvalLarge) -> Eval {
    (eval + 8000) / 8 - 1000
}

/// EvalLarge -> Eval（切り上げ）
#[inline]
pub const fn large_to_eval_upper(eval: EvalLarge) -> Eval {
    (eval + 8007) / 8 - 1000
}

/// 探索で追跡する閾値として有効か（奇数かつ盤面の範囲内）
#[inline]
pub const fn is_valid_goal(goal: Eval) -> bool {
    goal % 2 != 0 && goal > MIN_EVAL && goal < MAX_EVAL
}
