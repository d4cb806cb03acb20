//! 勝率モデル
//!
//! 深さ `depth` の探索値 `eval` に対し、真の値が `goal` 以上になる確率を
//! `1 - Φ((goal - eval) / (8 σ))` で見積もる。σ は (深さ, 空きマス数) ごとの実測誤差。
//!
//! 確率は `rescale_prob` で 0/1 付近を引き伸ばしてから 255 段階に量子化する。

use std::sync::LazyLock;

use super::inverse;
use crate::types::{EvalLarge, MIN_EVAL_LARGE};

/// 量子化した確率（0 = 0%, 255 = 100%）
pub type Probability = u8;

/// 確率の量子化段数
pub const PROB_STEP: u8 = 255;

/// 探索深さ（1..=4）と空きマス数ごとの評価誤差（石数差）
const ERRORS: [[f32; 60]; 5] = [
    [0.0; 60],
    [
        2.00, 2.00, 2.00, 2.00, 6.64, 6.87, 7.64, 7.77, 8.18, 8.30, 8.72, 8.73, 8.98, 8.71, 8.65,
        8.35, 8.29, 8.05, 8.20, 7.64, 7.55, 7.05, 6.82, 6.00, 6.36, 5.61, 5.86, 5.19, 5.76, 5.13,
        5.58, 4.91, 5.19, 4.39, 4.89, 4.14, 4.82, 4.03, 4.38, 3.83, 4.16, 3.52, 3.82, 3.20, 3.28,
        2.79, 2.96, 2.41, 2.84, 2.57, 2.51, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00,
    ],
    [
        2.00, 2.00, 2.00, 2.00, 5.57, 5.86, 6.40, 7.08, 7.23, 7.63, 7.77, 8.06, 8.03, 8.19, 7.91,
        7.81, 7.57, 7.51, 7.41, 7.29, 6.92, 6.56, 6.18, 5.41, 5.67, 5.14, 5.13, 4.66, 4.98, 4.56,
        4.78, 4.37, 4.21, 3.90, 4.03, 3.73, 3.97, 3.63, 3.54, 3.46, 3.51, 3.15, 3.17, 2.94, 2.67,
        2.52, 2.56, 2.21, 2.10, 2.48, 2.09, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00,
    ],
    [
        2.00, 2.00, 2.00, 2.00, 5.17, 4.96, 5.63, 5.93, 6.68, 6.74, 7.21, 7.25, 7.47, 7.38, 7.51,
        7.21, 7.10, 6.97, 6.89, 6.66, 6.57, 6.03, 5.75, 5.01, 5.30, 4.71, 5.16, 4.30, 4.73, 4.09,
        4.59, 3.88, 4.40, 3.50, 3.97, 3.29, 4.03, 3.17, 3.81, 3.09, 3.50, 2.74, 3.25, 2.59, 3.00,
        2.28, 2.61, 2.05, 2.25, 2.00, 2.37, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00,
    ],
    [
        2.00, 2.00, 2.00, 2.00, 2.00, 4.72, 4.71, 5.25, 5.53, 6.34, 6.37, 6.77, 6.71, 6.87, 6.81,
        7.03, 6.56, 6.54, 6.37, 6.27, 6.05, 5.93, 5.32, 4.77, 4.93, 4.39, 4.64, 3.98, 4.05, 3.66,
        3.96, 3.53, 3.67, 3.24, 3.15, 2.96, 3.34, 2.93, 3.06, 2.86, 2.80, 2.57, 2.72, 2.40, 2.50,
        2.13, 2.13, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00, 2.00,
    ],
];

/// テーブルの評価差の範囲（EvalLarge で ±1024）
const MAX_DELTA: EvalLarge = -2 * MIN_EVAL_LARGE;
const TABLE_SIZE: usize = (((2 * MAX_DELTA) as usize) + 1) << 8;

#[inline]
fn cdf_offset(depth: u32, n_empties: u32, delta: EvalLarge) -> usize {
    debug_assert!((1..=4).contains(&depth));
    debug_assert!(n_empties <= 63);
    debug_assert!((-MAX_DELTA..=MAX_DELTA).contains(&delta));
    (depth as usize - 1) | ((n_empties as usize) << 2) | (((delta + MAX_DELTA) as usize) << 8)
}

fn base_rescale_prob(x: f64) -> f64 {
    if x < f64::MIN_POSITIVE {
        return 0.0;
    }
    (-x.ln() + 10.0).powf(-3.5)
}

/// 0/1 付近を引き伸ばす単調増加の変換
pub fn rescale_prob(x: f64) -> f64 {
    if x <= 1e-14 {
        return 0.0;
    } else if x >= 1.0 - 1e-14 {
        return 1.0;
    }
    (base_rescale_prob(x) - base_rescale_prob(1.0 - x))
        / (base_rescale_prob(1.0) - base_rescale_prob(0.0))
        / 2.0
        + 0.5
}

fn inverse_rescale_prob(y: f64) -> f64 {
    if y <= 1e-14 {
        return 0.0;
    } else if y >= 1.0 - 1e-14 {
        return 1.0;
    }
    inverse(rescale_prob, y, 0.0, 1.0)
}

/// 確率を 1 バイトに量子化
pub fn probability_to_byte(probability: f64) -> Probability {
    debug_assert!((0.0..=1.0).contains(&probability));
    (rescale_prob(probability) * PROB_STEP as f64).round() as Probability
}

fn byte_to_probability_explicit(byte: Probability) -> f64 {
    inverse_rescale_prob(byte as f64 / PROB_STEP as f64)
}

/// 標準正規分布の累積分布関数
#[inline]
fn gaussian_cdf(x: f64) -> f64 {
    0.5 * libm::erfc(-x * std::f64::consts::FRAC_1_SQRT_2)
}

/// 深さ `depth` の評価値が閾値を `delta`（EvalLarge）だけ下回るとき、真の値が閾値以上になる確率
pub fn probability_explicit(depth: u32, n_empties: u32, delta: EvalLarge) -> f64 {
    let error = if n_empties < 60 {
        ERRORS[depth as usize][n_empties as usize].max(3.0)
    } else {
        3.0
    };
    1.0 - gaussian_cdf(delta as f64 / (8.0 * error as f64))
}

struct WinProbabilityTables {
    win_probability: Vec<Probability>,
    byte_to_probability: [f64; 256],
}

impl WinProbabilityTables {
    fn new() -> Self {
        let mut win_probability = vec![0; TABLE_SIZE];
        for depth in 1..=4 {
            for n_empties in 0..64 {
                for delta in -MAX_DELTA..=MAX_DELTA {
                    win_probability[cdf_offset(depth, n_empties, delta)] =
                        probability_to_byte(probability_explicit(depth, n_empties, delta));
                }
            }
        }
        let mut byte_to_probability = [0.0; 256];
        for (byte, p) in byte_to_probability.iter_mut().enumerate() {
            *p = byte_to_probability_explicit(byte as Probability);
        }
        WinProbabilityTables {
            win_probability,
            byte_to_probability,
        }
    }
}

static TABLES: LazyLock<WinProbabilityTables> = LazyLock::new(WinProbabilityTables::new);

/// 量子化した確率を実数に戻す
#[inline]
pub fn byte_to_probability(byte: Probability) -> f64 {
    TABLES.byte_to_probability[byte as usize]
}

/// 深さ `depth` の評価値 `eval` から、真の値が `goal` 以上になる確率（量子化済み）
#[inline]
pub fn win_probability(depth: u32, n_empties: u32, goal: EvalLarge, eval: EvalLarge) -> Probability {
    TABLES.win_probability[cdf_offset(depth, n_empties, goal - eval)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_roundtrip() {
        for byte in 0..=PROB_STEP {
            assert_eq!(probability_to_byte(byte_to_probability(byte)), byte, "byte {byte}");
        }
        assert_eq!(byte_to_probability(0), 0.0);
        assert_eq!(byte_to_probability(PROB_STEP), 1.0);
    }

    #[test]
    fn test_rescale_monotone() {
        let mut last = 0.0;
        for i in 1..1000 {
            let value = rescale_prob(i as f64 / 1000.0);
            assert!(value > last);
            last = value;
        }
        assert!((rescale_prob(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_win_probability_symmetry() {
        // 評価値が閾値と一致すれば 50%
        assert_eq!(win_probability(1, 30, 8, 8), 128);
        // 評価値が高いほど確率も高い
        assert!(win_probability(1, 30, 0, 80) > win_probability(1, 30, 0, 0));
        assert_eq!(win_probability(4, 10, -512, 512), PROB_STEP);
        assert_eq!(win_probability(4, 10, 512, -512), 0);
    }

    #[test]
    fn test_probability_error_floor() {
        // 誤差は最低でも 3 石
        let p = probability_explicit(1, 2, 24);
        assert!((p - (1.0 - gaussian_cdf(1.0))).abs() < 1e-12);
        assert!((gaussian_cdf(0.0) - 0.5).abs() < 1e-12);
    }
}
