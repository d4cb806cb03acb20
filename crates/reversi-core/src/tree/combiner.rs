//! 子の勝率を親の勝率に合成する関数
//!
//! 変換 `f` の下で子の値を足し合わせ、逆変換で確率に戻す。`f` は [0, 1] 上で
//! 単調増加、`f(0) = -∞`、`f(1) = 0`。

use crate::estimators::{derivative, inverse};

const POWER: f64 = 1.7;

#[inline]
fn exponential(y: f64) -> f64 {
    2f64.powf(20.0 * (1.0 - y)) - 1.0
}

#[inline]
fn poly_log(y: f64) -> f64 {
    // 冪乗で 0 に潰れた場合の log(0) を避ける
    (-y.max(1e-30).ln()).powf(1.5)
}

/// 合成関数 `f(x) = -(E(x^1.7) * L(x^1.7))^(1/1.7)`
pub fn combine_function(x: f64) -> f64 {
    debug_assert!((0.0..=1.0).contains(&x));
    if x <= 1e-18 {
        return -f64::MAX;
    }
    let y = x.powf(POWER);
    -(exponential(y) * poly_log(y)).powf(1.0 / POWER)
}

/// `f` の逆関数。`f(1e-14)` 以下は 0 とみなす
pub fn inverse_combine_function(y: f64) -> f64 {
    debug_assert!(y <= 0.0);
    if combine_function(1e-14) >= y {
        return 0.0;
    }
    inverse(combine_function, y, 1e-14, 1.0)
}

/// `f` の導関数
pub fn combine_function_derivative(x: f64) -> f64 {
    derivative(combine_function, x)
}

/// 2 つの確率の合成 `f⁻¹(f(x1) + f(x2))`
#[inline]
pub fn combine(x1: f64, x2: f64) -> f64 {
    inverse_combine_function(combine_function(x1) + combine_function(x2))
}
