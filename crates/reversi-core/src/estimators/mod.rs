//! 推定器モジュール
//!
//! 探索ノードの統計量の元になる、フィッティング済みのモデルと量子化。
//!
//! - `win_probability`: 評価値の誤差を正規分布とみなした勝率（閾値以上になる確率）
//! - `proof_number`: 終盤で閾値を証明・反証するのに必要な訪問数の回帰
//!
//! 確率・証明数はどちらも 1 バイトに量子化して持つ。

pub mod proof_number;
pub mod win_probability;

pub use proof_number::{
    byte_to_proof_number, convert_proof_number, disproof_number, disproof_number_over_prob,
    proof_number, proof_number_to_byte, ProofByte, MAX_PROOF_NUMBER, PROOF_NUMBER_STEP,
};
pub use win_probability::{
    byte_to_probability, probability_explicit, probability_to_byte, win_probability, Probability,
    PROB_STEP,
};

/// 単調増加関数 `f` の逆関数を [l, u] の二分法で求める
///
/// `f(l) <= y <= f(u)` を前提とする。区間幅が 1e-14 以下になるまで絞り込む。
pub(crate) fn inverse(f: impl Fn(f64) -> f64, y: f64, mut l: f64, mut u: f64) -> f64 {
    if f(l) == y {
        return l;
    } else if f(u) == y {
        return u;
    }
    while u - l > 1e-14 {
        let mid = (l + u) / 2.0;
        let fmid = f(mid);
        if fmid == y {
            return mid;
        } else if fmid < y {
            l = mid;
        } else {
            u = mid;
        }
    }
    (l + u) / 2.0
}

/// [0, 1] 上の関数の数値微分（端では片側差分）
pub(crate) fn derivative(f: impl Fn(f64) -> f64, x: f64) -> f64 {
    let epsilon = 1e-12;
    if x < epsilon {
        (f(x + epsilon) - f(x)) / epsilon
    } else if x > 1.0 - epsilon {
        (f(x) - f(x - epsilon)) / epsilon
    } else {
        (f(x + epsilon) - f(x - epsilon)) / (2.0 * epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_square() {
        let x = inverse(|x| x * x, 0.25, 0.0, 1.0);
        assert!((x - 0.5).abs() < 1e-12);
        assert_eq!(inverse(|x| x, 0.0, 0.0, 1.0), 0.0);
        assert_eq!(inverse(|x| x, 1.0, 0.0, 1.0), 1.0);
    }

    #[test]
    fn test_derivative_linear() {
        assert!((derivative(|x| 3.0 * x, 0.5) - 3.0).abs() < 1e-3);
        assert!((derivative(|x| 3.0 * x, 0.0) - 3.0).abs() < 1e-3);
        assert!((derivative(|x| 3.0 * x, 1.0) - 3.0).abs() < 1e-3);
    }
}
