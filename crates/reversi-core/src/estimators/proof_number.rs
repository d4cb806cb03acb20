//! 証明数・反証数の回帰モデル
//!
//! 閾値を証明（反証）するまでの終盤探索の訪問数を、空きマス数・着手可能数・
//! 評価値と閾値の差から対数線形回帰で見積もる。値は対数スケールで 1 バイトに量子化する。

use std::sync::LazyLock;

use super::win_probability::probability_explicit;
use crate::movegen::n_moves;

/// 量子化した証明数（0 = 証明済み、255 = 飽和）
pub type ProofByte = u8;

/// 表現可能な最大の証明数
pub const MAX_PROOF_NUMBER: f32 = 1e25;

/// 証明数の量子化段数
pub const PROOF_NUMBER_STEP: u8 = 255;

/// 評価差は EvalLarge / 8 で ±128 に収まる
const MAX_DELTA: i32 = 128;
const TABLE_SIZE: usize = ((2 * MAX_DELTA as usize) + 1) << 10;

const PROOF_COEFFICIENTS: [[f64; 3]; 64] = [
    [2.3775, -0.0135, -0.0077],
    [2.6704, -0.0135, -0.0077],
    [2.9633, -0.0135, -0.0077],
    [3.2562, -0.0135, -0.0077],
    [3.4484, 0.0531, -0.0077],
    [3.7903, 0.0611, -0.0095],
    [4.0437, 0.1433, -0.0111],
    [4.3923, 0.1815, -0.0134],
    [4.7118, 0.2290, -0.0151],
    [5.0509, 0.3189, -0.0195],
    [5.4526, 0.3808, -0.0243],
    [5.8066, 0.4850, -0.0291],
    [6.1568, 0.6330, -0.0343],
    [6.5719, 0.7582, -0.0407],
    [6.8365, 0.9411, -0.0453],
    [6.9268, 1.1992, -0.0497],
    [7.2731, 1.3660, -0.0556],
    [7.7136, 1.4870, -0.0612],
    [8.3667, 1.5015, -0.0652],
    [8.9113, 1.5736, -0.0688],
    [9.4660, 1.6287, -0.0711],
    [9.8823, 1.7680, -0.0755],
    [9.9799, 2.0293, -0.0778],
    [10.1760, 2.2368, -0.0801],
    [10.5026, 2.3894, -0.0810],
    [11.0438, 2.4437, -0.0812],
    [11.5552, 2.5013, -0.0809],
    [11.2036, 2.9100, -0.0817],
    [11.5537, 3.0210, -0.0820],
    [11.3580, 3.3440, -0.0838],
    [11.9478, 3.3756, -0.0858],
    [11.1340, 3.9379, -0.0869],
    [11.2932, 4.1384, -0.0903],
    [12.2237, 4.0371, -0.0922],
    [12.4435, 4.1864, -0.0930],
    [12.8772, 4.2497, -0.0935],
    [14.2472, 3.9304, -0.0946],
    [14.7386, 3.9651, -0.0950],
    [14.8980, 4.1735, -0.0970],
    [14.0817, 4.7402, -0.0984],
    [14.3064, 4.8891, -0.0986],
    [14.6816, 5.0126, -0.0987],
    [15.8863, 4.7816, -0.0986],
    [17.3965, 4.4429, -0.0992],
    [18.3813, 4.3203, -0.0999],
    [20.5447, 3.7845, -0.1017],
    [22.0146, 3.4876, -0.1032],
    [23.6573, 3.1384, -0.1040],
    [25.6805, 2.6265, -0.1055],
    [27.6521, 2.1471, -0.1058],
    [28.3654, 2.1083, -0.1074],
    [30.2369, 1.6629, -0.1073],
    [31.2131, 1.5556, -0.1095],
    [32.9067, 1.1731, -0.1091],
    [33.4042, 1.2356, -0.1087],
    [34.3972, 1.1098, -0.1088],
    [35.4394, 0.9344, -0.1093],
    [36.4362, 0.7680, -0.1091],
    [36.4893, 1.1315, -0.1097],
    [37.9377, 0.5617, -0.1093],
    [39.9141, -0.1785, -0.1098],
    [38.2563, 0.6285, -0.1082],
    [42.0388, 0.5295, -0.1078],
    [41.8089, 0.0181, -0.1080],
];

const DISPROOF_COEFFICIENTS: [[f64; 3]; 64] = [
    [0.7470, 1.8772, 0.0068],
    [0.8341, 1.8772, 0.0068],
    [0.9211, 1.8772, 0.0068],
    [1.0081, 1.8772, 0.0068],
    [1.2574, 1.8207, 0.0093],
    [1.4380, 1.8150, 0.0117],
    [1.7417, 1.7745, 0.0141],
    [2.0862, 1.7405, 0.0165],
    [2.3991, 1.7622, 0.0196],
    [2.9038, 1.7680, 0.0265],
    [3.4093, 1.7722, 0.0328],
    [3.7167, 1.9012, 0.0390],
    [3.9560, 2.0881, 0.0453],
    [4.2470, 2.2542, 0.0515],
    [4.5899, 2.4023, 0.0584],
    [4.8119, 2.6004, 0.0653],
    [4.8123, 2.8932, 0.0708],
    [4.7712, 3.2071, 0.0753],
    [5.0249, 3.3671, 0.0789],
    [5.4563, 3.4749, 0.0819],
    [5.3436, 3.7827, 0.0837],
    [5.7800, 3.8638, 0.0846],
    [6.1249, 3.9909, 0.0855],
    [6.5926, 4.0829, 0.0871],
    [6.9811, 4.1664, 0.0867],
    [7.5065, 4.2070, 0.0861],
    [7.9698, 4.2483, 0.0849],
    [8.4343, 4.2815, 0.0839],
    [8.7454, 4.3870, 0.0839],
    [8.7884, 4.6196, 0.0845],
    [9.2611, 4.6733, 0.0852],
    [10.1316, 4.5851, 0.0868],
    [9.0824, 5.1902, 0.0846],
    [9.1862, 5.4088, 0.0862],
    [9.8346, 5.3909, 0.0876],
    [9.1160, 5.9012, 0.0881],
    [10.0605, 5.8064, 0.0896],
    [10.5922, 5.8341, 0.0901],
    [10.2118, 6.2229, 0.0919],
    [10.5953, 6.3295, 0.0931],
    [11.0811, 6.4034, 0.0940],
    [12.6840, 6.0612, 0.0946],
    [14.5836, 5.5750, 0.0949],
    [15.6792, 5.4182, 0.0955],
    [18.2796, 4.7097, 0.0979],
    [20.0477, 4.2865, 0.0987],
    [21.2313, 4.1294, 0.0999],
    [24.3182, 3.2275, 0.0999],
    [25.9864, 2.8570, 0.1005],
    [27.5568, 2.5071, 0.1023],
    [28.2594, 2.5344, 0.1035],
    [28.8723, 2.5801, 0.1053],
    [29.8889, 2.4971, 0.1056],
    [31.5168, 2.1207, 0.1064],
    [32.2733, 2.1401, 0.1069],
    [33.0243, 2.1285, 0.1074],
    [33.4561, 2.2713, 0.1076],
    [34.1675, 2.3004, 0.1081],
    [34.9810, 2.2548, 0.1080],
    [35.4962, 2.4597, 0.1090],
    [36.8959, 1.8881, 0.1089],
    [38.4175, 1.4472, 0.1099],
    [36.1571, 2.9271, 0.1099],
    [41.8230, 0.0181, 0.1107],
];

/// 量子化の底（≒ 1.25）
static BASE_LOG_PROOF_NUMBER: LazyLock<f64> =
    LazyLock::new(|| (MAX_PROOF_NUMBER as f64).powf(1.0 / (PROOF_NUMBER_STEP as f64 - 1.99)));

#[inline]
fn proof_offset(n_empties: u32, moves: u32, delta: i32) -> usize {
    debug_assert!(moves <= 15);
    debug_assert!(n_empties <= 63);
    debug_assert!((-MAX_DELTA..=MAX_DELTA).contains(&delta));
    n_empties as usize | ((moves as usize) << 6) | (((delta + MAX_DELTA) as usize) << 10)
}

/// 証明数を 1 バイトに量子化
pub fn proof_number_to_byte(proof_number: f32) -> ProofByte {
    debug_assert!(proof_number == 0.0 || proof_number >= 1.0);
    if proof_number <= 1e-8 {
        return 0;
    } else if proof_number > MAX_PROOF_NUMBER {
        return PROOF_NUMBER_STEP;
    }
    let rescaled = (proof_number as f64).ln() / BASE_LOG_PROOF_NUMBER.ln() + 1.0;
    rescaled.round() as ProofByte
}

fn byte_to_proof_number_explicit(byte: ProofByte) -> f32 {
    if byte == 0 {
        return 0.0;
    } else if byte == PROOF_NUMBER_STEP {
        return f32::MAX;
    }
    BASE_LOG_PROOF_NUMBER.powi(byte as i32 - 1) as f32
}

/// [1, 0.99 * MAX_PROOF_NUMBER] に丸める
#[inline]
pub fn bound(value: f64) -> f32 {
    value.min(MAX_PROOF_NUMBER as f64 * 0.99).max(1.0) as f32
}

/// 閾値が `delta` だけずれたときの証明数（反証数）の換算
#[inline]
pub fn convert_proof_number(old: f64, delta: i32) -> f64 {
    debug_assert!(delta > 0);
    bound((old.ln() - 0.07 * delta as f64).exp()) as f64
}

#[inline]
fn regression(coefficients: &[[f64; 3]; 64], n_empties: u32, moves: u32, error: i32) -> f64 {
    let log_moves = ((moves.max(1) + 2) as f64).ln();
    let error = error.clamp(-70 * 8, 70 * 8) as f64;
    let [a, b, c] = coefficients[n_empties as usize];
    a + b * log_moves + c * error
}

/// log(証明数)。`moves_opponent` は相手の着手可能数
pub fn log_proof_number(n_empties: u32, moves_opponent: u32, error: i32) -> f64 {
    regression(&PROOF_COEFFICIENTS, n_empties, moves_opponent, error)
}

/// log(反証数)。`moves_player` は手番側の着手可能数
pub fn log_disproof_number(n_empties: u32, moves_player: u32, error: i32) -> f64 {
    regression(&DISPROOF_COEFFICIENTS, n_empties, moves_player, error)
}

struct ProofNumberTables {
    proof_number: Vec<ProofByte>,
    disproof_number: Vec<ProofByte>,
    disproof_number_over_prob: Vec<i32>,
    byte_to_proof_number: [f32; 256],
}

impl ProofNumberTables {
    fn new() -> Self {
        let mut proof_number = vec![0; TABLE_SIZE];
        let mut disproof_number = vec![0; TABLE_SIZE];
        let mut disproof_number_over_prob = vec![0; TABLE_SIZE];
        for n_empties in 0..64 {
            for moves in 0..16 {
                for delta in -MAX_DELTA..=MAX_DELTA {
                    let offset = proof_offset(n_empties, moves, delta);
                    proof_number[offset] =
                        proof_number_to_byte(bound(log_proof_number(n_empties, moves, delta).exp()));
                    let disproof = bound(log_disproof_number(n_empties, moves, delta).exp());
                    disproof_number[offset] = proof_number_to_byte(disproof);
                    disproof_number_over_prob[offset] = (disproof as f64
                        / probability_explicit(1, n_empties, delta))
                    .min(i32::MAX as f64 - 2.0)
                    .round() as i32;
                }
            }
        }
        let mut byte_to_proof_number = [0.0; 256];
        for (byte, pn) in byte_to_proof_number.iter_mut().enumerate() {
            *pn = byte_to_proof_number_explicit(byte as ProofByte);
        }
        ProofNumberTables {
            proof_number,
            disproof_number,
            disproof_number_over_prob,
            byte_to_proof_number,
        }
    }
}

static TABLES: LazyLock<ProofNumberTables> = LazyLock::new(ProofNumberTables::new);

/// 量子化した証明数を実数に戻す
#[inline]
pub fn byte_to_proof_number(byte: ProofByte) -> f32 {
    TABLES.byte_to_proof_number[byte as usize]
}

#[inline]
fn offset_for(player: u64, opponent: u64, moves: u32, lower: i32, approx_eval: i32) -> usize {
    let n_empties = (!(player | opponent)).count_ones();
    proof_offset(n_empties, moves.min(15), (approx_eval - lower) >> 3)
}

/// 真の値が `lower` より大きいことを証明するための推定訪問数（量子化済み）
#[inline]
pub fn proof_number(player: u64, opponent: u64, lower: i32, approx_eval: i32) -> ProofByte {
    TABLES.proof_number[offset_for(player, opponent, n_moves(opponent, player), lower, approx_eval)]
}

/// 真の値が `lower` 以下であることを証明するための推定訪問数（量子化済み）
#[inline]
pub fn disproof_number(player: u64, opponent: u64, lower: i32, approx_eval: i32) -> ProofByte {
    TABLES.disproof_number[offset_for(player, opponent, n_moves(player, opponent), lower, approx_eval)]
}

/// 反証数を勝率で割った値。終盤の着手順序付けに使う
#[inline]
pub fn disproof_number_over_prob(player: u64, opponent: u64, lower: i32, approx_eval: i32) -> i32 {
    TABLES.disproof_number_over_prob
        [offset_for(player, opponent, n_moves(player, opponent), lower, approx_eval)]
}
