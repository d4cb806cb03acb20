//! 局面ハッシュ
//!
//! 行（8 マス）ごとの乱数表を引いて xor する。置換表とノード索引で使う。

/// 行ごとの乱数表 [手番側/相手側][行][行の石の配置]
pub struct Zobrist {
    rows: [[[u64; 256]; 8]; 2],
}

impl Zobrist {
    /// テーブル初期化
    pub const fn init() -> Self {
        let mut zobrist = Zobrist {
            rows: [[[0; 256]; 8]; 2],
        };
        // XorShift64で疑似乱数生成
        let mut seed = 0x2545_F491_4F6C_DD1Du64;
        let mut side = 0;
        while side < 2 {
            let mut row = 0;
            while row < 8 {
                let mut pattern = 1;
                // 空の行は 0 のまま
                while pattern < 256 {
                    seed = xorshift64(seed);
                    zobrist.rows[side][row][pattern] = seed;
                    pattern += 1;
                }
                row += 1;
            }
            side += 1;
        }
        zobrist
    }
}

/// XorShift64疑似乱数生成（const fn対応）
const fn xorshift64(mut x: u64) -> u64 {
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

/// グローバルな乱数表
pub static ZOBRIST: Zobrist = Zobrist::init();

/// 局面のハッシュ値
#[inline]
pub fn hash_board(player: u64, opponent: u64) -> u64 {
    let mut hash = 0;
    for row in 0..8 {
        let shift = row * 8;
        hash ^= ZOBRIST.rows[0][row][((player >> shift) & 0xFF) as usize];
        hash ^= ZOBRIST.rows[1][row][((opponent >> shift) & 0xFF) as usize];
    }
    hash
}
