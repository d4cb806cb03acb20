//! 結合テストの共通部品

#![allow(dead_code)]

use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rand_xoshiro::rand_core::SeedableRng;
use reversi_core::movegen::get_all_moves_with_pass;
use reversi_core::position::Board;
use reversi_core::types::Eval;

/// テスト用のログ出力（`RUST_LOG` で制御する）
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn minimax(board: Board) -> Eval {
    if board.is_game_over() {
        return board.game_over_eval();
    }
    board
        .successors()
        .into_iter()
        .map(|child| -minimax(child))
        .max()
        .unwrap_or_else(|| board.game_over_eval())
}

/// 初期局面からランダムに打って、空きマスが `n_empties` の局面を作る（途中で終局したら None）
pub fn random_position(rng: &mut Xoshiro256PlusPlus, n_empties: u32) -> Option<Board> {
    let mut board = Board::start();
    while board.n_empties() > n_empties {
        let moves = get_all_moves_with_pass(board.player(), board.opponent());
        if moves.is_empty() {
            return None;
        }
        let flip = moves[rng.random_range(0..moves.len())];
        board = board.play_flip(flip);
    }
    Some(board)
}

/// 空きマスが 1..=`max_empties` の局面を `count` 個
pub fn positions(seed: u64, count: usize, max_empties: u32) -> Vec<Board> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut result = Vec::new();
    while result.len() < count {
        let n_empties = rng.random_range(1..=max_empties);
        if let Some(board) = random_position(&mut rng, n_empties) {
            result.push(board);
        }
    }
    result
}

/// 空きマスがちょうど `n_empties` の、終局していない局面
pub fn position_with_empties(seed: u64, n_empties: u32) -> Board {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    loop {
        if let Some(board) = random_position(&mut rng, n_empties) {
            if !board.is_game_over() {
                return board;
            }
        }
    }
}
