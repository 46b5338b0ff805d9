/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use chessie::{Bitboard, Color, File, Game, PieceKind};

use crate::Score;

/// Penalty for a pawn with no friendly pawn on an adjacent file.
const ISOLATED_PAWN_PENALTY: i32 = Score::PAWN_UNIT / 2;

/// Penalty for a file holding more than one friendly pawn, applied once per
/// file regardless of how many pawns are stacked on it.
const DOUBLED_PAWN_PENALTY: i32 = Score::PAWN_UNIT / 4;

/// Penalty for a pawn whose square directly ahead (in its direction of
/// advance) is occupied by any piece.
const BLOCKED_PAWN_PENALTY: i32 = Score::PAWN_UNIT / 2;

/// Weight of a single legal move in the mobility term.
const MOBILITY_WEIGHT: i32 = Score::PAWN_UNIT / 10;

/// Encapsulates the logic of scoring a chess position.
///
/// Scores are always from White's perspective: a high score is good for
/// White, a low score is good for Black. The search layer is responsible for
/// interpreting the sign relative to the side it is maximizing for.
#[derive(Debug, Clone)]
pub struct Evaluator<'a> {
    /// The game whose position to evaluate.
    game: &'a Game,
}

impl<'a> Evaluator<'a> {
    /// Construct a new [`Evaluator`] for the provided game.
    #[inline(always)]
    pub fn new(game: &'a Game) -> Self {
        Self { game }
    }

    /// Evaluate this position.
    ///
    /// Deterministic and side-effect free: the same position always yields
    /// the same score, and the game being evaluated is never mutated.
    pub fn eval(&self) -> Score {
        if let Some(score) = self.terminal_score() {
            return score;
        }

        let mut score = self.material();
        score -= self.pawn_penalties(Color::White);
        score += self.pawn_penalties(Color::Black);
        score += (self.mobility(Color::White) - self.mobility(Color::Black)) * MOBILITY_WEIGHT;
        score
    }

    /// If the game has concluded, the fixed sentinel for its result.
    ///
    /// Checkmate scores [`Score::WIN`]/[`Score::LOSS`] depending on which
    /// King fell; every draw (stalemate, fifty-move rule, insufficient
    /// material) scores [`Score::DRAW`], regardless of material on the board.
    fn terminal_score(&self) -> Option<Score> {
        if self.game.get_legal_moves().is_empty() {
            let score = if self.game.is_in_check() {
                // The side to move has been mated.
                if self.game.side_to_move().is_white() {
                    Score::LOSS
                } else {
                    Score::WIN
                }
            } else {
                Score::DRAW
            };

            return Some(score);
        }

        is_drawn(self.game).then_some(Score::DRAW)
    }

    /// Sum of per-piece material values, positive for White's pieces and
    /// negative for Black's. Kings carry no material value; their fate is
    /// handled by terminal detection.
    fn material(&self) -> Score {
        let mut score = Score::DRAW;
        for (_, piece) in self.game.board() {
            score += value_of(piece.kind()) * piece.color().negation_multiplier() as i32;
        }
        score
    }

    /// Total pawn-structure penalty for `color`'s pawns, as a positive number.
    /// The caller applies the sign.
    fn pawn_penalties(&self, color: Color) -> i32 {
        let board = self.game.board();
        let pawns = board.pawns(color);
        let occupied = board.occupied();

        let mut penalty = 0;
        for square in pawns {
            if (adjacent_files(square.file()) & pawns).is_empty() {
                penalty += ISOLATED_PAWN_PENALTY;
            }

            if square
                .forward_by(color, 1)
                .is_some_and(|ahead| !(occupied & ahead.bitboard()).is_empty())
            {
                penalty += BLOCKED_PAWN_PENALTY;
            }
        }

        for file in File::iter() {
            if (pawns & file.bitboard()).population() > 1 {
                penalty += DOUBLED_PAWN_PENALTY;
            }
        }

        penalty
    }

    /// Number of legal moves `color` would have if it were their turn.
    ///
    /// Computed on a scratch copy of the game, so the real position's
    /// side-to-move is never altered.
    fn mobility(&self, color: Color) -> i32 {
        let mut game = *self.game;
        if game.side_to_move() != color {
            game.toggle_side_to_move();
        }

        game.get_legal_moves().len() as i32
    }
}

impl fmt::Display for Evaluator<'_> {
    /// Displays the board alongside a term-by-term breakdown of the score.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}\n", self.game)?;

        if let Some(score) = self.terminal_score() {
            return write!(f, "Terminal: {score}");
        }

        writeln!(f, "Material:       {}", self.material())?;
        writeln!(
            f,
            "Pawn structure: {}",
            self.pawn_penalties(Color::Black) - self.pawn_penalties(Color::White)
        )?;
        write!(
            f,
            "Mobility:       {}",
            (self.mobility(Color::White) - self.mobility(Color::Black)) * MOBILITY_WEIGHT
        )
    }
}

/// Returns `true` if the game has concluded: checkmate, stalemate, the
/// fifty-move rule, or insufficient mating material.
///
/// Draws by repetition are the host's to adjudicate; a position carries no
/// move history, and evaluation must not depend on anything beyond what the
/// position encodes.
pub fn is_terminal(game: &Game) -> bool {
    game.get_legal_moves().is_empty() || is_drawn(game)
}

/// Drawn by rule, independent of whether any moves remain.
fn is_drawn(game: &Game) -> bool {
    game.halfmove() >= 100 || has_insufficient_material(game)
}

/// Neither side retains enough material to deliver mate: bare kings, a lone
/// minor piece, or two bishops confined to same-colored squares.
fn has_insufficient_material(game: &Game) -> bool {
    let board = game.board();

    let heavy = board.kind(PieceKind::Pawn) | board.kind(PieceKind::Rook) | board.kind(PieceKind::Queen);
    if !heavy.is_empty() {
        return false;
    }

    let minors = board.kind(PieceKind::Knight) | board.kind(PieceKind::Bishop);
    match minors.population() {
        0 | 1 => true,
        2 => {
            let bishops = board.kind(PieceKind::Bishop);
            let mut iter = bishops.into_iter();
            match (iter.next(), iter.next()) {
                (Some(a), Some(b)) => a.color() == b.color(),
                _ => false,
            }
        }
        _ => false,
    }
}

/// Returns the material value of the provided [`PieceKind`], in centipawns.
#[inline(always)]
pub const fn value_of(kind: PieceKind) -> i32 {
    match kind {
        PieceKind::Pawn => Score::PAWN_UNIT,
        PieceKind::Knight | PieceKind::Bishop => 3 * Score::PAWN_UNIT,
        PieceKind::Rook => 5 * Score::PAWN_UNIT,
        PieceKind::Queen => 9 * Score::PAWN_UNIT,
        // The King cannot be captured; terminal detection covers it.
        PieceKind::King => 0,
    }
}

/// Bitboard of the files immediately left and right of `file`.
fn adjacent_files(file: File) -> Bitboard {
    let mut mask = Bitboard::EMPTY_BOARD;
    if let Some(left) = file.offset(-1) {
        mask |= left.bitboard();
    }
    if let Some(right) = file.offset(1) {
        mask |= right.bitboard();
    }
    mask
}
