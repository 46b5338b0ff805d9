/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use anyhow::{bail, Result};
use chessie::{File, Game, Move, PieceKind, Rank, Square};

/// Total number of action indices: one slot per from/to square pair, plus 64
/// promotion slots (4 piece kinds x 8 files x 2 promotion ranks).
pub const ACTION_SPACE_SIZE: usize = Square::COUNT * Square::COUNT + 64;

/// First action index of the promotion block.
const PROMOTION_BASE: u16 = (Square::COUNT * Square::COUNT) as u16;

/// Width of one color's promotion block (4 piece kinds x 8 files).
const PROMOTION_BLOCK: u16 = 32;

/// A move as the codec sees it: source, destination, and an optional
/// promotion piece kind. This is all a move-selection component needs; flags
/// like "capture" or "en passant" are context the Board Engine supplies when
/// the move is resolved against a live position.
pub type MoveRepr = (Square, Square, Option<PieceKind>);

/// Maps a move onto its dense action index in `[0, ACTION_SPACE_SIZE)`.
///
/// Non-promotion moves occupy `from * 64 + to`. Promotions live above
/// [`PROMOTION_BASE`], keyed by promotion kind and source file, with the
/// destination rank selecting the White (rank 8) or Black (rank 1) block.
/// A capture-promotion shares the slot of the same-file push; decoding an
/// action therefore always yields the pushing form.
#[inline(always)]
pub fn encode(mv: &Move) -> u16 {
    if let Some(kind) = mv.promotion() {
        let block = if mv.to().rank() == Rank::EIGHT { 0 } else { 1 };
        PROMOTION_BASE
            + block * PROMOTION_BLOCK
            + promotion_kind_index(kind) * 8
            + mv.from().file().index() as u16
    } else {
        (mv.from().index() * Square::COUNT + mv.to().index()) as u16
    }
}

/// Inverse of [`encode`]: reconstructs the move for an action index.
///
/// Total over the full action space. The caller must never pass an index
/// outside `[0, ACTION_SPACE_SIZE)`; doing so is a programmer error, not a
/// recoverable condition.
#[inline(always)]
pub fn decode(action: u16) -> MoveRepr {
    debug_assert!(
        (action as usize) < ACTION_SPACE_SIZE,
        "action index {action} is outside the action space"
    );

    if action < PROMOTION_BASE {
        let from = Square::from_index_unchecked(action as usize / Square::COUNT);
        let to = Square::from_index_unchecked(action as usize % Square::COUNT);
        (from, to, None)
    } else {
        let sub = action - PROMOTION_BASE;
        let kind = promotion_kind_of(sub % PROMOTION_BLOCK / 8);
        let file = File::new_unchecked((sub % 8) as u8);

        // Block 0 is a White pawn pushing 7 -> 8; block 1 a Black pawn 2 -> 1.
        let (from_rank, to_rank) = if sub < PROMOTION_BLOCK {
            (Rank::SEVEN, Rank::EIGHT)
        } else {
            (Rank::TWO, Rank::ONE)
        };

        (
            Square::new(file, from_rank),
            Square::new(file, to_rank),
            Some(kind),
        )
    }
}

/// Decodes `action` and resolves it against `game` through the Board Engine,
/// yielding a fully-qualified [`Move`] if it is legal in that position.
///
/// This is the entry point for consumers that pick actions from a masked
/// distribution over the action space (e.g. a learned policy) and need the
/// Board Engine's legality filter applied.
pub fn decode_legal(action: u16, game: &Game) -> Result<Move> {
    let (from, to, promotion) = decode(action);

    let mut uci = format!("{from}{to}");
    if let Some(kind) = promotion {
        uci.push(promotion_char(kind));
    }

    // `from_uci` resolves the move structurally; it does not check whose turn
    // it is or whether the move is playable, so filter through movegen.
    let mv = Move::from_uci(game, &uci)?;
    if !game.get_legal_moves().contains(&mv) {
        bail!("move {mv} is not legal in position {:?}", game.to_fen());
    }

    Ok(mv)
}

/// Sub-index of a promotion piece kind within a promotion block.
#[inline(always)]
fn promotion_kind_index(kind: PieceKind) -> u16 {
    match kind {
        PieceKind::Knight => 0,
        PieceKind::Bishop => 1,
        PieceKind::Rook => 2,
        PieceKind::Queen => 3,
        // The Board Engine never yields a pawn/king promotion.
        _ => unreachable!("invalid promotion piece kind: {kind:?}"),
    }
}

/// Inverse of [`promotion_kind_index`].
#[inline(always)]
fn promotion_kind_of(index: u16) -> PieceKind {
    match index {
        0 => PieceKind::Knight,
        1 => PieceKind::Bishop,
        2 => PieceKind::Rook,
        3 => PieceKind::Queen,
        _ => unreachable!("invalid promotion kind index: {index}"),
    }
}

/// UCI suffix letter for a promotion piece kind.
#[inline(always)]
fn promotion_char(kind: PieceKind) -> char {
    match kind {
        PieceKind::Knight => 'n',
        PieceKind::Bishop => 'b',
        PieceKind::Rook => 'r',
        PieceKind::Queen => 'q',
        _ => unreachable!("invalid promotion piece kind: {kind:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chessie::Game;

    fn repr(mv: &Move) -> MoveRepr {
        (mv.from(), mv.to(), mv.promotion())
    }

    #[test]
    fn action_space_size_is_fixed() {
        assert_eq!(ACTION_SPACE_SIZE, 4160);
    }

    #[test]
    fn roundtrip_startpos_moves() {
        let game = Game::default();
        for mv in game.get_legal_moves() {
            let action = encode(&mv);
            assert!((action as usize) < ACTION_SPACE_SIZE);
            assert_eq!(decode(action), repr(&mv), "failed on {mv}");
        }
    }

    #[test]
    fn roundtrip_push_promotions() {
        // Lone pawns one step from promoting, nothing to capture.
        for fen in ["8/4P3/8/8/k6K/8/8/8 w - - 0 1", "8/8/8/8/k6K/8/4p3/8 b - - 0 1"] {
            let game = Game::from_fen(fen).unwrap();
            for mv in game.get_legal_moves().into_iter().filter(|m| m.is_promotion()) {
                let action = encode(&mv);
                assert!((action as usize) >= PROMOTION_BASE as usize);
                assert_eq!(decode(action), repr(&mv), "failed on {mv}");
            }
        }
    }

    #[test]
    fn every_promotion_slot_decodes_and_reencodes() {
        for action in PROMOTION_BASE..ACTION_SPACE_SIZE as u16 {
            let (from, to, promotion) = decode(action);
            let kind = promotion.expect("promotion range must decode a promotion");

            // Derived squares sit on the promotion ranks of their block.
            assert_eq!(from.file(), to.file());
            if action < PROMOTION_BASE + PROMOTION_BLOCK {
                assert_eq!((from.rank(), to.rank()), (Rank::SEVEN, Rank::EIGHT));
            } else {
                assert_eq!((from.rank(), to.rank()), (Rank::TWO, Rank::ONE));
            }

            let block = (action - PROMOTION_BASE) / PROMOTION_BLOCK;
            let reencoded = PROMOTION_BASE
                + block * PROMOTION_BLOCK
                + promotion_kind_index(kind) * 8
                + from.file().index() as u16;
            assert_eq!(reencoded, action);
        }
    }

    #[test]
    fn capture_promotion_shares_the_push_slot() {
        // White pawn on b7 may capture the rook on a8 while promoting.
        let game = Game::from_fen("r3k3/1P6/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let capture = game
            .get_legal_moves()
            .into_iter()
            .find(|m| m.promotion() == Some(PieceKind::Queen) && m.from().file() != m.to().file())
            .expect("capture promotion must be legal");

        let (from, to, promotion) = decode(encode(&capture));
        assert_eq!(from, capture.from());
        assert_eq!(promotion, Some(PieceKind::Queen));
        // The to-file collapses onto the source file.
        assert_eq!(to.file(), capture.from().file());
    }

    #[test]
    fn decode_legal_resolves_against_position() {
        let game = Game::default();
        for mv in game.get_legal_moves() {
            let resolved = decode_legal(encode(&mv), &game).unwrap();
            assert_eq!(resolved, mv);
        }

        // Structurally valid but illegal in context: e2e4 for Black.
        let game = Game::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1").unwrap();
        let action = encode(&Move::from_uci(&Game::default(), "e2e4").unwrap());
        assert!(decode_legal(action, &game).is_err());
    }
}
