/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

/// A numeric evaluation of a position, in centipawns, from White's perspective.
///
/// Positive favors White, negative favors Black, and zero is equal.
/// One pawn of material is worth [`Score::PAWN_UNIT`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Score(pub(crate) i32);

impl Score {
    /// Value of a single pawn of material.
    pub const PAWN_UNIT: i32 = 100;

    /// Score of a drawn game (stalemate, fifty-move rule, insufficient material).
    pub const DRAW: Self = Self(0);

    /// Sentinel for a game White has won.
    ///
    /// Deliberately far outside the range any sum of material and positional
    /// terms can reach, so a found checkmate always outranks material.
    pub const WIN: Self = Self(1000 * Self::PAWN_UNIT);

    /// Sentinel for a game Black has won.
    pub const LOSS: Self = Self(-Self::WIN.0);

    /// Strict bound on all achievable scores; used to seed alpha-beta windows.
    pub const INF: Self = Self(Self::WIN.0 + 1);
}

macro_rules! impl_binary_op {
    ($trait:tt, $fn:ident) => {
        impl std::ops::$trait for Score {
            type Output = Self;

            fn $fn(self, rhs: Self) -> Self::Output {
                Self(self.0.$fn(rhs.0))
            }
        }

        impl std::ops::$trait<i32> for Score {
            type Output = Self;

            fn $fn(self, rhs: i32) -> Self::Output {
                Self(self.0.$fn(rhs))
            }
        }
    };
}

macro_rules! impl_binary_op_assign {
    ($trait:tt, $fn:ident) => {
        impl std::ops::$trait for Score {
            fn $fn(&mut self, rhs: Self) {
                self.0.$fn(rhs.0);
            }
        }

        impl std::ops::$trait<i32> for Score {
            fn $fn(&mut self, rhs: i32) {
                self.0.$fn(rhs);
            }
        }
    };
}

impl_binary_op!(Add, add);
impl_binary_op!(Sub, sub);
impl_binary_op!(Mul, mul);
impl_binary_op!(Div, div);

impl_binary_op_assign!(AddAssign, add_assign);
impl_binary_op_assign!(SubAssign, sub_assign);

impl std::ops::Neg for Score {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(self.0.neg())
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
