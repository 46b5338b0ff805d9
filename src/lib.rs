/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Custom command-line flavors of UCI commands.
mod cli;
/// Dense integer encoding of moves for external move-selection components.
mod codec;
/// Main engine logic; manages the protocol session and search threads.
mod engine;
/// Static evaluation of chess positions.
mod eval;
/// Types for quantifying the evaluation of a position.
mod score;
/// Alpha-beta minimax search.
mod search;

pub use cli::*;
pub use codec::*;
pub use engine::*;
pub use eval::*;
pub use score::*;
pub use search::*;
