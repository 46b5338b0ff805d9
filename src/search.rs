/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use anyhow::{bail, Result};
use chessie::{Game, Move};
use uci_parser::{UciInfo, UciResponse, UciScore, UciSearchOptions};

use crate::{is_terminal, Evaluator, Score};

/// Depth at which to search when the host does not supply one.
pub const DEFAULT_DEPTH: usize = 4;

/// Upper bound on search depth, however large a depth the host requests.
///
/// Depth bounds the recursion directly (there is no iterative deepening), and
/// every frame carries its own copy of the position, so an unbounded depth
/// would exhaust the worker's stack long before the clock intervened. Without
/// move ordering a search this deep never completes in realistic time anyway.
pub const MAX_DEPTH: usize = 10;

/// The result of a search, containing the best move found, score, and total nodes searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchResult {
    /// Number of nodes searched.
    pub nodes: u64,

    /// Best move found during the search.
    pub bestmove: Option<Move>,

    /// Evaluation of the position after `bestmove` is made.
    pub score: Score,
}

impl Default for SearchResult {
    #[inline(always)]
    fn default() -> Self {
        Self {
            nodes: 0,
            bestmove: None,
            score: Score::DRAW,
        }
    }
}

/// Configuration variables for executing a [`Search`].
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Depth at which to execute the search.
    pub depth: usize,

    /// Start time of the search.
    pub starttime: Instant,

    /// Hard limit on search time.
    ///
    /// If this limit is exceeded at *any* point, the search will cancel and
    /// fall back to the best move found so far.
    pub timeout: Duration,
}

impl SearchConfig {
    /// Constructs a new [`SearchConfig`] from the provided UCI options and game.
    ///
    /// The [`Game`] is used to determine side to move when computing a
    /// timeout from the host's remaining-time parameters.
    pub fn new(options: UciSearchOptions, game: &Game) -> Self {
        let mut config = Self::default();

        if let Some(depth) = options.depth {
            config.depth = depth as usize;
        }

        // If `movetime` was supplied, search exactly that long.
        if let Some(movetime) = options.movetime {
            config.timeout = movetime;
        } else {
            // Otherwise, budget a slice of the time remaining and increment.
            let (time, inc) = if game.side_to_move().is_white() {
                (options.wtime, options.winc)
            } else {
                (options.btime, options.binc)
            };

            if let Some(time) = time {
                config.timeout = time / 20 + inc.unwrap_or(Duration::ZERO) / 2;
            }
        }

        config
    }
}

impl Default for SearchConfig {
    /// A default [`SearchConfig`] searches at [`DEFAULT_DEPTH`] with no time limit.
    #[inline(always)]
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            starttime: Instant::now(),
            timeout: Duration::MAX,
        }
    }
}

/// Marker error raised inside the search tree when the halt flag is flipped
/// or the clock runs out.
///
/// Distinguishes cooperative cancellation (recoverable at the root, which
/// falls back to its best partial result) from genuine contract violations,
/// which propagate as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SearchCancelled(&'static str);

impl fmt::Display for SearchCancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "search cancelled: {}", self.0)
    }
}

impl std::error::Error for SearchCancelled {}

/// Executes a minimax search with alpha-beta pruning on the provided game at
/// a fixed depth.
pub struct Search<'a> {
    /// The game to search on.
    ///
    /// This game is copied whenever a move is applied to it, so sibling
    /// branches never observe each other's mutations.
    game: &'a Game,

    /// The result of the search, updated after every fully-searched root move.
    result: SearchResult,

    /// An atomic flag to determine if the search should be cancelled at any time.
    ///
    /// If this is ever `false`, the search will exit as soon as possible.
    is_searching: Arc<AtomicBool>,

    /// Configuration variables for this instance of the search.
    config: SearchConfig,
}

impl<'a> Search<'a> {
    /// Construct a new [`Search`] instance to execute on the provided [`Game`].
    ///
    /// The configured depth is clamped to `[1, MAX_DEPTH]` here, so every
    /// construction path honors the recursion bound.
    #[inline(always)]
    pub fn new(game: &'a Game, is_searching: Arc<AtomicBool>, mut config: SearchConfig) -> Self {
        config.depth = config.depth.clamp(1, MAX_DEPTH);

        let result = SearchResult {
            // Initialize `bestmove` to the first move available, so that a
            // cancellation arriving before any root move completes still has
            // a legal answer to give.
            bestmove: game.get_legal_moves().into_iter().next(),
            ..Default::default()
        };

        Self {
            game,
            result,
            is_searching,
            config,
        }
    }

    /// Start the search, returning its result.
    ///
    /// Always concludes by sending the `bestmove` response, whether the
    /// search ran to completion or was cancelled; a fatal contract violation
    /// is the only path that returns an error instead.
    pub fn start(mut self) -> Result<SearchResult> {
        match self.root() {
            Ok(()) => {}

            Err(e) if e.is::<SearchCancelled>() => {
                self.send_info(UciInfo::new().string(format!(
                    "{e}; falling back to {} with score {}",
                    self.result
                        .bestmove
                        .map(|mv| mv.to_string())
                        .unwrap_or_else(|| String::from("(none)")),
                    self.result.score,
                )));
            }

            Err(e) => {
                // An internal invariant was violated; do not fabricate a move.
                self.is_searching.store(false, Ordering::Relaxed);
                return Err(e);
            }
        }

        let elapsed = self.config.starttime.elapsed();
        self.send_info(
            UciInfo::new()
                .depth(self.config.depth)
                .nodes(self.result.nodes)
                .score(UciScore::cp(self.result.score.0))
                .time(elapsed.as_millis()),
        );

        let response = UciResponse::BestMove {
            bestmove: self.result.bestmove,
            ponder: None,
        };
        println!("{response}");

        // Search has concluded; alert other threads that we are no longer searching.
        self.is_searching.store(false, Ordering::Relaxed);

        Ok(self.result)
    }

    /// Searches every root move at the configured depth, committing the
    /// running best into `self.result` after each one completes.
    ///
    /// White maximizes and Black minimizes, matching the evaluator's
    /// perspective.
    fn root(&mut self) -> Result<()> {
        let depth = self.config.depth;
        let maximizing = self.game.side_to_move().is_white();
        let moves = self.game.get_legal_moves();

        if moves.is_empty() || is_terminal(self.game) {
            // Nothing to play; report the static verdict on the position.
            self.result.bestmove = None;
            self.result.score = Evaluator::new(self.game).eval();
            return Ok(());
        }

        let mut alpha = -Score::INF;
        let mut beta = Score::INF;
        let mut best = if maximizing { -Score::INF } else { Score::INF };

        for mv in moves {
            let (score, _) =
                self.alphabeta(self.game.with_move_made(mv), depth - 1, alpha, beta, !maximizing)?;

            // Strict comparisons: the first move to achieve the best score
            // is the one we keep.
            if maximizing {
                if score > best {
                    best = score;
                    self.result.bestmove = Some(mv);
                    self.result.score = best;
                }
                alpha = alpha.max(best);
                if alpha >= beta {
                    break;
                }
            } else {
                if score < best {
                    best = score;
                    self.result.bestmove = Some(mv);
                    self.result.score = best;
                }
                beta = beta.min(best);
                if beta <= alpha {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Minimax with alpha-beta pruning, entered with a fresh full-width window.
    ///
    /// Returns the best reachable score and the first move achieving it
    /// (`None` at leaf/terminal nodes).
    pub fn minimax(
        &mut self,
        game: &Game,
        depth: usize,
        maximizing: bool,
    ) -> Result<(Score, Option<Move>)> {
        self.alphabeta(*game, depth, -Score::INF, Score::INF, maximizing)
    }

    /// Primary location of search logic.
    ///
    /// Each call owns its copy of the position; bounds and the
    /// maximizing-player flag live on the call stack.
    fn alphabeta(
        &mut self,
        game: Game,
        depth: usize,
        mut alpha: Score,
        mut beta: Score,
        maximizing: bool,
    ) -> Result<(Score, Option<Move>)> {
        self.result.nodes += 1;

        // Cancellation is checked once per node expansion, so a stop request
        // interrupts promptly instead of waiting for full-depth completion.
        self.check_for_interrupt()?;

        if depth == 0 || is_terminal(&game) {
            return Ok((Evaluator::new(&game).eval(), None));
        }

        let moves = game.get_legal_moves();

        // A non-terminal position with no legal moves means the Board Engine
        // broke its contract. Fail loudly; never score this as a draw.
        if moves.is_empty() {
            bail!(
                "board engine produced no legal moves for non-terminal position {:?}",
                game.to_fen()
            );
        }

        let mut best_move = None;
        let mut best = if maximizing { -Score::INF } else { Score::INF };

        for mv in moves {
            let (score, _) =
                self.alphabeta(game.with_move_made(mv), depth - 1, alpha, beta, !maximizing)?;

            if maximizing {
                if score > best {
                    best = score;
                    best_move = Some(mv);
                }
                alpha = alpha.max(best);
                if alpha >= beta {
                    break;
                }
            } else {
                if score < best {
                    best = score;
                    best_move = Some(mv);
                }
                beta = beta.min(best);
                if beta <= alpha {
                    break;
                }
            }
        }

        Ok((best, best_move))
    }

    /// Raises [`SearchCancelled`] if the halt flag was flipped or the
    /// allotted time has elapsed.
    fn check_for_interrupt(&self) -> Result<()> {
        if !self.is_searching.load(Ordering::Relaxed) {
            return Err(SearchCancelled("halted by stop request").into());
        }

        if self.config.starttime.elapsed() >= self.config.timeout {
            return Err(SearchCancelled("exceeded allotted movetime").into());
        }

        Ok(())
    }

    #[inline(always)]
    fn send_info(&self, info: UciInfo) {
        let resp = UciResponse::<String>::Info(Box::new(info));
        println!("{resp}");
    }
}

/// How the engine chooses a move to play.
///
/// The selector is picked once, when the engine is configured, not per
/// search. [`StaticSearch`] is the built-in variant; a learned policy ranking
/// the action space defined in [`crate::codec`] plugs in through this same
/// trait.
pub trait MoveSelector: Send + Sync {
    /// Compute a move for `game`, honoring the halt flag and configuration,
    /// and emit the `bestmove` response once finished.
    fn select(
        &self,
        game: &Game,
        is_searching: Arc<AtomicBool>,
        config: SearchConfig,
    ) -> Result<SearchResult>;
}

/// Selects moves with a fixed-depth alpha-beta minimax over the static
/// [`Evaluator`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticSearch;

impl MoveSelector for StaticSearch {
    fn select(
        &self,
        game: &Game,
        is_searching: Arc<AtomicBool>,
        config: SearchConfig,
    ) -> Result<SearchResult> {
        Search::new(game, is_searching, config).start()
    }
}
