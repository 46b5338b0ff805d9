/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt, io,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Receiver, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
};

use anyhow::{bail, Context, Result};
use chessie::{Game, Move};
use clap::Parser;
use uci_parser::{UciCommand, UciInfo, UciResponse, UciSearchOptions};

use crate::{EngineCommand, Evaluator, MoveSelector, SearchConfig, SearchResult, StaticSearch};

/// Search thread stack size (32 MB to handle deep recursion).
const SEARCH_STACK_SIZE: usize = 32 * 1024 * 1024;

/// The Manush chess engine.
///
/// Owns the session state the UCI protocol mutates: the current position,
/// the searching flag, and the handle of any in-flight search. There is no
/// global state; everything flows through this struct.
pub struct Engine {
    /// The current state of the chess board, as known to the engine.
    ///
    /// This is modified whenever moves are played or new positions are given,
    /// and is reset whenever the engine is told to start a new game.
    game: Game,

    /// One half of a channel, responsible for sending commands to the engine to execute.
    sender: Sender<EngineCommand>,

    /// One half of a channel, responsible for receiving commands for the engine to execute.
    receiver: Receiver<EngineCommand>,

    /// Atomic flag to determine whether a search is currently running.
    is_searching: Arc<AtomicBool>,

    /// Handle to the currently-running search thread, if one exists.
    search_thread: Option<JoinHandle<Result<SearchResult>>>,

    /// How this engine chooses its moves; fixed at construction time.
    selector: Arc<dyn MoveSelector>,
}

impl Engine {
    /// Constructs a new [`Engine`] using the built-in alpha-beta search.
    pub fn new() -> Self {
        Self::with_selector(Arc::new(StaticSearch))
    }

    /// Constructs an [`Engine`] that chooses moves with the provided selector.
    pub fn with_selector(selector: Arc<dyn MoveSelector>) -> Self {
        let (sender, receiver) = channel();

        Self {
            game: Game::default(),
            sender,
            receiver,
            is_searching: Arc::default(),
            search_thread: None,
            selector,
        }
    }

    /// Returns a string of the engine's name and current version.
    pub fn name(&self) -> String {
        format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }

    /// Returns a string of all authors of this engine.
    pub fn authors(&self) -> String {
        // Split multiple authors by comma-space
        env!("CARGO_PKG_AUTHORS").replace(':', ", ").to_string()
    }

    /// Sends an [`EngineCommand`] to the engine to be executed.
    pub fn send_command(&self, command: EngineCommand) {
        // Safe unwrap: `send` can only fail if its corresponding receiver doesn't exist,
        //  and the only way our engine's `Receiver` can no longer exist is when our engine
        //  doesn't exist either, so this is always safe.
        self.sender.send(command).unwrap();
    }

    /// Execute the main event loop for the engine.
    ///
    /// This function spawns a thread to handle input from `stdin` and waits on received commands.
    pub fn run(&mut self) -> Result<()> {
        // Spawn a separate thread for handling user input
        let sender = self.sender.clone();
        thread::spawn(|| {
            if let Err(err) = input_handler(sender) {
                eprintln!("Input handler thread stopping after fatal error: {err}");
            }
        });

        // Loop on user input
        while let Ok(cmd) = self.receiver.recv() {
            match cmd {
                EngineCommand::Display => self.display(),

                EngineCommand::Eval { pretty } => self.eval(pretty),

                EngineCommand::Fen => println!("{}", self.game.to_fen()),

                EngineCommand::Moves { square } => {
                    // Get the legal moves
                    let moves = if let Some(square) = square {
                        self.game.get_legal_moves_from(square.into())
                    } else {
                        self.game.get_legal_moves()
                    };

                    // If there are none, print "(none)"
                    let moves_string = if moves.is_empty() {
                        String::from("(none)")
                    } else {
                        // Otherwise, join them by comma-space
                        moves
                            .into_iter()
                            .map(|mv| mv.to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    };
                    println!("{moves_string}");
                }

                EngineCommand::Exit { cleanup } => {
                    // If requested, await the completion of any ongoing search threads
                    if cleanup {
                        self.stop_search();
                    }

                    // Exit the loop so the engine can quit
                    break;
                }

                EngineCommand::Uci { cmd } => {
                    // Keep running, even on error
                    if let Err(e) = self.handle_uci_command(cmd) {
                        eprintln!("Error: {e}");
                    }
                }
            };
        }

        Ok(())
    }

    /// Handle the execution of a single [`UciCommand`].
    fn handle_uci_command(&mut self, uci: UciCommand) -> Result<()> {
        use UciCommand::*;
        match uci {
            Uci => self.uci(),

            IsReady => println!("{}", UciResponse::<&str>::ReadyOk),

            SetOption { name, value } => self.set_option(&name, value),

            UciNewGame => self.new_game(),

            Position { fen, moves } => self.position(fen, moves)?,

            Go(options) => self.go(options),

            Stop => {
                // Clear the flag first so the worker exits, then join it.
                // Its `bestmove` must flush before the next command runs;
                // otherwise a following `go` could revive the old search and
                // the host would see two `bestmove` lines for one request.
                self.set_is_searching(false);
                self.stop_search();
            }

            Quit => self.send_command(EngineCommand::Exit { cleanup: false }),

            _ => bail!(
                "{} does not support UCI command {uci:?}",
                env!("CARGO_PKG_NAME")
            ),
        }

        Ok(())
    }

    /// Executes the `display` command, printing the current position.
    fn display(&self) {
        println!("{}", self.game);
    }

    /// Executes the `eval` command, printing an evaluation of the current position.
    fn eval(&self, pretty: bool) {
        let evaluator = Evaluator::new(&self.game);
        if pretty {
            print!("{evaluator}\n\nScore: ");
        }

        println!("{}", evaluator.eval());
    }

    /// Set the position to the supplied FEN string (defaults to the standard startpos if not supplied),
    /// and then apply `moves` one-by-one to the position.
    ///
    /// Everything is staged on a scratch copy first; if the FEN or any move
    /// fails to parse or apply, the current position stays authoritative.
    fn position<T: AsRef<str>>(
        &mut self,
        fen: Option<T>,
        moves: impl IntoIterator<Item = T>,
    ) -> Result<()> {
        let mut game = if let Some(fen) = fen {
            fen.as_ref().parse()?
        } else {
            Game::default()
        };

        for mv_str in moves {
            let mv = Move::from_uci(&game, mv_str.as_ref())?;
            game.make_move(mv);
        }

        self.game = game;

        Ok(())
    }

    /// Executes the `go` command, spawning a search on the current position.
    ///
    /// The search runs at a fixed depth under whatever clock the options
    /// describe; parameters with no effect here (`searchmoves`, `infinite`,
    /// ponder and mate limits) do not alter it.
    fn go(&mut self, options: UciSearchOptions) {
        let config = SearchConfig::new(options, &self.game);
        self.search_thread = self.start_search(config);
    }

    /// Resets the engine's internal game state.
    ///
    /// It also cancels any ongoing searches, ignoring their results.
    fn new_game(&mut self) {
        self.set_is_searching(false);
        self.game = Game::default();
    }

    /// Sets the search flag to signal that the engine is starting/stopping a search.
    fn set_is_searching(&mut self, status: bool) {
        self.is_searching.store(status, Ordering::Relaxed);
    }

    /// Returns `true` if the engine is currently executing a search.
    fn is_searching(&self) -> bool {
        self.is_searching.load(Ordering::Relaxed)
    }

    /// Starts a search on the current position, given the parameters in `config`.
    ///
    /// The worker receives its own copy of the position, so the command loop
    /// and the search never share live state; they communicate only through
    /// the `is_searching` flag.
    fn start_search(&mut self, config: SearchConfig) -> Option<JoinHandle<Result<SearchResult>>> {
        // Cannot start a search if one is already running
        if self.is_searching() {
            eprintln!("A search is already running");
            return None;
        }
        self.set_is_searching(true);

        // Clone the parameters that will be sent into the thread
        let game = self.game;
        let is_searching = Arc::clone(&self.is_searching);
        let selector = Arc::clone(&self.selector);

        // Spawn a thread to conduct the search. Each recursion frame carries
        // its own copy of the position, so the worker gets a roomy stack.
        let spawned = thread::Builder::new()
            .name(String::from("search"))
            .stack_size(SEARCH_STACK_SIZE)
            .spawn(move || selector.select(&game, is_searching, config));

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                eprintln!("Failed to spawn search thread: {e}");
                self.set_is_searching(false);
                None
            }
        }
    }

    /// Awaits the current search thread, blocking until it finishes and returning its result.
    fn stop_search(&mut self) -> Option<SearchResult> {
        // Can't stop a search if there aren't any threads searching!
        let handle = self.search_thread.take()?;

        // Attempt to join the thread handle to retrieve the result
        let id = handle.thread().id();
        let Ok(res) = handle.join() else {
            eprintln!("Failed to join on thread {id:?}");
            return None;
        };

        // Flip the search flag so that any active threads will begin to clean themselves up.
        self.set_is_searching(false);

        match res {
            Ok(res) => Some(res),
            Err(e) => {
                eprintln!("Search on thread {id:?} failed: {e}");
                None
            }
        }
    }

    /// Called when the engine receives the `uci` command.
    ///
    /// Prints the engine's ID, version, and authors.
    fn uci(&self) {
        println!("id name {}\nid author {}", self.name(), self.authors());

        // We're ready to go!
        println!("{}", UciResponse::<&str>::UciOk)
    }

    /// Handles the `setoption` command.
    ///
    /// This engine has no tunable parameters, so options are accepted and
    /// acknowledged, but otherwise ignored.
    fn set_option(&mut self, name: &str, _value: Option<String>) {
        self.send_info_string(format!("option {name:?} ignored"));
    }

    fn send_info_string<T: fmt::Display>(&self, info: T) {
        let resp = UciResponse::<String>::Info(Box::new(UciInfo::new().string(info)));
        println!("{resp}");
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Loops endlessly to await input via `stdin`, sending all successfully-parsed commands through the supplied `sender`.
fn input_handler(sender: Sender<EngineCommand>) -> Result<()> {
    let mut buffer = String::with_capacity(2048); // Seems like a good amount of space to pre-allocate

    loop {
        // Clear the buffer, read input, and trim the trailing newline
        buffer.clear();
        let bytes = io::stdin()
            .read_line(&mut buffer)
            .context("Failed to read line when parsing UCI commands")?;

        // For ctrl + d
        if 0 == bytes {
            // Send the Quit command and exit this function
            sender
                .send(EngineCommand::Exit { cleanup: false })
                .context("Failed to send 'quit' command after receiving empty input")?;

            bail!("Engine received input of 0 bytes and is quitting");
        }

        // Trim any leading/trailing whitespace
        let buf = buffer.trim();

        // Ignore empty lines
        if buf.is_empty() {
            continue;
        }

        // These `go` parameters parse fine but never alter the fixed-depth
        // search, so warn instead of silently ignoring them.
        if buf.split_ascii_whitespace().next() == Some("go") {
            for token in ["searchmoves", "infinite"] {
                if buf.split_ascii_whitespace().any(|t| t == token) {
                    let info = UciInfo::new().string(format!("{token} is not implemented"));
                    println!("{}", UciResponse::<String>::Info(Box::new(info)));
                }
            }
        }

        // Attempt to parse the input as a UCI command first, since that's the primary use case of the engine
        match UciCommand::new(buf) {
            Ok(cmd) => sender
                .send(EngineCommand::Uci { cmd })
                .context("Failed to send UCI command to engine")?,

            // If it's not a UCI command, check if it's an engine-specific command
            Err(uci_err) => match EngineCommand::try_parse_from(buf.split_ascii_whitespace()) {
                Ok(cmd) => sender
                    .send(cmd)
                    .context("Failed to send command to engine")?,

                // If it wasn't a custom command, either, print an error.
                Err(_) => eprintln!("{uci_err}"),
            },
        }
    }
}
