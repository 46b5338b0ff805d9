/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! End-to-end tests that drive the engine binary over stdin/stdout, the same
//! way a UCI host would.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chessie::{Game, Move};

fn spawn_engine() -> (Child, ChildStdin, BufReader<std::process::ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_manush");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to spawn engine binary");

    let stdin = child.stdin.take().unwrap();
    let reader = BufReader::new(child.stdout.take().unwrap());
    (child, stdin, reader)
}

/// Reads lines until one starting with `bestmove` appears, returning all
/// output seen plus that line.
fn read_until_bestmove(reader: &mut impl BufRead) -> (String, Option<String>) {
    let mut output = String::new();
    loop {
        let mut line = String::new();
        let bytes = reader.read_line(&mut line).expect("read failed");
        if bytes == 0 {
            return (output, None);
        }
        output.push_str(&line);
        if line.starts_with("bestmove") {
            return (output, Some(line));
        }
    }
}

/// Extracts the move token from a `bestmove` line.
fn bestmove_token(line: &str) -> String {
    let parts: Vec<&str> = line.split_whitespace().collect();
    assert!(parts.len() >= 2, "bestmove missing move: {line}");
    parts[1].to_string()
}

/// Applies `moves` to the startpos and asserts `mv` is legal in the result.
fn assert_legal_after(moves: &[&str], mv: &str) {
    let mut game = Game::default();
    for played in moves {
        let parsed = Move::from_uci(&game, played).expect("setup move must be legal");
        game.make_move(parsed);
    }

    assert!(
        Move::from_uci(&game, mv).is_ok(),
        "bestmove {mv} not legal in position {}",
        game.to_fen()
    );
}

#[test]
fn handshake_and_search_return_a_legal_move() {
    let (mut child, mut stdin, mut reader) = spawn_engine();

    stdin
        .write_all(b"uci\nisready\nposition startpos moves e2e4 e7e5\ngo movetime 100\n")
        .unwrap();

    let (output, bestmove_line) = read_until_bestmove(&mut reader);

    stdin.write_all(b"quit\n").unwrap();
    let _ = child.wait();

    assert!(output.contains("id name"));
    assert!(output.contains("uciok"));
    assert!(output.contains("readyok"));
    // A single bestmove, preceded by an info line carrying the score.
    assert!(output.contains("score cp "));
    assert_eq!(output.matches("bestmove").count(), 1);

    let mv = bestmove_token(&bestmove_line.expect("no bestmove found"));
    assert_legal_after(&["e2e4", "e7e5"], &mv);
}

#[test]
fn stop_interrupts_a_deep_search() {
    let (mut child, stdin, mut reader) = spawn_engine();
    let stdin = Arc::new(Mutex::new(stdin));

    stdin
        .lock()
        .unwrap()
        .write_all(b"uci\nisready\nposition startpos\ngo depth 12\n")
        .unwrap();

    // A depth-12 search without a clock would run for ages; stop it shortly
    // after it starts and expect a bestmove anyway.
    let stdin_clone = Arc::clone(&stdin);
    let stop_thread = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        let _ = stdin_clone.lock().unwrap().write_all(b"stop\n");
    });

    let (_, bestmove_line) = read_until_bestmove(&mut reader);

    let _ = stop_thread.join();
    stdin.lock().unwrap().write_all(b"quit\n").unwrap();
    let _ = child.wait();

    let mv = bestmove_token(&bestmove_line.expect("no bestmove found"));
    assert_legal_after(&[], &mv);
}

#[test]
fn malformed_position_leaves_the_session_usable() {
    let (mut child, mut stdin, mut reader) = spawn_engine();

    // Set a real position, then feed a FEN that cannot parse. The engine must
    // keep the prior position and still search it on request.
    stdin
        .write_all(b"position startpos moves e2e4\nposition fen garbage\ngo depth 1\n")
        .unwrap();

    let (_, bestmove_line) = read_until_bestmove(&mut reader);

    stdin.write_all(b"quit\n").unwrap();
    let _ = child.wait();

    let mv = bestmove_token(&bestmove_line.expect("no bestmove found"));
    // Still Black to move in the position set before the bad FEN.
    assert_legal_after(&["e2e4"], &mv);
}

#[test]
fn unknown_input_does_not_kill_the_session() {
    let (mut child, mut stdin, mut reader) = spawn_engine();

    // Gibberish that happens to start with "go" and mention "infinite" must
    // neither crash the loop nor trigger the go-limitation notice.
    stdin
        .write_all(b"gone infinite\nflounder\nisready\nquit\n")
        .unwrap();

    let mut output = String::new();
    loop {
        let mut line = String::new();
        let bytes = reader.read_line(&mut line).expect("read failed");
        if bytes == 0 {
            break;
        }
        output.push_str(&line);
    }
    let _ = child.wait();

    assert!(output.contains("readyok"));
    assert!(!output.contains("not implemented"));
    assert!(!output.contains("bestmove"));
}

#[test]
fn each_go_gets_exactly_one_bestmove() {
    let (mut child, mut stdin, mut reader) = spawn_engine();

    stdin
        .write_all(b"position startpos\ngo depth 10\n")
        .unwrap();

    // Let the first search get going, then stop it and immediately request
    // another. The host must see one bestmove per go, in order.
    thread::sleep(Duration::from_millis(300));
    stdin.write_all(b"stop\ngo depth 1\nquit\n").unwrap();

    let mut bestmoves = 0;
    loop {
        let mut line = String::new();
        let bytes = reader.read_line(&mut line).expect("read failed");
        if bytes == 0 {
            break;
        }
        if line.starts_with("bestmove") {
            bestmoves += 1;
        }
    }
    let _ = child.wait();

    assert_eq!(bestmoves, 2, "expected one bestmove per go command");
}

#[test]
fn mate_in_one_is_found_over_the_wire() {
    let (mut child, mut stdin, mut reader) = spawn_engine();

    // White to move; Qb7 is mate.
    stdin
        .write_all(b"position fen k7/8/KQ6/8/8/8/8/8 w - - 0 1\ngo depth 2\n")
        .unwrap();

    let (_, bestmove_line) = read_until_bestmove(&mut reader);

    stdin.write_all(b"quit\n").unwrap();
    let _ = child.wait();

    let mv = bestmove_token(&bestmove_line.expect("no bestmove found"));

    let game = Game::from_fen("k7/8/KQ6/8/8/8/8/8 w - - 0 1").unwrap();
    let parsed = Move::from_uci(&game, &mv).expect("bestmove must be legal");
    let after = game.with_move_made(parsed);
    assert!(
        after.get_legal_moves().is_empty() && after.is_in_check(),
        "bestmove {mv} does not deliver mate"
    );
}
