/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::str::FromStr;

use manush::{Engine, EngineCommand};

fn main() {
    let mut engine = Engine::new();

    // Each argument is treated as one command to execute before entering the
    // event loop, so `manush "position startpos" "go depth 3"` works.
    for arg in std::env::args().skip(1) {
        match EngineCommand::from_str(&arg) {
            Ok(cmd) => engine.send_command(cmd),
            Err(e) => eprintln!("Failed to parse argument {arg:?}:\n{e}"),
        }
    }

    if let Err(e) = engine.run() {
        eprintln!("{} encountered an error: {e}", env!("CARGO_PKG_NAME"));
    }
}
