use std::io::{stdin, stdout, Write};

use forthboy::{Console, RecordingHost};
use miette::IntoDiagnostic;

use crate::config::Config;

/// Typed on its own line, runs one frame instead of being interpreted.
const TICK: &str = "tick";

pub fn run(config: &Config) -> miette::Result<()> {
    let mut console = Console::boot(
        RecordingHost::new(),
        &config.console,
        config.forth.clone(),
    )
    .map_err(|e| e.error)
    .into_diagnostic()?;

    let mut inp = String::new();
    loop {
        print!("> ");
        stdout().flush().into_diagnostic()?;
        inp.clear();
        if stdin().read_line(&mut inp).into_diagnostic()? == 0 {
            println!();
            return Ok(());
        }

        let res = if inp.trim() == TICK {
            console.tick()
        } else {
            console.interpret(&inp, "repl")
        };

        let host = console.host_mut();
        print!("{}", host.take_output());
        for cmd in host.take_commands() {
            println!("  {cmd:?}");
        }
        match res {
            Ok(()) => {
                let stack = console.forth().data_stack.as_slice();
                if stack.is_empty() {
                    println!("ok.");
                } else {
                    println!("ok. {stack:?}");
                }
            }
            Err(e) => println!("error: {e}"),
        }
    }
}
