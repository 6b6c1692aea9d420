//! Manual-override console.
//!
//! Runs on its own OS thread next to the session.  Plain text is injected as
//! a game command; slash-commands steer the session:
//!   /help          – show this list
//!   /pause         – stop autonomous play
//!   /resume        – resume autonomous play (clears throttle memory)
//!   /reset         – clear throttle and classifier memory
//!   /state         – print the tracked world state
//!   /quit | /exit  – end the session

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, warn};

use mudgate_runtime::SessionHandle;

/// One parsed line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    Pause,
    Resume,
    Reset,
    State,
    Quit,
    /// A game command to send as-is.
    Inject(String),
    Unknown(String),
    Empty,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ConsoleCommand::Empty;
        }
        if !line.starts_with('/') {
            return ConsoleCommand::Inject(line.to_string());
        }
        match line.to_ascii_lowercase().as_str() {
            "/help" | "/?" => ConsoleCommand::Help,
            "/pause" => ConsoleCommand::Pause,
            "/resume" => ConsoleCommand::Resume,
            "/reset" => ConsoleCommand::Reset,
            "/state" => ConsoleCommand::State,
            "/quit" | "/exit" => ConsoleCommand::Quit,
            _ => ConsoleCommand::Unknown(line.to_string()),
        }
    }
}

/// Read console input until `/quit`, Ctrl-D, or Ctrl-C.
///
/// `runtime` is used to query the world state; this function must not be
/// called from inside an async task.
pub fn run(handle: SessionHandle, runtime: tokio::runtime::Handle) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            warn!(error = %e, "console unavailable; manual override disabled");
            return;
        }
    };

    loop {
        let line = match editor.readline("mudgate> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                handle.shutdown();
                break;
            }
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                handle.shutdown();
                break;
            }
        };
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }

        match ConsoleCommand::parse(&line) {
            ConsoleCommand::Empty => {}
            ConsoleCommand::Help => print_help(),
            ConsoleCommand::Pause => handle.pause(),
            ConsoleCommand::Resume => handle.resume(),
            ConsoleCommand::Reset => {
                handle.reset();
                println!("{}", "  ✓ Throttle and classifier memory cleared.".green());
            }
            ConsoleCommand::State => {
                let summary = runtime.block_on(handle.world_summary());
                println!("  {}", summary.bold());
            }
            ConsoleCommand::Inject(command) => {
                debug!(%command, "manual command");
                handle.inject(command);
            }
            ConsoleCommand::Quit => {
                println!("{}", "Goodbye.".green());
                handle.shutdown();
                break;
            }
            ConsoleCommand::Unknown(other) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

fn print_help() {
    println!();
    println!("{}", "MudGate Commands".bold().underline());
    println!("  {}        – stop autonomous play", "/pause".bold().cyan());
    println!("  {}       – resume autonomous play", "/resume".bold().cyan());
    println!("  {}        – clear throttle and classifier memory", "/reset".bold().cyan());
    println!("  {}        – show the tracked world state", "/state".bold().cyan());
    println!("  {}  – end the session", "/quit  /exit".bold().cyan());
    println!("  Anything else is sent to the game as a manual command.");
    println!();
}
