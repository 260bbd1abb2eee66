//! Command-line front end for the sam structural-regex command engine.
//!
//! Reads a file, runs one command line against it end to end (lex,
//! parse, execute, commit), and either prints the result to stdout or
//! writes it back in place.

use clap::Parser;
use sam_engine::{run_command_line, CollectingEmitter, ProcessPipe};
use sam_error::SamError;
use sam_registers::InMemoryRegisters;
use sam_text_mem::{InMemoryView, RopeText};
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing_subscriber::{fmt, EnvFilter};

/// Run a sam-style structural-regex command against a file.
#[derive(Parser, Debug)]
#[command(name = "sam", version, about, long_about = None)]
struct Args {
    /// File to read and operate on
    file: PathBuf,

    /// The command line to run, e.g. ",x/foo/ c/bar/"
    command: String,

    /// Write the result back to `file` instead of printing it to stdout
    #[arg(long)]
    write: bool,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

/// Runs `|`/`>`/`<`/`!` commands' shell text through the host shell.
/// Grounded on the same `std::process::Command` pattern a shell-out
/// collaborator needs regardless of embedding; kept minimal since the
/// engine only ever needs stdin piped in and stdout captured.
struct ShellPipe;

impl ProcessPipe for ShellPipe {
    fn run(&mut self, shell_cmd: &str, stdin: &[u8]) -> Result<Vec<u8>, SamError> {
        use std::io::Write;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(shell_cmd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|_| SamError::Shell)?;

        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(stdin).map_err(|_| SamError::Shell)?;
        }

        let output = child.wait_with_output().map_err(|_| SamError::Shell)?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(SamError::Shell)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    tracing::info!(file = %args.file.display(), "sam: running command");

    let original = std::fs::read_to_string(&args.file)?;
    let mut text = RopeText::from_str(&original);
    let mut view = InMemoryView::with_initial_selection();
    let mut registers = InMemoryRegisters::new();
    let mut pipe = ShellPipe;
    let mut emit = CollectingEmitter::default();
    let registry = sam_command::default_registry();

    let (error, errors) = run_command_line(
        args.command.as_bytes(),
        &registry,
        &mut text,
        &mut view,
        &mut registers,
        &mut pipe,
        &mut emit,
    );

    for message in &emit.messages {
        tracing::info!("{message}");
    }

    if error != SamError::Ok {
        eprintln!("{}", errors.render(&args.command));
        std::process::exit(1);
    }

    let result = text.as_string();
    if args.write {
        std::fs::write(&args.file, &result)?;
        tracing::info!(file = %args.file.display(), "wrote result");
    } else {
        print!("{result}");
    }

    Ok(())
}
