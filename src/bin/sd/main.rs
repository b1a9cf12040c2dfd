// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The `sd` binary: parses arguments, wires up the narrow collaborators, and
//! picks one of the three input modes the driver (C6) supports.

use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use streamdown::config::{self, Config};
use streamdown::driver::RenderSession;
use streamdown::highlight::SyntectHighlighter;
use streamdown::inline::NullImageRenderer;
use streamdown::plugins::clipboard::Osc52Clipboard;
use streamdown::plugins::latex::UnicodeLatexPlugin;
use streamdown::term;
use tracing_subscriber::EnvFilter;

/// Stream Markdown from an LLM assistant, a pipe, or a PTY straight to your
/// terminal.
#[derive(Debug, Parser)]
#[command(name = "sd", version, about, long_about = None)]
struct Cli {
    /// Markdown files to render. Reads standard input when none are given.
    files: Vec<PathBuf>,

    /// Run COMMAND in a pseudo-terminal and render its output as it streams.
    #[arg(short = 'e', long = "exec", value_name = "COMMAND")]
    exec: Option<String>,

    /// Write each fenced code block to its own file in this directory.
    #[arg(short = 's', long = "scrape", value_name = "DIR")]
    scrape: Option<PathBuf>,

    /// Wrap output to this many columns instead of detecting the terminal width.
    #[arg(short = 'w', long = "width", value_name = "COLUMNS")]
    width: Option<usize>,

    /// Base color as "H,S,V" (each 0.0-1.0), overriding the configured default.
    #[arg(short = 'c', long = "color", value_name = "H,S,V")]
    color: Option<String>,

    /// Minimum log level to print on stderr (error, warn, info, debug, trace).
    #[arg(short = 'l', long = "loglevel", value_name = "LEVEL")]
    loglevel: Option<String>,

    /// Print a shell completion script for the given shell and exit.
    #[arg(long = "completions", value_name = "SHELL")]
    completions: Option<Shell>,
}

fn init_logging(loglevel: Option<&str>) {
    let filter = loglevel
        .map(EnvFilter::new)
        .or_else(|| std::env::var("RUST_LOG").ok().map(EnvFilter::new))
        .unwrap_or_else(|| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn parse_color(spec: &str) -> Option<[f64; 3]> {
    let mut parts = spec.splitn(3, ',');
    let h = parts.next()?.trim().parse().ok()?;
    let s = parts.next()?.trim().parse().ok()?;
    let v = parts.next()?.trim().parse().ok()?;
    Some([h, s, v])
}

fn apply_cli_overrides(mut config: Config, cli: &Cli) -> Config {
    if let Some(width) = cli.width {
        config.style.width = width;
    }
    if let Some(spec) = cli.color.as_deref() {
        match parse_color(spec) {
            Some(hsv) => config.style.hsv = hsv,
            None => tracing::warn!(spec, "ignoring malformed --color value, expected H,S,V"),
        }
    }
    config
}

fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.loglevel.as_deref());

    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        let name = command.get_name().to_string();
        clap_complete::generate(shell, &mut command, name, &mut io::stdout());
        std::process::exit(0);
    }

    let config = apply_cli_overrides(config::load(), &cli);
    let full_width = if config.style.width > 0 {
        config.style.width
    } else {
        term::detect_width()
    };

    let highlighter = SyntectHighlighter::new();
    let images = NullImageRenderer;
    let latex = UnicodeLatexPlugin;
    let clipboard = Osc52Clipboard;
    let clipboard: Option<&dyn streamdown::plugins::clipboard::ClipboardSink> =
        if config.features.clipboard { Some(&clipboard) } else { None };

    let stdout = io::stdout();
    let mut session = RenderSession::new(
        &config,
        full_width,
        &highlighter,
        &images,
        &latex,
        clipboard,
        cli.scrape.clone(),
        stdout.lock(),
    );

    let result = if let Some(command) = cli.exec.as_deref() {
        session.run_exec(command)
    } else if !cli.files.is_empty() {
        run_files(&mut session, &cli.files)
    } else if io::stdin().is_terminal() {
        let _ = Cli::command().print_help();
        println!();
        std::process::exit(0);
    } else if io::stdout().is_terminal() {
        let timeout = Duration::from_secs_f64(config.features.timeout.max(0.05));
        session.run_nonblocking_pipe(timeout)
    } else {
        session.run_blocking(io::stdin())
    };

    if let Err(error) = result {
        eprintln!("sd: {error}");
        std::process::exit(1);
    }

    io::stdout().flush().ok();
    std::process::exit(session.exit_code());
}

fn run_files<W: Write>(session: &mut RenderSession<'_, W>, files: &[PathBuf]) -> Result<(), streamdown::Error> {
    for path in files {
        let mut file = std::fs::File::open(path).map_err(streamdown::Error::Io)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(streamdown::Error::Io)?;
        session.run_blocking(io::Cursor::new(buf))?;
    }
    Ok(())
}
