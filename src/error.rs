// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The crate's typed error taxonomy.
//!
//! Most of these are logged and swallowed at the point they occur (see §7 of
//! the design doc); only [`Error::Io`] and [`Error::Config`] ever propagate
//! out of [`crate::driver`].

use std::io;
use std::path::PathBuf;

/// Errors that can terminate a render session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading from the input stream failed.
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),

    /// The configuration file could not be read or written.
    #[error("failed to load configuration from {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    /// The child process for `-e`/`--exec` could not be spawned.
    #[error("failed to spawn child process {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// PTY allocation or terminal mode switching failed.
    #[error("terminal setup failed: {0}")]
    Terminal(#[source] io::Error),
}

/// Errors from configuration loading and parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine the user configuration directory")]
    NoConfigDir,
    #[error("failed to read configuration file: {0}")]
    Read(#[source] io::Error),
    #[error("failed to write default configuration file: {0}")]
    Write(#[source] io::Error),
    #[error("failed to parse configuration TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Non-fatal conditions logged via `tracing` and otherwise ignored, per the
/// propagation policy in §7: nothing here ever aborts the render loop.
#[derive(Debug, thiserror::Error)]
pub enum RenderWarning {
    #[error("highlighter could not find language {language:?}, falling back to bash/default")]
    UnknownLanguage { language: String },
    #[error("could not render image {url:?}: {reason}")]
    ImageFailed { url: String, reason: String },
    #[error("table separator row did not match the expected pattern: {line:?}")]
    MalformedTableSeparator { line: String },
    #[error("indentation decreased below the first line's indent ({expected} spaces)")]
    IndentationDecreased { expected: usize },
}
