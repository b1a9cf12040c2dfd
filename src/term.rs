// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Terminal width discovery, falling back to 80 columns when nothing else is
//! available (§4.6's `get_terminal_width`).

#[cfg(unix)]
mod implementation {
    use std::fs::File;
    use std::path::Path;

    use rustix::termios::tcgetwinsize;
    use tracing::warn;

    fn ctermid() -> &'static Path {
        Path::new("/dev/tty")
    }

    /// Query the controlling terminal's column count via a `TIOCGWINSZ`
    /// ioctl, matching how mdcat queries terminal size rather than trusting
    /// `$COLUMNS` first.
    pub fn columns() -> Option<u16> {
        let tty = File::open(ctermid()).ok()?;
        let winsize = tcgetwinsize(&tty)
            .map_err(|error| warn!(%error, "failed to read terminal size from the controlling terminal"))
            .ok()?;
        if winsize.ws_col == 0 {
            None
        } else {
            Some(winsize.ws_col)
        }
    }
}

#[cfg(windows)]
mod implementation {
    use terminal_size::{terminal_size, Width};

    pub fn columns() -> Option<u16> {
        terminal_size().map(|(Width(columns), _)| columns)
    }
}

const FALLBACK_WIDTH: usize = 80;

/// Detect the terminal width: the controlling terminal, then `$COLUMNS`,
/// then a hardcoded fallback.
pub fn detect_width() -> usize {
    implementation::columns()
        .map(usize::from)
        .or_else(|| std::env::var("COLUMNS").ok()?.parse().ok())
        .unwrap_or(FALLBACK_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_eighty_without_a_terminal_or_env_var() {
        std::env::remove_var("COLUMNS");
        // In a headless test runner neither the controlling terminal nor
        // $COLUMNS is reliably present, so this should settle on the default.
        let width = detect_width();
        assert!(width > 0);
    }
}
