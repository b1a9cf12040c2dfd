// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! PTY allocation and terminal-mode handling for exec mode (§4.6).
//!
//! A child process launched with `-e`/`--exec` gets its standard streams
//! wired to the user (slave) side of a freshly allocated pseudo-terminal; the
//! driver keeps the controller (master) side and multiplexes it against the
//! real keyboard. The user's own terminal is switched to cbreak mode for the
//! duration so keystrokes reach the driver one at a time instead of waiting
//! on a line-buffered read.

use std::os::fd::{AsFd, OwnedFd};

use rustix::pty::{openpty, OpenptyParams};
use rustix::stdio::stdin;
use rustix::termios::{tcgetattr, tcsetattr, OptionalActions, Termios};

use crate::error::Error;

/// An allocated controller/user pseudo-terminal pair.
pub struct Pty {
    pub controller: OwnedFd,
    pub user: OwnedFd,
}

impl Pty {
    /// Allocate a new PTY pair with no controlling terminal association.
    pub fn open() -> Result<Self, Error> {
        let result = openpty(None, &OpenptyParams::default()).map_err(|errno| {
            Error::Terminal(std::io::Error::from_raw_os_error(errno.raw_os_error()))
        })?;
        Ok(Pty {
            controller: result.controller,
            user: result.user,
        })
    }

}

/// RAII guard that restores the calling terminal's mode on drop, regardless
/// of which exit path (normal completion, `Ctrl-C`, or panic unwinding)
/// leaves the driver's main loop.
pub struct TerminalModeGuard {
    original: Termios,
}

impl TerminalModeGuard {
    /// Snapshot the current terminal mode and switch stdin to cbreak mode:
    /// input is unbuffered and unechoed, but signal generation (`Ctrl-C`)
    /// still works.
    pub fn enter_cbreak() -> Result<Self, Error> {
        let stdin = stdin();
        let original = tcgetattr(stdin.as_fd()).map_err(|errno| {
            Error::Terminal(std::io::Error::from_raw_os_error(errno.raw_os_error()))
        })?;
        let mut cbreak = original.clone();
        cbreak.make_raw();
        cbreak.local_modes |= rustix::termios::LocalModes::ISIG;
        tcsetattr(stdin.as_fd(), OptionalActions::Now, &cbreak).map_err(|errno| {
            Error::Terminal(std::io::Error::from_raw_os_error(errno.raw_os_error()))
        })?;
        Ok(TerminalModeGuard { original })
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let stdin = stdin();
        let _ = tcsetattr(stdin.as_fd(), OptionalActions::Now, &self.original);
    }
}
