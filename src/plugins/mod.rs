// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Narrow external-collaborator interfaces (§6): a LaTeX-to-unicode
//! transformer and the OSC-52 clipboard sink. Both are invoked by the
//! driver (C6) around a line's normal block-level dispatch.

pub mod clipboard;
pub mod latex;

/// Result of offering a line to a [`latex::LatexPlugin`], replacing Python's
/// `None | True | [chunks]` return convention with a tagged variant
/// (§9 "Exceptions for control flow").
#[derive(Debug, Clone)]
pub enum PluginOutcome {
    /// Unrecognized; continue with the normal block-level dispatch.
    Continue,
    /// Fully consumed; emit nothing and fetch the next line.
    Consumed,
    /// Consumed; emit these chunks instead of normal dispatch.
    Replace(Vec<String>),
}
