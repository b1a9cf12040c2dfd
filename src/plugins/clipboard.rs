// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! OSC-52 clipboard sink (§6). On exit, the driver hands the full rendered
//! (or raw, depending on config) document to a [`ClipboardSink`], which
//! base64-encodes it and wraps it in an OSC-52 escape sequence so the
//! terminal emulator copies it to the system clipboard — no subprocess or
//! platform clipboard API involved.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const OSC52_PREFIX: &str = "\x1b]52;c;";
const OSC52_SUFFIX: &str = "\x07";

/// Accepts a complete buffer at the end of a stream and hands it off to
/// whatever actually owns the terminal's output stream.
pub trait ClipboardSink {
    fn copy(&self, text: &str);
}

/// Writes the OSC-52 escape sequence for `text` directly to stdout.
pub struct Osc52Clipboard;

impl Osc52Clipboard {
    /// Build the escape sequence without emitting it, for testing and for
    /// callers that want to interleave it with other output themselves.
    pub fn encode(text: &str) -> String {
        let encoded = STANDARD.encode(text.as_bytes());
        format!("{OSC52_PREFIX}{encoded}{OSC52_SUFFIX}")
    }
}

impl ClipboardSink for Osc52Clipboard {
    fn copy(&self, text: &str) {
        print!("{}", Self::encode(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_wraps_base64_in_osc52() {
        let seq = Osc52Clipboard::encode("hi");
        assert!(seq.starts_with(OSC52_PREFIX));
        assert!(seq.ends_with(OSC52_SUFFIX));
        assert!(seq.contains(&STANDARD.encode(b"hi")));
    }

    #[test]
    fn encode_round_trips_through_base64() {
        let seq = Osc52Clipboard::encode("streamdown");
        let body = seq
            .strip_prefix(OSC52_PREFIX)
            .unwrap()
            .strip_suffix(OSC52_SUFFIX)
            .unwrap();
        let decoded = STANDARD.decode(body).unwrap();
        assert_eq!(decoded, b"streamdown");
    }
}
