// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Low-level ANSI escape sequence handling.
//!
//! Everything that measures or rewrites already-styled text lives here, so the
//! higher-level renderers never have to reason about escape sequence syntax
//! directly.

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches a CSI (`ESC [ ... m|K`) or OSC (`ESC ] ... ST`) escape sequence.
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b(\[[0-9;]*[mK]|\][^\x07\x1b]*(\x07|\x1b\\))").expect("valid regex")
});

/// Matches a single SGR sequence, to pull out its numeric parameters.
static SGR_SEQUENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[([0-9;]*)m").expect("valid regex"));

/// Matches keystroke/cursor escape sequences a terminal's line discipline may
/// echo back (arrow keys, function keys, `CSI ... letter`), as opposed to the
/// SGR (`m`) and erase-line (`K`) sequences we emit ourselves, which are left
/// alone.
static KEYCODE_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-JL-ln-~])").expect("valid regex"));

/// Remove all CSI and OSC escape sequences from `s`, returning the plain
/// "glyph" text a reader actually sees.
pub fn visible(s: &str) -> String {
    ANSI_ESCAPE.replace_all(s, "").into_owned()
}

/// The number of visible characters in `s`, ignoring any ANSI escape
/// sequences. This is a character count, not a byte count: multi-byte UTF-8
/// is handled correctly.
pub fn visible_length(s: &str) -> usize {
    visible(s).chars().count()
}

/// Extract every SGR escape sequence verbatim, in the order they occur.
pub fn extract_codes(s: &str) -> Vec<String> {
    SGR_SEQUENCE
        .find_iter(s)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Strip terminal keystroke/cursor escape sequences, leaving SGR/OSC output
/// intact. Used by the stream driver's idle-prompt heuristic, which must not
/// mistake an echoed arrow key for literal text.
pub fn strip_keycodes(s: &str) -> String {
    KEYCODE_ESCAPE.replace_all(s, "").into_owned()
}

/// The style "class" an SGR parameter belongs to, used to decide which
/// earlier codes a new one supersedes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StyleClass {
    Foreground,
    Background,
    Bold,
    Italic,
    Underline,
    FullReset,
    Other,
}

fn classify(param: u32) -> StyleClass {
    match param {
        0 => StyleClass::FullReset,
        1 | 21 | 22 => StyleClass::Bold,
        3 | 23 => StyleClass::Italic,
        4 | 24 => StyleClass::Underline,
        30..=39 => StyleClass::Foreground,
        40..=49 => StyleClass::Background,
        _ => StyleClass::Other,
    }
}

/// Given the ordered list of `active` SGR sequences currently open and one
/// `new` sequence about to be appended, drop every earlier sequence in
/// `active` whose style class `new` supersedes.
///
/// A full reset (`ESC[0m`) clears everything. This keeps the style preamble
/// re-emitted at the start of every wrapped line bounded, rather than
/// accumulating one entry per paragraph.
pub fn collapse(active: &mut Vec<String>, new: &str) {
    let new_classes: Vec<StyleClass> = SGR_SEQUENCE
        .captures(new)
        .map(|caps| {
            caps.get(1)
                .map(|m| m.as_str())
                .unwrap_or("")
                .split(';')
                .filter(|p| !p.is_empty())
                .filter_map(|p| p.parse::<u32>().ok())
                .map(classify)
                .collect()
        })
        .unwrap_or_default();

    if new_classes.contains(&StyleClass::FullReset) {
        active.clear();
        return;
    }

    if new_classes.is_empty() {
        return;
    }

    active.retain(|code| {
        let Some(caps) = SGR_SEQUENCE.captures(code) else {
            return true;
        };
        let classes: Vec<StyleClass> = caps
            .get(1)
            .map(|m| m.as_str())
            .unwrap_or("")
            .split(';')
            .filter(|p| !p.is_empty())
            .filter_map(|p| p.parse::<u32>().ok())
            .map(classify)
            .collect();
        !classes.iter().any(|c| new_classes.contains(c))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_strips_sgr() {
        assert_eq!(visible("\x1b[1mbold\x1b[22m"), "bold");
    }

    #[test]
    fn visible_strips_osc8_link() {
        let s = "\x1b]8;;http://example.com\x1b\\text\x1b]8;;\x1b\\";
        assert_eq!(visible(s), "text");
    }

    #[test]
    fn visible_length_counts_chars_not_bytes() {
        assert_eq!(visible_length("\x1b[1m世界\x1b[22m"), 2);
    }

    #[test]
    fn extract_codes_finds_all() {
        let codes = extract_codes("\x1b[1m\x1b[38;2;1;2;3mtext\x1b[0m");
        assert_eq!(codes, vec!["\x1b[1m", "\x1b[38;2;1;2;3m", "\x1b[0m"]);
    }

    #[test]
    fn collapse_drops_same_class_foreground() {
        let mut active = vec!["\x1b[38;2;1;2;3m".to_string()];
        collapse(&mut active, "\x1b[38;2;4;5;6m");
        assert!(active.is_empty());
    }

    #[test]
    fn collapse_keeps_different_classes() {
        let mut active = vec!["\x1b[1m".to_string(), "\x1b[38;2;1;2;3m".to_string()];
        collapse(&mut active, "\x1b[4m");
        assert_eq!(active.len(), 2);
    }

    #[test]
    fn collapse_full_reset_clears_everything() {
        let mut active = vec!["\x1b[1m".to_string(), "\x1b[38;2;1;2;3m".to_string()];
        collapse(&mut active, "\x1b[0m");
        assert!(active.is_empty());
    }

    #[test]
    fn strip_keycodes_removes_arrow_keys_not_sgr() {
        let s = "\x1b[A\x1b[1mfoo\x1b[22m";
        assert_eq!(strip_keycodes(s), "foo");
    }
}
