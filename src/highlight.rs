// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The syntax-highlighting bridge: wraps `syntect` behind the narrow
//! [`Highlighter`] trait the code-block streamer (C4) drives.
//!
//! Per §7's error taxonomy, an unknown language or theme name never aborts a
//! block: the wrapper silently substitutes `bash` and the bundled default
//! theme and logs a warning.

use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::as_24_bit_terminal_escaped;
use tracing::warn;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

const FALLBACK_LANGUAGE: &str = "bash";
const FALLBACK_THEME: &str = "base16-ondark";

/// Turns a full source buffer plus a language token into 24-bit-SGR-colored
/// terminal text. Implementations are re-entered with growing buffers but
/// retain no state across calls (§5): the whole source is rehighlighted
/// every time, per the streaming diff in [`crate::code`].
pub trait Highlighter {
    fn highlight(&self, language: &str, theme: &str, source: &str) -> String;
}

/// The production [`Highlighter`] backed by `syntect`'s bundled syntax and
/// theme sets.
pub struct SyntectHighlighter;

impl SyntectHighlighter {
    pub fn new() -> Self {
        SyntectHighlighter
    }

    fn syntax_for(&self, language: &str) -> &'static SyntaxReference {
        SYNTAX_SET
            .find_syntax_by_token(language)
            .or_else(|| SYNTAX_SET.find_syntax_by_extension(language))
            .unwrap_or_else(|| {
                warn!(language, "unknown language, falling back to bash");
                SYNTAX_SET
                    .find_syntax_by_token(FALLBACK_LANGUAGE)
                    .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text())
            })
    }

    fn theme_for(&self, name: &str) -> &'static Theme {
        THEME_SET.themes.get(name).unwrap_or_else(|| {
            warn!(theme = name, "unknown theme, falling back to default");
            THEME_SET
                .themes
                .get(FALLBACK_THEME)
                .expect("bundled fallback theme always present")
        })
    }
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter for SyntectHighlighter {
    fn highlight(&self, language: &str, theme: &str, source: &str) -> String {
        let syntax = self.syntax_for(language);
        let theme = self.theme_for(theme);
        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut out = String::with_capacity(source.len() * 2);
        for line in syntect::util::LinesWithEndings::from(source) {
            let Ok(ranges) = highlighter.highlight_line(line, &SYNTAX_SET) else {
                out.push_str(line);
                continue;
            };
            out.push_str(&as_24_bit_terminal_escaped(&ranges, false));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_language_falls_back_without_panicking() {
        let highlighter = SyntectHighlighter::new();
        let out = highlighter.highlight("not-a-real-language", "monokai", "echo hi\n");
        assert!(out.contains("echo"));
    }

    #[test]
    fn known_language_produces_escape_sequences() {
        let highlighter = SyntectHighlighter::new();
        let out = highlighter.highlight("python", "base16-ondark", "x = 1\n");
        assert!(out.contains("\x1b["));
    }
}
