// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The code block streamer (C4): incremental re-highlighting that emits
//! only the stable suffix of the accumulated, rehighlighted source as new
//! lines arrive.

use crate::ansi;
use crate::highlight::Highlighter;
use crate::style;

/// Fence kind a code block was entered through, since `CodeSpaces` exit is
/// re-injected rather than consumed (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Backtick,
    Spaces,
}

/// Per-block streaming state. Reset to a fresh value on every block entry,
/// per the `code_gen` invariant in §3.
pub struct CodeState {
    pub kind: CodeKind,
    pub language: String,
    /// Accumulated raw code seen so far (`B` in §4.4), after indent stripping.
    raw: String,
    /// Byte index into the last rehighlighted buffer where the previously
    /// emitted output ended (`G` in §4.4).
    emitted_to: usize,
    /// The leading indent snapshotted on block entry, stripped from every
    /// subsequent line before it reaches the highlighter.
    pub indent: usize,
    pub first_line: bool,
    /// Staging buffer for a code line split across multiple stream frames.
    staging: String,
}

impl CodeState {
    pub fn new(kind: CodeKind, language: String) -> Self {
        CodeState {
            kind,
            language,
            raw: String::new(),
            emitted_to: 0,
            indent: 0,
            first_line: true,
            staging: String::new(),
        }
    }

    /// Buffer a raw (still indented) line fragment; returns the complete
    /// line once a `\n` has been seen, else `None` and keeps staging.
    pub fn stage_line(&mut self, fragment: &str) -> Option<String> {
        self.staging.push_str(fragment);
        if self.staging.ends_with('\n') {
            Some(std::mem::take(&mut self.staging))
        } else {
            None
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Rehighlight the accumulated buffer plus `line`, diff against the last
    /// emitted prefix, and return the new stable suffix to emit (§4.4).
    pub fn feed_line(&mut self, line: &str, highlighter: &dyn Highlighter, theme: &str) -> String {
        let highlighted = highlighter.highlight(&self.language, theme, &format!("{}{line}", self.raw));
        let highlighted = highlighted
            .strip_suffix(&format!("{}\n", style::FG_RESET))
            .unwrap_or(&highlighted)
            .to_string();

        // The highlighter eats leading newlines on an otherwise-empty buffer.
        let visible_already_emitted = ansi::visible_length(self.raw.trim_start());

        let mut cursor = self.emitted_to.min(highlighted.len());
        while !highlighted.is_char_boundary(cursor)
            || ansi::visible_length(&highlighted[..cursor]) > visible_already_emitted
        {
            if cursor == 0 {
                break;
            }
            cursor -= 1;
        }

        self.raw.push_str(line);

        let mut batch = highlighted[cursor..].to_string();
        if let Some(rest) = batch.strip_prefix(style::FG_RESET) {
            batch = rest.to_string();
        }

        self.emitted_to = highlighted.len();
        batch
    }
}

/// Split `text` into screen-row-sized segments by *character* count (not
/// byte count — UTF-8 multi-byte sequences, combining marks, and wide CJK
/// glyphs must never be sliced mid-codepoint), preserving the line's
/// leading indentation as a prefix on the first segment only.
///
/// Returns `(indent, segments)`.
pub fn code_wrap(text: &str, width: usize) -> (usize, Vec<String>) {
    let stripped = text.trim_start_matches(' ');
    let indent = text.chars().count() - stripped.chars().count();
    let usable = width.saturating_sub(indent).max(1);

    if stripped.is_empty() {
        return (0, vec![text.to_string()]);
    }

    let chars: Vec<char> = stripped.chars().collect();
    let segments = chars
        .chunks(usable)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect();
    (indent, segments)
}

/// Pad an already-visible-width-measured `line` with the code background to
/// the full output width, so the panel stays a solid rectangle (§4.4).
pub fn pad_to_width(line: &str, width: usize, bg: &str) -> String {
    let margin = width.saturating_sub(ansi::visible_length(line));
    format!("{bg}{line}{}{}", " ".repeat(margin), style::BG_RESET)
}

/// The filename extension a scraped code block should use, keyed by the
/// fenced/indented block's language token. Falls back to `sh` for anything
/// unrecognized, matching the source-of-truth script's own lexer-lookup
/// fallback.
pub fn extension_for(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "python" | "py" => "py",
        "rust" | "rs" => "rs",
        "javascript" | "js" => "js",
        "typescript" | "ts" => "ts",
        "go" | "golang" => "go",
        "ruby" | "rb" => "rb",
        "java" => "java",
        "c" => "c",
        "c++" | "cpp" | "cxx" => "cpp",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "html" => "html",
        "css" => "css",
        "sql" => "sql",
        _ => "sh",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::SyntectHighlighter;

    #[test]
    fn code_wrap_splits_by_character_not_byte_count() {
        // Each CJK character is 3 bytes in UTF-8; splitting at byte index 4
        // would land mid-codepoint.
        let text = "世界世界世界";
        let (indent, segments) = code_wrap(text, 2);
        assert_eq!(indent, 0);
        for segment in &segments {
            assert!(segment.chars().count() <= 2);
        }
        assert_eq!(segments.concat(), text);
    }

    #[test]
    fn code_wrap_preserves_indent_on_first_segment_only() {
        let (indent, segments) = code_wrap("    abcdef", 4);
        assert_eq!(indent, 4);
        assert_eq!(segments[0], "abcd");
        assert_eq!(segments[1], "ef");
    }

    #[test]
    fn code_wrap_keeps_empty_lines() {
        let (indent, segments) = code_wrap("", 10);
        assert_eq!(indent, 0);
        assert_eq!(segments, vec![""]);
    }

    #[test]
    fn feed_line_emits_growing_suffix() {
        let highlighter = SyntectHighlighter::new();
        let mut state = CodeState::new(CodeKind::Backtick, "python".to_string());
        let first = state.feed_line("x = 1\n", &highlighter, "base16-ondark");
        assert!(ansi::visible(&first).contains("x = 1"));
        let second = state.feed_line("y = 2\n", &highlighter, "base16-ondark");
        assert!(ansi::visible(&second).contains("y = 2"));
        assert!(!ansi::visible(&second).contains("x = 1"));
    }
}
