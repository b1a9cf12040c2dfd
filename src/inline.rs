// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The inline formatter (C2): one-line tokenizer for emphasis, inline code,
//! links, images, and footnote references.
//!
//! [`InlineState`] is the cross-line register set that used to live on
//! Python's process-wide `state` object; here it's threaded explicitly by
//! the block state machine so that a code block or a fresh render session
//! can reset it without touching anything else.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::style::{self, Palette};

/// Image and link substitution happen for a whole line before emphasis
/// tokens are considered.
static IMAGE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").expect("valid regex"));
static LINK_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid regex"));
static FOOTNOTE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\^(\d+)\]:?").expect("valid regex"));

/// Emphasis/inline-code delimiter tokens, ordered so multi-character
/// combinations are tried before the single-character tokens they contain.
static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\*\*\*|___|\*\*_|_\*\*|~~|\*\*|__|`+|\*|_|[^*_~`]+)").expect("valid regex")
});

const SUPERSCRIPT_DIGITS: [char; 10] = ['⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹'];

/// External collaborator that turns an image reference into terminal output.
/// The only implementation shipped here always falls back to the link text;
/// a real block-graphics renderer is out of scope (§6).
pub trait ImageRenderer {
    /// Attempt to render `url` (with alt text `alt`) and return the
    /// ready-to-emit replacement, or `None` to fall back to the bare URL.
    fn render(&self, alt: &str, url: &str) -> Option<String>;
}

/// Always-fallback image renderer: substitutes the URL, as §7 prescribes for
/// any image/link failure.
pub struct NullImageRenderer;

impl ImageRenderer for NullImageRenderer {
    fn render(&self, _alt: &str, _url: &str) -> Option<String> {
        None
    }
}

/// Cross-line inline-style registers. Reset to closed state after every
/// committed chunk (defense against unterminated emphasis, §4.6) and
/// suppressed entirely while inside a code block (§3 invariants).
#[derive(Debug, Clone, Default)]
pub struct InlineState {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    /// The exact backtick run that opened inline code, if any.
    pub inline_code: Option<String>,
}

impl InlineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when every register is closed (used by the prompt-flush
    /// heuristic in C6, and to decide when emphasis markers are plain text).
    pub fn is_clear(&self) -> bool {
        !self.bold && !self.italic && !self.underline && !self.strike && self.inline_code.is_none()
    }

    /// Force every register closed, matching §4.6's post-chunk reset.
    pub fn clear(&mut self) {
        *self = InlineState::default();
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn superscript(digits: &str) -> String {
    digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| SUPERSCRIPT_DIGITS[d as usize])
        .collect()
}

/// Format one logical line: substitute images/links/footnotes, then tokenize
/// the remainder for emphasis and inline code, carrying `state` across
/// calls so that delimiters opened on an earlier streamed line still close
/// correctly.
pub fn format_line(
    line: &str,
    state: &mut InlineState,
    palette: &Palette,
    ambient_bg: &str,
    images: &dyn ImageRenderer,
) -> String {
    let line = IMAGE_REF.replace_all(line, |caps: &regex::Captures| {
        let alt = &caps[1];
        let url = &caps[2];
        images.render(alt, url).unwrap_or_else(|| url.to_string())
    });

    let link_style = format!("{}{}", palette.symbol_fg(), style::UNDERLINE_ON);
    let line = LINK_REF.replace_all(&line, |caps: &regex::Captures| {
        let text = &caps[1];
        let url = &caps[2];
        format!(
            "\x1b]8;;{url}\x1b\\{link_style}{text}{}\x1b]8;;\x1b\\",
            style::UNDERLINE_OFF
        )
    });

    let line = FOOTNOTE_REF.replace_all(&line, |caps: &regex::Captures| superscript(&caps[1]));

    let mut result = String::with_capacity(line.len());
    let chars: Vec<char> = line.chars().collect();

    for m in TOKEN.find_iter(&line) {
        let token = m.as_str();
        let start_char = line[..m.start()].chars().count();
        let end_char = start_char + token.chars().count();
        let prev_char = if start_char > 0 {
            chars.get(start_char - 1).copied()
        } else {
            None
        };
        let next_char = chars.get(end_char).copied();

        let is_boundary = prev_char.map_or(true, |c| !is_word_char(c));

        if let Some(opener) = &state.inline_code {
            if token.chars().all(|c| c == '`') && token == opener {
                state.inline_code = None;
                result.push_str(ambient_bg);
            } else {
                result.push_str(token);
            }
            continue;
        }

        if !token.is_empty() && token.chars().all(|c| c == '`') {
            state.inline_code = Some(token.to_string());
            result.push_str(&palette.mid_bg());
            continue;
        }

        match token {
            "~~" if is_boundary || state.strike => {
                state.strike = !state.strike;
                result.push_str(if state.strike {
                    style::STRIKE_ON
                } else {
                    style::STRIKE_OFF
                });
            }
            "***" | "___" | "**_" | "_**" if is_boundary || (state.bold && state.italic) => {
                state.bold = !state.bold;
                state.italic = !state.italic;
                result.push_str(if state.bold { style::BOLD_ON } else { style::BOLD_OFF });
                result.push_str(if state.italic {
                    style::ITALIC_ON
                } else {
                    style::ITALIC_OFF
                });
            }
            "**" | "__" if is_boundary || state.bold => {
                state.bold = !state.bold;
                result.push_str(if state.bold { style::BOLD_ON } else { style::BOLD_OFF });
            }
            "*" if is_boundary || state.italic => {
                if state.italic || next_char.map_or(true, |c| c != ' ') {
                    state.italic = !state.italic;
                    result.push_str(if state.italic {
                        style::ITALIC_ON
                    } else {
                        style::ITALIC_OFF
                    });
                } else {
                    result.push_str(token);
                }
            }
            "_" if (is_boundary || state.underline)
                && (state.underline || next_char.map_or(false, is_word_char)) =>
            {
                state.underline = !state.underline;
                result.push_str(if state.underline {
                    style::UNDERLINE_ON
                } else {
                    style::UNDERLINE_OFF
                });
            }
            _ => result.push_str(token),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StyleConfig;

    fn palette() -> Palette {
        Palette::from_config(&StyleConfig::default())
    }

    #[test]
    fn bold_toggles_across_line() {
        let palette = palette();
        let mut state = InlineState::new();
        let out = format_line("a **b** c", &mut state, &palette, style::BG_RESET, &NullImageRenderer);
        assert_eq!(out, format!("a {}b{} c", style::BOLD_ON, style::BOLD_OFF));
        assert!(state.is_clear());
    }

    #[test]
    fn asterisk_before_space_stays_literal() {
        let palette = palette();
        let mut state = InlineState::new();
        let out = format_line(
            "* and * word",
            &mut state,
            &palette,
            style::BG_RESET,
            &NullImageRenderer,
        );
        assert_eq!(out, "* and * word");
    }

    #[test]
    fn underline_requires_word_boundary_next_char() {
        let palette = palette();
        let mut state = InlineState::new();
        let out = format_line("foo_bar", &mut state, &palette, style::BG_RESET, &NullImageRenderer);
        assert_eq!(out, "foo_bar");
    }

    #[test]
    fn inline_code_closes_on_matching_backtick_run() {
        let palette = palette();
        let mut state = InlineState::new();
        let out = format_line("``a`b``", &mut state, &palette, style::BG_RESET, &NullImageRenderer);
        assert!(out.contains("a`b"));
        assert!(state.inline_code.is_none());
    }

    #[test]
    fn link_wraps_osc8() {
        let palette = palette();
        let mut state = InlineState::new();
        let out = format_line(
            "[text](http://example.com)",
            &mut state,
            &palette,
            style::BG_RESET,
            &NullImageRenderer,
        );
        assert!(out.starts_with("\x1b]8;;http://example.com\x1b\\"));
        assert!(out.contains("text"));
    }

    #[test]
    fn footnote_becomes_superscript() {
        let palette = palette();
        let mut state = InlineState::new();
        let out = format_line("see[^12]", &mut state, &palette, style::BG_RESET, &NullImageRenderer);
        assert_eq!(out, "see¹²");
    }
}
