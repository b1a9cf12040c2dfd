// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The block-level state machine (C5): a line-dispatched recognizer for
//! headings, horizontal rules, lists, tables, fenced/indented code, and
//! block-quotes.
//!
//! [`ParseState`] is the formerly-global `state` object, now an explicit
//! value threaded through every call — see the REDESIGN notes this repo's
//! design ledger records. Python's `Goto` exception (the "exit space-indented
//! code without consuming the triggering line" case) becomes
//! [`LineEvent::Rewind`], which the driver re-feeds through
//! [`ParseState::process_line`] immediately.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::code::{self, CodeKind, CodeState};
use crate::config::Config;
use crate::highlight::Highlighter;
use crate::inline::{self, ImageRenderer, InlineState};
use crate::style::{self, Palette};
use crate::wrap;

const BLOCKQUOTE_GLYPH: &str = "\u{258E}";

static BLOCKQUOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:(>\s*)+|(<think>)|(</think>))").expect("valid regex"));
static TABLE_ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|.+\|\s*$").expect("valid regex"));
static TABLE_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s|:-]+$").expect("valid regex"));
static CODE_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*```\s*([^\s`]*)\s*$").expect("valid regex"));
static CODE_SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^    [^\s*]").expect("valid regex"));
static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)([*+-]|\d+\.)\s+(.*)").expect("valid regex"));
static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(#{1,6})\s+(.*)").expect("valid regex"));
static HR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([-=_*]){3,}\s*$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    Header,
    Body,
}

/// One outcome of feeding a line to [`ParseState::process_line`]. A single
/// line can produce any number of chunks, at most one rewind, and at most
/// one heading promotion.
#[derive(Debug, Clone)]
pub enum LineEvent {
    Chunk(String),
    /// Setext promotion (§4.5 step 8): the previously emitted chunk should
    /// be rewritten as a level-1 or level-2 heading.
    PromoteHeading(u8),
    /// The "exit space-indented code without consuming" signal (§4.4): `line`
    /// must be re-fed into `process_line` as if freshly arrived.
    Rewind(String),
}

/// The parser's cross-line state: block mode, inline registers, list/table
/// bookkeeping, and the active code-streaming state. One instance per
/// render session.
pub struct ParseState {
    pub palette: Palette,
    pub margin: usize,
    pub list_indent: usize,
    pub pretty_pad: bool,
    pub code_spaces_enabled: bool,
    pub syntax_theme: String,
    pub full_width: usize,
    pub content_width: usize,

    pub inline: InlineState,
    /// Ambient background SGR in effect outside any special region.
    pub bg: String,

    pub code: Option<CodeState>,
    pub table: Option<TableMode>,
    pub blockquote_depth: usize,
    pub in_list: bool,
    pub list_stack: Vec<(usize, ListKind)>,
    pub ordered_counters: Vec<i64>,

    pub first_indent: Option<usize>,
    pub last_line_empty: bool,

    /// `(language, raw source)` of the most recently completed code block,
    /// kept around after exit for the clipboard/scrape collaborators.
    pub last_code_block: Option<(String, String)>,
    /// Incremented every time a code block closes, so collaborators can tell
    /// a freshly closed block from one they already handled.
    pub code_block_sequence: u64,
}

impl ParseState {
    pub fn new(config: &Config, full_width: usize) -> Self {
        let content_width = full_width.saturating_sub(2 * config.style.margin);
        ParseState {
            palette: Palette::from_config(&config.style),
            margin: config.style.margin,
            list_indent: config.style.list_indent,
            pretty_pad: config.style.pretty_pad,
            code_spaces_enabled: config.features.code_spaces,
            syntax_theme: config.style.syntax.clone(),
            full_width,
            content_width,
            inline: InlineState::new(),
            bg: style::BG_RESET.to_string(),
            code: None,
            table: None,
            blockquote_depth: 0,
            in_list: false,
            list_stack: Vec::new(),
            ordered_counters: Vec::new(),
            first_indent: None,
            last_line_empty: false,
            last_code_block: None,
            code_block_sequence: 0,
        }
    }

    fn margin_prefix(&self) -> String {
        " ".repeat(self.margin)
    }

    fn gutter(&self) -> String {
        if self.blockquote_depth == 0 {
            String::new()
        } else {
            format!(
                "{}{} {}{} ",
                self.palette.grey_fg(),
                BLOCKQUOTE_GLYPH.repeat(self.blockquote_depth),
                style::RESET,
                self.bg,
            )
        }
    }

    fn space_left(&self) -> String {
        format!("{}{}", self.margin_prefix(), self.gutter())
    }

    /// Strip a globally-detected first-line indent from every later line
    /// (§4.5's indentation-stripping pass, run before dispatch).
    fn strip_indent<'a>(&mut self, line: &'a str) -> std::borrow::Cow<'a, str> {
        let indent = line.len() - line.trim_start_matches(' ').len();
        match self.first_indent {
            None => {
                self.first_indent = Some(indent);
                std::borrow::Cow::Borrowed(line)
            }
            Some(expected) if indent >= expected => std::borrow::Cow::Borrowed(&line[expected..]),
            Some(expected) => {
                warn!(expected, found = indent, "indentation decreased below first line's indent");
                std::borrow::Cow::Borrowed(line)
            }
        }
    }

    /// Re-render `text` as a heading of the given level. Exposed for the
    /// driver's setext-promotion handling (§4.6), which rewrites a
    /// previously buffered paragraph line once it sees the underlining `---`
    /// or `===` on the next line.
    pub(crate) fn format_heading(&mut self, level: u8, text: &str, images: &dyn ImageRenderer) -> String {
        let formatted = inline::format_line(text, &mut self.inline, &self.palette, &self.bg, images);
        let visible = crate::ansi::visible_length(&formatted);
        let pad = self.content_width.saturating_sub(visible) as f64 / 2.0;
        let left = pad.floor() as usize;
        let right = pad.ceil() as usize;
        match level {
            1 => format!(
                "\n{}{}{}{}{}{}\n",
                self.margin_prefix(),
                style::BOLD_ON,
                " ".repeat(left),
                formatted,
                " ".repeat(right),
                style::BOLD_OFF
            ),
            2 => format!(
                "\n{}{}{}{}{}{}{}\n\n",
                self.margin_prefix(),
                style::BOLD_ON,
                self.palette.bright_fg(),
                " ".repeat(left),
                formatted,
                " ".repeat(right),
                style::RESET
            ),
            3 => format!(
                "{}{}{}{}{}",
                self.margin_prefix(),
                self.palette.head_fg(),
                style::BOLD_ON,
                formatted,
                style::RESET
            ),
            4 => format!(
                "{}{}{}{}",
                self.margin_prefix(),
                self.palette.symbol_fg(),
                formatted,
                style::RESET
            ),
            _ => format!("{}{}{}", self.margin_prefix(), formatted, style::RESET),
        }
    }

    /// Feed one complete logical line (newline already observed) through the
    /// block dispatcher, in the priority order of §4.5.
    pub fn process_line(
        &mut self,
        line: &str,
        highlighter: &dyn Highlighter,
        images: &dyn ImageRenderer,
    ) -> Vec<LineEvent> {
        let stripped = self.strip_indent(line).into_owned();
        let mut events = Vec::new();

        // 1. Block-quote / think marker.
        if self.code.is_none() {
            if let Some(caps) = BLOCKQUOTE_RE.captures(&stripped) {
                if caps.get(2).is_some() {
                    self.blockquote_depth = 1;
                    return events;
                }
                if caps.get(3).is_some() {
                    self.blockquote_depth = 0;
                    events.push(LineEvent::Chunk(style::RESET.to_string()));
                    return events;
                }
                let marker = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                self.blockquote_depth = marker.matches('>').count();
                let rest = stripped[caps.get(0).unwrap().end()..].to_string();
                return self.dispatch_body(&rest, highlighter, images);
            }
        }

        self.dispatch_body(&stripped, highlighter, images)
    }

    fn dispatch_body(
        &mut self,
        line: &str,
        highlighter: &dyn Highlighter,
        images: &dyn ImageRenderer,
    ) -> Vec<LineEvent> {
        let mut events = Vec::new();
        let line = line.to_string();
        let trimmed = line.trim_end_matches('\n').trim_end();

        // 2. Empty-line collapse (outside code).
        if self.code.is_none() {
            let is_empty = trimmed.trim().is_empty();
            if is_empty {
                if self.last_line_empty {
                    return events;
                }
                self.last_line_empty = true;
                events.push(LineEvent::Chunk(self.space_left()));
                return events;
            }
        }
        let was_last_line_empty = self.last_line_empty;
        self.last_line_empty = false;

        // 3. List-bullet reset.
        if !LIST_ITEM_RE.is_match(trimmed) {
            if !self.in_list {
                self.ordered_counters.clear();
                self.list_stack.clear();
            }
            self.in_list = false;
        }

        // Table continuation check: a non-pipe line exits an open table.
        if self.table.is_some() && self.code.is_none() && !TABLE_ROW_RE.is_match(trimmed) {
            self.table = None;
        }

        // 5. Code block entry/exit takes priority over table/list/heading
        // detection once inside a block, and must also be checked for entry
        // before those, per §4.5 step 5's placement ahead of steps 6-9 (table
        // row detection in step 4 only applies when not already in code).
        if self.code.is_none() {
            if let Some(caps) = CODE_FENCE_RE.captures(trimmed) {
                let lang = caps.get(1).map(|m| m.as_str()).filter(|s| !s.is_empty());
                self.enter_code(CodeKind::Backtick, lang.unwrap_or("bash").to_string(), &mut events);
                return events;
            }
            if self.code_spaces_enabled && was_last_line_empty && !self.in_list && CODE_SPACES_RE.is_match(&line)
            {
                self.enter_code(CodeKind::Spaces, "bash".to_string(), &mut events);
            }
        }

        if self.code.is_some() {
            return self.drive_code(line, highlighter, events);
        }

        // 4. Table row.
        if TABLE_ROW_RE.is_match(trimmed) {
            return self.drive_table(trimmed, events);
        }

        // 6. List item.
        if let Some(caps) = LIST_ITEM_RE.captures(trimmed) {
            return self.drive_list_item(&caps, events, images);
        }

        // 7. Heading.
        if let Some(caps) = HEADING_RE.captures(trimmed) {
            let level = caps[1].len() as u8;
            events.push(LineEvent::Chunk(self.format_heading(level, &caps[2], images)));
            return events;
        }

        // 8. Horizontal rule / setext promotion.
        if let Some(caps) = HR_RE.captures(trimmed) {
            if was_last_line_empty {
                events.push(LineEvent::Chunk(format!(
                    "{}{}{}{}",
                    self.margin_prefix(),
                    self.palette.symbol_fg(),
                    "\u{2500}".repeat(self.content_width),
                    style::RESET
                )));
            } else {
                let level = if &caps[1] == "-" { 1 } else { 2 };
                events.push(LineEvent::PromoteHeading(level));
            }
            return events;
        }

        // 9. Paragraph.
        let formatted = inline::format_line(trimmed, &mut self.inline, &self.palette, &self.bg, images);
        if crate::ansi::visible_length(&formatted) < self.content_width {
            events.push(LineEvent::Chunk(format!("{}{}", self.space_left(), formatted)));
        } else {
            for wrapped in wrap::wrap_text(&formatted, self.content_width, 0, "", "") {
                events.push(LineEvent::Chunk(format!("{}{}\n", self.space_left(), wrapped)));
            }
        }
        events
    }

    fn enter_code(&mut self, kind: CodeKind, language: String, events: &mut Vec<LineEvent>) {
        self.code = Some(CodeState::new(kind, language));
        self.bg = self.palette.code_bg();
        if self.pretty_pad {
            events.push(LineEvent::Chunk(format!(
                "{}{}{}{}\n",
                style::RESET,
                self.palette.fg(&self.palette.dark),
                "\u{2584}".repeat(self.full_width),
                style::RESET
            )));
        }
    }

    fn drive_code(
        &mut self,
        line: String,
        highlighter: &dyn Highlighter,
        mut events: Vec<LineEvent>,
    ) -> Vec<LineEvent> {
        let trimmed = line.trim_end_matches('\n').trim_end().to_string();
        let code_state = self.code.as_mut().expect("checked Some by caller");
        let is_exit = !code_state.first_line
            && match code_state.kind {
                CodeKind::Backtick => trimmed.trim() == "```",
                CodeKind::Spaces => self.code_spaces_enabled && !line.starts_with("    "),
            };

        if is_exit {
            let kind = code_state.kind;
            self.last_code_block = Some((code_state.language.clone(), code_state.raw().to_string()));
            self.code_block_sequence += 1;
            self.code = None;
            self.bg = style::BG_RESET.to_string();
            if self.pretty_pad {
                events.push(LineEvent::Chunk(format!(
                    "{}{}{}{}",
                    style::RESET,
                    self.palette.fg(&self.palette.dark),
                    "\u{2580}".repeat(self.full_width),
                    style::RESET
                )));
            }
            events.push(LineEvent::Chunk(style::RESET.to_string()));
            if kind == CodeKind::Spaces {
                events.push(LineEvent::Rewind(line));
            }
            return events;
        }

        let mut stripped = line.as_str();
        if code_state.first_line {
            code_state.first_line = false;
            let indent = stripped.len() - stripped.trim_start_matches(' ').len();
            code_state.indent = indent;
            stripped = &stripped[indent.min(stripped.len())..];
        } else if stripped.starts_with(&" ".repeat(code_state.indent)) {
            stripped = &stripped[code_state.indent..];
        }

        let Some(complete_line) = code_state.stage_line(stripped) else {
            return events;
        };

        let (indent, pieces) = code::code_wrap(&complete_line, self.full_width);
        for piece in pieces {
            let highlighted = code_state.feed_line(&piece, highlighter, &self.syntax_theme);
            let code_line = format!("{}{}", " ".repeat(indent), highlighted.trim());
            events.push(LineEvent::Chunk(code::pad_to_width(
                &code_line,
                self.full_width,
                &self.palette.code_bg(),
            )));
        }
        events
    }

    fn drive_table(&mut self, trimmed: &str, mut events: Vec<LineEvent>) -> Vec<LineEvent> {
        let body = trimmed.trim().trim_matches('|');
        let cells: Vec<String> = body.split('|').map(|c| c.trim().to_string()).collect();

        match self.table {
            None => {
                self.table = Some(TableMode::Header);
            }
            Some(TableMode::Header) => {
                if !TABLE_SEPARATOR_RE.is_match(trimmed.trim()) {
                    warn!(line = trimmed, "table separator row did not match the expected pattern");
                }
                self.table = Some(TableMode::Body);
                return events;
            }
            Some(TableMode::Body) => {}
        }

        let header = self.table == Some(TableMode::Header);
        for row in wrap::format_table(&cells, self.content_width, header, &self.palette) {
            events.push(LineEvent::Chunk(format!("{}{}", self.margin_prefix(), row)));
        }
        events
    }

    fn drive_list_item(
        &mut self,
        caps: &regex::Captures,
        mut events: Vec<LineEvent>,
        images: &dyn ImageRenderer,
    ) -> Vec<LineEvent> {
        self.in_list = true;
        let raw_indent = caps[1].len();
        let marker = &caps[2];
        let content = &caps[3];
        let kind = if marker.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            ListKind::Number
        } else {
            ListKind::Bullet
        };

        while let Some(&(top_indent, _)) = self.list_stack.last() {
            if top_indent > raw_indent {
                self.list_stack.pop();
                self.ordered_counters.pop();
            } else {
                break;
            }
        }
        match self.list_stack.last() {
            Some(&(top_indent, _)) if top_indent < raw_indent => {
                self.list_stack.push((raw_indent, kind));
                self.ordered_counters.push(0);
            }
            None => {
                self.list_stack.push((raw_indent, kind));
                self.ordered_counters.push(0);
            }
            _ => {}
        }
        if kind == ListKind::Number {
            if let Some(last) = self.ordered_counters.last_mut() {
                *last += 1;
            }
        }

        let indent = self.list_stack.len() * 2;
        let wrap_width = self.content_width.saturating_sub(indent + 2 * self.list_indent);

        let bullet = match kind {
            ListKind::Bullet => "\u{2022}".to_string(),
            ListKind::Number => {
                let parsed: i64 = marker.trim_end_matches('.').parse().unwrap_or(1);
                let counter = *self.ordered_counters.last().unwrap_or(&1);
                counter.max(parsed).to_string()
            }
        };

        let formatted = inline::format_line(content, &mut self.inline, &self.palette, &self.bg, images);
        let first_prefix = format!(
            "{}{}{}{} ",
            " ".repeat(indent.saturating_sub(bullet.chars().count())),
            self.palette.symbol_fg(),
            bullet,
            style::RESET
        );
        let subsequent_prefix = " ".repeat(indent.saturating_sub(1));
        for wrapped in wrap::wrap_text(&formatted, wrap_width, self.list_indent, &first_prefix, &subsequent_prefix) {
            events.push(LineEvent::Chunk(format!("{}{}\n", self.space_left(), wrapped)));
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::inline::NullImageRenderer;

    fn state() -> ParseState {
        ParseState::new(&Config::default(), 80)
    }

    fn run(state: &mut ParseState, line: &str) -> Vec<LineEvent> {
        let highlighter = crate::highlight::SyntectHighlighter::new();
        state.process_line(line, &highlighter, &NullImageRenderer)
    }

    #[test]
    fn heading_level_one_is_bold_and_centered() {
        let mut s = state();
        let events = run(&mut s, "# Hello\n");
        let LineEvent::Chunk(chunk) = &events[0] else {
            panic!("expected chunk")
        };
        assert!(chunk.contains("Hello"));
        assert!(chunk.contains(style::BOLD_ON));
    }

    #[test]
    fn list_items_use_bullet_glyph() {
        let mut s = state();
        let events = run(&mut s, "- a\n");
        let LineEvent::Chunk(chunk) = &events[0] else {
            panic!("expected chunk")
        };
        assert!(chunk.contains('\u{2022}'));
    }

    #[test]
    fn ordered_list_counter_uses_parsed_number_when_larger() {
        let mut s = state();
        let _ = run(&mut s, "1. a\n");
        let events = run(&mut s, "5. b\n");
        let LineEvent::Chunk(chunk) = &events[0] else {
            panic!("expected chunk")
        };
        assert!(chunk.contains('5'));
    }

    #[test]
    fn setext_dash_promotes_previous_line_to_level_one() {
        let mut s = state();
        let _ = run(&mut s, "hello\n");
        let events = run(&mut s, "---\n");
        assert!(matches!(events[0], LineEvent::PromoteHeading(1)));
    }

    #[test]
    fn horizontal_rule_after_blank_line_is_a_rule() {
        let mut s = state();
        let _ = run(&mut s, "\n");
        let events = run(&mut s, "---\n");
        let LineEvent::Chunk(chunk) = &events[0] else {
            panic!("expected a rule chunk, got {:?}", events[0])
        };
        assert!(chunk.contains('\u{2500}'));
    }

    #[test]
    fn table_separator_row_produces_no_chunks() {
        let mut s = state();
        let _ = run(&mut s, "| h1 | h2 |\n");
        let events = run(&mut s, "|---|---|\n");
        assert!(events.is_empty());
    }

    #[test]
    fn code_fence_entry_and_exit_round_trip() {
        let mut s = state();
        let _ = run(&mut s, "```bash\n");
        assert!(s.code.is_some());
        let _ = run(&mut s, "echo hi\n");
        let events = run(&mut s, "```\n");
        assert!(s.code.is_none());
        assert!(events.iter().any(|e| matches!(e, LineEvent::Chunk(c) if c.contains(style::RESET))));
    }

    #[test]
    fn blockquote_prefix_is_stripped_and_gutter_applied() {
        let mut s = state();
        let events = run(&mut s, "> quoted text\n");
        let LineEvent::Chunk(chunk) = &events[0] else {
            panic!("expected chunk")
        };
        assert!(chunk.contains("quoted text"));
        assert!(chunk.contains(BLOCKQUOTE_GLYPH));
    }
}
