// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Word-wrap and table layout (C3).
//!
//! Wrapping preserves and re-applies the active SGR style on every
//! continuation line, using [`crate::ansi::collapse`] to keep the
//! re-emitted preamble bounded rather than accumulating one entry per
//! paragraph.

use crate::ansi::{self, collapse};
use crate::style::{self, Palette};

/// Word-wrap already-inline-formatted `text` (SGR codes already inserted) to
/// `width` columns, indenting continuation lines by `indent` columns and
/// prefixing the first/subsequent line with the given prefixes.
///
/// `text` is expected to already have gone through [`crate::inline::format_line`];
/// this function only splits on whitespace and re-applies the style classes
/// active at each break, per §4.3.
pub fn wrap_text(
    text: &str,
    width: usize,
    indent: usize,
    first_line_prefix: &str,
    subsequent_line_prefix: &str,
) -> Vec<String> {
    let mut words: Vec<&str> = text.split_whitespace().collect();
    words.push("");

    let mut lines: Vec<String> = Vec::new();
    let mut current_line = String::new();
    let mut active_codes: Vec<String> = Vec::new();

    for word in &words {
        for code in ansi::extract_codes(word) {
            collapse(&mut active_codes, &code);
            active_codes.push(code);
        }

        let would_fit =
            !word.is_empty() && ansi::visible_length(&current_line) + ansi::visible_length(word) + 1 <= width;

        if would_fit {
            if !current_line.is_empty() {
                current_line.push(' ');
            }
            current_line.push_str(word);
        } else {
            let prefix = if lines.is_empty() {
                first_line_prefix
            } else {
                subsequent_line_prefix
            };
            let line_content = format!("{prefix}{current_line}");
            let margin = width.saturating_sub(ansi::visible_length(&line_content));
            lines.push(format!("{line_content}{}{}", " ".repeat(margin), style::RESET));
            current_line = format!("{}{}{}", " ".repeat(indent), active_codes.concat(), word);
        }
    }

    if lines.is_empty() {
        return Vec::new();
    }

    let preamble = active_codes.concat();
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| if i == 0 { line } else { format!("{preamble}{line}") })
        .collect()
}

/// Render a `|`-delimited row's already-trimmed cells as one or more screen
/// rows of column-wrapped, background-filled cells, per §4.3. `header`
/// selects the `Mid` background for a header row, `Dark` otherwise.
pub fn format_table(cells: &[String], content_width: usize, header: bool, palette: &Palette) -> Vec<String> {
    let num_cols = cells.len().max(1);
    let available_width = content_width.saturating_sub(num_cols + 1);
    let col_width = (available_width / num_cols).max(1);

    let bg = if header { palette.mid_bg() } else { palette.code_bg() };

    let wrapped: Vec<Vec<String>> = cells
        .iter()
        .map(|cell| {
            let lines = wrap_text(cell, col_width, 0, "", "");
            if lines.is_empty() {
                vec![String::new()]
            } else {
                lines
            }
        })
        .collect();
    let row_height = wrapped.iter().map(Vec::len).max().unwrap_or(1);

    let mut out = Vec::with_capacity(row_height);
    for row_ix in 0..row_height {
        let is_last_body_row = !header && row_ix == row_height - 1;
        let divider = if is_last_body_row { palette.table_divider() } else { String::new() };

        let segments: Vec<String> = wrapped
            .iter()
            .map(|cell_lines| {
                let segment = cell_lines.get(row_ix).map(String::as_str).unwrap_or("");
                let pad = col_width.saturating_sub(ansi::visible_length(segment));
                format!("{bg}{divider} {segment}{}", " ".repeat(pad))
            })
            .collect();

        let separator = format!("{bg}{divider}{}{}{}", palette.symbol_fg(), '\u{2502}', style::RESET);
        out.push(format!("{}{}", segments.join(&separator), style::RESET));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StyleConfig;

    fn palette() -> Palette {
        Palette::from_config(&StyleConfig::default())
    }

    #[test]
    fn wraps_long_text_on_word_boundaries() {
        let lines = wrap_text("one two three four five", 10, 0, "", "");
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(ansi::visible_length(line) <= 10 || line.contains(style::RESET));
        }
    }

    #[test]
    fn short_text_produces_single_line() {
        let lines = wrap_text("hi", 20, 0, "", "");
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn table_row_has_column_separators() {
        let palette = palette();
        let cells = vec!["1".to_string(), "2".to_string()];
        let rows = format_table(&cells, 40, false, &palette);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].contains('\u{2502}'));
    }

    #[test]
    fn header_row_uses_mid_background() {
        let palette = palette();
        let cells = vec!["h1".to_string()];
        let rows = format_table(&cells, 40, true, &palette);
        assert!(rows[0].contains(&palette.mid_bg()));
    }
}
