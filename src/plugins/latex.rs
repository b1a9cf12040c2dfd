// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! LaTeX-to-unicode transformer plugin (§6d). Out of scope in the sense
//! that a full LaTeX parser is not part of this crate; the shipped
//! implementation recognizes a small, common subset of inline math macros
//! and falls back to `Continue` for anything else, letting the line fall
//! through to the normal inline formatter.

use once_cell::sync::Lazy;
use regex::Regex;

use super::PluginOutcome;

static INLINE_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([^$]+)\$").expect("valid regex"));

const GREEK: &[(&str, &str)] = &[
    ("\\alpha", "\u{3b1}"),
    ("\\beta", "\u{3b2}"),
    ("\\gamma", "\u{3b3}"),
    ("\\delta", "\u{3b4}"),
    ("\\epsilon", "\u{3b5}"),
    ("\\theta", "\u{3b8}"),
    ("\\lambda", "\u{3bb}"),
    ("\\mu", "\u{3bc}"),
    ("\\pi", "\u{3c0}"),
    ("\\sigma", "\u{3c3}"),
    ("\\phi", "\u{3c6}"),
    ("\\omega", "\u{3c9}"),
    ("\\times", "\u{d7}"),
    ("\\infty", "\u{221e}"),
    ("\\leq", "\u{2264}"),
    ("\\geq", "\u{2265}"),
    ("\\neq", "\u{2260}"),
    ("\\rightarrow", "\u{2192}"),
    ("\\sqrt", "\u{221a}"),
];

/// Given a complete line, decide whether it is (or contains) recognized
/// LaTeX-ish content. Implementations must never panic on malformed input;
/// unrecognized content should return [`PluginOutcome::Continue`].
pub trait LatexPlugin {
    fn apply(&self, line: &str) -> PluginOutcome;
}

/// Replaces `$...$` inline math spans with a best-effort unicode
/// transliteration of common macros; anything it doesn't recognize inside a
/// math span is left as-is rather than dropped.
pub struct UnicodeLatexPlugin;

impl UnicodeLatexPlugin {
    fn transliterate(expr: &str) -> String {
        let mut out = expr.to_string();
        for (macro_, glyph) in GREEK {
            out = out.replace(macro_, glyph);
        }
        out
    }
}

impl LatexPlugin for UnicodeLatexPlugin {
    fn apply(&self, line: &str) -> PluginOutcome {
        if !line.contains('$') {
            return PluginOutcome::Continue;
        }
        if !INLINE_MATH.is_match(line) {
            return PluginOutcome::Continue;
        }
        let replaced = INLINE_MATH.replace_all(line, |caps: &regex::Captures| Self::transliterate(&caps[1]));
        PluginOutcome::Replace(vec![replaced.into_owned()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_line_continues() {
        assert!(matches!(
            UnicodeLatexPlugin.apply("just prose"),
            PluginOutcome::Continue
        ));
    }

    #[test]
    fn inline_math_transliterates_known_macros() {
        let outcome = UnicodeLatexPlugin.apply("energy is $\\alpha \\times \\beta$\n");
        let PluginOutcome::Replace(lines) = outcome else {
            panic!("expected replacement")
        };
        assert!(lines[0].contains('\u{3b1}'));
        assert!(lines[0].contains('\u{3b2}'));
    }
}
