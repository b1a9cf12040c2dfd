// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The color-role registry: turns the configured HSV base and per-role
//! multipliers into ready-to-emit SGR fragments.
//!
//! Style roles are a closed enumeration (`Dark`, `Mid`, `Symbol`, `Head`,
//! `Grey`, `Bright`), so rather than a dictionary lookup we precompute every
//! role's SGR fragment once, at startup, into a plain struct.

use crate::config::{RoleMultiplier, StyleConfig};

pub const FG: &str = "\x1b[38;2;";
pub const BG: &str = "\x1b[48;2;";
pub const RESET: &str = "\x1b[0m";
pub const FG_RESET: &str = "\x1b[39m";
pub const BG_RESET: &str = "\x1b[49m";

pub const BOLD_ON: &str = "\x1b[1m";
pub const BOLD_OFF: &str = "\x1b[22m";
pub const ITALIC_ON: &str = "\x1b[3m";
pub const ITALIC_OFF: &str = "\x1b[23m";
pub const UNDERLINE_ON: &str = "\x1b[4m";
pub const UNDERLINE_OFF: &str = "\x1b[24m";
pub const STRIKE_ON: &str = "\x1b[9m";
pub const STRIKE_OFF: &str = "\x1b[29m";

/// Convert an `(h, s, v)` triple in `[0, 1]` to 24-bit RGB, the same way
/// `colorsys.hsv_to_rgb` does.
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    if s <= 0.0 {
        let c = (256.0 * v.clamp(0.0, 1.0)).floor().min(255.0) as u8;
        return (c, c, c);
    }
    let h = h.rem_euclid(1.0) * 6.0;
    let i = h.floor() as i32;
    let f = h - h.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match i.rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    let conv = |x: f64| (256.0 * x.clamp(0.0, 1.0)).floor().min(255.0) as u8;
    (conv(r), conv(g), conv(b))
}

/// Apply a role's H/S/V multipliers to the base HSV triple, clamp each
/// component to 1.0, and format the `R;G;B` body of an SGR 24-bit color
/// sequence (without the `38;2;`/`48;2;` prefix or trailing `m`).
fn apply_multiplier(base: (f64, f64, f64), role: &RoleMultiplier) -> String {
    let (h, s, v) = base;
    let (r, g, b) = hsv_to_rgb(
        (h * role.h).min(1.0),
        (s * role.s).min(1.0),
        (v * role.v).min(1.0),
    );
    format!("{r};{g};{b}")
}

/// Precomputed SGR fragments for every color role, ready to be interpolated
/// into `FG`/`BG` prefixed sequences.
#[derive(Debug, Clone)]
pub struct Palette {
    pub dark: String,
    pub mid: String,
    pub symbol: String,
    pub head: String,
    pub grey: String,
    pub bright: String,
}

impl Palette {
    pub fn from_config(style: &StyleConfig) -> Self {
        let base = (style.hsv[0], style.hsv[1], style.hsv[2]);
        Palette {
            dark: apply_multiplier(base, &style.dark),
            mid: apply_multiplier(base, &style.mid),
            symbol: apply_multiplier(base, &style.symbol),
            head: apply_multiplier(base, &style.head),
            grey: apply_multiplier(base, &style.grey),
            bright: apply_multiplier(base, &style.bright),
        }
    }

    pub fn fg(&self, rgb: &str) -> String {
        format!("{FG}{rgb}m")
    }

    pub fn bg(&self, rgb: &str) -> String {
        format!("{BG}{rgb}m")
    }

    /// Background fill used for code blocks, inline code, and table body rows.
    pub fn code_bg(&self) -> String {
        self.bg(&self.dark)
    }

    /// Background used for table header rows and the momentary inline-code span.
    pub fn mid_bg(&self) -> String {
        self.bg(&self.mid)
    }

    /// Foreground used for bullets, rule glyphs, and table borders.
    pub fn symbol_fg(&self) -> String {
        self.fg(&self.symbol)
    }

    /// Foreground used for level-3/4 heading accents.
    pub fn head_fg(&self) -> String {
        self.fg(&self.head)
    }

    /// Foreground used for block-quote gutters.
    pub fn grey_fg(&self) -> String {
        self.fg(&self.grey)
    }

    /// Foreground used for level-2 headings.
    pub fn bright_fg(&self) -> String {
        self.fg(&self.bright)
    }

    /// The underline accent color used on a table's final body sub-row
    /// (SGR `4;58;2;R;G;B`).
    pub fn table_divider(&self) -> String {
        format!("\x1b[4;58;2;{}m", self.mid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_to_rgb_white() {
        assert_eq!(hsv_to_rgb(0.0, 0.0, 1.0), (255, 255, 255));
    }

    #[test]
    fn hsv_to_rgb_pure_red() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), (255, 0, 0));
    }

    #[test]
    fn apply_multiplier_clamps_to_one() {
        let role = RoleMultiplier {
            h: 3.0,
            s: 3.0,
            v: 3.0,
        };
        // h/s/v all saturate to 1.0, which is pure red.
        let rgb = apply_multiplier((0.5, 0.5, 0.5), &role);
        assert_eq!(rgb, "255;0;0");
    }
}
