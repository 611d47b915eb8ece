//! Built-in metric tables for the standard font families.
//!
//! Advance widths are in thousandths of an em for the printable ASCII range
//! (U+0020..=U+007E). Characters outside the table use the family's default
//! advance. Bold and oblique faces share the regular advance table.

/// Advance widths and vertical metrics for one standard family.
#[derive(Debug)]
pub struct StandardFontMetrics {
    widths: &'static [u16; 95],
    default_width: u16,
    /// Distance from baseline to the top of the em box, in 1/1000 em.
    pub ascender: i16,
    /// Distance from baseline to the bottom (negative), in 1/1000 em.
    pub descender: i16,
    /// Extra leading between lines, in 1/1000 em.
    pub line_gap: i16,
}

impl StandardFontMetrics {
    /// Advance width of `ch` in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let code = ch as u32;
        let w = if (32..=126).contains(&code) {
            self.widths[(code - 32) as usize]
        } else {
            self.default_width
        };
        w as f64 / 1000.0 * font_size
    }

    /// Width of `text` in points, with `letter_spacing` after every char.
    pub fn measure_string(&self, text: &str, font_size: f64, letter_spacing: f64) -> f64 {
        text.chars()
            .map(|ch| self.char_width(ch, font_size) + letter_spacing)
            .sum()
    }
}

#[rustfmt::skip]
static HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,                               // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015,                                             // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,                // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,                // 'N'..'Z'
    278, 278, 278, 469, 556, 333,                                                   // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,                // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,                // 'n'..'z'
    334, 260, 334, 584,                                                             // '{'..'~'
];

static COURIER_WIDTHS: [u16; 95] = [600; 95];

pub static HELVETICA: StandardFontMetrics = StandardFontMetrics {
    widths: &HELVETICA_WIDTHS,
    default_width: 556,
    ascender: 718,
    descender: -207,
    line_gap: 231,
};

pub static COURIER: StandardFontMetrics = StandardFontMetrics {
    widths: &COURIER_WIDTHS,
    default_width: 600,
    ascender: 629,
    descender: -157,
    line_gap: 214,
};
