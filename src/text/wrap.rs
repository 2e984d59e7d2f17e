use super::{Font, TextMeasurer};
use crate::style::TextWrapping;

const FIT_EPSILON: f32 = 0.001;

/// Flattens a run to a single inline paragraph: every line break (`\r\n`
/// counts once) becomes a space and other control characters are dropped.
pub fn clean_run_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push(' ');
            }
            '\n' | '\u{2028}' | '\u{2029}' => out.push(' '),
            ch if (ch as u32) < 0x20 => {}
            ch => out.push(ch),
        }
    }
    out
}

/// The head of a string that fits a width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextFit<'a> {
    /// Text to draw on the current line.
    pub text: &'a str,
    /// Bytes consumed from the input. Exceeds `text.len()` when a word-wrap
    /// break swallowed the separating space.
    pub consumed: usize,
    pub width: f32,
}

impl TextFit<'_> {
    pub const EMPTY: TextFit<'static> = TextFit {
        text: "",
        consumed: 0,
        width: 0.0,
    };

    pub fn is_empty(&self) -> bool {
        self.consumed == 0
    }
}

/// Fits as much of `text` as possible into `max_width`.
///
/// `NoWrap` always returns the whole string. `WordWrap` breaks after the last
/// space whose preceding text fits and falls back to a character break when
/// no such space exists; `Wrap` always breaks at the last fitting character.
/// Returns [`TextFit::EMPTY`] when not even one character fits.
pub fn fit_text<'a>(
    text: &'a str,
    max_width: f32,
    font: &Font,
    wrapping: TextWrapping,
    measurer: &dyn TextMeasurer,
) -> TextFit<'a> {
    if text.is_empty() {
        return TextFit::EMPTY;
    }
    if wrapping == TextWrapping::NoWrap {
        return whole(text, measurer.measure_width(text, font));
    }
    if max_width.is_nan() || max_width <= 0.0 {
        return TextFit::EMPTY;
    }

    let full_width = measurer.measure_width(text, font);
    if full_width <= max_width + FIT_EPSILON {
        return whole(text, full_width);
    }

    let word_wrap = wrapping == TextWrapping::WordWrap;
    let mut width = 0.0_f32;
    let mut last_fit = 0usize;
    let mut last_fit_width = 0.0_f32;
    let mut last_space: Option<(usize, f32)> = None;

    for (index, ch) in text.char_indices() {
        if word_wrap && ch == ' ' && index > 0 {
            last_space = Some((index, width));
        }
        let next = width + measurer.char_width(ch, font);
        if next > max_width + FIT_EPSILON {
            break;
        }
        width = next;
        last_fit = index + ch.len_utf8();
        last_fit_width = width;
    }

    if let Some((space, space_width)) = last_space {
        return TextFit {
            text: &text[..space],
            consumed: space + 1,
            width: space_width,
        };
    }
    TextFit {
        text: &text[..last_fit],
        consumed: last_fit,
        width: last_fit_width,
    }
}

fn whole(text: &str, width: f32) -> TextFit<'_> {
    TextFit {
        text,
        consumed: text.len(),
        width,
    }
}
