use std::cell::RefCell;

use cosmic_text::{Align, Attrs, Buffer, Family, FontSystem, Metrics, Shaping};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::error::{Result, UiError};
use crate::style::{FontStyle, FontWeight};

#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub family: SmolStr,
    pub size: f32,
    pub weight: FontWeight,
    pub style: FontStyle,
}

impl Font {
    pub fn new(family: impl Into<SmolStr>, size: f32) -> Self {
        Self {
            family: family.into(),
            size,
            weight: FontWeight::NORMAL,
            style: FontStyle::Normal,
        }
    }

    pub fn with_weight(mut self, weight: FontWeight) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_style(mut self, style: FontStyle) -> Self {
        self.style = style;
        self
    }
}

/// Vertical metrics relative to the baseline. `ascent` is negative (above the
/// baseline), `descent` is positive.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FontMetrics {
    pub ascent: f32,
    pub descent: f32,
}

impl FontMetrics {
    pub fn line_height(&self) -> f32 {
        self.descent - self.ascent
    }
}

/// The text measurement capability the layout core depends on.
///
/// Implementations must be deterministic for a given `(font, text)` pair,
/// since measured widths are cached across frames.
pub trait TextMeasurer {
    fn measure_width(&self, text: &str, font: &Font) -> f32;

    fn metrics(&self, font: &Font) -> FontMetrics;

    fn has_family(&self, _family: &str) -> bool {
        true
    }

    fn char_width(&self, ch: char, font: &Font) -> f32 {
        let mut buf = [0u8; 4];
        self.measure_width(ch.encode_utf8(&mut buf), font)
    }
}

/// Shaping-free width estimates. Deterministic and font-independent, so it is
/// what headless hosts use before any font data is loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatedTextMeasurer;

impl TextMeasurer for EstimatedTextMeasurer {
    fn measure_width(&self, text: &str, font: &Font) -> f32 {
        text.chars().map(|ch| self.char_width(ch, font)).sum()
    }

    fn metrics(&self, font: &Font) -> FontMetrics {
        FontMetrics {
            ascent: -font.size * 0.8,
            descent: font.size * 0.2,
        }
    }

    fn char_width(&self, ch: char, font: &Font) -> f32 {
        let width = estimate_char_width_px(ch, font.size);
        if font.weight.is_bold() {
            width * 1.05
        } else {
            width
        }
    }
}

fn estimate_char_width_px(ch: char, font_size: f32) -> f32 {
    // CJK / fullwidth glyphs are near 1em, ASCII is narrower, whitespace narrowest.
    if ch == '\t' {
        return font_size * 2.0;
    }
    if ch.is_whitespace() {
        return font_size * 0.33;
    }
    if ch.is_ascii() {
        return font_size * 0.56;
    }
    font_size
}

const LINE_HEIGHT_RATIO: f32 = 1.25;

/// Measures with real shaping through `cosmic-text`.
pub struct CosmicTextMeasurer {
    font_system: RefCell<FontSystem>,
    metrics_cache: RefCell<FxHashMap<(SmolStr, u32, u16, FontStyle), FontMetrics>>,
}

impl CosmicTextMeasurer {
    /// Loads the system font database. Expensive; build one per process.
    pub fn new() -> Self {
        Self::with_font_system(FontSystem::new())
    }

    pub fn with_font_system(font_system: FontSystem) -> Self {
        Self {
            font_system: RefCell::new(font_system),
            metrics_cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn load_font_data(&self, data: Vec<u8>) -> Result<()> {
        let mut font_system = self.font_system.borrow_mut();
        let before = font_system.db().len();
        font_system.db_mut().load_font_data(data);
        if font_system.db().len() == before {
            return Err(UiError::FontLoad("no usable faces in font data".to_string()));
        }
        self.metrics_cache.borrow_mut().clear();
        tracing::debug!(faces = font_system.db().len(), "loaded font data");
        Ok(())
    }

    fn shape<R>(&self, text: &str, font: &Font, f: impl FnOnce(&Buffer) -> R) -> R {
        let mut guard = self.font_system.borrow_mut();
        let font_system = &mut *guard;
        let size = font.size.max(1.0);
        let mut buffer = Buffer::new(font_system, Metrics::new(size, size * LINE_HEIGHT_RATIO));
        buffer.set_size(font_system, None, None);
        let attrs = Attrs::new()
            .family(cosmic_family(&font.family))
            .weight(cosmic_text::Weight(font.weight.0))
            .style(cosmic_style(font.style));
        buffer.set_text(font_system, text, &attrs, Shaping::Advanced, Some(Align::Left));
        buffer.shape_until_scroll(font_system, false);
        f(&buffer)
    }
}

impl Default for CosmicTextMeasurer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextMeasurer for CosmicTextMeasurer {
    fn measure_width(&self, text: &str, font: &Font) -> f32 {
        if text.is_empty() {
            return 0.0;
        }
        self.shape(text, font, |buffer| {
            buffer
                .layout_runs()
                .fold(0.0_f32, |width, run| width.max(run.line_w))
        })
    }

    fn metrics(&self, font: &Font) -> FontMetrics {
        let key = (
            font.family.clone(),
            font.size.to_bits(),
            font.weight.0,
            font.style,
        );
        if let Some(metrics) = self.metrics_cache.borrow().get(&key) {
            return *metrics;
        }
        let metrics = self.shape("Xg", font, |buffer| {
            buffer.layout_runs().next().map(|run| FontMetrics {
                ascent: run.line_top - run.line_y,
                descent: run.line_top + run.line_height - run.line_y,
            })
        });
        let metrics = metrics.unwrap_or_else(|| EstimatedTextMeasurer.metrics(font));
        self.metrics_cache.borrow_mut().insert(key, metrics);
        metrics
    }

    fn has_family(&self, family: &str) -> bool {
        if is_generic_family(family) {
            return true;
        }
        self.font_system.borrow().db().faces().any(|face| {
            face.families
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case(family))
        })
    }
}

fn is_generic_family(family: &str) -> bool {
    matches!(
        family,
        "sans-serif" | "serif" | "monospace" | "cursive" | "fantasy"
    )
}

fn cosmic_family(family: &str) -> Family<'_> {
    match family {
        "sans-serif" => Family::SansSerif,
        "serif" => Family::Serif,
        "monospace" => Family::Monospace,
        "cursive" => Family::Cursive,
        "fantasy" => Family::Fantasy,
        name => Family::Name(name),
    }
}

fn cosmic_style(style: FontStyle) -> cosmic_text::Style {
    match style {
        FontStyle::Normal => cosmic_text::Style::Normal,
        FontStyle::Italic => cosmic_text::Style::Italic,
        FontStyle::Oblique => cosmic_text::Style::Oblique,
    }
}
