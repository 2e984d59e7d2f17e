use std::rc::Rc;

use trellis::config::TextDefaults;
use trellis::text::{Font, FontMetrics, TextContext, TextMeasurer};

/// Every character advances by the font size.
pub(crate) struct FixedAdvance;

impl TextMeasurer for FixedAdvance {
    fn measure_width(&self, text: &str, font: &Font) -> f32 {
        text.chars().count() as f32 * font.size
    }

    fn metrics(&self, font: &Font) -> FontMetrics {
        FontMetrics {
            ascent: -0.8 * font.size,
            descent: 0.2 * font.size,
        }
    }
}

/// 10px text, so one character is 10px wide and a line is 10px tall.
pub(crate) fn context() -> Rc<TextContext> {
    TextContext::new(
        Box::new(FixedAdvance),
        TextDefaults {
            font_size: 10.0,
            ..TextDefaults::default()
        },
    )
}
