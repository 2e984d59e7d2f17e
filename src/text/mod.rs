//! Text measurement, the shared paint pool and line fitting.

mod measure;
mod paint;
mod wrap;

use std::rc::Rc;

pub use measure::*;
pub use paint::*;
pub use wrap::*;

use crate::config::TextDefaults;
use crate::style::{FontStyle, FontWeight};

/// The text services every text-bearing element is constructed with.
pub struct TextContext {
    measurer: Box<dyn TextMeasurer>,
    paints: PaintPool,
    defaults: TextDefaults,
}

impl TextContext {
    pub fn new(measurer: Box<dyn TextMeasurer>, defaults: TextDefaults) -> Rc<Self> {
        let paints = PaintPool::new(defaults.fallback_family.clone());
        Rc::new(Self {
            measurer,
            paints,
            defaults,
        })
    }

    /// Shaping-free context, suitable for headless layout.
    pub fn estimated(defaults: TextDefaults) -> Rc<Self> {
        Self::new(Box::new(EstimatedTextMeasurer), defaults)
    }

    pub fn with_system_fonts(defaults: TextDefaults) -> Rc<Self> {
        Self::new(Box::new(CosmicTextMeasurer::new()), defaults)
    }

    pub fn measurer(&self) -> &dyn TextMeasurer {
        self.measurer.as_ref()
    }

    pub fn paints(&self) -> &PaintPool {
        &self.paints
    }

    pub fn defaults(&self) -> &TextDefaults {
        &self.defaults
    }

    pub fn acquire_paint(&self, key: &RunStyleKey) -> Rc<TextPaint> {
        self.paints.acquire(key, self.measurer.as_ref())
    }

    /// Key for the configured default text style.
    pub fn default_style_key(&self) -> RunStyleKey {
        RunStyleKey::new(
            self.defaults.color,
            self.defaults.font_size,
            FontWeight::NORMAL,
            FontStyle::Normal,
            self.defaults.font_family.clone(),
        )
    }
}
