use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::{Font, FontMetrics, TextMeasurer};
use crate::style::{Color, FontStyle, FontWeight};

/// The fully resolved style of a text run. Identical keys share one paint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunStyleKey {
    pub color: Color,
    size_bits: u32,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub family: SmolStr,
}

impl RunStyleKey {
    pub fn new(
        color: Color,
        size: f32,
        weight: FontWeight,
        style: FontStyle,
        family: impl Into<SmolStr>,
    ) -> Self {
        let size = if size.is_finite() { size.max(0.0) } else { 0.0 };
        Self {
            color,
            // +0.0 so that -0.0 and 0.0 hash the same
            size_bits: (size + 0.0).to_bits(),
            weight,
            style,
            family: family.into(),
        }
    }

    pub fn size(&self) -> f32 {
        f32::from_bits(self.size_bits)
    }

    fn font(&self, family: SmolStr) -> Font {
        Font {
            family,
            size: self.size(),
            weight: self.weight,
            style: self.style,
        }
    }
}

/// A resolved font plus color, ready to hand to a [`Canvas`](crate::render::Canvas).
#[derive(Debug, PartialEq)]
pub struct TextPaint {
    pub color: Color,
    pub font: Font,
    pub metrics: FontMetrics,
}

struct PoolEntry {
    paint: Rc<TextPaint>,
    refs: usize,
}

/// Reference-counted paint/font pool shared by every text element of a
/// [`TextContext`](super::TextContext).
pub struct PaintPool {
    entries: RefCell<FxHashMap<RunStyleKey, PoolEntry>>,
    fallback_family: SmolStr,
}

impl PaintPool {
    pub fn new(fallback_family: impl Into<SmolStr>) -> Self {
        Self {
            entries: RefCell::new(FxHashMap::default()),
            fallback_family: fallback_family.into(),
        }
    }

    /// Returns the shared paint for `key`, creating it on first use. Every
    /// call must be paired with one [`PaintPool::release`].
    pub fn acquire(&self, key: &RunStyleKey, measurer: &dyn TextMeasurer) -> Rc<TextPaint> {
        let mut entries = self.entries.borrow_mut();
        if let Some(entry) = entries.get_mut(key) {
            entry.refs += 1;
            return Rc::clone(&entry.paint);
        }

        let family = if measurer.has_family(&key.family) {
            key.family.clone()
        } else {
            tracing::debug!(
                family = %key.family,
                fallback = %self.fallback_family,
                "font family unavailable, using fallback"
            );
            self.fallback_family.clone()
        };
        let font = key.font(family);
        let metrics = measurer.metrics(&font);
        let paint = Rc::new(TextPaint {
            color: key.color,
            font,
            metrics,
        });
        tracing::debug!(family = %key.family, size = key.size(), "paint created");
        entries.insert(
            key.clone(),
            PoolEntry {
                paint: Rc::clone(&paint),
                refs: 1,
            },
        );
        paint
    }

    pub fn release(&self, key: &RunStyleKey) {
        let mut entries = self.entries.borrow_mut();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            entries.remove(key);
            tracing::debug!(family = %key.family, size = key.size(), "paint evicted");
        }
    }

    pub fn ref_count(&self, key: &RunStyleKey) -> usize {
        self.entries.borrow().get(key).map_or(0, |entry| entry.refs)
    }

    pub fn live_entries(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// One element's view of the pool: holds a single reference per distinct key.
#[derive(Debug, Default)]
pub struct RunPaintCache {
    paints: FxHashMap<RunStyleKey, Rc<TextPaint>>,
}

impl RunPaintCache {
    pub fn get_or_acquire(&mut self, key: &RunStyleKey, context: &super::TextContext) -> Rc<TextPaint> {
        if let Some(paint) = self.paints.get(key) {
            return Rc::clone(paint);
        }
        let paint = context.acquire_paint(key);
        self.paints.insert(key.clone(), Rc::clone(&paint));
        paint
    }

    pub fn release_all(&mut self, context: &super::TextContext) {
        for (key, _) in self.paints.drain() {
            context.paints().release(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.paints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paints.is_empty()
    }
}
