use std::any::Any;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use smol_str::SmolStr;

use crate::geometry::{Point, Size};
use crate::render::Canvas;
use crate::style::{Color, FontStyle, FontWeight, HorizontalTextAlignment, TextWrapping};
use crate::text::{RunPaintCache, RunStyleKey, TextContext, TextPaint, clean_run_text, fit_text};
use crate::ui::{AccessibilityRole, Binding, PropertyBindings};

use super::{ElementCore, UiElement};

/// One styled span of a [`RichTextLabel`]. Unset style fields inherit from the
/// label.
pub struct TextRun {
    text: String,
    color: Option<Color>,
    font_size: Option<f32>,
    font_weight: Option<FontWeight>,
    font_style: Option<FontStyle>,
    font_family: Option<SmolStr>,
    revision: u64,
    bindings: PropertyBindings<TextRun>,
}

impl TextRun {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
            font_size: None,
            font_weight: None,
            font_style: None,
            font_family: None,
            revision: 0,
            bindings: PropertyBindings::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    pub fn font_size(&self) -> Option<f32> {
        self.font_size
    }

    pub fn font_weight(&self) -> Option<FontWeight> {
        self.font_weight
    }

    pub fn font_style(&self) -> Option<FontStyle> {
        self.font_style
    }

    pub fn font_family(&self) -> Option<&str> {
        self.font_family.as_deref()
    }

    fn touch<T: PartialEq>(revision: &mut u64, slot: &mut T, value: T) {
        if *slot != value {
            *slot = value;
            *revision += 1;
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        Self::touch(&mut self.revision, &mut self.text, text.into());
    }

    pub fn set_color(&mut self, color: Option<Color>) {
        Self::touch(&mut self.revision, &mut self.color, color);
    }

    pub fn set_font_size(&mut self, size: Option<f32>) {
        Self::touch(&mut self.revision, &mut self.font_size, size);
    }

    pub fn set_font_weight(&mut self, weight: Option<FontWeight>) {
        Self::touch(&mut self.revision, &mut self.font_weight, weight);
    }

    pub fn set_font_style(&mut self, style: Option<FontStyle>) {
        Self::touch(&mut self.revision, &mut self.font_style, style);
    }

    pub fn set_font_family(&mut self, family: Option<SmolStr>) {
        Self::touch(&mut self.revision, &mut self.font_family, family);
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.set_color(Some(color));
        self
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.set_font_size(Some(size));
        self
    }

    pub fn with_font_weight(mut self, weight: FontWeight) -> Self {
        self.set_font_weight(Some(weight));
        self
    }

    pub fn bold(self) -> Self {
        self.with_font_weight(FontWeight::BOLD)
    }

    pub fn italic(mut self) -> Self {
        self.set_font_style(Some(FontStyle::Italic));
        self
    }

    pub fn with_font_family(mut self, family: impl Into<SmolStr>) -> Self {
        self.set_font_family(Some(family.into()));
        self
    }

    pub fn bind_text(&mut self, source: Binding<String>) {
        self.bindings
            .bind("text", move |run: &mut TextRun| run.set_text(source.get()));
    }

    pub fn bind_color(&mut self, source: Binding<Option<Color>>) {
        self.bindings
            .bind("color", move |run: &mut TextRun| run.set_color(source.get()));
    }

    fn refresh_bindings(&mut self) -> usize {
        let mut bindings = std::mem::take(&mut self.bindings);
        let applied = bindings.apply(self);
        self.bindings = bindings;
        applied
    }
}

impl fmt::Debug for TextRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextRun")
            .field("text", &self.text)
            .field("color", &self.color)
            .field("font_size", &self.font_size)
            .field("font_weight", &self.font_weight)
            .field("font_style", &self.font_style)
            .field("font_family", &self.font_family)
            .finish()
    }
}

/// Label-level defaults and layout settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RichTextStyle {
    pub text_color: Color,
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub font_family: SmolStr,
    pub wrapping: TextWrapping,
    pub max_lines: Option<usize>,
    pub alignment: HorizontalTextAlignment,
}

/// Resolves every style field of `run`, falling back to the label defaults.
pub fn resolve_run_style(run: &TextRun, style: &RichTextStyle) -> RunStyleKey {
    RunStyleKey::new(
        run.color.unwrap_or(style.text_color),
        run.font_size.unwrap_or(style.font_size),
        run.font_weight.unwrap_or(style.font_weight),
        run.font_style.unwrap_or(style.font_style),
        run.font_family
            .clone()
            .unwrap_or_else(|| style.font_family.clone()),
    )
}

#[derive(Debug, Clone)]
pub struct RunFragment {
    pub text: String,
    pub paint: Rc<TextPaint>,
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
    pub run_index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct WrappedLine {
    pub fragments: Vec<RunFragment>,
    pub width: f32,
    /// Most negative ascent on the line.
    pub max_ascent: f32,
    pub max_descent: f32,
}

impl WrappedLine {
    pub fn height(&self) -> f32 {
        self.max_descent - self.max_ascent
    }

    pub fn text(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    fn push(&mut self, fragment: RunFragment) {
        self.width += fragment.width;
        self.max_ascent = self.max_ascent.min(fragment.ascent);
        self.max_descent = self.max_descent.max(fragment.descent);
        self.fragments.push(fragment);
    }
}

fn fragment(text: &str, width: f32, paint: &Rc<TextPaint>, run_index: usize) -> RunFragment {
    RunFragment {
        text: text.to_string(),
        paint: Rc::clone(paint),
        width,
        ascent: paint.metrics.ascent,
        descent: paint.metrics.descent,
        run_index,
    }
}

/// Breaks `runs` into lines no wider than `max_width` (unbounded for
/// `NoWrap`). Paints are taken from `paints`.
pub fn layout_runs(
    runs: &[TextRun],
    style: &RichTextStyle,
    max_width: f32,
    context: &TextContext,
    paints: &mut RunPaintCache,
) -> Vec<WrappedLine> {
    let measurer = context.measurer();
    let mut lines = Vec::new();
    let mut current = WrappedLine::default();
    let mut x = 0.0_f32;

    for (run_index, run) in runs.iter().enumerate() {
        let key = resolve_run_style(run, style);
        let paint = paints.get_or_acquire(&key, context);
        let cleaned = clean_run_text(&run.text);
        if cleaned.is_empty() {
            continue;
        }

        if style.wrapping == TextWrapping::NoWrap {
            let width = measurer.measure_width(&cleaned, &paint.font);
            current.push(fragment(&cleaned, width, &paint, run_index));
            x += width;
            continue;
        }

        let mut rest = cleaned.as_str();
        while !rest.is_empty() {
            let fit = fit_text(rest, max_width - x, &paint.font, style.wrapping, measurer);
            if fit.is_empty() {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    x = 0.0;
                    continue;
                }
                // Not even one character fits an empty line; force it through.
                let len = rest.chars().next().map_or(rest.len(), char::len_utf8);
                let forced = &rest[..len];
                let width = measurer.measure_width(forced, &paint.font);
                current.push(fragment(forced, width, &paint, run_index));
                rest = &rest[len..];
                if !rest.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    x = 0.0;
                }
                continue;
            }

            if !fit.text.is_empty() {
                current.push(fragment(fit.text, fit.width, &paint, run_index));
                x += fit.width;
            }
            rest = &rest[fit.consumed..];
            if !rest.is_empty() {
                lines.push(std::mem::take(&mut current));
                x = 0.0;
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if let Some(max_lines) = style.max_lines {
        lines.truncate(max_lines);
    }
    lines
}

struct LineCache {
    max_width: f32,
    lines: Vec<WrappedLine>,
}

fn same_width(a: f32, b: f32) -> bool {
    a == b || (a - b).abs() <= 0.01
}

/// Inline text built from independently styled runs.
pub struct RichTextLabel {
    core: ElementCore,
    context: Rc<TextContext>,
    runs: Vec<TextRun>,
    style: RichTextStyle,
    paints: RunPaintCache,
    cached_lines: Option<LineCache>,
    line_builds: u64,
    bindings: PropertyBindings<RichTextLabel>,
}

impl RichTextLabel {
    pub fn new(context: Rc<TextContext>) -> Self {
        let defaults = context.defaults();
        let style = RichTextStyle {
            text_color: defaults.color,
            font_size: defaults.font_size,
            font_weight: FontWeight::NORMAL,
            font_style: FontStyle::Normal,
            font_family: defaults.font_family.clone(),
            wrapping: TextWrapping::WordWrap,
            max_lines: None,
            alignment: HorizontalTextAlignment::Left,
        };
        Self {
            core: ElementCore::new(),
            context,
            runs: Vec::new(),
            style,
            paints: RunPaintCache::default(),
            cached_lines: None,
            line_builds: 0,
            bindings: PropertyBindings::new(),
        }
    }

    pub fn with_run(mut self, run: TextRun) -> Self {
        self.add_run(run);
        self
    }

    pub fn with_wrapping(mut self, wrapping: TextWrapping) -> Self {
        self.set_wrapping(wrapping);
        self
    }

    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.set_max_lines(Some(max_lines));
        self
    }

    pub fn with_text_color(mut self, color: Color) -> Self {
        self.set_text_color(color);
        self
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn add_run(&mut self, run: TextRun) {
        self.runs.push(run);
        self.invalidate_layout();
    }

    pub fn insert_run(&mut self, index: usize, run: TextRun) {
        let index = index.min(self.runs.len());
        self.runs.insert(index, run);
        self.invalidate_layout();
    }

    pub fn remove_run(&mut self, index: usize) -> Option<TextRun> {
        if index >= self.runs.len() {
            return None;
        }
        let run = self.runs.remove(index);
        self.invalidate_layout();
        Some(run)
    }

    pub fn clear_runs(&mut self) {
        if !self.runs.is_empty() {
            self.runs.clear();
            self.invalidate_layout();
        }
    }

    /// Mutable access to one run. Any change made through the guard drops the
    /// cached lines and invalidates measure when the guard goes away.
    pub fn run_mut(&mut self, index: usize) -> Option<RunMut<'_>> {
        let revision = self.runs.get(index)?.revision;
        Some(RunMut {
            label: self,
            index,
            revision,
        })
    }

    pub fn style(&self) -> &RichTextStyle {
        &self.style
    }

    /// Every label-level style change goes through here.
    fn update_style(&mut self, update: impl FnOnce(&mut RichTextStyle)) {
        let mut next = self.style.clone();
        update(&mut next);
        if next != self.style {
            self.style = next;
            self.invalidate_layout();
        }
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.update_style(|style| style.text_color = color);
    }

    pub fn set_font_size(&mut self, size: f32) {
        let size = crate::geometry::non_negative(size);
        self.update_style(|style| style.font_size = size);
    }

    pub fn set_font_weight(&mut self, weight: FontWeight) {
        self.update_style(|style| style.font_weight = weight);
    }

    pub fn set_font_style(&mut self, font_style: FontStyle) {
        self.update_style(|style| style.font_style = font_style);
    }

    pub fn set_font_family(&mut self, family: impl Into<SmolStr>) {
        let family = family.into();
        self.update_style(|style| style.font_family = family);
    }

    pub fn set_wrapping(&mut self, wrapping: TextWrapping) {
        self.update_style(|style| style.wrapping = wrapping);
    }

    /// `Some(0)` means no limit.
    pub fn set_max_lines(&mut self, max_lines: Option<usize>) {
        let max_lines = max_lines.filter(|lines| *lines > 0);
        self.update_style(|style| style.max_lines = max_lines);
    }

    pub fn set_text_alignment(&mut self, alignment: HorizontalTextAlignment) {
        self.update_style(|style| style.alignment = alignment);
    }

    pub fn bind_text_color(&mut self, source: Binding<Color>) {
        self.bindings.bind("text_color", move |label: &mut RichTextLabel| {
            label.set_text_color(source.get())
        });
    }

    /// Drops the cached lines, releases their paints and invalidates measure.
    pub fn invalidate_layout(&mut self) {
        self.cached_lines = None;
        self.paints.release_all(&self.context);
        self.core.invalidate_measure();
    }

    /// Lines for `max_width`, rebuilt only when the width moved by more than
    /// 0.01px or the layout was invalidated.
    pub fn build_lines(&mut self, max_width: f32) -> &[WrappedLine] {
        let reusable = matches!(
            &self.cached_lines,
            Some(cache) if same_width(cache.max_width, max_width)
        );
        if !reusable {
            let mut paints = RunPaintCache::default();
            let lines = layout_runs(&self.runs, &self.style, max_width, &self.context, &mut paints);
            let mut previous = std::mem::replace(&mut self.paints, paints);
            previous.release_all(&self.context);
            self.line_builds += 1;
            tracing::debug!(
                id = %self.core.id(),
                max_width,
                lines = lines.len(),
                "rich text lines rebuilt"
            );
            self.cached_lines = Some(LineCache { max_width, lines });
        }
        match &self.cached_lines {
            Some(cache) => &cache.lines,
            None => &[],
        }
    }

    pub fn cached_lines(&self) -> Option<&[WrappedLine]> {
        self.cached_lines.as_ref().map(|cache| cache.lines.as_slice())
    }

    pub fn line_build_count(&self) -> u64 {
        self.line_builds
    }

    pub fn paint_cache_len(&self) -> usize {
        self.paints.len()
    }

    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

impl UiElement for RichTextLabel {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn measure_internal(&mut self, available: Size, _dont_stretch: bool) -> Size {
        let max_width = match self.core.desired_size().0 {
            Some(width) => width.min(available.width),
            None => available.width,
        };
        let lines = self.build_lines(max_width);
        let width = lines.iter().fold(0.0_f32, |acc, line| acc.max(line.width));
        let height: f32 = lines.iter().map(WrappedLine::height).sum();
        Size::new(width, height).min(available)
    }

    fn render_internal(&mut self, canvas: &mut dyn Canvas) {
        let bounds = self.core.bounds();
        let alignment = self.style.alignment;
        if self.cached_lines.is_none() {
            self.build_lines(bounds.width);
        }
        let Some(cache) = &self.cached_lines else {
            return;
        };

        canvas.save();
        canvas.clip_rect(bounds);
        let mut y = bounds.y;
        for line in &cache.lines {
            let mut x = match alignment {
                HorizontalTextAlignment::Left => bounds.x,
                HorizontalTextAlignment::Center => bounds.x + (bounds.width - line.width) / 2.0,
                HorizontalTextAlignment::Right => bounds.right() - line.width,
            };
            let baseline = y - line.max_ascent;
            for fragment in &line.fragments {
                canvas.draw_text(&fragment.text, Point::new(x, baseline), &fragment.paint);
                x += fragment.width;
            }
            y += line.height();
        }
        canvas.restore();
    }

    fn accessibility_role(&self) -> AccessibilityRole {
        AccessibilityRole::Text
    }

    fn computed_accessibility_label(&self) -> Option<String> {
        self.core
            .accessibility_label()
            .map(str::to_string)
            .or_else(|| Some(self.plain_text()))
    }

    fn refresh_bindings(&mut self) -> usize {
        let mut bindings = std::mem::take(&mut self.bindings);
        let mut applied = bindings.apply(self);
        self.bindings = bindings;

        let mut changed = false;
        for run in &mut self.runs {
            let before = run.revision;
            applied += run.refresh_bindings();
            changed |= run.revision != before;
        }
        if changed {
            self.invalidate_layout();
        }
        applied
    }

    fn dispose(&mut self) {
        self.cached_lines = None;
        self.paints.release_all(&self.context);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for RichTextLabel {
    fn drop(&mut self) {
        self.paints.release_all(&self.context);
    }
}

/// Guard returned by [`RichTextLabel::run_mut`].
pub struct RunMut<'a> {
    label: &'a mut RichTextLabel,
    index: usize,
    revision: u64,
}

impl Deref for RunMut<'_> {
    type Target = TextRun;

    fn deref(&self) -> &TextRun {
        &self.label.runs[self.index]
    }
}

impl DerefMut for RunMut<'_> {
    fn deref_mut(&mut self) -> &mut TextRun {
        &mut self.label.runs[self.index]
    }
}

impl Drop for RunMut<'_> {
    fn drop(&mut self) {
        if self.label.runs[self.index].revision != self.revision {
            self.label.invalidate_layout();
        }
    }
}
