//! Auto-fit text layout
//!
//! The main line is sized so it covers 80% of the surface width, then drawn
//! one glyph at a time so the ampersand between the two names can use its
//! own face and spacing. The optional subtitle sits below it at 35% of the
//! main size, wrapped to at most two lines.

use stylecast_core::constants::PREVIEW_PLACEHOLDER;
use stylecast_core::{AppError, TextSpec};

use super::canvas::{FontSpec, TextCanvas};

/// Share of the surface width the main line should cover.
pub const TARGET_WIDTH_FRACTION: f32 = 0.8;
/// Subtitles wider than this share of the surface width are wrapped.
pub const SUBTITLE_WRAP_FRACTION: f32 = 0.9;
pub const SUBTITLE_SIZE_FRACTION: f32 = 0.35;
pub const SUBTITLE_MAX_LINES: usize = 2;
/// Share of the last kept subtitle line retained before the ellipsis.
pub const TRUNCATE_FRACTION: f32 = 0.8;

pub const MIN_SIZE_FRACTION: f32 = 0.04;
pub const MAX_SIZE_FRACTION: f32 = 0.18;
/// Initial size is `surface_width * INITIAL_SIZE_FACTOR / char_count`.
pub const INITIAL_SIZE_FACTOR: f32 = 1.6;
/// The fitted main line ends up at most this far below the target width.
pub const FIT_TOLERANCE_PX: f32 = 0.5;
const MAX_FIT_ITERATIONS: usize = 40;

/// Letter spacing as a share of the font size is `SPACING_REFERENCE_PX / size`,
/// kept within `[MIN_SPACING_EM, MAX_SPACING_EM]`.
pub const SPACING_REFERENCE_PX: f32 = 4.0;
pub const MIN_SPACING_EM: f32 = 0.02;
pub const MAX_SPACING_EM: f32 = 0.12;

const SUBTITLE_GAP_EM: f32 = 0.4;
const SUBTITLE_LINE_HEIGHT: f32 = 1.3;
const EDGE_MARGIN_FRACTION: f32 = 0.03;
const ELLIPSIS: char = '\u{2026}';

/// Previews show placeholder text when no names were entered; the final
/// composite never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Preview,
    Final,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedGlyph {
    pub text: String,
    /// Offset from the left edge of the line.
    pub x: f32,
    pub width: f32,
    pub font: FontSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MainLine {
    pub text: String,
    pub glyphs: Vec<PlacedGlyph>,
    pub font_size: f32,
    pub letter_spacing: f32,
    pub left: f32,
    pub width: f32,
    /// Vertical middle of the line.
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub main: MainLine,
    pub subtitle_size: f32,
    pub subtitle: Vec<SubtitleLine>,
}

impl TextLayout {
    fn shift_vertically(&mut self, dy: f32) {
        self.main.y += dy;
        for line in &mut self.subtitle {
            line.y += dy;
        }
    }

    fn top(&self) -> f32 {
        self.main.y - self.main.font_size / 2.0
    }

    fn bottom(&self) -> f32 {
        match self.subtitle.last() {
            Some(line) => line.y + self.subtitle_size / 2.0,
            None => self.main.y + self.main.font_size / 2.0,
        }
    }
}

/// `"NAME1 & NAME2"`, a single uppercased name, or an empty string.
pub fn format_names(name1: &str, name2: &str) -> String {
    let first = name1.trim().to_uppercase();
    let second = name2.trim().to_uppercase();
    match (first.is_empty(), second.is_empty()) {
        (false, false) => format!("{} & {}", first, second),
        (false, true) => first,
        (true, false) => second,
        (true, true) => String::new(),
    }
}

/// Letter spacing in pixels for a font size. The spacing share of the size
/// shrinks as the size grows.
pub fn letter_spacing(size: f32) -> f32 {
    if size <= 0.0 {
        return 0.0;
    }
    size * (SPACING_REFERENCE_PX / size).clamp(MIN_SPACING_EM, MAX_SPACING_EM)
}

/// Picks the main font size for `text` on a surface `surface_width` wide.
pub fn fit_font_size(canvas: &dyn TextCanvas, text: &str, surface_width: f32) -> f32 {
    let floor = surface_width * MIN_SIZE_FRACTION;
    let ceiling = surface_width * MAX_SIZE_FRACTION;
    let target = surface_width * TARGET_WIDTH_FRACTION;
    let chars = text.chars().count().max(1) as f32;

    let mut size = (surface_width * INITIAL_SIZE_FACTOR / chars).clamp(floor, ceiling);
    let measured = canvas.measure(text, FontSpec::primary(size));
    if measured > 0.0 {
        size *= target / measured;
    }
    size.clamp(floor, ceiling)
}

/// Greedy word wrap. A single word wider than `max_width` gets its own line.
pub fn wrap_words<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Cuts `line` and appends an ellipsis until it fits `max_width`. Lines that
/// already fit are returned unchanged.
pub fn fit_line<F>(line: &str, max_width: f32, measure: F) -> String
where
    F: Fn(&str) -> f32,
{
    if measure(line) <= max_width {
        return line.to_string();
    }
    let mut chars: Vec<char> = line.chars().collect();
    while !chars.is_empty() {
        chars.pop();
        let kept: String = chars.iter().collect();
        let candidate = format!("{}{}", kept.trim_end(), ELLIPSIS);
        if measure(&candidate) <= max_width {
            return candidate;
        }
    }
    ELLIPSIS.to_string()
}

/// Keeps at most [`SUBTITLE_MAX_LINES`] lines. When lines are dropped the
/// last kept line is cut to [`TRUNCATE_FRACTION`] of its characters and
/// marked with an ellipsis.
pub fn limit_lines(mut lines: Vec<String>) -> Vec<String> {
    if lines.len() <= SUBTITLE_MAX_LINES {
        return lines;
    }
    lines.truncate(SUBTITLE_MAX_LINES);
    if let Some(last) = lines.last_mut() {
        let chars: Vec<char> = last.chars().collect();
        let keep = ((chars.len() as f32) * TRUNCATE_FRACTION).floor() as usize;
        let kept: String = chars[..keep].iter().collect();
        *last = format!("{}{}", kept.trim_end(), ELLIPSIS);
    }
    lines
}

struct LineBuilder<'c> {
    canvas: &'c dyn TextCanvas,
    font: FontSpec,
    spacing: f32,
    x: f32,
    spacing_total: f32,
    glyphs: Vec<PlacedGlyph>,
}

impl<'c> LineBuilder<'c> {
    fn new(canvas: &'c dyn TextCanvas, size: f32) -> Self {
        Self {
            canvas,
            font: FontSpec::primary(size),
            spacing: letter_spacing(size),
            x: 0.0,
            spacing_total: 0.0,
            glyphs: Vec::new(),
        }
    }

    fn add_spacing(&mut self, amount: f32) {
        self.x += amount;
        self.spacing_total += amount;
    }

    fn place(&mut self, text: String, font: FontSpec) {
        let width = self.canvas.measure(&text, font);
        self.glyphs.push(PlacedGlyph {
            text,
            x: self.x,
            width,
            font,
        });
        self.x += width;
    }

    fn word(&mut self, word: &str) {
        for (i, ch) in word.chars().enumerate() {
            if i > 0 {
                self.add_spacing(self.spacing);
            }
            self.place(ch.to_string(), self.font);
        }
    }

    /// A word space plus one letter spacing, on either side of the ampersand.
    fn gap(&mut self) {
        self.x += self.canvas.measure(" ", self.font);
        self.add_spacing(self.spacing);
    }

    fn ampersand(&mut self) {
        self.place("&".to_string(), FontSpec::accent(self.font.size));
    }
}

struct BuiltLine {
    glyphs: Vec<PlacedGlyph>,
    width: f32,
    spacing_total: f32,
    spacing: f32,
}

fn build_line(canvas: &dyn TextCanvas, first: &str, second: Option<&str>, size: f32) -> BuiltLine {
    let mut builder = LineBuilder::new(canvas, size);
    builder.word(first);
    if let Some(second) = second {
        builder.gap();
        builder.ampersand();
        builder.gap();
        builder.word(second);
    }
    BuiltLine {
        width: builder.x,
        spacing_total: builder.spacing_total,
        spacing: builder.spacing,
        glyphs: builder.glyphs,
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextCompositor;

impl TextCompositor {
    pub fn new() -> Self {
        Self
    }

    /// Lays out `spec` on `canvas`. Returns `None` when there is nothing to
    /// draw (no names in final mode).
    pub fn layout(
        &self,
        canvas: &dyn TextCanvas,
        spec: &TextSpec,
        mode: RenderMode,
    ) -> Option<TextLayout> {
        let surface_width = canvas.width();
        let surface_height = canvas.height();
        if surface_width <= 0.0 || surface_height <= 0.0 {
            return None;
        }

        let first = spec.name1.trim().to_uppercase();
        let second = spec.name2.trim().to_uppercase();
        let (first, second) = match (first.is_empty(), second.is_empty()) {
            (false, false) => (first, Some(second)),
            (false, true) => (first, None),
            (true, false) => (second, None),
            (true, true) => match mode {
                RenderMode::Preview => (PREVIEW_PLACEHOLDER.to_string(), None),
                RenderMode::Final => return None,
            },
        };
        let text = match &second {
            Some(second) => format!("{} & {}", first, second),
            None => first.clone(),
        };

        let target = surface_width * TARGET_WIDTH_FRACTION;
        let mut size = fit_font_size(canvas, &text, surface_width);
        let mut line = build_line(canvas, &first, second.as_deref(), size);

        if line.width > target {
            // Width grows monotonically with size, so bisect below the
            // initial estimate until the line sits just under the target.
            let mut low = 0.0_f32;
            let mut high = size;
            for _ in 0..MAX_FIT_ITERATIONS {
                let mid = (low + high) / 2.0;
                let candidate = build_line(canvas, &first, second.as_deref(), mid);
                if candidate.width > target {
                    high = mid;
                    continue;
                }
                low = mid;
                size = mid;
                line = candidate;
                if target - line.width <= FIT_TOLERANCE_PX {
                    break;
                }
            }
            tracing::debug!(font_size = size, width = line.width, "Rescaled main line to fit");
        }

        let main = MainLine {
            text,
            glyphs: line.glyphs,
            font_size: size,
            letter_spacing: line.spacing,
            left: (surface_width - line.width) / 2.0,
            width: line.width,
            y: surface_height * spec.position.anchor_fraction(),
        };

        let subtitle_size = size * SUBTITLE_SIZE_FRACTION;
        let subtitle = spec
            .subtitle
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| self.layout_subtitle(canvas, s, subtitle_size, &main))
            .unwrap_or_default();

        let mut layout = TextLayout {
            main,
            subtitle_size,
            subtitle,
        };

        let margin = surface_height * EDGE_MARGIN_FRACTION;
        let overflow = layout.bottom() - (surface_height - margin);
        if overflow > 0.0 {
            layout.shift_vertically(-overflow);
        }
        let underflow = margin - layout.top();
        if underflow > 0.0 {
            layout.shift_vertically(underflow);
        }

        Some(layout)
    }

    fn layout_subtitle(
        &self,
        canvas: &dyn TextCanvas,
        subtitle: &str,
        size: f32,
        main: &MainLine,
    ) -> Vec<SubtitleLine> {
        let font = FontSpec::primary(size);
        let surface_width = canvas.width();
        let wrap_width = surface_width * SUBTITLE_WRAP_FRACTION;

        let measure = |s: &str| canvas.measure(s, font);
        let lines = if measure(subtitle) > wrap_width {
            limit_lines(wrap_words(subtitle, wrap_width, measure))
                .iter()
                .map(|line| fit_line(line, wrap_width, measure))
                .collect()
        } else {
            vec![subtitle.to_string()]
        };

        let first_y = main.y + main.font_size / 2.0 + size * SUBTITLE_GAP_EM + size / 2.0;
        lines
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let width = canvas.measure(&text, font);
                SubtitleLine {
                    x: (surface_width - width) / 2.0,
                    y: first_y + i as f32 * size * SUBTITLE_LINE_HEIGHT,
                    width,
                    text,
                }
            })
            .collect()
    }

    /// Lays out and draws `spec`. Returns the layout that was drawn.
    pub fn draw(
        &self,
        canvas: &mut dyn TextCanvas,
        spec: &TextSpec,
        mode: RenderMode,
    ) -> Result<Option<TextLayout>, AppError> {
        let color = spec.rgba()?;
        let Some(layout) = self.layout(&*canvas, spec, mode) else {
            return Ok(None);
        };

        for glyph in &layout.main.glyphs {
            if glyph.text.trim().is_empty() {
                continue;
            }
            canvas.fill_text(
                &glyph.text,
                layout.main.left + glyph.x,
                layout.main.y,
                glyph.font,
                color,
            );
        }

        let subtitle_font = FontSpec::primary(layout.subtitle_size);
        for line in &layout.subtitle {
            canvas.fill_text(&line.text, line.x, line.y, subtitle_font, color);
        }

        Ok(Some(layout))
    }
}
