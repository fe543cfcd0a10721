use anyhow::{Context, Result, anyhow};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

use super::{Direction, ttb_columns};

/// Gap between stacked lines (or columns), in pixels.
pub const LINE_SPACING: f32 = 4.0;

/// Font identifier as it appears in settings and in rendered scenes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(String);

impl FontId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f32,
    pub height: f32,
}

pub trait TextMeasurer: Send + Sync {
    /// Advance width of a single line.
    fn line_width(&self, line: &str, font_size: f32) -> f32;

    /// Height of one line box.
    fn line_height(&self, font_size: f32) -> f32;

    /// Extent of possibly multi-line text laid out in `direction`.
    fn measure(&self, text: &str, font_size: f32, direction: Direction) -> TextExtent {
        let lines: Vec<&str> = text.split('\n').collect();
        let gaps = lines.len().saturating_sub(1) as f32 * LINE_SPACING;
        match direction {
            Direction::Ltr | Direction::Rtl => TextExtent {
                width: lines
                    .iter()
                    .map(|line| self.line_width(line, font_size))
                    .fold(0.0, f32::max),
                height: lines.len() as f32 * self.line_height(font_size) + gaps,
            },
            // every column is a run of em cells
            Direction::Ttb => {
                let columns = ttb_columns(text);
                let gaps = columns.len().saturating_sub(1) as f32 * LINE_SPACING;
                TextExtent {
                    width: columns.len() as f32 * font_size + gaps,
                    height: columns
                        .iter()
                        .map(|column| column.chars().count() as f32 * font_size)
                        .fold(0.0, f32::max),
                }
            }
        }
    }
}

/// Real glyph metrics read with ttf-parser.
#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    space_advance: u16,
    family: Option<String>,
}

impl fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    fn scale(&self, font_size: f32) -> f32 {
        font_size / self.units_per_em.max(1) as f32
    }
}

impl TextMeasurer for FontMetrics {
    fn line_width(&self, line: &str, font_size: f32) -> f32 {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return EstimatedMetrics.line_width(line, font_size);
        };
        let mut advance = 0u32;
        for ch in line.chars() {
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        advance as f32 * self.scale(font_size)
    }

    fn line_height(&self, font_size: f32) -> f32 {
        (self.ascender as i32 - self.descender as i32) as f32 * self.scale(font_size)
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

fn load_font_metrics_from_data(
    data: Vec<u8>,
    preferred_family: Option<&str>,
) -> Result<FontMetrics> {
    let data = Arc::new(data);
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    for index in 0..count {
        let Ok(face) = Face::parse(&data, index) else {
            continue;
        };
        let units_per_em = face.units_per_em().max(1);
        let metrics = FontMetrics {
            data: Arc::clone(&data),
            face_index: index,
            units_per_em,
            ascender: face.ascender(),
            descender: face.descender(),
            space_advance: face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2),
            family: extract_family_name(&face),
        };
        if let (Some(preferred), Some(found)) = (preferred_family, metrics.family())
            && found.eq_ignore_ascii_case(preferred)
        {
            return Ok(metrics);
        }
        if fallback.is_none() {
            fallback = Some(metrics);
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn load_font_metrics_from_family(db: &fontdb::Database, family: &str) -> Result<FontMetrics> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db.query(&query).ok_or_else(|| anyhow!("font not found: {}", family))?;
    let data = db
        .with_face_data(id, |data, _index| data.to_vec())
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    load_font_metrics_from_data(data, Some(family))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

/// Character-class estimate for when no font file is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatedMetrics;

impl EstimatedMetrics {
    fn char_units(ch: char) -> f32 {
        if ch.is_whitespace() {
            0.25
        } else if ch.is_ascii_alphanumeric() {
            0.55
        } else if ch.is_ascii() {
            0.35
        } else if is_cjk(ch) {
            1.0
        } else {
            0.9
        }
    }
}

impl TextMeasurer for EstimatedMetrics {
    fn line_width(&self, line: &str, font_size: f32) -> f32 {
        line.chars().map(Self::char_units).sum::<f32>() * font_size
    }

    fn line_height(&self, font_size: f32) -> f32 {
        font_size
    }
}

pub(crate) fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xAC00..=0xD7AF
    )
}

/// Fonts resolved once at startup, keyed by [`FontId`].
#[derive(Clone)]
pub struct FontBook {
    fonts: HashMap<FontId, Arc<dyn TextMeasurer>>,
    fallback: Arc<dyn TextMeasurer>,
}

impl Default for FontBook {
    fn default() -> Self {
        Self {
            fonts: HashMap::new(),
            fallback: Arc::new(EstimatedMetrics),
        }
    }
}

impl FontBook {
    /// Load every configured font. A path that fails to load falls back to a
    /// system font of the same family name, then to estimated metrics.
    pub fn load(paths: &BTreeMap<String, PathBuf>) -> Self {
        let mut book = Self::default();
        let mut db: Option<fontdb::Database> = None;
        for (id, path) in paths {
            match load_font_metrics(path) {
                Ok(metrics) => {
                    book.insert(FontId::new(id.as_str()), Arc::new(metrics));
                }
                Err(err) => {
                    let db = db.get_or_insert_with(|| {
                        let mut db = fontdb::Database::new();
                        db.load_system_fonts();
                        db
                    });
                    match load_font_metrics_from_family(db, id) {
                        Ok(metrics) => {
                            book.insert(FontId::new(id.as_str()), Arc::new(metrics));
                        }
                        Err(_) => warn!(
                            "font '{}' unavailable ({:#}); using estimated metrics",
                            id, err
                        ),
                    }
                }
            }
        }
        book
    }

    pub fn insert(&mut self, id: FontId, measurer: Arc<dyn TextMeasurer>) {
        self.fonts.insert(id, measurer);
    }

    pub fn measurer(&self, id: &FontId) -> Arc<dyn TextMeasurer> {
        self.fonts.get(id).cloned().unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_widths_follow_character_class() {
        let m = EstimatedMetrics;
        assert!((m.line_width("ab", 10.0) - 11.0).abs() < 1e-4);
        assert!((m.line_width("中文", 10.0) - 20.0).abs() < 1e-4);
    }

    #[test]
    fn horizontal_extent_uses_widest_line_and_spacing() {
        let extent = EstimatedMetrics.measure("ab\nabcd", 10.0, Direction::Ltr);
        assert!((extent.width - 22.0).abs() < 1e-4);
        assert!((extent.height - (2.0 * 10.0 + LINE_SPACING)).abs() < 1e-4);
    }

    #[test]
    fn vertical_extent_stacks_columns() {
        let extent = EstimatedMetrics.measure("中文字\n好", 12.0, Direction::Ttb);
        assert!((extent.width - (2.0 * 12.0 + LINE_SPACING)).abs() < 1e-4);
        assert!((extent.height - 36.0).abs() < 1e-4);
    }

    #[test]
    fn one_character_lines_measure_as_a_single_column() {
        let extent = EstimatedMetrics.measure("S\nO\nL\nD\nE", 10.0, Direction::Ttb);
        assert!((extent.width - 10.0).abs() < 1e-4);
        assert!((extent.height - 50.0).abs() < 1e-4);
    }

    #[test]
    fn missing_font_files_fall_back_to_estimates() {
        let mut paths = BTreeMap::new();
        paths.insert(
            "NoSuchFontFamilyAnywhere".to_string(),
            PathBuf::from("/nonexistent/font.ttf"),
        );
        let book = FontBook::load(&paths);
        let width = book
            .measurer(&FontId::new("NoSuchFontFamilyAnywhere"))
            .line_width("ab", 10.0);
        assert!((width - 11.0).abs() < 1e-4);
    }
}
