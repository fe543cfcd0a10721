use image::{Rgb, RgbImage, RgbaImage};
use serde::Deserialize;

use crate::color;
use crate::layout::font::FontId;
use crate::layout::{Direction, vertical_content};
use crate::region::Quad;

/// How the replacement text is rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationRule {
    /// Follow the detected baseline.
    Measured,
    /// 90 degrees for vertical footprints, level otherwise.
    QuarterTurnWhenVertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionRule {
    /// `ttb` for vertical footprints and quarter turns, `rtl` otherwise.
    TtbWhenVertical,
    Fixed(Direction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRule {
    /// Vertical footprints get one character per line.
    StackWhenVertical,
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorRule {
    /// Black or white, whichever contrasts with the erased background.
    Contrast,
    /// Reuse the color of the source glyphs.
    SourceGlyph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EraseMode {
    /// Per-region masks, inpainted blob by blob.
    Regional,
    /// One inpaint over the whole image; it becomes the new base layer.
    WholeImage,
}

/// Everything that varies between language pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementPolicy {
    pub font: FontId,
    pub rotation: RotationRule,
    pub direction: DirectionRule,
    pub content: ContentRule,
    pub color: ColorRule,
    pub erase: EraseMode,
}

impl ReplacementPolicy {
    pub fn new(font: FontId) -> Self {
        Self {
            font,
            rotation: RotationRule::Measured,
            direction: DirectionRule::TtbWhenVertical,
            content: ContentRule::StackWhenVertical,
            color: ColorRule::Contrast,
            erase: EraseMode::Regional,
        }
    }

    pub fn with_rotation(mut self, rotation: RotationRule) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_direction(mut self, direction: DirectionRule) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_content(mut self, content: ContentRule) -> Self {
        self.content = content;
        self
    }

    pub fn with_color(mut self, color: ColorRule) -> Self {
        self.color = color;
        self
    }

    pub fn with_erase(mut self, erase: EraseMode) -> Self {
        self.erase = erase;
        self
    }

    /// Vertical-text override used for targets that keep horizontal glyphs:
    /// turn the line a quarter instead of stacking characters.
    pub fn quarter_turn(self) -> Self {
        self.with_rotation(RotationRule::QuarterTurnWhenVertical)
            .with_content(ContentRule::Keep)
    }

    pub fn angle(&self, quad: &Quad) -> f32 {
        match self.rotation {
            RotationRule::Measured => quad.angle_degrees(),
            RotationRule::QuarterTurnWhenVertical => {
                if quad.is_vertical() {
                    90.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn direction(&self, quad: &Quad, angle: f32) -> Direction {
        match self.direction {
            DirectionRule::TtbWhenVertical => {
                if quad.is_vertical() || angle == 90.0 {
                    Direction::Ttb
                } else {
                    Direction::Rtl
                }
            }
            DirectionRule::Fixed(direction) => direction,
        }
    }

    pub fn content(&self, quad: &Quad, to_text: &str) -> String {
        match self.content {
            ContentRule::StackWhenVertical if quad.is_vertical() => vertical_content(to_text),
            _ => to_text.to_string(),
        }
    }

    pub fn text_color(&self, source_crop: &RgbImage, erased: &RgbaImage) -> Rgb<u8> {
        match self.color {
            ColorRule::Contrast => color::text_color_for_patch(erased),
            ColorRule::SourceGlyph => color::dominant_color(source_crop),
        }
    }
}
