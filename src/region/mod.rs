pub mod classify;
pub mod refine;

use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point as PolyPoint;
use serde::{Deserialize, Serialize};

use crate::languages::Language;
use classify::{ClassifyParams, classify};
use refine::{Binarized, RefineParams, kmeans_threshold, refine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Four corners in clockwise order starting at the top-left of the text
/// baseline: TL, TR, BR, BL. Edge 0→1 is the baseline direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    pub fn new(points: [(i32, i32); 4]) -> Self {
        Self(points.map(|(x, y)| Point::new(x, y)))
    }

    /// Detector output usually carries float coordinates; truncate like an
    /// integer cast would.
    pub fn from_f32(points: [[f32; 2]; 4]) -> Self {
        Self(points.map(|[x, y]| Point::new(x as i32, y as i32)))
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }

    pub fn rect_width(&self) -> i32 {
        let [p0, p1, p2, p3] = self.0;
        (p1.x - p0.x).abs().max((p2.x - p3.x).abs())
    }

    pub fn rect_height(&self) -> i32 {
        let [p0, p1, p2, p3] = self.0;
        (p2.y - p1.y).abs().max((p3.y - p0.y).abs())
    }

    /// Baseline angle in degrees, `atan2(dy, dx)` of p0→p1.
    pub fn angle_degrees(&self) -> f32 {
        let [p0, p1, _, _] = self.0;
        ((p1.y - p0.y) as f64).atan2((p1.x - p0.x) as f64).to_degrees() as f32
    }

    pub fn is_vertical(&self) -> bool {
        self.rect_width() < self.rect_height()
    }

    /// Twice the signed area. Positive means clockwise on screen (y down).
    fn signed_area2(&self) -> i64 {
        let pts = &self.0;
        (0..4)
            .map(|i| {
                let a = pts[i];
                let b = pts[(i + 1) % 4];
                a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
            })
            .sum()
    }

    pub fn is_clockwise(&self) -> bool {
        self.signed_area2() > 0
    }

    /// Zero-area quads, or quads whose refined edges crossed each other.
    pub fn is_degenerate(&self) -> bool {
        self.rect_width() == 0 || self.rect_height() == 0 || !self.is_clockwise()
    }

    /// `(min_x, min_y, max_x, max_y)`
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        let xs = self.0.iter().map(|p| p.x);
        let ys = self.0.iter().map(|p| p.y);
        (
            xs.clone().min().unwrap_or(0),
            ys.clone().min().unwrap_or(0),
            xs.max().unwrap_or(0),
            ys.max().unwrap_or(0),
        )
    }

    pub fn clamp(&self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1) as i32;
        let max_y = height.saturating_sub(1) as i32;
        Self(self.0.map(|p| Point::new(p.x.clamp(0, max_x), p.y.clamp(0, max_y))))
    }
}

/// Axis-aligned crop rectangle, right/bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoxRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BoxRect {
    /// Quad bounds grown by `padding` and clamped to the image.
    pub fn from_quad(quad: &Quad, padding: u32, width: u32, height: u32) -> Self {
        let (min_x, min_y, max_x, max_y) = quad.bounds();
        let pad = padding as i32;
        let left = (min_x - pad).max(0) as u32;
        let top = (min_y - pad).max(0) as u32;
        let right = ((max_x + pad).max(0) as u32).min(width);
        let bottom = ((max_y + pad).max(0) as u32).min(height);
        Self {
            left,
            top,
            right: right.max(left),
            bottom: bottom.max(top),
        }
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left as i32
            && point.y >= self.top as i32
            && point.x <= self.right as i32
            && point.y <= self.bottom as i32
    }

    pub fn pad(&self, padding: u32, width: u32, height: u32) -> Self {
        Self {
            left: self.left.saturating_sub(padding),
            top: self.top.saturating_sub(padding),
            right: (self.right + padding).min(width),
            bottom: (self.bottom + padding).min(height),
        }
    }
}

/// The decoded bitmap a task works on, plus its grayscale copy used for
/// thresholding.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub image: RgbImage,
    pub gray: GrayImage,
}

impl SourceImage {
    pub fn new(image: RgbImage) -> Self {
        let gray = image::imageops::grayscale(&image);
        Self { image, gray }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// One detected line of text moving through the pipeline.
#[derive(Debug, Clone)]
pub struct Region {
    pub from_lan: Language,
    pub to_lan: Language,
    pub ocr_box: Quad,
    pub confidence: f32,
    pub text: String,
    pub to_text: String,
    pub box_rect: BoxRect,
    pub box_img: RgbImage,
    pub box_solid: bool,
    pub text_mask: GrayImage,
    pub erase_img: RgbaImage,
}

impl Region {
    pub fn new(
        from_lan: Language,
        to_lan: Language,
        ocr_box: Quad,
        text: String,
        confidence: f32,
    ) -> Self {
        Self {
            from_lan,
            to_lan,
            ocr_box,
            confidence,
            text,
            to_text: String::new(),
            box_rect: BoxRect {
                left: 0,
                top: 0,
                right: 0,
                bottom: 0,
            },
            box_img: RgbImage::new(0, 0),
            box_solid: false,
            text_mask: GrayImage::new(0, 0),
            erase_img: RgbaImage::new(0, 0),
        }
    }

    pub fn rect_width(&self) -> i32 {
        self.ocr_box.rect_width()
    }

    pub fn rect_height(&self) -> i32 {
        self.ocr_box.rect_height()
    }

    /// Snap the quad to the pixels, crop it and classify its background.
    ///
    /// Solid backgrounds get their flat fill as `erase_img` right away; the
    /// rest are left for the mask compositor.
    pub fn prepare(
        &mut self,
        source: &SourceImage,
        padding: u32,
        refine_params: &RefineParams,
        classify_params: &ClassifyParams,
    ) {
        let unpadded = BoxRect::from_quad(&self.ocr_box, 0, source.width(), source.height());
        let threshold = if unpadded.is_empty() {
            u8::MAX / 2
        } else {
            let crop = image::imageops::crop_imm(
                &source.gray,
                unpadded.left,
                unpadded.top,
                unpadded.width(),
                unpadded.height(),
            )
            .to_image();
            kmeans_threshold(&crop)
        };

        let binary = Binarized::new(&source.gray, threshold);
        let refined = refine(&binary, &self.ocr_box, refine_params);
        if refined.is_degenerate() {
            tracing::debug!(
                text = %self.text,
                "refinement collapsed the quad; keeping detector box"
            );
        } else {
            self.ocr_box = refined;
        }

        let (box_img, text_mask, box_rect) = crop_with_mask(&source.image, &self.ocr_box, padding);
        self.box_img = box_img;
        self.text_mask = text_mask;
        self.box_rect = box_rect;

        let classification = classify(&self.box_img, classify_params);
        self.box_solid = classification.is_solid;
        if classification.is_solid {
            self.erase_img = to_rgba(&classification.image, 255);
        }
    }
}

/// Crop `quad` grown by `padding`, together with an L8 mask of the quad
/// polygon in crop coordinates.
pub fn crop_with_mask(
    image: &RgbImage,
    quad: &Quad,
    padding: u32,
) -> (RgbImage, GrayImage, BoxRect) {
    let rect = BoxRect::from_quad(quad, padding, image.width(), image.height());
    let crop = image::imageops::crop_imm(image, rect.left, rect.top, rect.width(), rect.height())
        .to_image();

    let mut mask = GrayImage::new(rect.width(), rect.height());
    let mut poly: Vec<PolyPoint<i32>> = quad
        .points()
        .iter()
        .map(|p| PolyPoint::new(p.x - rect.left as i32, p.y - rect.top as i32))
        .collect();
    poly.dedup();
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    if poly.len() >= 3 && !rect.is_empty() {
        draw_polygon_mut(&mut mask, &poly, Luma([255u8]));
    }
    (crop, mask, rect)
}

pub fn to_rgba(image: &RgbImage, alpha: u8) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        Rgba([r, g, b, alpha])
    })
}
