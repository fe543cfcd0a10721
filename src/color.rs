use image::{GrayImage, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::dilate;

use crate::cluster::kmeans;

pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const EDGE_GROWTH: u8 = 2;
const EDGE_CUTOFF: u8 = 50;
const GLYPH_CLUSTERS: usize = 3;

/// Area average of all pixels. `None` for an empty image.
pub fn average_color(image: &RgbImage) -> Option<Rgb<u8>> {
    let count = image.width() as u64 * image.height() as u64;
    if count == 0 {
        return None;
    }
    let mut sums = [0u64; 3];
    for pixel in image.pixels() {
        for (sum, channel) in sums.iter_mut().zip(pixel.0) {
            *sum += channel as u64;
        }
    }
    Some(Rgb(sums.map(|sum| ((sum + count / 2) / count) as u8)))
}

/// Rec. 709 relative luminance on the 0..=255 scale.
pub fn luminance(color: Rgb<u8>) -> f32 {
    luminance_scaled(color) as f32 / LUMA_SCALE as f32
}

const LUMA_SCALE: u32 = 10_000;

// integer weights keep the 128 boundary exact
fn luminance_scaled(color: Rgb<u8>) -> u32 {
    let [r, g, b] = color.0;
    2126 * r as u32 + 7152 * g as u32 + 722 * b as u32
}

/// Black text on light backgrounds, white otherwise. A luminance of exactly
/// 128 counts as dark.
pub fn text_color_for_background(background: &RgbImage) -> Rgb<u8> {
    match average_color(background) {
        Some(color) if luminance_scaled(color) > 128 * LUMA_SCALE => BLACK,
        Some(_) => WHITE,
        None => BLACK,
    }
}

/// Same decision for an erased patch, ignoring fully transparent pixels.
pub fn text_color_for_patch(patch: &RgbaImage) -> Rgb<u8> {
    let visible: Vec<Rgb<u8>> = patch
        .pixels()
        .filter(|p| p[3] > 0)
        .map(|&Rgba([r, g, b, _])| Rgb([r, g, b]))
        .collect();
    if visible.is_empty() {
        return BLACK;
    }
    let strip = RgbImage::from_fn(visible.len() as u32, 1, |x, _| visible[x as usize]);
    text_color_for_background(&strip)
}

/// Best guess at the glyph color of a text crop.
///
/// Pixels near Canny edges are clustered into three colors. The largest
/// cluster is usually background bleeding into the edge band, so the second
/// largest wins.
pub fn dominant_color(image: &RgbImage) -> Rgb<u8> {
    let gray = image::imageops::grayscale(image);
    let edges = edge_band(&gray);

    let points: Vec<[f32; 3]> = image
        .enumerate_pixels()
        .filter(|(x, y, _)| edges.get_pixel(*x, *y)[0] > EDGE_CUTOFF)
        .map(|(_, _, p)| p.0.map(|c| c as f32))
        .collect();

    let clusters = kmeans(&points, GLYPH_CLUSTERS);
    let pick = match clusters.as_slice() {
        [] => return average_color(image).unwrap_or(BLACK),
        [only] => only,
        [_, second, ..] => second,
    };
    Rgb(pick.center.map(|c| c.round().clamp(0.0, 255.0) as u8))
}

fn edge_band(gray: &GrayImage) -> GrayImage {
    let edges = canny(gray, CANNY_LOW, CANNY_HIGH);
    dilate(&edges, Norm::LInf, EDGE_GROWTH)
}

pub fn css_rgb(color: Rgb<u8>) -> String {
    let [r, g, b] = color.0;
    format!("rgb({}, {}, {})", r, g, b)
}
