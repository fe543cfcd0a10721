use image::GrayImage;
use imageproc::drawing::BresenhamLineIter;
use serde::Deserialize;

use super::{Point, Quad};
use crate::cluster::kmeans;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RefineParams {
    /// Most outward steps an edge may take.
    pub max_expansion: u32,
    /// Inward push applied before walking outward.
    pub min_expansion: u32,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            max_expansion: 12,
            min_expansion: 4,
        }
    }
}

/// Grayscale image viewed through a threshold: `> threshold` is foreground.
pub struct Binarized<'a> {
    gray: &'a GrayImage,
    threshold: u8,
}

impl<'a> Binarized<'a> {
    pub fn new(gray: &'a GrayImage, threshold: u8) -> Self {
        Self { gray, threshold }
    }

    fn contains(&self, p: Point) -> bool {
        p.x >= 0
            && p.y >= 0
            && (p.x as u32) < self.gray.width()
            && (p.y as u32) < self.gray.height()
    }

    fn value(&self, x: i32, y: i32) -> Option<bool> {
        if !self.contains(Point::new(x, y)) {
            return None;
        }
        Some(self.gray.get_pixel(x as u32, y as u32)[0] > self.threshold)
    }

    /// True when every in-bounds pixel on the segment has the same value.
    fn is_uniform_line(&self, start: Point, end: Point) -> bool {
        let mut seen: Option<bool> = None;
        let line = BresenhamLineIter::new(
            (start.x as f32, start.y as f32),
            (end.x as f32, end.y as f32),
        );
        for (x, y) in line {
            let Some(value) = self.value(x, y) else {
                continue;
            };
            match seen {
                None => seen = Some(value),
                Some(prev) if prev != value => return false,
                Some(_) => {}
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

impl Edge {
    /// One outward step.
    fn outward(self) -> (i32, i32) {
        match self {
            Edge::Top => (0, -1),
            Edge::Right => (1, 0),
            Edge::Bottom => (0, 1),
            Edge::Left => (-1, 0),
        }
    }
}

fn shift(p: Point, (dx, dy): (i32, i32), steps: i32) -> Point {
    Point::new(p.x + dx * steps, p.y + dy * steps)
}

/// Walk one edge outward until it rests on a uniform run of pixels.
fn expand_edge(
    binary: &Binarized<'_>,
    start: Point,
    end: Point,
    edge: Edge,
    params: &RefineParams,
) -> (Point, Point) {
    let out = edge.outward();
    let inward = -(params.min_expansion as i32);
    let mut start = shift(start, out, inward);
    let mut end = shift(end, out, inward);
    let mut result = (start, end);

    for _ in 0..params.max_expansion {
        if binary.is_uniform_line(start, end) {
            break;
        }
        start = shift(start, out, 1);
        end = shift(end, out, 1);
        if !binary.contains(start) || !binary.contains(end) {
            break;
        }
        result = (start, end);
    }
    result
}

/// Snap `quad` to the background boundary around the glyphs.
///
/// Edges are processed top, right, bottom, left; each one starts from the
/// corners the previous edge produced, so the order matters.
pub fn refine(binary: &Binarized<'_>, quad: &Quad, params: &RefineParams) -> Quad {
    let [mut tl, mut tr, mut br, mut bl] = quad.0;
    (tl, tr) = expand_edge(binary, tl, tr, Edge::Top, params);
    (tr, br) = expand_edge(binary, tr, br, Edge::Right, params);
    (br, bl) = expand_edge(binary, br, bl, Edge::Bottom, params);
    (bl, tl) = expand_edge(binary, bl, tl, Edge::Left, params);
    Quad([tl, tr, br, bl])
}

/// Midpoint of the two gray-level centers, integer-truncated.
pub fn kmeans_threshold(gray: &GrayImage) -> u8 {
    let points: Vec<[f32; 1]> = gray.pixels().map(|p| [p[0] as f32]).collect();
    let clusters = kmeans(&points, 2);
    match clusters.as_slice() {
        [] => u8::MAX / 2,
        [only] => only.center[0] as u8,
        [a, b, ..] => ((a.center[0] + b.center[0]) / 2.0) as u8,
    }
}
