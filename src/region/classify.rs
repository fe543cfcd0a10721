use image::{Rgb, RgbImage};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ClassifyParams {
    /// Thickness of the sampled border ring in pixels.
    pub border: u32,
    /// Euclidean RGB distance under which a pixel joins a cluster.
    pub color_tolerance: f32,
    /// Share of the ring the largest cluster needs for a solid verdict.
    pub ratio: f32,
}

impl Default for ClassifyParams {
    fn default() -> Self {
        Self {
            border: 1,
            color_tolerance: 10.0,
            ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub is_solid: bool,
    /// Flat fill when solid, otherwise the input crop.
    pub image: RgbImage,
    pub color: Option<Rgb<u8>>,
}

/// Pixels of the outer ring: top rows, bottom rows, then the left and right
/// columns between them.
fn border_ring(crop: &RgbImage, border: u32) -> Vec<Rgb<u8>> {
    let (w, h) = crop.dimensions();
    let b = border.min(h);
    let mut pixels = Vec::new();
    for y in 0..b {
        pixels.extend((0..w).map(|x| *crop.get_pixel(x, y)));
    }
    for y in h.saturating_sub(b).max(b)..h {
        pixels.extend((0..w).map(|x| *crop.get_pixel(x, y)));
    }
    let side = border.min(w);
    for y in b..h.saturating_sub(b) {
        pixels.extend((0..side).map(|x| *crop.get_pixel(x, y)));
        pixels.extend((w.saturating_sub(side).max(side)..w).map(|x| *crop.get_pixel(x, y)));
    }
    pixels
}

fn distance(a: &Rgb<u8>, b: &Rgb<u8>) -> f32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(&x, &y)| (x as f32 - y as f32).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Decide whether the crop sits on a flat color.
///
/// Clusters are keyed by the first pixel that opened them, so the verdict
/// depends on ring order; that keeps the result reproducible for a given crop.
pub fn classify(crop: &RgbImage, params: &ClassifyParams) -> Classification {
    let ring = border_ring(crop, params.border);
    if ring.is_empty() {
        return Classification {
            is_solid: false,
            image: crop.clone(),
            color: None,
        };
    }

    let mut clusters: Vec<(Rgb<u8>, usize)> = Vec::new();
    for pixel in &ring {
        match clusters
            .iter_mut()
            .find(|(seed, _)| distance(seed, pixel) <= params.color_tolerance)
        {
            Some((_, count)) => *count += 1,
            None => clusters.push((*pixel, 1)),
        }
    }

    let mut largest = clusters[0];
    for cluster in &clusters[1..] {
        if cluster.1 > largest.1 {
            largest = *cluster;
        }
    }

    let share = largest.1 as f32 / ring.len() as f32;
    if share >= params.ratio {
        let (w, h) = crop.dimensions();
        Classification {
            is_solid: true,
            image: RgbImage::from_pixel(w, h, largest.0),
            color: Some(largest.0),
        }
    } else {
        Classification {
            is_solid: false,
            image: crop.clone(),
            color: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_counts_every_border_pixel_once() {
        let crop = RgbImage::new(5, 4);
        assert_eq!(border_ring(&crop, 1).len(), 5 + 5 + 2 + 2);
        assert_eq!(border_ring(&RgbImage::new(1, 1), 1).len(), 1);
    }

    #[test]
    fn near_uniform_border_is_solid() {
        let mut crop = RgbImage::from_pixel(20, 10, Rgb([200, 30, 30]));
        crop.put_pixel(0, 0, Rgb([204, 33, 28]));
        crop.put_pixel(10, 5, Rgb([0, 0, 0]));
        let result = classify(&crop, &ClassifyParams::default());
        assert!(result.is_solid);
        assert_eq!(result.color, Some(Rgb([204, 33, 28])));
        assert!(result.image.pixels().all(|p| *p == Rgb([204, 33, 28])));
    }

    #[test]
    fn striped_border_is_not_solid() {
        let crop = RgbImage::from_fn(20, 10, |x, _| {
            if x % 2 == 0 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
        });
        assert!(!classify(&crop, &ClassifyParams::default()).is_solid);
    }

    #[test]
    fn reclassifying_a_fill_keeps_its_color() {
        let crop = RgbImage::from_fn(16, 16, |x, y| {
            if x == y { Rgb([0, 0, 0]) } else { Rgb([90, 90, 90]) }
        });
        let first = classify(&crop, &ClassifyParams::default());
        assert!(first.is_solid);
        let second = classify(&first.image, &ClassifyParams::default());
        assert!(second.is_solid);
        assert_eq!(second.color, first.color);
    }

    #[test]
    fn empty_crop_is_never_solid() {
        let result = classify(&RgbImage::new(0, 0), &ClassifyParams::default());
        assert!(!result.is_solid);
        assert!(result.color.is_none());
    }
}
