use std::collections::HashMap;

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::region::BoxRect;

/// Overlay region masks onto a blank canvas. Each pixel keeps the maximum
/// of what is already there and what the region contributes.
pub fn compose<'a>(
    width: u32,
    height: u32,
    masks: impl IntoIterator<Item = (&'a BoxRect, &'a GrayImage)>,
) -> GrayImage {
    let mut canvas = GrayImage::new(width, height);
    for (rect, mask) in masks {
        for (x, y, value) in mask.enumerate_pixels() {
            let cx = rect.left + x;
            let cy = rect.top + y;
            if cx >= width || cy >= height {
                continue;
            }
            let current = canvas.get_pixel_mut(cx, cy);
            if value[0] > current[0] {
                *current = *value;
            }
        }
    }
    canvas
}

/// Binarize at `> 128` and grow by `radius` pixels under the city-block
/// norm, the same diamond `radius` passes of a 3x3 cross produce. Output is
/// strictly 0/255.
pub fn dilate(mask: &GrayImage, radius: u8) -> GrayImage {
    let binary = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get_pixel(x, y)[0] > 128 { Luma([255]) } else { Luma([0]) }
    });
    if radius == 0 {
        return binary;
    }
    morphology::dilate(&binary, Norm::L1, radius)
}

/// Split a mask into its outer connected components, holes filled, one
/// full-size mask per component in scan order of their first pixel.
pub fn split(mask: &GrayImage) -> Vec<GrayImage> {
    let (width, height) = mask.dimensions();
    let filled = fill_holes(mask);
    let labels = connected_components(&filled, Connectivity::Eight, Luma([0u8]));

    let mut slots: HashMap<u32, usize> = HashMap::new();
    let mut components: Vec<GrayImage> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        let slot = *slots.entry(label).or_insert_with(|| {
            components.push(GrayImage::new(width, height));
            components.len() - 1
        });
        components[slot].put_pixel(x, y, Luma([255]));
    }
    components
}

/// Any zero pixel that cannot reach the border through 4-connected zeros
/// belongs to a hole.
fn fill_holes(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let framed = GrayImage::from_fn(width + 2, height + 2, |x, y| {
        let inside = x >= 1 && y >= 1 && x <= width && y <= height;
        if inside && mask.get_pixel(x - 1, y - 1)[0] >= 1 {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    // label the zero pixels: foreground value is the background here
    let gaps = connected_components(&framed, Connectivity::Four, Luma([255u8]));
    let outside = gaps.get_pixel(0, 0)[0];

    GrayImage::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y)[0] >= 1 || gaps.get_pixel(x + 1, y + 1)[0] != outside {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Tight bounds of the non-zero pixels.
pub fn bounding_rect(mask: &GrayImage) -> Option<BoxRect> {
    let mut bounds: Option<BoxRect> = None;
    for (x, y, value) in mask.enumerate_pixels() {
        if value[0] == 0 {
            continue;
        }
        let rect = bounds.get_or_insert(BoxRect {
            left: x,
            top: y,
            right: x + 1,
            bottom: y + 1,
        });
        rect.left = rect.left.min(x);
        rect.top = rect.top.min(y);
        rect.right = rect.right.max(x + 1);
        rect.bottom = rect.bottom.max(y + 1);
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(canvas: &mut GrayImage, x0: u32, y0: u32, size: u32, value: u8) {
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                canvas.put_pixel(x, y, Luma([value]));
            }
        }
    }

    #[test]
    fn compose_keeps_the_maximum() {
        let rect_a = BoxRect { left: 0, top: 0, right: 4, bottom: 4 };
        let rect_b = BoxRect { left: 2, top: 2, right: 6, bottom: 6 };
        let a = GrayImage::from_pixel(4, 4, Luma([200]));
        let b = GrayImage::from_pixel(4, 4, Luma([0]));
        let canvas = compose(8, 8, [(&rect_a, &a), (&rect_b, &b)]);
        assert_eq!(canvas.get_pixel(3, 3)[0], 200);
        assert_eq!(canvas.get_pixel(5, 5)[0], 0);
        assert_eq!(canvas.get_pixel(0, 0)[0], 200);
    }

    #[test]
    fn dilate_grows_a_diamond_of_the_radius() {
        let mut mask = GrayImage::new(11, 11);
        mask.put_pixel(5, 5, Luma([255]));
        mask.put_pixel(0, 0, Luma([100]));
        let grown = dilate(&mask, 2);
        assert_eq!(grown.pixels().filter(|p| p[0] == 255).count(), 13);
        assert_eq!(grown.get_pixel(3, 5)[0], 255);
        assert_eq!(grown.get_pixel(5, 7)[0], 255);
        assert_eq!(grown.get_pixel(4, 4)[0], 255);
        assert_eq!(grown.get_pixel(3, 3)[0], 0);
        assert_eq!(grown.get_pixel(2, 5)[0], 0);
        assert_eq!(grown.get_pixel(0, 0)[0], 0);
        assert!(grown.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn split_separates_islands_in_scan_order() {
        let mut mask = GrayImage::new(20, 10);
        square(&mut mask, 12, 1, 3, 255);
        square(&mut mask, 2, 4, 3, 255);
        let parts = split(&mask);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].get_pixel(13, 2)[0], 255);
        assert_eq!(parts[0].get_pixel(3, 5)[0], 0);
        assert_eq!(parts[1].get_pixel(3, 5)[0], 255);
    }

    #[test]
    fn split_fills_ring_holes_and_absorbs_nested_islands() {
        let mut mask = GrayImage::new(12, 12);
        square(&mut mask, 1, 1, 9, 255);
        square(&mut mask, 2, 2, 7, 0);
        mask.put_pixel(5, 5, Luma([255]));
        let parts = split(&mask);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].get_pixel(3, 3)[0], 255);
        assert_eq!(parts[0].get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn diagonal_touch_is_one_component() {
        let mut mask = GrayImage::new(6, 6);
        mask.put_pixel(1, 1, Luma([255]));
        mask.put_pixel(2, 2, Luma([255]));
        assert_eq!(split(&mask).len(), 1);
    }

    #[test]
    fn bounding_rect_is_exclusive() {
        let mut mask = GrayImage::new(10, 10);
        square(&mut mask, 3, 4, 2, 255);
        assert_eq!(bounding_rect(&mask), Some(BoxRect { left: 3, top: 4, right: 5, bottom: 6 }));
        assert_eq!(bounding_rect(&GrayImage::new(3, 3)), None);
    }
}
