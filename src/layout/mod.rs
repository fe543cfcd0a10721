pub mod font;

use serde::{Deserialize, Serialize};

use crate::region::{Point, Quad};
use font::TextMeasurer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
    Ttb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FitParams {
    pub min_size: u32,
    pub max_size: u32,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            min_size: 8,
            max_size: 100,
        }
    }
}

/// Chosen size and the measured extent of the text at that size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit {
    pub font_size: u32,
    pub text_width: i32,
    pub text_height: i32,
    /// Set when even the minimum size spills outside the box.
    pub overflow: bool,
}

/// Largest font size in `min_size..=max_size` whose extent fits inside
/// `rect_width` x `rect_height`.
pub fn fit(
    text: &str,
    rect_width: i32,
    rect_height: i32,
    measurer: &dyn TextMeasurer,
    direction: Direction,
    params: &FitParams,
) -> Fit {
    let fits = |size: u32| {
        let extent = measurer.measure(text, size as f32, direction);
        extent.width <= rect_width as f32 && extent.height <= rect_height as f32
    };

    let min_size = params.min_size.max(1);
    let max_size = params.max_size.max(min_size);
    if !fits(min_size) {
        return measured(text, min_size, measurer, direction, true);
    }

    let mut size = min_size;
    while size < max_size && fits(size + 1) {
        size += 1;
    }
    measured(text, size, measurer, direction, false)
}

fn measured(
    text: &str,
    size: u32,
    measurer: &dyn TextMeasurer,
    direction: Direction,
    overflow: bool,
) -> Fit {
    let extent = measurer.measure(text, size as f32, direction);
    Fit {
        font_size: size,
        text_width: extent.width.round() as i32,
        text_height: extent.height.round() as i32,
        overflow,
    }
}

/// Top-left of the text box when centered on the quad's footprint.
pub fn place(quad: &Quad, fit: &Fit) -> Point {
    let origin = quad.points()[0];
    Point::new(
        origin.x - (fit.text_width - quad.rect_width()).div_euclid(2),
        origin.y - (fit.text_height - quad.rect_height()).div_euclid(2),
    )
}

/// Columns of top-to-bottom text, first column rightmost. Text already
/// stacked one character per line reads as a single column.
pub fn ttb_columns(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() > 1 && lines.iter().all(|line| line.chars().count() <= 1) {
        return vec![lines.concat()];
    }
    lines.into_iter().map(str::to_string).collect()
}

/// One character per line, existing line breaks dropped.
pub fn vertical_content(text: &str) -> String {
    let chars: Vec<String> = text
        .chars()
        .filter(|ch| *ch != '\n' && *ch != '\r')
        .map(String::from)
        .collect();
    chars.join("\n")
}

#[cfg(test)]
mod tests {
    use super::font::EstimatedMetrics;
    use super::*;

    #[test]
    fn picks_the_largest_size_that_fits() {
        // two CJK cells: 2 em wide, 1 em tall
        let fit = fit("中文", 100, 60, &EstimatedMetrics, Direction::Rtl, &FitParams::default());
        assert_eq!(fit.font_size, 50);
        assert_eq!(fit.text_width, 100);
        assert_eq!(fit.text_height, 50);
        assert!(!fit.overflow);
    }

    #[test]
    fn size_is_capped_at_the_maximum() {
        let fit = fit("a", 1000, 1000, &EstimatedMetrics, Direction::Ltr, &FitParams::default());
        assert_eq!(fit.font_size, 100);
    }

    #[test]
    fn unfittable_text_is_flagged_at_the_minimum() {
        let fit = fit(
            "a very long sentence",
            20,
            5,
            &EstimatedMetrics,
            Direction::Ltr,
            &FitParams::default(),
        );
        assert_eq!(fit.font_size, 8);
        assert!(fit.overflow);
    }

    #[test]
    fn result_never_exceeds_the_box_unless_flagged() {
        for (w, h) in [(30, 12), (200, 40), (64, 64), (9, 200)] {
            let fit = fit("SOLDE", w, h, &EstimatedMetrics, Direction::Rtl, &FitParams::default());
            if !fit.overflow {
                assert!(fit.text_width <= w && fit.text_height <= h, "{w}x{h}: {fit:?}");
            }
        }
    }

    #[test]
    fn placement_centers_with_floor_division() {
        let quad = Quad::new([(10, 20), (110, 20), (110, 60), (10, 60)]);
        let fit = Fit {
            font_size: 30,
            text_width: 81,
            text_height: 30,
            overflow: false,
        };
        assert_eq!(place(&quad, &fit), Point::new(20, 25));

        let wide = Fit {
            text_width: 103,
            ..fit
        };
        // (103 - 100) / 2 floors to 1
        assert_eq!(place(&quad, &wide), Point::new(9, 25));
    }

    #[test]
    fn stacked_characters_form_one_column() {
        assert_eq!(ttb_columns("S\nO\nL\nD\nE"), vec!["SOLDE".to_string()]);
        assert_eq!(ttb_columns("特价\n商品"), vec!["特价".to_string(), "商品".to_string()]);
        assert_eq!(ttb_columns("A"), vec!["A".to_string()]);
    }

    #[test]
    fn stacked_text_fits_a_narrow_column() {
        let stacked = vertical_content("SOLDE");
        let fit = fit(&stacked, 22, 132, &EstimatedMetrics, Direction::Ttb, &FitParams::default());
        assert!(!fit.overflow);
        assert_eq!(fit.font_size, 22);
        assert_eq!((fit.text_width, fit.text_height), (22, 110));
    }

    #[test]
    fn vertical_content_stacks_characters() {
        assert_eq!(vertical_content("特价\n商品"), "特\n价\n商\n品");
        assert_eq!(vertical_content(""), "");
    }
}
