pub mod mask;

use std::time::Duration;

use anyhow::Result;
use image::imageops::{self, FilterType};
use image::{GrayImage, Rgba, RgbImage, RgbaImage};
use serde::Deserialize;
use tracing::debug;

use crate::pipeline::{Stage, guarded};
use crate::providers::Inpainter;
use crate::region::{BoxRect, Region, SourceImage, to_rgba};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EraseParams {
    /// Growth applied to the composed mask before splitting it.
    pub stage_one_radius: u8,
    /// Extra growth for the final full-canvas smoothing pass.
    pub stage_two_radius: u8,
    /// Margin added around each component before it is cropped.
    pub component_padding: u32,
}

impl Default for EraseParams {
    fn default() -> Self {
        Self {
            stage_one_radius: 2,
            stage_two_radius: 4,
            component_padding: 1,
        }
    }
}

/// Borrowed collaborator plus the knobs every erase call needs.
pub struct Eraser<'a> {
    pub inpainter: &'a dyn Inpainter,
    pub params: EraseParams,
    pub timeout: Duration,
}

impl Eraser<'_> {
    async fn inpaint(&self, image: RgbImage, mask: GrayImage) -> Result<RgbImage> {
        let (width, height) = image.dimensions();
        let result = guarded(
            Stage::Erasing,
            self.timeout,
            self.inpainter.inpaint(image, vec![mask]),
        )
        .await?;
        Ok(match_size(result, width, height))
    }

    /// Erase every non-solid region in two passes: each connected blob of
    /// the merged mask on its own, then one wider pass over the whole canvas
    /// to smooth the seams. Returns the erased canvas, or `None` when every
    /// region already had a flat fill.
    pub async fn erase_regions(
        &self,
        source: &SourceImage,
        regions: &mut [Region],
    ) -> Result<Option<RgbImage>> {
        let pending: Vec<usize> = (0..regions.len()).filter(|&i| !regions[i].box_solid).collect();
        if pending.is_empty() {
            debug!("all regions sit on flat colors; skipping inpaint");
            return Ok(None);
        }

        let (width, height) = (source.width(), source.height());
        let composed = mask::compose(
            width,
            height,
            pending.iter().map(|&i| (&regions[i].box_rect, &regions[i].text_mask)),
        );
        let tight = mask::dilate(&composed, self.params.stage_one_radius);
        let components = mask::split(&tight);
        debug!(regions = pending.len(), components = components.len(), "erasing mask components");

        let mut canvas = source.image.clone();
        for component in &components {
            let Some(bounds) = mask::bounding_rect(component) else {
                continue;
            };
            let rect = bounds.pad(self.params.component_padding, width, height);
            let crop = crop_rgb(&source.image, &rect);
            let crop_mask =
                imageops::crop_imm(component, rect.left, rect.top, rect.width(), rect.height())
                    .to_image();
            let patch = self.inpaint(crop, crop_mask).await?;
            imageops::replace(&mut canvas, &patch, rect.left as i64, rect.top as i64);
        }

        let wide = mask::dilate(&tight, self.params.stage_two_radius);
        let smoothed = self.inpaint(canvas, wide.clone()).await?;

        for &i in &pending {
            regions[i].erase_img = masked_crop(&smoothed, &wide, &regions[i].box_rect);
        }
        Ok(Some(smoothed))
    }

    /// Erase all text in a single call and use the result as the new base
    /// image. Region patches become opaque crops of the original so an
    /// editor can still toggle them back on.
    pub async fn erase_whole_image(
        &self,
        source: &SourceImage,
        regions: &mut [Region],
    ) -> Result<RgbImage> {
        let composed = mask::compose(
            source.width(),
            source.height(),
            regions.iter().map(|r| (&r.box_rect, &r.text_mask)),
        );
        let wide = mask::dilate(&composed, self.params.stage_two_radius);
        let erased = self.inpaint(source.image.clone(), wide).await?;

        for region in regions.iter_mut() {
            region.erase_img = to_rgba(&crop_rgb(&source.image, &region.box_rect), 255);
        }
        Ok(erased)
    }
}

fn crop_rgb(image: &RgbImage, rect: &BoxRect) -> RgbImage {
    imageops::crop_imm(image, rect.left, rect.top, rect.width(), rect.height()).to_image()
}

/// Crop of the erased canvas whose alpha is the erase mask, so only the
/// pixels that were actually repainted cover the original.
fn masked_crop(image: &RgbImage, mask: &GrayImage, rect: &BoxRect) -> RgbaImage {
    RgbaImage::from_fn(rect.width(), rect.height(), |x, y| {
        let [r, g, b] = image.get_pixel(rect.left + x, rect.top + y).0;
        let alpha = mask.get_pixel(rect.left + x, rect.top + y)[0];
        Rgba([r, g, b, alpha])
    })
}

fn match_size(image: RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        image
    } else {
        debug!(
            got_width = image.width(),
            got_height = image.height(),
            width,
            height,
            "inpainter changed the image size; resizing"
        );
        imageops::resize(&image, width, height, FilterType::Triangle)
    }
}
