use anyhow::Result;
use image::{DynamicImage, RgbImage, imageops};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::color::css_rgb;
use crate::layout::font::FontBook;
use crate::layout::{FitParams, fit, place};
use crate::policy::{EraseMode, ReplacementPolicy};
use crate::providers::{ObjectStore, encode_png};
use crate::region::{Region, to_rgba};
use crate::scene::{GroupLayer, ImageLayer, Layer, Origin, Scene, TextExtra, TextLayer};

use super::stage::{Stage, guarded};

const BASE_FILL: &str = "#ffffff";

/// Turns erased regions into the layered scene: one locked base image, then
/// one translation group per region.
pub struct Composer<'a> {
    pub store: &'a dyn ObjectStore,
    pub policy: &'a ReplacementPolicy,
    pub fonts: &'a FontBook,
    pub fit: FitParams,
    pub canvas_background: &'a str,
    pub timeout: Duration,
}

/// What the bottom layer shows.
pub enum BaseImage<'a> {
    /// The untouched upload, optionally already stored under a URL.
    Original { image: &'a RgbImage, url: Option<String> },
    /// The whole-image inpaint result.
    Erased(&'a RgbImage),
}

impl Composer<'_> {
    pub async fn compose(
        &self,
        base: BaseImage<'_>,
        stem: &str,
        regions: &[Region],
    ) -> Result<Scene> {
        let (base_url, width, height, erased_base) = match base {
            BaseImage::Original { image, url } => {
                let url = match url {
                    Some(url) => url,
                    None => self.upload(image, format!("{stem}.png")).await?,
                };
                (url, image.width(), image.height(), None)
            }
            BaseImage::Erased(image) => {
                let url = self.upload(image, format!("{stem}_erased.png")).await?;
                (url, image.width(), image.height(), Some(image))
            }
        };

        let mut scene = Scene::new(width, height, self.canvas_background);
        scene.push(Layer::Image(
            ImageLayer::new("bg", 0, 0, width, height, base_url)
                .locked()
                .with_fill(BASE_FILL),
        ));

        for (index, region) in regions.iter().enumerate() {
            let patch_url = self
                .upload_rgba(region, format!("{stem}_bg{index}.png"))
                .await?;
            let mut patch = ImageLayer::at_rect(format!("bg{index}"), &region.box_rect, patch_url);
            patch.selectable = false;
            if self.policy.erase == EraseMode::WholeImage {
                patch = patch.hidden();
            }

            let text = self.text_layer(region, erased_base);
            scene.push(Layer::Group(GroupLayer::for_region(
                &region.box_rect,
                vec![Layer::Image(patch), Layer::Text(text)],
            )));
        }
        debug!(layers = scene.objects.len(), "scene composed");
        Ok(scene)
    }

    fn text_layer(&self, region: &Region, erased_base: Option<&RgbImage>) -> TextLayer {
        let quad = &region.ocr_box;
        let angle = self.policy.angle(quad);
        let direction = self.policy.direction(quad, angle);
        let content = self.policy.content(quad, &region.to_text);
        let measurer = self.fonts.measurer(&self.policy.font);
        let fitted = fit(
            &content,
            quad.rect_width(),
            quad.rect_height(),
            measurer.as_ref(),
            direction,
            &self.fit,
        );
        if fitted.overflow {
            warn!(
                text = %region.to_text,
                width = quad.rect_width(),
                height = quad.rect_height(),
                "translation does not fit its box even at the minimum size"
            );
        }
        let placement = place(quad, &fitted);

        let background = match erased_base {
            Some(erased) => to_rgba(
                &imageops::crop_imm(
                    erased,
                    region.box_rect.left,
                    region.box_rect.top,
                    region.box_rect.width(),
                    region.box_rect.height(),
                )
                .to_image(),
                255,
            ),
            None => region.erase_img.clone(),
        };
        let fill = css_rgb(self.policy.text_color(&region.box_img, &background));

        TextLayer {
            text: content,
            left: placement.x,
            top: placement.y,
            width: fitted.text_width.max(0) as u32,
            height: fitted.text_height.max(0) as u32,
            origin_x: Origin::Left,
            origin_y: Origin::Top,
            font_family: self.policy.font.as_str().to_string(),
            font_size: fitted.font_size,
            fill,
            angle,
            direction,
            placement,
            overflow: fitted.overflow,
            extra: TextExtra {
                from_lan: region.from_lan,
                to_lan: region.to_lan,
                from_text: region.text.clone(),
                to_text: region.to_text.clone(),
            },
        }
    }

    async fn upload(&self, image: &RgbImage, name: String) -> Result<String> {
        let bytes = encode_png(&DynamicImage::ImageRgb8(image.clone()))?;
        Ok(guarded(Stage::Composing, self.timeout, self.store.upload(bytes, name)).await?)
    }

    async fn upload_rgba(&self, region: &Region, name: String) -> Result<String> {
        let bytes = encode_png(&DynamicImage::ImageRgba8(region.erase_img.clone()))?;
        Ok(guarded(Stage::Composing, self.timeout, self.store.upload(bytes, name)).await?)
    }
}

/// Object-name stem for a task's uploads: the sanitized file stem of the
/// upload name, or the md5 of the pixels when there is none.
pub fn object_stem(name: Option<&str>, image: &RgbImage) -> String {
    let from_name: String = name
        .and_then(|name| Path::new(name).file_stem())
        .map(|stem| {
            stem.to_string_lossy()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect()
        })
        .unwrap_or_default();
    if from_name.is_empty() {
        format!("{:x}", md5::compute(image.as_raw()))
    } else {
        from_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn stems_come_from_names_or_pixels() {
        let image = RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]));
        assert_eq!(object_stem(Some("uploads/banner 01.jpg"), &image), "banner01");
        let hashed = object_stem(None, &image);
        assert_eq!(hashed.len(), 32);
        assert_eq!(object_stem(Some("../"), &image), hashed);
    }
}
