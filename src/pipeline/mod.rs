pub mod compose;
pub mod filter;
mod stage;
pub mod translate;

pub use stage::{Stage, guarded};

use anyhow::Result;
use image::RgbImage;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::erase::Eraser;
use crate::error::PicTransError;
use crate::languages::Language;
use crate::policy::EraseMode;
use crate::region::{Region, SourceImage};
use crate::registry::Registry;
use crate::scene::Scene;
use crate::settings::Settings;
use compose::{BaseImage, Composer, object_stem};
use translate::translate_batch;

/// One picture to translate.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub from: Language,
    pub to: Language,
    pub image: RgbImage,
    /// Original file name; names the uploaded layers.
    pub name: Option<String>,
    /// Where the untouched image is already stored, if anywhere.
    pub image_url: Option<String>,
}

/// Drives a task through every [`Stage`] in order. Holds nothing
/// task-specific, so one orchestrator serves every request.
pub struct Orchestrator<'a> {
    registry: &'a Registry,
    settings: &'a Settings,
}

impl<'a> Orchestrator<'a> {
    pub fn new(registry: &'a Registry, settings: &'a Settings) -> Self {
        Self { registry, settings }
    }

    pub async fn run(&self, request: TaskRequest) -> Result<Scene> {
        let TaskRequest {
            from,
            to,
            image,
            name,
            image_url,
        } = request;
        let policy = self.registry.policy(from, to)?;
        let timeout = self.settings.collaborator_timeout;
        let stem = object_stem(name.as_deref(), &image);
        let source = SourceImage::new(image);
        let (width, height) = (source.width(), source.height());

        info!(stage = %Stage::Detecting, %from, %to, width, height);
        let detector = self
            .registry
            .detector()
            .await
            .map_err(|err| PicTransError::collaborator(Stage::Detecting, err))?;
        let detections = guarded(
            Stage::Detecting,
            timeout,
            detector.detect(Arc::new(source.image.clone()), from),
        )
        .await?;
        let threshold = self.settings.detect_threshold_for(policy.erase);
        let mut regions: Vec<Region> = detections
            .into_iter()
            .filter(|detection| detection.confidence >= threshold)
            .map(|detection| {
                Region::new(
                    from,
                    to,
                    detection.quad.clamp(width, height),
                    detection.text,
                    detection.confidence,
                )
            })
            .collect();

        info!(stage = %Stage::FilteringDetections, regions = regions.len());
        regions.retain(|region| filter::needs_translation(&region.text));

        info!(stage = %Stage::Translating, regions = regions.len());
        if !regions.is_empty() {
            let translator = self
                .registry
                .translator()
                .await
                .map_err(|err| PicTransError::collaborator(Stage::Translating, err))?;
            let texts: Vec<String> = regions.iter().map(|region| region.text.clone()).collect();
            let translated = translate_batch(translator.as_ref(), from, to, &texts, timeout).await?;
            for (region, to_text) in regions.iter_mut().zip(translated) {
                region.to_text = to_text;
            }
        }

        info!(stage = %Stage::FilteringTranslations, regions = regions.len());
        regions.retain(|region| region.text != region.to_text);

        info!(stage = %Stage::Erasing, regions = regions.len());
        let mut erased_base = None;
        if !regions.is_empty() {
            let settings = self.settings;
            regions.par_iter_mut().for_each(|region| {
                region.prepare(&source, settings.crop_padding, &settings.refine, &settings.classify)
            });
            regions.retain(|region| {
                let keep = !region.ocr_box.is_degenerate() && !region.box_rect.is_empty();
                if !keep {
                    warn!(
                        text = %region.text,
                        quad = ?region.ocr_box,
                        "dropping degenerate region"
                    );
                }
                keep
            });

            let needs_inpaint = match policy.erase {
                EraseMode::Regional => regions.iter().any(|region| !region.box_solid),
                EraseMode::WholeImage => !regions.is_empty(),
            };
            if needs_inpaint {
                let inpainter = self
                    .registry
                    .inpainter()
                    .await
                    .map_err(|err| PicTransError::collaborator(Stage::Erasing, err))?;
                let eraser = Eraser {
                    inpainter: inpainter.as_ref(),
                    params: settings.erase,
                    timeout,
                };
                match policy.erase {
                    EraseMode::Regional => {
                        eraser.erase_regions(&source, &mut regions).await?;
                    }
                    EraseMode::WholeImage => {
                        erased_base = Some(eraser.erase_whole_image(&source, &mut regions).await?);
                    }
                }
            } else {
                debug!("every region has a flat background; no inpainting needed");
            }
        }

        info!(stage = %Stage::Composing, regions = regions.len());
        let store = self
            .registry
            .store()
            .await
            .map_err(|err| PicTransError::collaborator(Stage::Composing, err))?;
        let composer = Composer {
            store: store.as_ref(),
            policy,
            fonts: self.registry.fonts(),
            fit: self.settings.layout,
            canvas_background: &self.settings.canvas_background,
            timeout,
        };
        let base = match &erased_base {
            Some(erased) => BaseImage::Erased(erased),
            None => BaseImage::Original {
                image: &source.image,
                url: image_url,
            },
        };
        let scene = composer.compose(base, &stem, &regions).await?;
        info!(stage = %Stage::Done, layers = scene.objects.len());
        Ok(scene)
    }
}
