use anyhow::{Result, anyhow};
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::PicTransError;
use crate::languages::Language;
use crate::region::Quad;

mod baidu;
mod http_detector;
mod inpaint;
mod openai;
pub(crate) mod retry;
mod store;
mod tesseract;

pub use baidu::BaiduTranslator;
pub use http_detector::HttpDetector;
pub use inpaint::HttpInpainter;
pub use openai::OpenAiTranslator;
pub use store::LocalStore;
pub use tesseract::TesseractDetector;

pub type CollaboratorFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// One recognized line as reported by a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub quad: Quad,
    pub text: String,
    pub confidence: f32,
}

pub trait Detector: Send + Sync {
    fn detect(
        &self,
        image: Arc<RgbImage>,
        language: Language,
    ) -> CollaboratorFuture<Vec<Detection>>;
}

/// Translators must return exactly one output per input, in order.
pub trait Translator: Send + Sync {
    fn translate(
        &self,
        from: Language,
        to: Language,
        texts: Vec<String>,
    ) -> CollaboratorFuture<Vec<String>>;
}

pub trait Inpainter: Send + Sync {
    fn inpaint(&self, image: RgbImage, masks: Vec<GrayImage>) -> CollaboratorFuture<RgbImage>;
}

pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `object_name` and return its public URL.
    fn upload(&self, bytes: Vec<u8>, object_name: String) -> CollaboratorFuture<String>;

    /// Read back an object by the URL `upload` returned. `None` when the URL
    /// does not belong to this store.
    fn fetch(&self, url: &str) -> CollaboratorFuture<Option<Vec<u8>>>;
}

/// Echoes its input. Useful offline, where every region is then dropped as
/// untranslated.
#[derive(Debug, Clone, Default)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(
        &self,
        _from: Language,
        _to: Language,
        texts: Vec<String>,
    ) -> CollaboratorFuture<Vec<String>> {
        Box::pin(async move { Ok(texts) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorKind {
    Baidu,
    OpenAi,
    Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Tesseract,
    Http,
}

pub fn get_env(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

pub(crate) fn require_env(key: &str) -> Result<String> {
    get_env(key).ok_or_else(|| anyhow!("{} is not set", key))
}

pub(crate) fn encode_png(image: &image::DynamicImage) -> Result<Vec<u8>> {
    use anyhow::Context;
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(PicTransError::from)
        .context("failed to encode png")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identity_translator_echoes_in_order() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let out = IdentityTranslator
            .translate(Language::English, Language::French, texts.clone())
            .await
            .unwrap();
        assert_eq!(out, texts);
    }
}
