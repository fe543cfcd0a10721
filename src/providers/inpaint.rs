use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{DynamicImage, GrayImage, RgbImage};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::retry::send_with_retry;
use super::{CollaboratorFuture, Inpainter, encode_png};

/// Inpainting service reached over HTTP. The image and every mask travel as
/// base64 PNG; the answer is the repaired image, same encoding.
#[derive(Debug, Clone)]
pub struct HttpInpainter {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpInpainter {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }
}

impl Inpainter for HttpInpainter {
    fn inpaint(&self, image: RgbImage, masks: Vec<GrayImage>) -> CollaboratorFuture<RgbImage> {
        let this = self.clone();
        Box::pin(async move {
            let (width, height) = image.dimensions();
            let encoded_masks = masks
                .into_iter()
                .map(|mask| {
                    encode_png(&DynamicImage::ImageLuma8(mask)).map(|png| BASE64.encode(png))
                })
                .collect::<Result<Vec<_>>>()?;
            debug!("inpaint {}x{} with {} masks", width, height, encoded_masks.len());
            let body = json!({
                "image": BASE64.encode(encode_png(&DynamicImage::ImageRgb8(image))?),
                "masks": encoded_masks,
            });
            let text =
                send_with_retry("Inpainter", || this.client.post(&this.endpoint).json(&body))
                    .await?;
            decode_image(&text)
        })
    }
}

#[derive(Debug, Deserialize)]
struct InpaintResponse {
    image: Option<String>,
    error: Option<String>,
}

fn decode_image(text: &str) -> Result<RgbImage> {
    let payload: InpaintResponse =
        serde_json::from_str(text).context("failed to parse inpaint response JSON")?;
    if let Some(error) = payload.error.filter(|e| !e.trim().is_empty()) {
        return Err(anyhow!("inpaint service error: {}", error));
    }
    let encoded = payload.image.ok_or_else(|| anyhow!("inpaint response has no image"))?;
    let bytes = BASE64.decode(encoded.trim()).context("inpaint image is not valid base64")?;
    let decoded = image::load_from_memory(&bytes).context("failed to decode inpainted image")?;
    Ok(decoded.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn decodes_base64_png_answers() {
        let image = RgbImage::from_pixel(3, 2, Rgb([9, 8, 7]));
        let png = encode_png(&DynamicImage::ImageRgb8(image.clone())).unwrap();
        let body = json!({ "image": BASE64.encode(png) }).to_string();
        assert_eq!(decode_image(&body).unwrap(), image);
    }

    #[test]
    fn service_errors_surface() {
        let err = decode_image(r#"{"error":"cuda out of memory"}"#).unwrap_err();
        assert!(err.to_string().contains("cuda out of memory"));
    }
}
