use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{DynamicImage, RgbImage};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::retry::send_with_retry;
use super::{CollaboratorFuture, Detection, Detector, encode_png};
use crate::languages::Language;
use crate::region::Quad;

/// Detector reached over HTTP. Posts `{"image": <base64 png>, "language":
/// <ocr code>}` and expects a list of `{box, text, score}` lines back.
#[derive(Debug, Clone)]
pub struct HttpDetector {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpDetector {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }
}

impl Detector for HttpDetector {
    fn detect(
        &self,
        image: Arc<RgbImage>,
        language: Language,
    ) -> CollaboratorFuture<Vec<Detection>> {
        let this = self.clone();
        Box::pin(async move {
            let png = encode_png(&DynamicImage::ImageRgb8((*image).clone()))?;
            let body = json!({
                "image": BASE64.encode(png),
                "language": language.ocr_code(),
            });
            let text =
                send_with_retry("Detector", || this.client.post(&this.endpoint).json(&body))
                    .await?;
            parse_detections(&text)
        })
    }
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    lines: Vec<DetectedLine>,
}

#[derive(Debug, Deserialize)]
struct DetectedLine {
    #[serde(rename = "box")]
    corners: [[f32; 2]; 4],
    text: String,
    score: f32,
}

fn parse_detections(text: &str) -> Result<Vec<Detection>> {
    let payload: DetectResponse =
        serde_json::from_str(text).context("failed to parse detector response JSON")?;
    Ok(payload
        .lines
        .into_iter()
        .map(|line| Detection {
            quad: Quad::from_f32(line.corners),
            text: line.text,
            confidence: line.score,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_corners_are_truncated() {
        let body = r#"{"lines":[{"box":[[10.7,10.2],[110.9,10.0],[110.0,60.5],[10.0,60.0]],"text":"SALE","score":0.97}]}"#;
        let detections = parse_detections(body).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].quad, Quad::new([(10, 10), (110, 10), (110, 60), (10, 60)]));
        assert_eq!(detections[0].text, "SALE");
    }

    #[test]
    fn missing_lines_mean_nothing_found() {
        assert!(parse_detections("{}").unwrap().is_empty());
    }
}
