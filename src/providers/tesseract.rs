use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

use super::{CollaboratorFuture, Detection, Detector};
use crate::languages::Language;
use crate::layout::font::is_cjk;
use crate::region::Quad;

/// Line detector backed by the `tesseract` command line tool. Word boxes
/// from the TSV output are merged per line into axis-aligned quads.
#[derive(Debug, Clone)]
pub struct TesseractDetector {
    psm: u32,
}

impl TesseractDetector {
    pub fn new() -> Self {
        Self { psm: 11 }
    }

    pub fn with_psm(mut self, psm: u32) -> Self {
        self.psm = psm;
        self
    }
}

impl Default for TesseractDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for TesseractDetector {
    fn detect(
        &self,
        image: Arc<RgbImage>,
        language: Language,
    ) -> CollaboratorFuture<Vec<Detection>> {
        let psm = self.psm;
        Box::pin(async move {
            let detections = tokio::task::spawn_blocking(move || -> Result<Vec<Detection>> {
                let mut tmp = tempfile::Builder::new()
                    .suffix(".png")
                    .tempfile()
                    .context("failed to create temp file for detection")?;
                image
                    .write_to(&mut tmp, image::ImageFormat::Png)
                    .context("failed to write temp image for detection")?;
                tmp.flush().ok();
                let tsv = run_tesseract_tsv(tmp.path(), language.tesseract_code(), psm)?;
                Ok(parse_tsv_lines(&tsv))
            })
            .await
            .context("detection task panicked")??;
            debug!("tesseract found {} lines", detections.len());
            Ok(detections)
        })
    }
}

fn run_tesseract_tsv(path: &Path, languages: &str, psm: u32) -> Result<String> {
    let output = Command::new("tesseract")
        .arg(path)
        .arg("stdout")
        .arg("-l")
        .arg(languages)
        .arg("--psm")
        .arg(psm.to_string())
        .arg("tsv")
        .output()
        .context("failed to run tesseract (is it installed?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract failed: {}", stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

struct Word {
    text: String,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    conf: f32,
}

fn parse_tsv_lines(tsv: &str) -> Vec<Detection> {
    let mut lines: BTreeMap<(i32, i32, i32, i32), Vec<Word>> = BTreeMap::new();

    for row in tsv.lines().skip(1) {
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 12 {
            continue;
        }
        let level: i32 = cols[0].parse().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        let field = |idx: usize| cols[idx].parse::<i32>().unwrap_or(0);
        let (left, top) = (field(6), field(7));
        let key = (field(1), field(2), field(3), field(4));
        lines.entry(key).or_default().push(Word {
            text: text.to_string(),
            left,
            top,
            right: left + field(8),
            bottom: top + field(9),
            conf,
        });
    }

    lines
        .into_values()
        .filter_map(|mut words| {
            words.sort_by_key(|word| word.left);
            let left = words.iter().map(|w| w.left).min()?;
            let top = words.iter().map(|w| w.top).min()?;
            let right = words.iter().map(|w| w.right).max()?;
            let bottom = words.iter().map(|w| w.bottom).max()?;
            let confidence = words.iter().map(|w| w.conf).sum::<f32>() / words.len() as f32 / 100.0;
            Some(Detection {
                quad: Quad::new([(left, top), (right, top), (right, bottom), (left, bottom)]),
                text: join_words(&words),
                confidence,
            })
        })
        .collect()
}

/// CJK words are glued back together; everything else is space separated.
fn join_words(words: &[Word]) -> String {
    let mut text = String::new();
    for word in words {
        let glue = match (text.chars().last(), word.text.chars().next()) {
            (Some(prev), Some(next)) => !(is_cjk(prev) && is_cjk(next)),
            _ => false,
        };
        if glue {
            text.push(' ');
        }
        text.push_str(&word.text);
    }
    text
}
