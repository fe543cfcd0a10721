use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::erase::EraseParams;
use crate::layout::FitParams;
use crate::policy::{ColorRule, EraseMode};
use crate::providers::{DetectorKind, TranslatorKind};
use crate::region::classify::ClassifyParams;
use crate::region::refine::RefineParams;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub fonts: BTreeMap<String, PathBuf>,
    pub default_font: String,
    pub detect_threshold: f32,
    pub alternate_detect_threshold: f32,
    pub refine: RefineParams,
    pub classify: ClassifyParams,
    pub erase: EraseParams,
    pub layout: FitParams,
    pub crop_padding: u32,
    pub collaborator_timeout: Duration,
    pub canvas_background: String,
    pub erase_mode: EraseMode,
    pub text_color: ColorRule,
    pub store_dir: PathBuf,
    pub store_url: String,
    pub translator: TranslatorKind,
    pub translator_model: Option<String>,
    pub detector: DetectorKind,
    pub detector_endpoint: Option<String>,
    pub inpaint_endpoint: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fonts: BTreeMap::new(),
            default_font: "AlibabaPuHuiTi".to_string(),
            detect_threshold: 0.85,
            alternate_detect_threshold: 0.8,
            refine: RefineParams::default(),
            classify: ClassifyParams::default(),
            erase: EraseParams::default(),
            layout: FitParams::default(),
            crop_padding: 10,
            collaborator_timeout: Duration::from_secs(120),
            canvas_background: "#ddd".to_string(),
            erase_mode: EraseMode::Regional,
            text_color: ColorRule::Contrast,
            store_dir: PathBuf::from("uploads"),
            store_url: "/files".to_string(),
            translator: TranslatorKind::Baidu,
            translator_model: None,
            detector: DetectorKind::Tesseract,
            detector_endpoint: None,
            inpaint_endpoint: None,
        }
    }
}

impl Settings {
    /// Detection cutoff for the erase mode in use.
    pub fn detect_threshold_for(&self, mode: EraseMode) -> f32 {
        match mode {
            EraseMode::Regional => self.detect_threshold,
            EraseMode::WholeImage => self.alternate_detect_threshold,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    default_font: Option<String>,
    fonts: Option<BTreeMap<String, String>>,
    detect: Option<DetectSettings>,
    refine: Option<RefineSettings>,
    classify: Option<ClassifySettings>,
    erase: Option<EraseSettings>,
    layout: Option<LayoutSettings>,
    pipeline: Option<PipelineSettings>,
    store: Option<StoreSettings>,
    translator: Option<TranslatorSettings>,
    detector: Option<DetectorSettings>,
    inpaint: Option<InpaintSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct DetectSettings {
    threshold: Option<f32>,
    alternate_threshold: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct RefineSettings {
    max_expansion: Option<u32>,
    min_expansion: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifySettings {
    border: Option<u32>,
    color_tolerance: Option<f32>,
    ratio: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct EraseSettings {
    stage_one_radius: Option<u8>,
    stage_two_radius: Option<u8>,
    component_padding: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutSettings {
    min_size: Option<u32>,
    max_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineSettings {
    crop_padding: Option<u32>,
    collaborator_timeout_secs: Option<u64>,
    canvas_background: Option<String>,
    erase_mode: Option<EraseMode>,
    text_color: Option<ColorRule>,
}

#[derive(Debug, Default, Deserialize)]
struct StoreSettings {
    base_dir: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslatorSettings {
    kind: Option<TranslatorKind>,
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DetectorSettings {
    kind: Option<DetectorKind>,
    endpoint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InpaintSettings {
    endpoint: Option<String>,
}

/// Built-in defaults layered with the project, home and explicit settings
/// files, later files winning.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let embedded: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).context("failed to parse built-in settings")?;
    settings.merge(embedded);

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge_toml(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn merge_toml(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(font) = non_empty(incoming.default_font) {
            self.default_font = font;
        }
        if let Some(fonts) = incoming.fonts {
            for (id, path) in fonts {
                if !path.trim().is_empty() {
                    self.fonts.insert(id, PathBuf::from(path));
                }
            }
        }
        if let Some(detect) = incoming.detect {
            if let Some(threshold) = detect.threshold.filter(|v| (0.0..=1.0).contains(v)) {
                self.detect_threshold = threshold;
            }
            if let Some(threshold) = detect
                .alternate_threshold
                .filter(|v| (0.0..=1.0).contains(v))
            {
                self.alternate_detect_threshold = threshold;
            }
        }
        if let Some(refine) = incoming.refine {
            if let Some(max) = refine.max_expansion {
                self.refine.max_expansion = max;
            }
            if let Some(min) = refine.min_expansion {
                self.refine.min_expansion = min;
            }
        }
        if let Some(classify) = incoming.classify {
            if let Some(border) = classify.border.filter(|v| *v > 0) {
                self.classify.border = border;
            }
            if let Some(tolerance) = classify.color_tolerance.filter(|v| *v >= 0.0) {
                self.classify.color_tolerance = tolerance;
            }
            if let Some(ratio) = classify.ratio.filter(|v| (0.0..=1.0).contains(v)) {
                self.classify.ratio = ratio;
            }
        }
        if let Some(erase) = incoming.erase {
            if let Some(radius) = erase.stage_one_radius {
                self.erase.stage_one_radius = radius;
            }
            if let Some(radius) = erase.stage_two_radius {
                self.erase.stage_two_radius = radius;
            }
            if let Some(padding) = erase.component_padding {
                self.erase.component_padding = padding;
            }
        }
        if let Some(layout) = incoming.layout {
            if let Some(min) = layout.min_size.filter(|v| *v > 0) {
                self.layout.min_size = min;
            }
            if let Some(max) = layout.max_size.filter(|v| *v > 0) {
                self.layout.max_size = max;
            }
        }
        if let Some(pipeline) = incoming.pipeline {
            if let Some(padding) = pipeline.crop_padding {
                self.crop_padding = padding;
            }
            if let Some(secs) = pipeline.collaborator_timeout_secs.filter(|v| *v > 0) {
                self.collaborator_timeout = Duration::from_secs(secs);
            }
            if let Some(background) = non_empty(pipeline.canvas_background) {
                self.canvas_background = background;
            }
            if let Some(mode) = pipeline.erase_mode {
                self.erase_mode = mode;
            }
            if let Some(rule) = pipeline.text_color {
                self.text_color = rule;
            }
        }
        if let Some(store) = incoming.store {
            if let Some(dir) = non_empty(store.base_dir) {
                self.store_dir = PathBuf::from(dir);
            }
            if let Some(url) = store.base_url {
                self.store_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Some(translator) = incoming.translator {
            if let Some(kind) = translator.kind {
                self.translator = kind;
            }
            if let Some(model) = non_empty(translator.model) {
                self.translator_model = Some(model);
            }
        }
        if let Some(detector) = incoming.detector {
            if let Some(kind) = detector.kind {
                self.detector = kind;
            }
            if let Some(endpoint) = detector.endpoint {
                self.detector_endpoint = non_empty(Some(endpoint));
            }
        }
        if let Some(inpaint) = incoming.inpaint
            && let Some(endpoint) = inpaint.endpoint
        {
            self.inpaint_endpoint = non_empty(Some(endpoint));
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".pic-translator-rust"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedded() -> Settings {
        let mut settings = Settings::default();
        settings.merge_toml(DEFAULT_SETTINGS_TOML).unwrap();
        settings
    }

    #[test]
    fn embedded_defaults_match_code_defaults() {
        let settings = embedded();
        assert_eq!(settings.refine, RefineParams::default());
        assert_eq!(settings.erase, EraseParams::default());
        assert_eq!(settings.layout, FitParams::default());
        assert_eq!(settings.crop_padding, 10);
        assert_eq!(settings.collaborator_timeout, Duration::from_secs(120));
        assert!(settings.fonts.contains_key("AlibabaPuHuiTi"));
        assert_eq!(settings.erase_mode, EraseMode::Regional);
    }

    #[test]
    fn later_layers_override_selected_keys() {
        let mut settings = embedded();
        settings
            .merge_toml(
                r#"
                [erase]
                stage_two_radius = 6

                [pipeline]
                erase_mode = "whole_image"

                [translator]
                kind = "identity"

                [store]
                base_url = "https://cdn.example.com/pt/"
                "#,
            )
            .unwrap();
        assert_eq!(settings.erase.stage_two_radius, 6);
        assert_eq!(settings.erase.stage_one_radius, 2);
        assert_eq!(settings.erase_mode, EraseMode::WholeImage);
        assert_eq!(settings.translator, TranslatorKind::Identity);
        assert_eq!(settings.store_url, "https://cdn.example.com/pt");
        assert!((settings.detect_threshold_for(EraseMode::WholeImage) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_values_are_ignored() {
        let mut settings = embedded();
        settings
            .merge_toml("[detect]\nthreshold = 3.5\n[classify]\nratio = -1.0\n")
            .unwrap();
        assert!((settings.detect_threshold - 0.85).abs() < 1e-6);
        assert!((settings.classify.ratio - 0.8).abs() < 1e-6);
    }

    #[test]
    fn unknown_enum_values_fail_to_parse() {
        let mut settings = embedded();
        assert!(settings.merge_toml("[translator]\nkind = \"babelfish\"\n").is_err());
    }
}
