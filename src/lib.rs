use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};

mod cluster;
pub mod color;
pub mod erase;
pub mod error;
pub mod languages;
pub mod layout;
pub mod logging;
pub mod pipeline;
pub mod policy;
pub mod providers;
pub mod region;
pub mod registry;
pub mod render;
pub mod scene;
mod server;
pub mod settings;

pub use error::PicTransError;
pub use languages::Language;
pub use pipeline::{Orchestrator, TaskRequest};
pub use registry::Registry;
pub use scene::Scene;
pub use server::run_server;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub input: Option<PathBuf>,
    pub from: String,
    pub to: String,
    pub output: Option<PathBuf>,
    pub preview: Option<PathBuf>,
    pub settings_path: Option<String>,
    pub serve: Option<String>,
    pub show_language_pairs: bool,
}

/// CLI entry point. Returns what should be printed: the scene JSON, the
/// language pair list, or nothing when the result went to a file.
pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let registry = Registry::from_settings(&settings)?;

    if config.show_language_pairs {
        return Ok(format_language_pairs(&registry));
    }
    if let Some(addr) = config.serve {
        run_server(settings, registry, addr).await?;
        return Ok(String::new());
    }

    let input = config.input.ok_or_else(|| anyhow!("--input is required"))?;
    let from: Language = config.from.parse()?;
    let to: Language = config.to.parse()?;
    let image = image::open(&input)
        .with_context(|| format!("failed to read image: {}", input.display()))?
        .to_rgb8();
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().to_string());

    let orchestrator = Orchestrator::new(&registry, &settings);
    let scene = orchestrator
        .run(TaskRequest {
            from,
            to,
            image,
            name,
            image_url: None,
        })
        .await?;

    if let Some(preview) = config.preview.as_deref() {
        let store = registry.store().await?;
        let png = render::render_scene_png(&scene, store.as_ref(), &settings.fonts).await?;
        fs::write(preview, png)
            .with_context(|| format!("failed to write preview: {}", preview.display()))?;
    }

    let json = serde_json::to_string_pretty(&scene).context("failed to serialize scene")?;
    match config.output.as_deref() {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("failed to write scene: {}", path.display()))?;
            Ok(String::new())
        }
        None => Ok(json),
    }
}

fn format_language_pairs(registry: &Registry) -> String {
    registry
        .language_pairs()
        .into_iter()
        .map(|(from, to)| {
            format!(
                "{} -> {}\t{} -> {}",
                from.code(),
                to.code(),
                from.english_name(),
                to.english_name()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
