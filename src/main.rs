use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "pic-translator-rust",
    version,
    about = "Translate the text inside images into an editable layered scene"
)]
struct Cli {
    /// Image to translate
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Source language code (e.g. en, zh)
    #[arg(short = 'f', long = "from", default_value = "zh")]
    from: String,

    /// Target language code (e.g. jp, en, fra)
    #[arg(short = 't', long = "to", default_value = "en")]
    to: String,

    /// Write the scene JSON here instead of stdout
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Render a PNG preview of the scene
    #[arg(long = "preview")]
    preview: Option<PathBuf>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Run the HTTP server on this address (e.g. 127.0.0.1:8080)
    #[arg(long = "serve")]
    serve: Option<String>,

    /// Show registered language pairs and exit
    #[arg(long = "show-language-pairs")]
    show_language_pairs: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    pic_translator_rust::logging::init(cli.verbose)?;

    let output = pic_translator_rust::run(pic_translator_rust::Config {
        input: cli.input,
        from: cli.from,
        to: cli.to,
        output: cli.output,
        preview: cli.preview,
        settings_path: cli.read_settings,
        serve: cli.serve,
        show_language_pairs: cli.show_language_pairs,
    })
    .await?;

    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
