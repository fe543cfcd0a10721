//! Preview rendering: scene to SVG, SVG to PNG.

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tiny_skia::Pixmap;
use tracing::warn;
use usvg::{Options, Tree, fontdb};

use crate::layout::{Direction, ttb_columns};
use crate::layout::font::LINE_SPACING;
use crate::providers::ObjectStore;
use crate::scene::{ImageLayer, Layer, Origin, Scene, TextLayer};

/// Approximate ascent as a share of the font size, used to put the first
/// baseline below the top of the text box.
const ASCENT: f32 = 0.8;

/// Render `scene` to PNG bytes. Image sources are read back through `store`;
/// sources it does not own are left out of the preview.
pub async fn render_scene_png(
    scene: &Scene,
    store: &dyn ObjectStore,
    fonts: &BTreeMap<String, PathBuf>,
) -> Result<Vec<u8>> {
    let svg = scene_to_svg(scene, store).await?;
    rasterize(&svg, fonts)
}

pub async fn scene_to_svg(scene: &Scene, store: &dyn ObjectStore) -> Result<String> {
    let mut svg = String::new();
    write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = scene.width,
        h = scene.height
    )?;
    write!(
        svg,
        r#"<rect x="0" y="0" width="{}" height="{}" fill="{}"/>"#,
        scene.width,
        scene.height,
        escape_xml(&scene.background)
    )?;

    for layer in &scene.objects {
        match layer {
            Layer::Image(image) => push_image(&mut svg, image, store).await?,
            Layer::Text(text) => push_text(&mut svg, text)?,
            Layer::Group(group) => {
                let cx = group.left as f32 + group.width as f32 / 2.0;
                let cy = group.top as f32 + group.height as f32 / 2.0;
                write!(svg, r#"<g transform="translate({cx} {cy})">"#)?;
                for child in &group.objects {
                    match child {
                        Layer::Image(image) => push_image(&mut svg, image, store).await?,
                        Layer::Text(text) => push_text(&mut svg, text)?,
                        Layer::Group(_) => warn!("nested groups are not rendered"),
                    }
                }
                svg.push_str("</g>");
            }
        }
    }

    svg.push_str("</svg>");
    Ok(svg)
}

/// Top-left offset of a box anchored with the given origins.
fn anchor(
    left: i32,
    top: i32,
    width: f32,
    height: f32,
    origin_x: Origin,
    origin_y: Origin,
) -> (f32, f32) {
    let x = match origin_x {
        Origin::Center => left as f32 - width / 2.0,
        _ => left as f32,
    };
    let y = match origin_y {
        Origin::Center => top as f32 - height / 2.0,
        _ => top as f32,
    };
    (x, y)
}

async fn push_image(svg: &mut String, image: &ImageLayer, store: &dyn ObjectStore) -> Result<()> {
    if !image.visible {
        return Ok(());
    }
    let (x, y) = anchor(
        image.left,
        image.top,
        image.width as f32,
        image.height as f32,
        image.origin_x,
        image.origin_y,
    );
    if let Some(fill) = &image.fill {
        write!(
            svg,
            r#"<rect x="{x}" y="{y}" width="{}" height="{}" fill="{}"/>"#,
            image.width,
            image.height,
            escape_xml(fill)
        )?;
    }
    let uri = if image.src.starts_with("data:") {
        image.src.clone()
    } else {
        match store
            .fetch(&image.src)
            .await
            .with_context(|| format!("failed to fetch {}", image.src))?
        {
            Some(bytes) => format!("data:image/png;base64,{}", BASE64.encode(bytes)),
            None => {
                warn!(
                    src = %image.src,
                    "image source is not in the store; leaving it out of the preview"
                );
                return Ok(());
            }
        }
    };
    write!(
        svg,
        r#"<image href="{uri}" xlink:href="{uri}" x="{x}" y="{y}" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        w = image.width,
        h = image.height
    )?;
    Ok(())
}

fn push_text(svg: &mut String, text: &TextLayer) -> Result<()> {
    let size = text.font_size as f32;
    let (x, y) = anchor(
        text.left,
        text.top,
        text.width as f32,
        text.height as f32,
        text.origin_x,
        text.origin_y,
    );
    let cx = x + text.width as f32 / 2.0;
    let cy = y + text.height as f32 / 2.0;
    write!(
        svg,
        r#"<g transform="rotate({angle} {cx} {cy})" font-family="{family}" font-size="{size}" fill="{fill}">"#,
        angle = text.angle,
        family = escape_xml(&text.font_family),
        fill = escape_xml(&text.fill)
    )?;

    let lines: Vec<&str> = text.text.split('\n').collect();
    match text.direction {
        Direction::Ttb => {
            let columns = ttb_columns(&text.text);
            let count = columns.len() as f32;
            for (col, line) in columns.iter().enumerate() {
                let column_x = x + (count - 1.0 - col as f32) * (size + LINE_SPACING) + size / 2.0;
                for (row, ch) in line.chars().enumerate() {
                    let baseline = y + row as f32 * size + size * ASCENT;
                    write!(
                        svg,
                        r#"<text x="{column_x}" y="{baseline}" text-anchor="middle">{}</text>"#,
                        escape_xml(&ch.to_string())
                    )?;
                }
            }
        }
        Direction::Ltr | Direction::Rtl => {
            let line_height = if lines.len() > 1 {
                (text.height as f32 - LINE_SPACING * (lines.len() - 1) as f32) / lines.len() as f32
            } else {
                text.height as f32
            };
            for (row, line) in lines.iter().enumerate() {
                let baseline = y + row as f32 * (line_height + LINE_SPACING) + size * ASCENT;
                write!(
                    svg,
                    r#"<text x="{cx}" y="{baseline}" text-anchor="middle">{}</text>"#,
                    escape_xml(line)
                )?;
            }
        }
    }
    svg.push_str("</g>");
    Ok(())
}

/// Rasterize an SVG document to PNG. Fonts named in `fonts` are loaded on
/// top of the system fonts.
pub fn rasterize(svg: &str, fonts: &BTreeMap<String, PathBuf>) -> Result<Vec<u8>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    for (id, path) in fonts {
        if let Err(err) = db.load_font_file(path) {
            warn!(
                font = %id,
                path = %path.display(),
                error = %err,
                "failed to load font for preview"
            );
        }
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).context("failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .context("failed to encode preview png")?;
    Ok(bytes)
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::LocalStore;
    use crate::region::{BoxRect, Point};
    use crate::scene::{GroupLayer, TextExtra};
    use crate::languages::Language;
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    fn text_layer(text: &str) -> TextLayer {
        TextLayer {
            text: text.to_string(),
            left: 20,
            top: 20,
            width: 60,
            height: 20,
            origin_x: Origin::Left,
            origin_y: Origin::Top,
            font_family: "AlibabaPuHuiTi".to_string(),
            font_size: 20,
            fill: "rgb(0, 0, 0)".to_string(),
            angle: 0.0,
            direction: Direction::Rtl,
            placement: Point::new(20, 20),
            overflow: false,
            extra: TextExtra {
                from_lan: Language::English,
                to_lan: Language::French,
                from_text: "A&B".to_string(),
                to_text: text.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn svg_inlines_stored_images_and_skips_hidden_ones() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf(), "/files".to_string());
        let url = store.upload(vec![137, 80, 78, 71], "base.png".to_string()).await.unwrap();

        let rect = BoxRect {
            left: 10,
            top: 10,
            right: 90,
            bottom: 50,
        };
        let mut scene = Scene::new(100, 60, "#ddd");
        scene.push(Layer::Image(ImageLayer::new("bg", 0, 0, 100, 60, url).locked()));
        scene.push(Layer::Group(GroupLayer::for_region(
            &rect,
            vec![
                Layer::Image(ImageLayer::at_rect("bg0", &rect, "/files/patch.png").hidden()),
                Layer::Text(text_layer("A<B")),
            ],
        )));

        let svg = scene_to_svg(&scene, &store).await.unwrap();
        assert_eq!(svg.matches("<image ").count(), 1);
        assert!(svg.contains("data:image/png;base64,iVBORw=="));
        assert!(svg.contains(r#"<g transform="translate(50 30)">"#));
        assert!(svg.contains("A&lt;B"));
    }

    #[tokio::test]
    async fn foreign_sources_are_left_out() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf(), "/files".to_string());
        let mut scene = Scene::new(10, 10, "#fff");
        scene.push(Layer::Image(ImageLayer::new(
            "bg",
            0,
            0,
            10,
            10,
            "https://cdn.example.com/x.png",
        )));
        let svg = scene_to_svg(&scene, &store).await.unwrap();
        assert!(!svg.contains("<image "));
    }

    #[test]
    fn rasterize_produces_png_of_the_svg_size() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="3" viewBox="0 0 4 3"><rect x="0" y="0" width="4" height="3" fill="#ff0000"/></svg>"##;
        let png = rasterize(svg, &BTreeMap::new()).unwrap();
        let decoded: RgbaImage = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(*decoded.get_pixel(1, 1), Rgba([255, 0, 0, 255]));
    }
}
