use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::RgbImage;

use crate::error::PicTransError;
use crate::providers::ObjectStore;

/// Decode plain base64 or a `data:<mime>;base64,` URI.
pub(crate) fn decode_base64(value: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim();
    let payload = match trimmed.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => trimmed,
    };
    BASE64.decode(payload).context("image is not valid base64")
}

pub(crate) fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(bytes)
        .map_err(PicTransError::from)
        .context("failed to decode image")?;
    Ok(image.to_rgb8())
}

/// Bytes behind `url`: read back from the store when it owns the URL,
/// downloaded otherwise.
pub(crate) async fn fetch_image_bytes(store: &dyn ObjectStore, url: &str) -> Result<Vec<u8>> {
    if let Some(bytes) = store.fetch(url).await? {
        return Ok(bytes);
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(anyhow!("image not found: {}", url));
    }
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("failed to download {}", url))?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("failed to download {} ({})", url, status));
    }
    let bytes = response.bytes().await.context("failed to read image body")?;
    Ok(bytes.to_vec())
}

/// Extension for uploaded images, defaulting to png.
pub(crate) fn normalize_ext(ext: Option<&str>) -> Result<&'static str> {
    match ext.map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("png") => Ok("png"),
        Some("jpg") | Some("jpeg") => Ok("jpg"),
        Some("webp") => Ok("webp"),
        Some("gif") => Ok("gif"),
        Some("bmp") => Ok("bmp"),
        Some(other) => Err(anyhow!("unsupported image extension: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uris_and_plain_base64_decode_alike() {
        assert_eq!(decode_base64("AQID").unwrap(), vec![1, 2, 3]);
        assert_eq!(decode_base64("data:image/png;base64,AQID").unwrap(), vec![1, 2, 3]);
        assert!(decode_base64("not base64!").is_err());
    }

    #[test]
    fn undecodable_bytes_surface_as_image_errors() {
        let err = decode_image(b"definitely not a picture").unwrap_err();
        assert!(matches!(err.downcast_ref::<PicTransError>(), Some(PicTransError::Image(_))));
        assert!(format!("{:#}", err).starts_with("failed to decode image: image error"));
    }

    #[test]
    fn extensions_are_normalized() {
        assert_eq!(normalize_ext(None).unwrap(), "png");
        assert_eq!(normalize_ext(Some(".JPEG")).unwrap(), "jpg");
        assert!(normalize_ext(Some("exe")).is_err());
    }
}
