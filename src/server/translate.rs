use axum::http::StatusCode;

use crate::error::PicTransError;
use crate::languages::Language;
use crate::pipeline::{Orchestrator, TaskRequest};

use super::models::{PicTransRequest, PicTransResponse, UploadRequest, UploadResponse};
use super::state::ServerState;
use super::util::{decode_base64, decode_image, fetch_image_bytes, normalize_ext};

#[derive(Debug)]
pub(crate) struct ServerError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ServerError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        let status = match err.downcast_ref::<PicTransError>() {
            Some(
                PicTransError::UnsupportedLanguage(_)
                | PicTransError::UnsupportedLanguagePair { .. },
            ) => StatusCode::BAD_REQUEST,
            Some(typed) if typed.is_collaborator_failure() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: format!("{:#}", err),
        }
    }
}

pub(crate) async fn pic_trans_request(
    state: &ServerState,
    request: PicTransRequest,
) -> Result<PicTransResponse, ServerError> {
    let from: Language = request
        .from_lan
        .parse()
        .map_err(|err: PicTransError| ServerError::bad_request(err.to_string()))?;
    let to: Language = request
        .to_lan
        .parse()
        .map_err(|err: PicTransError| ServerError::bad_request(err.to_string()))?;
    state
        .registry
        .policy(from, to)
        .map_err(|err| ServerError::bad_request(err.to_string()))?;

    let (bytes, image_url) = match (request.image_base64.as_deref(), request.image_url) {
        (Some(encoded), _) if !encoded.trim().is_empty() => (
            decode_base64(encoded).map_err(|err| ServerError::bad_request(err.to_string()))?,
            None,
        ),
        (_, Some(url)) if !url.trim().is_empty() => {
            let store = state.registry.store().await?;
            let bytes = fetch_image_bytes(store.as_ref(), url.trim())
                .await
                .map_err(|err| ServerError::bad_request(format!("{:#}", err)))?;
            (bytes, Some(url.trim().to_string()))
        }
        _ => return Err(ServerError::bad_request("image_url or image_base64 is required")),
    };
    let image = decode_image(&bytes).map_err(|err| ServerError::bad_request(format!("{:#}", err)))?;

    let orchestrator = Orchestrator::new(&state.registry, &state.settings);
    let content = orchestrator
        .run(TaskRequest {
            from,
            to,
            image,
            name: request.image_name,
            image_url,
        })
        .await?;
    Ok(PicTransResponse { content })
}

pub(crate) async fn upload_request(
    state: &ServerState,
    request: UploadRequest,
) -> Result<UploadResponse, ServerError> {
    if request.image_base64.trim().is_empty() {
        return Err(ServerError::bad_request("image_base64 is required"));
    }
    let ext = normalize_ext(request.ext.as_deref())
        .map_err(|err| ServerError::bad_request(err.to_string()))?;
    let bytes = decode_base64(&request.image_base64)
        .map_err(|err| ServerError::bad_request(err.to_string()))?;
    decode_image(&bytes).map_err(|err| ServerError::bad_request(format!("{:#}", err)))?;

    let name = format!("{:x}.{}", md5::compute(&bytes), ext);
    let store = state.registry.store().await?;
    let image_url = store
        .upload(bytes, name)
        .await
        .map_err(|err| ServerError::internal(format!("{:#}", err)))?;
    Ok(UploadResponse { image_url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::font::{FontBook, FontId};
    use crate::policy::ReplacementPolicy;
    use crate::providers::{
        CollaboratorFuture, Detection, Detector, IdentityTranslator, Inpainter, LocalStore,
        encode_png,
    };
    use crate::region::Quad;
    use crate::registry::Registry;
    use crate::settings::Settings;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use image::{DynamicImage, GrayImage, Rgb, RgbImage};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct OneLine;

    impl Detector for OneLine {
        fn detect(
            &self,
            _image: Arc<RgbImage>,
            _language: Language,
        ) -> CollaboratorFuture<Vec<Detection>> {
            Box::pin(async {
                Ok(vec![Detection {
                    quad: Quad::new([(10, 10), (110, 10), (110, 60), (10, 60)]),
                    text: "SALE".to_string(),
                    confidence: 0.99,
                }])
            })
        }
    }

    struct Unused;

    impl Inpainter for Unused {
        fn inpaint(
            &self,
            _image: RgbImage,
            _masks: Vec<GrayImage>,
        ) -> CollaboratorFuture<RgbImage> {
            Box::pin(async { Err(anyhow::anyhow!("inpainter should not be called")) })
        }
    }

    fn state(dir: &TempDir) -> ServerState {
        let registry = Registry::builder()
            .policy(
                Language::English,
                Language::French,
                ReplacementPolicy::new(FontId::new("AlibabaPuHuiTi")),
            )
            .fonts(FontBook::default())
            .with_instances(
                Arc::new(OneLine),
                Arc::new(IdentityTranslator),
                Arc::new(Unused),
                Arc::new(LocalStore::new(dir.path().to_path_buf(), "/files".to_string())),
            )
            .build()
            .unwrap();
        ServerState {
            settings: Settings::default(),
            registry,
        }
    }

    fn white_png() -> String {
        let image = RgbImage::from_pixel(40, 20, Rgb([255, 255, 255]));
        BASE64.encode(encode_png(&DynamicImage::ImageRgb8(image)).unwrap())
    }

    #[tokio::test]
    async fn unknown_languages_are_bad_requests() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let request = PicTransRequest {
            from_lan: "tlh".to_string(),
            to_lan: "en".to_string(),
            image_base64: Some(white_png()),
            ..Default::default()
        };
        let err = pic_trans_request(&state, request).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let request = PicTransRequest {
            from_lan: "en".to_string(),
            to_lan: "ru".to_string(),
            image_base64: Some(white_png()),
            ..Default::default()
        };
        let err = pic_trans_request(&state, request).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("en -> ru"));
    }

    #[tokio::test]
    async fn untranslated_text_yields_only_the_base_layer() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let request = PicTransRequest {
            from_lan: "en".to_string(),
            to_lan: "fra".to_string(),
            image_base64: Some(white_png()),
            image_name: Some("banner.png".to_string()),
            ..Default::default()
        };
        let response = pic_trans_request(&state, request).await.unwrap();
        assert_eq!(response.content.objects.len(), 1);
        assert!(dir.path().join("banner.png").exists());
    }

    #[tokio::test]
    async fn uploads_are_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let response = upload_request(
            &state,
            UploadRequest {
                image_base64: white_png(),
                ext: None,
            },
        )
        .await
        .unwrap();
        assert!(response.image_url.starts_with("/files/"));
        assert!(response.image_url.ends_with(".png"));

        let err = upload_request(
            &state,
            UploadRequest {
                image_base64: "AQID".to_string(),
                ext: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
