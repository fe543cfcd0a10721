use serde::{Deserialize, Serialize};

use crate::scene::Scene;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct PicTransRequest {
    pub(crate) from_lan: String,
    pub(crate) to_lan: String,
    pub(crate) image_url: Option<String>,
    pub(crate) image_base64: Option<String>,
    pub(crate) image_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PicTransResponse {
    pub(crate) content: Scene,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct UploadRequest {
    pub(crate) image_base64: String,
    pub(crate) ext: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadResponse {
    pub(crate) image_url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LanguagePair {
    pub(crate) from_lan: String,
    pub(crate) to_lan: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
