use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use super::retry::send_with_retry;
use super::{CollaboratorFuture, Translator, get_env, require_env};
use crate::languages::Language;

const DEFAULT_ENDPOINT: &str = "https://fanyi-api.baidu.com/api/trans/vip/translate";

/// Baidu general translation API. Lines are sent newline-joined in a single
/// request and come back one result per line.
#[derive(Debug, Clone)]
pub struct BaiduTranslator {
    app_id: String,
    secret: String,
    endpoint: String,
    client: reqwest::Client,
}

impl BaiduTranslator {
    pub fn new(app_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            secret: secret.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let mut translator = Self::new(
            require_env("BAIDU_APP_ID")?,
            require_env("BAIDU_SECRET_KEY")?,
        );
        if let Some(endpoint) = get_env("BAIDU_TRANSLATE_URL") {
            translator.endpoint = endpoint;
        }
        Ok(translator)
    }
}

impl Translator for BaiduTranslator {
    fn translate(
        &self,
        from: Language,
        to: Language,
        texts: Vec<String>,
    ) -> CollaboratorFuture<Vec<String>> {
        let this = self.clone();
        Box::pin(async move {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let query = texts.join("\n");
            let salt = salt();
            let sign = sign(&this.app_id, &query, &salt, &this.secret);
            debug!("baidu translate {} -> {}: {} lines", from, to, texts.len());
            let form = [
                ("q", query.as_str()),
                ("from", from.code()),
                ("to", to.code()),
                ("appid", this.app_id.as_str()),
                ("salt", salt.as_str()),
                ("sign", sign.as_str()),
            ];
            let body =
                send_with_retry("Baidu", || this.client.post(&this.endpoint).form(&form)).await?;
            parse_response(&body)
        })
    }
}

fn salt() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos())
        .unwrap_or_default();
    (32768 + nanos % 32768).to_string()
}

fn sign(app_id: &str, query: &str, salt: &str, secret: &str) -> String {
    format!("{:x}", md5::compute(format!("{app_id}{query}{salt}{secret}")))
}

#[derive(Debug, Deserialize)]
struct BaiduResponse {
    #[serde(default)]
    trans_result: Vec<BaiduLine>,
    error_code: Option<String>,
    error_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BaiduLine {
    dst: String,
}

fn parse_response(body: &str) -> Result<Vec<String>> {
    let payload: BaiduResponse =
        serde_json::from_str(body).context("failed to parse Baidu response JSON")?;
    if let Some(code) = payload.error_code.filter(|code| code != "52000") {
        return Err(anyhow!(
            "Baidu API error {}: {}",
            code,
            payload.error_msg.unwrap_or_default()
        ));
    }
    Ok(payload.trans_result.into_iter().map(|line| line.dst).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_is_md5_of_concatenated_fields() {
        assert_eq!(
            sign("2015063000000001", "apple", "1435660288", "12345678"),
            "f89f9594663708c1605f3d736d01d2d4"
        );
    }

    #[test]
    fn results_keep_line_order() {
        let body = r#"{"from":"en","to":"zh","trans_result":[{"src":"apple","dst":"苹果"},{"src":"sale","dst":"促销"}]}"#;
        assert_eq!(parse_response(body).unwrap(), vec!["苹果", "促销"]);
    }

    #[test]
    fn error_codes_become_errors() {
        let body = r#"{"error_code":"54001","error_msg":"Invalid Sign"}"#;
        let err = parse_response(body).unwrap_err();
        assert!(err.to_string().contains("54001"));
    }
}
