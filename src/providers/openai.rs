use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::retry::send_with_retry;
use super::{CollaboratorFuture, Translator, get_env, require_env};
use crate::languages::Language;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const TOOL_NAME: &str = "deliver_translations";

/// Chat-completions translator. The model is forced to answer through a
/// single tool call carrying one translation per input line.
#[derive(Debug, Clone)]
pub struct OpenAiTranslator {
    key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiTranslator {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn from_env(model: Option<String>) -> Result<Self> {
        let mut translator = Self::new(require_env("OPENAI_API_KEY")?);
        if let Some(model) = model {
            translator = translator.with_model(model);
        }
        if let Some(base_url) = get_env("OPENAI_BASE_URL") {
            translator.base_url = base_url.trim_end_matches('/').to_string();
        }
        Ok(translator)
    }

    fn request_body(&self, from: Language, to: Language, texts: &[String]) -> Value {
        let system = format!(
            "You translate short text lines cut from product images from {} to {}. \
             Translate every line independently, keep numbers and brand names, and \
             answer by calling {} with exactly {} translations in input order.",
            from.english_name(),
            to.english_name(),
            TOOL_NAME,
            texts.len()
        );
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": json!(texts).to_string()}
            ],
            "tools": [
                {
                    "type": "function",
                    "function": {
                        "name": TOOL_NAME,
                        "description": "Deliver one translation per input line.",
                        "parameters": {
                            "type": "object",
                            "properties": {
                                "translations": {
                                    "type": "array",
                                    "items": {"type": "string"}
                                }
                            },
                            "required": ["translations"]
                        }
                    }
                }
            ],
            "tool_choice": {"type": "function", "function": {"name": TOOL_NAME}}
        })
    }
}

impl Translator for OpenAiTranslator {
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
            let url = format!("{}/chat/completions", this.base_url);
            let body = this.request_body(from, to, &texts);
            debug!(
                "openai translate {} -> {} with {}: {} lines",
                from,
                to,
                this.model,
                texts.len()
            );
            let text = send_with_retry("OpenAI", || {
                this.client.post(&url).bearer_auth(&this.key).json(&body)
            })
            .await
            .map_err(|err| match extract_openai_error(&err.to_string()) {
                Some(message) => anyhow!("OpenAI API error: {}", message),
                None => err,
            })?;
            extract_translations(&text)
        })
    }
}

fn extract_translations(text: &str) -> Result<Vec<String>> {
    let payload: OpenAIResponse =
        serde_json::from_str(text).context("failed to parse OpenAI response JSON")?;
    let tool_call = payload
        .choices
        .first()
        .and_then(|choice| choice.message.tool_calls.first())
        .ok_or_else(|| anyhow!("no tool call returned from OpenAI"))?;

    if tool_call.function.name != TOOL_NAME {
        return Err(anyhow!("unexpected tool name '{}' from OpenAI", tool_call.function.name));
    }

    let args: DeliveredTranslations = serde_json::from_str(&tool_call.function.arguments)
        .context("failed to parse OpenAI tool arguments")?;
    Ok(args.translations)
}

/// Pull the readable part out of an error body embedded in `message`.
fn extract_openai_error(message: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<OpenAIError>,
    }

    #[derive(Deserialize)]
    struct OpenAIError {
        message: Option<String>,
        code: Option<String>,
    }

    let start = message.find('{')?;
    let parsed: ErrorBody = serde_json::from_str(&message[start..]).ok()?;
    let error = parsed.error?;
    let mut parts = Vec::new();
    if let Some(message) = error.message.filter(|m| !m.trim().is_empty()) {
        parts.push(message);
    }
    if let Some(code) = error.code.filter(|c| !c.trim().is_empty()) {
        parts.push(format!("code: {}", code));
    }
    if parts.is_empty() { None } else { Some(parts.join(" | ")) }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    tool_calls: Vec<OpenAIToolCall>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    function: OpenAIFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct DeliveredTranslations {
    translations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn openai_extract_translations_snapshot() {
        let payload = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/openai_tool_response.json"
        ));
        let translations = extract_translations(payload).unwrap();
        assert_snapshot!(translations.join("\n"), @r###"
        限时特价
        买一送一
        "###);
    }

    #[test]
    fn request_forces_the_delivery_tool() {
        let translator = OpenAiTranslator::new("sk-test");
        let body =
            translator.request_body(Language::English, Language::Chinese, &["SALE".to_string()]);
        assert_eq!(body["tool_choice"]["function"]["name"], TOOL_NAME);
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["messages"][1]["content"], "[\"SALE\"]");
        let system = body["messages"][0]["content"].as_str().unwrap();
        assert!(system.contains("from English to Simplified Chinese"));
    }

    #[test]
    fn api_errors_are_summarized() {
        let message = r#"OpenAI error (401 Unauthorized): {"error":{"message":"Incorrect API key","code":"invalid_api_key"}}"#;
        assert_eq!(
            extract_openai_error(message).as_deref(),
            Some("Incorrect API key | code: invalid_api_key")
        );
    }
}
