//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{Content, GenerateOptions, LlmClient, LlmError};

/// Client for the Gemini REST API.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    host: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, host: String, model: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self {
            client,
            api_key,
            host: host.trim_end_matches('/').to_string(),
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_payload(contents: &[Content], options: &GenerateOptions) -> Value {
        let contents: Vec<Value> = contents
            .iter()
            .map(|c| {
                json!({
                    "role": c.role,
                    "parts": [{ "text": c.text }]
                })
            })
            .collect();

        let mut generation_config = json!({ "maxOutputTokens": options.max_output_tokens });
        if let Some(temperature) = options.temperature {
            generation_config["temperature"] = json!(temperature);
        }
        if options.json_response {
            generation_config["responseMimeType"] = json!("application/json");
        }

        json!({
            "contents": contents,
            "generationConfig": generation_config
        })
    }

    /// Pull the reply text out of the first candidate.
    fn extract_text(body: &Value) -> Result<String, LlmError> {
        let parts = body["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| {
                let reason = body["candidates"][0]["finishReason"]
                    .as_str()
                    .or_else(|| body["promptFeedback"]["blockReason"].as_str())
                    .unwrap_or("no candidates");
                LlmError::MalformedResponse(format!("reply has no content parts ({})", reason))
            })?;

        let text: String = parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(LlmError::MalformedResponse(
                "reply content parts carry no text".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(
        &self,
        contents: &[Content],
        options: &GenerateOptions,
    ) -> Result<String, LlmError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.host, self.model);
        let payload = Self::build_payload(contents, options);

        tracing::debug!(model = %self.model, messages = contents.len(), "Calling generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        Self::extract_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::WireRole;
    use mockito::Matcher;

    fn transcript() -> Vec<Content> {
        vec![
            Content {
                role: WireRole::User,
                text: "instructions".to_string(),
            },
            Content {
                role: WireRole::Model,
                text: "{\"step\":\"plan\",\"content\":\"ok\"}".to_string(),
            },
        ]
    }

    #[test]
    fn payload_carries_roles_and_generation_config() {
        let options = GenerateOptions {
            max_output_tokens: 256,
            temperature: Some(0.5),
            json_response: true,
        };
        let payload = GeminiClient::build_payload(&transcript(), &options);

        assert_eq!(payload["contents"][0]["role"], "user");
        assert_eq!(payload["contents"][1]["role"], "model");
        assert_eq!(payload["contents"][0]["parts"][0]["text"], "instructions");
        assert_eq!(payload["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(payload["generationConfig"]["temperature"], 0.5);
        assert_eq!(
            payload["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn payload_omits_unset_options() {
        let options = GenerateOptions {
            max_output_tokens: 64,
            temperature: None,
            json_response: false,
        };
        let payload = GeminiClient::build_payload(&transcript(), &options);
        assert!(payload["generationConfig"].get("temperature").is_none());
        assert!(payload["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn extract_text_reports_blocked_prompt() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = GeminiClient::extract_text(&body).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn generate_returns_first_candidate_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/test-model:generateContent")
            .match_header("x-goog-api-key", "secret")
            .match_body(Matcher::PartialJson(json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "candidates": [{
                        "content": {
                            "role": "model",
                            "parts": [{ "text": "{\"step\":\"output\"," }, { "text": "\"content\":\"hi\"}" }]
                        }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client =
            GeminiClient::new("secret".into(), server.url(), "test-model".into()).unwrap();
        let text = client
            .generate(&transcript(), &GenerateOptions::default())
            .await
            .unwrap();

        assert_eq!(text, "{\"step\":\"output\",\"content\":\"hi\"}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn generate_surfaces_http_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/test-model:generateContent")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let client =
            GeminiClient::new("secret".into(), server.url(), "test-model".into()).unwrap();
        let err = client
            .generate(&transcript(), &GenerateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Status { status: 503, .. }));
        assert!(err.to_string().contains("HTTP 503"));
    }
}
