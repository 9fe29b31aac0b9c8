//! The embedding-provider client: turns a node's composed input text
//! into a fixed-length vector via an external HTTP endpoint.
//!
//! §2's data flow upserts "node+edges+embedding" as one unit; this
//! module supplies the piece between the analyzer call and the store
//! upsert. `mock` is a real, deterministic no-op provider (it produces
//! no embedding row at all, per §8 scenario 1), not a stand-in for a
//! missing implementation.

use crate::error::{Error, Result};
use brain_types::{Embedding, NodeId};
use serde::{Deserialize, Serialize};

/// Revision marker for the input-text schema this client composes.
/// Bump when the fields folded into `input_text` change shape.
pub const INPUT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProviderKind {
    Ollama,
    Openai,
    Openrouter,
    Mock,
}

/// Everything an [`EmbeddingClient`] needs, independent of how the
/// caller's own config type names these fields.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// A provider-agnostic client for turning text into an [`Embedding`].
pub struct EmbeddingClient {
    config: EmbeddingConfig,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct OpenAiCompatibleRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OpenAiCompatibleResponse {
    data: Vec<OpenAiCompatibleDatum>,
}

#[derive(Deserialize)]
struct OpenAiCompatibleDatum {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }

    /// Produce an embedding for `input_text`, or `None` for the
    /// `mock` provider, which never emits an embedding row.
    pub fn embed(&self, node_id: &NodeId, input_text: &str) -> Result<Option<Embedding>> {
        let vector = match self.config.provider {
            EmbeddingProviderKind::Mock => return Ok(None),
            EmbeddingProviderKind::Ollama => self.embed_ollama(input_text)?,
            EmbeddingProviderKind::Openai => {
                self.embed_openai_compatible("https://api.openai.com/v1", input_text)?
            }
            EmbeddingProviderKind::Openrouter => {
                self.embed_openai_compatible("https://openrouter.ai/api/v1", input_text)?
            }
        };

        Ok(Some(Embedding {
            node_id: node_id.clone(),
            model: self.config.model.clone(),
            input_text: input_text.to_string(),
            schema_version: INPUT_SCHEMA_VERSION,
            vector,
        }))
    }

    fn embed_ollama(&self, input_text: &str) -> Result<Vec<f32>> {
        let base = self.config.base_url.as_deref().unwrap_or("http://localhost:11434");
        let url = format!("{base}/api/embeddings");
        let body = OllamaRequest { model: &self.config.model, prompt: input_text };

        let response = ureq::post(&url)
            .set("Content-Type", "application/json")
            .send_json(&body)
            .map_err(describe_ureq_error)?;

        let parsed: OllamaResponse = response
            .into_json()
            .map_err(|err| Error::EmbeddingResponse(format!("ollama: {err}")))?;
        Ok(parsed.embedding)
    }

    fn embed_openai_compatible(&self, default_base: &str, input_text: &str) -> Result<Vec<f32>> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| Error::MissingCredential(self.config.model.clone()))?;
        let base = self.config.base_url.as_deref().unwrap_or(default_base);
        let url = format!("{base}/embeddings");
        let body = OpenAiCompatibleRequest { model: &self.config.model, input: input_text };

        let response = ureq::post(&url)
            .set("Authorization", &format!("Bearer {api_key}"))
            .set("Content-Type", "application/json")
            .send_json(&body)
            .map_err(describe_ureq_error)?;

        let mut parsed: OpenAiCompatibleResponse = response
            .into_json()
            .map_err(|err| Error::EmbeddingResponse(format!("openai-compatible: {err}")))?;
        let datum = parsed
            .data
            .pop()
            .ok_or_else(|| Error::EmbeddingResponse("empty data array".to_string()))?;
        Ok(datum.embedding)
    }
}

fn describe_ureq_error(err: ureq::Error) -> Error {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            Error::EmbeddingRequest(format!("http {code} - {body}"))
        }
        other => Error::EmbeddingRequest(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_provider_produces_no_embedding() {
        let client = EmbeddingClient::new(EmbeddingConfig {
            provider: EmbeddingProviderKind::Mock,
            model: "mock".to_string(),
            api_key: None,
            base_url: None,
        });
        let result = client.embed(&NodeId::from("n1".to_string()), "some text").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn openai_without_api_key_is_a_missing_credential_error() {
        let client = EmbeddingClient::new(EmbeddingConfig {
            provider: EmbeddingProviderKind::Openai,
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            base_url: None,
        });
        let err = client.embed(&NodeId::from("n1".to_string()), "some text").unwrap_err();
        assert!(matches!(err, Error::MissingCredential(_)));
    }
}
