use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Failures crossing the backend boundary. All of them end up as the same
/// apology entry in the transcript; the variants matter for logs and tests.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not reach the backend: {0}")]
    Network(String),
    #[error("backend returned HTTP {0}")]
    Status(u16),
    #[error("could not decode the backend response: {0}")]
    Malformed(String),
}

/// One backend answer: the conversational reply plus optional report data.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryReply {
    pub reply: String,
    pub data: Option<Value>,
}

/// Dataset descriptors served by the backend, shown in the sidebar.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetMetadata {
    pub zones: Vec<String>,
    pub crops: Vec<String>,
    pub divisions: Vec<String>,
}

/// The analytics backend boundary.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn ask(&self, text: &str) -> Result<QueryReply, TransportError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
    #[serde(default)]
    data: Option<Value>,
}

/// HTTP client for the analytics backend.
#[derive(Clone)]
pub struct HttpQueryService {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpQueryService {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Fetch the zones, crops, and divisions the dataset covers.
    pub async fn metadata(&self) -> Result<DatasetMetadata, TransportError> {
        let url = format!("{}/api/metadata", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|err| TransportError::Malformed(err.to_string()))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl QueryService for HttpQueryService {
    async fn ask(&self, text: &str) -> Result<QueryReply, TransportError> {
        let url = format!("{}/chat", self.base_url);
        debug!(%url, "sending query");

        let response = self
            .authorize(self.client.post(&url).json(&ChatRequest { text }))
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|err| TransportError::Malformed(err.to_string()))?;

        Ok(QueryReply {
            reply: body.response,
            data: body.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ---- wire shapes ----

    #[test]
    fn chat_request_serializes_to_the_wire_shape() {
        let body = serde_json::to_value(ChatRequest {
            text: "Show total sales",
        })
        .unwrap();
        assert_eq!(body, json!({"text": "Show total sales"}));
    }

    #[test]
    fn chat_response_with_data_decodes() {
        let body: ChatResponse = serde_json::from_value(json!({
            "response": "Here are the sales figures by crop:",
            "data": {"crop_sales": []},
        }))
        .unwrap();
        assert_eq!(body.response, "Here are the sales figures by crop:");
        assert_eq!(body.data, Some(json!({"crop_sales": []})));
    }

    #[test]
    fn null_and_missing_data_both_decode_to_none() {
        let with_null: ChatResponse =
            serde_json::from_value(json!({"response": "ok", "data": null})).unwrap();
        assert_eq!(with_null.data, None);

        let without: ChatResponse =
            serde_json::from_value(json!({"response": "ok"})).unwrap();
        assert_eq!(without.data, None);
    }

    #[test]
    fn metadata_decodes() {
        let metadata: DatasetMetadata = serde_json::from_value(json!({
            "zones": ["North", "South"],
            "crops": ["Wheat"],
            "divisions": ["Seeds"],
        }))
        .unwrap();
        assert_eq!(metadata.zones.len(), 2);
        assert_eq!(metadata.crops, ["Wheat"]);
    }

    // ---- client construction ----

    #[test]
    fn trailing_slash_on_the_base_url_is_trimmed() {
        let service = HttpQueryService::new("http://localhost:8000/", None);
        assert_eq!(service.base_url, "http://localhost:8000");
    }

    #[test]
    fn error_messages_name_the_failure() {
        assert_eq!(
            TransportError::Status(502).to_string(),
            "backend returned HTTP 502"
        );
        assert_eq!(
            TransportError::Network("connection refused".to_string()).to_string(),
            "could not reach the backend: connection refused"
        );
    }
}
