//! HttpEndpoint -- concrete [`AnswerEndpoint`] over reqwest.
//!
//! POSTs the `{question, history}` body as JSON and hands back the response
//! body as a byte stream. The client carries no overall timeout: the
//! orchestrator's rolling inactivity deadline is the only limit, so long but
//! steadily streaming answers are never cut off.

use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderValue};

use askai_core::endpoint::{
    AnswerEndpoint, BodyFormat, BodyStream, BoxAnswerEndpoint, EndpointResponse,
};
use askai_core::fallback::FallbackCoordinator;
use askai_types::config::ClientConfig;
use askai_types::error::QueryError;
use askai_types::query::QueryRequest;

/// Build the shared HTTP client.
pub fn build_client() -> Result<reqwest::Client, QueryError> {
    reqwest::Client::builder()
        .user_agent(concat!("askai/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| QueryError::Transport(format!("failed to create HTTP client: {e}")))
}

/// One answer-service route.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client,
        }
    }

    /// The retrieval-augmented route (`/api/rag/query` by default).
    pub fn primary(config: &ClientConfig, client: reqwest::Client) -> Self {
        Self::new("rag", config.primary_url(), client)
    }

    /// The general-purpose route (`/api/askai` by default).
    pub fn secondary(config: &ClientConfig, client: reqwest::Client) -> Self {
        Self::new("askai", config.secondary_url(), client)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl AnswerEndpoint for HttpEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: &QueryRequest) -> Result<EndpointResponse, QueryError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| QueryError::Malformed(format!("failed to encode request: {e}")))?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body)
            .send()
            .await
            .map_err(|e| QueryError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::debug!(
                endpoint = %self.name,
                status = status.as_u16(),
                body = %error_body,
                "endpoint returned error status"
            );
            return Err(QueryError::Status {
                status: status.as_u16(),
            });
        }

        let format = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(BodyFormat::from_content_type)
            .unwrap_or(BodyFormat::Json);

        let body: BodyStream = Box::pin(response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| QueryError::Transport(format!("failed to read response body: {e}")))
        }));

        Ok(EndpointResponse { format, body })
    }
}

/// Wire the primary and secondary HTTP endpoints into a fallback cascade.
pub fn fallback_from_config(config: &ClientConfig) -> Result<FallbackCoordinator, QueryError> {
    let client = build_client()?;
    Ok(FallbackCoordinator::new(
        BoxAnswerEndpoint::new(HttpEndpoint::primary(config, client.clone())),
        BoxAnswerEndpoint::new(HttpEndpoint::secondary(config, client)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use askai_core::context::RequestContext;
    use askai_core::endpoint::call_endpoint;
    use askai_core::orchestrator::RunOutcome;
    use askai_core::session::AskSession;
    use askai_core::stream::StreamAccumulator;
    use askai_types::query::ConversationMessage;
    use axum::Json;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use bytes::Bytes;
    use serde_json::{Value, json};
    use std::time::Duration;

    async fn rag_stream(Json(body): Json<Value>) -> impl IntoResponse {
        let question = body["question"].as_str().unwrap_or_default().to_string();
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(format!("data: {}\n\n", json!({ "answer": "You asked: " })))),
            Ok(Bytes::from(format!(
                "data: {}\n\n",
                json!({ "answer": question, "chunks": [{"repo": "docs", "path": "faq.md"}] })
            ))),
            // "é" split across two chunks.
            Ok(Bytes::from_static(b"data: \"\xC3")),
            Ok(Bytes::from_static(b"\xA9\"\n\ndata: [DONE]\n\n")),
        ];
        (
            [(header::CONTENT_TYPE, "text/event-stream")],
            Body::from_stream(futures_util::stream::iter(chunks)),
        )
    }

    async fn rag_empty() -> impl IntoResponse {
        ([(header::CONTENT_TYPE, "text/event-stream")], "data: [DONE]\n\n")
    }

    async fn askai_json(Json(body): Json<Value>) -> impl IntoResponse {
        let turns = body["history"].as_array().map(|h| h.len()).unwrap_or(0);
        Json(json!({
            "answer": format!("general answer after {turns} turns"),
            "sources": [{"title": "Guide"}],
        }))
    }

    async fn failing() -> impl IntoResponse {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom")
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config_for(base_url: String) -> ClientConfig {
        ClientConfig {
            base_url,
            ..ClientConfig::default()
        }
    }

    fn request(question: &str) -> QueryRequest {
        QueryRequest {
            question: question.to_string(),
            history: vec![ConversationMessage::user(question)],
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new(1, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn streams_event_stream_response() {
        let base = serve(Router::new().route("/api/rag/query", post(rag_stream))).await;
        let config = config_for(base);
        let endpoint = BoxAnswerEndpoint::new(HttpEndpoint::primary(&config, build_client().unwrap()));

        let mut updates = 0;
        let answer = call_endpoint(&endpoint, &request("ping"), &ctx(), &mut |_: &StreamAccumulator| {
            updates += 1
        })
        .await
        .unwrap();

        assert_eq!(answer.answer, "You asked: pingé");
        assert_eq!(answer.sources[0].describe(), "docs:faq.md");
        assert_eq!(updates, 4);
    }

    #[tokio::test]
    async fn parses_json_response() {
        let base = serve(Router::new().route("/api/askai", post(askai_json))).await;
        let config = config_for(base);
        let endpoint =
            BoxAnswerEndpoint::new(HttpEndpoint::secondary(&config, build_client().unwrap()));

        let answer = call_endpoint(&endpoint, &request("hi"), &ctx(), &mut |_: &StreamAccumulator| {})
            .await
            .unwrap();
        assert_eq!(answer.answer, "general answer after 1 turns");
        assert_eq!(answer.sources.len(), 1);
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let base = serve(Router::new().route("/api/rag/query", post(failing))).await;
        let endpoint = HttpEndpoint::primary(&config_for(base), build_client().unwrap());

        let result = endpoint.send(&request("x")).await;
        assert!(matches!(result, Err(QueryError::Status { status: 500 })));
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = HttpEndpoint::new("rag", format!("http://{addr}/api/rag/query"), build_client().unwrap());
        let result = endpoint.send(&request("x")).await;
        assert!(matches!(result, Err(QueryError::Transport(_))));
    }

    #[tokio::test]
    async fn session_falls_back_to_secondary_over_http() {
        let base = serve(
            Router::new()
                .route("/api/rag/query", post(rag_empty))
                .route("/api/askai", post(askai_json)),
        )
        .await;
        let config = config_for(base);
        let session = AskSession::from_config(fallback_from_config(&config).unwrap(), &config);

        let outcome = session.ask_now("What is askai?").await.unwrap();
        let RunOutcome::Answered { answer, from_cache } = outcome else {
            panic!("expected an answer, got {outcome:?}");
        };
        assert_eq!(answer.answer, "general answer after 1 turns");
        assert_eq!(answer.sources[0].describe(), "Guide");
        assert!(!from_cache);

        // Second ask of the same question within the TTL is served locally.
        let outcome = session.ask_now("What is askai").await.unwrap();
        assert!(matches!(outcome, RunOutcome::Answered { from_cache: true, .. }));
    }
}
