//! Answer endpoint abstraction and the response driver.
//!
//! `AnswerEndpoint` is the port through which queries reach the network:
//! POST a [`QueryRequest`], get back a body format plus a byte stream.
//! `BoxAnswerEndpoint` wraps any implementation for dynamic dispatch, using
//! the same blanket-impl pattern as the other boxed traits in this codebase.
//!
//! [`call_endpoint`] sends a request and drives the body through the
//! [`StreamParser`] under a rolling inactivity deadline and the context's
//! cancellation token.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::time::Instant;

use askai_types::error::QueryError;
use askai_types::query::{QueryAnswer, QueryRequest};

use crate::context::RequestContext;
use crate::stream::{StreamAccumulator, StreamParser, parse_json_body};

/// Byte stream of a response body.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, QueryError>> + Send + 'static>>;

/// How the response body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    /// `text/event-stream`: incremental records.
    EventStream,
    /// A single JSON document.
    Json,
}

impl BodyFormat {
    /// Classify a `Content-Type` header value.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.to_ascii_lowercase().contains("text/event-stream") {
            BodyFormat::EventStream
        } else {
            BodyFormat::Json
        }
    }
}

/// A response whose headers have arrived and whose body is still streaming.
pub struct EndpointResponse {
    pub format: BodyFormat,
    pub body: BodyStream,
}

impl std::fmt::Debug for EndpointResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointResponse")
            .field("format", &self.format)
            .field("body", &"<stream>")
            .finish()
    }
}

/// A remote service that answers queries.
///
/// Implementations live in askai-infra (e.g., `HttpEndpoint`).
pub trait AnswerEndpoint: Send + Sync {
    /// Human-readable endpoint name used in logs (e.g., "rag", "askai").
    fn name(&self) -> &str;

    /// Issue the request and return once response headers are available.
    fn send(
        &self,
        request: &QueryRequest,
    ) -> impl Future<Output = Result<EndpointResponse, QueryError>> + Send;
}

/// Object-safe version of [`AnswerEndpoint`] with a boxed future.
pub trait AnswerEndpointDyn: Send + Sync {
    fn name(&self) -> &str;

    fn send_boxed<'a>(
        &'a self,
        request: &'a QueryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<EndpointResponse, QueryError>> + Send + 'a>>;
}

impl<T: AnswerEndpoint> AnswerEndpointDyn for T {
    fn name(&self) -> &str {
        AnswerEndpoint::name(self)
    }

    fn send_boxed<'a>(
        &'a self,
        request: &'a QueryRequest,
    ) -> Pin<Box<dyn Future<Output = Result<EndpointResponse, QueryError>> + Send + 'a>> {
        Box::pin(self.send(request))
    }
}

/// Type-erased endpoint for runtime selection.
pub struct BoxAnswerEndpoint {
    inner: Box<dyn AnswerEndpointDyn + Send + Sync>,
}

impl BoxAnswerEndpoint {
    pub fn new<T: AnswerEndpoint + 'static>(endpoint: T) -> Self {
        Self {
            inner: Box::new(endpoint),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn send(&self, request: &QueryRequest) -> Result<EndpointResponse, QueryError> {
        self.inner.send_boxed(request).await
    }
}

impl std::fmt::Debug for BoxAnswerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxAnswerEndpoint")
            .field("name", &self.name())
            .finish()
    }
}

/// Rolling deadline: pushed forward every time data arrives.
struct InactivityDeadline {
    window: std::time::Duration,
    deadline: Instant,
}

impl InactivityDeadline {
    fn start(window: std::time::Duration) -> Self {
        Self {
            window,
            deadline: Instant::now() + window,
        }
    }

    fn reset(&mut self) {
        self.deadline = Instant::now() + self.window;
    }

    fn timeout_error(&self) -> QueryError {
        QueryError::Timeout {
            after_ms: u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Await `fut` unless the deadline passes or the context is cancelled first.
    async fn guard<T>(
        &self,
        ctx: &RequestContext,
        fut: impl Future<Output = T>,
    ) -> Result<T, QueryError> {
        tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => Err(QueryError::Cancelled),
            result = tokio::time::timeout_at(self.deadline, fut) => {
                result.map_err(|_| self.timeout_error())
            }
        }
    }
}

/// Send `request` to `endpoint` and parse the response to completion.
///
/// The inactivity clock starts before the request is issued and is reset on
/// every received chunk. `on_update` sees the accumulated answer after each
/// record.
pub async fn call_endpoint<F>(
    endpoint: &BoxAnswerEndpoint,
    request: &QueryRequest,
    ctx: &RequestContext,
    on_update: &mut F,
) -> Result<QueryAnswer, QueryError>
where
    F: FnMut(&StreamAccumulator) + Send + ?Sized,
{
    if ctx.is_cancelled() {
        return Err(QueryError::Cancelled);
    }

    let mut deadline = InactivityDeadline::start(ctx.inactivity);
    let response = deadline.guard(ctx, endpoint.send(request)).await??;

    tracing::debug!(
        endpoint = endpoint.name(),
        sequence = ctx.sequence,
        format = ?response.format,
        "response headers received"
    );

    drive_body(response, ctx, &mut deadline, on_update).await
}

/// Drive an already-open response to completion with a fresh inactivity window.
pub async fn drive_response<F>(
    response: EndpointResponse,
    ctx: &RequestContext,
    on_update: &mut F,
) -> Result<QueryAnswer, QueryError>
where
    F: FnMut(&StreamAccumulator) + Send + ?Sized,
{
    let mut deadline = InactivityDeadline::start(ctx.inactivity);
    drive_body(response, ctx, &mut deadline, on_update).await
}

async fn drive_body<F>(
    response: EndpointResponse,
    ctx: &RequestContext,
    deadline: &mut InactivityDeadline,
    on_update: &mut F,
) -> Result<QueryAnswer, QueryError>
where
    F: FnMut(&StreamAccumulator) + Send + ?Sized,
{
    let EndpointResponse { format, mut body } = response;

    match format {
        BodyFormat::EventStream => {
            let mut parser = StreamParser::new();
            while let Some(chunk) = next_chunk(&mut body, ctx, deadline).await? {
                parser.feed(&chunk, on_update);
            }
            Ok(parser.finish(on_update))
        }
        BodyFormat::Json => {
            let mut buffer = Vec::new();
            while let Some(chunk) = next_chunk(&mut body, ctx, deadline).await? {
                buffer.extend_from_slice(&chunk);
            }
            let answer = parse_json_body(&buffer);
            on_update(&StreamAccumulator {
                answer: answer.answer.clone(),
                sources: answer.sources.clone(),
            });
            Ok(answer)
        }
    }
}

async fn next_chunk(
    body: &mut BodyStream,
    ctx: &RequestContext,
    deadline: &mut InactivityDeadline,
) -> Result<Option<Bytes>, QueryError> {
    match deadline.guard(ctx, body.next()).await? {
        Some(Ok(chunk)) => {
            deadline.reset();
            Ok(Some(chunk))
        }
        Some(Err(err)) => Err(err),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockEndpoint, Reply};
    use std::time::Duration;

    fn request() -> QueryRequest {
        QueryRequest {
            question: "q".to_string(),
            history: vec![],
        }
    }

    #[test]
    fn body_format_from_content_type() {
        assert_eq!(
            BodyFormat::from_content_type("text/event-stream; charset=utf-8"),
            BodyFormat::EventStream
        );
        assert_eq!(
            BodyFormat::from_content_type("application/json"),
            BodyFormat::Json
        );
        assert_eq!(BodyFormat::from_content_type(""), BodyFormat::Json);
    }

    #[tokio::test]
    async fn streams_events_through_parser() {
        let endpoint = BoxAnswerEndpoint::new(MockEndpoint::new(
            "rag",
            Reply::events(&[
                "data: {\"answer\":\"Hel\"}\n\n",
                "data: {\"answer\":\"lo\",\"chunks\":[\"a\"]}\n\n",
                "data: [DONE]\n\n",
            ]),
        ));
        let ctx = RequestContext::new(1, Duration::from_secs(5));
        let mut seen = Vec::new();
        let answer = call_endpoint(&endpoint, &request(), &ctx, &mut |acc: &StreamAccumulator| {
            seen.push(acc.answer.clone())
        })
        .await
        .unwrap();

        assert_eq!(answer.answer, "Hello");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(seen, vec!["Hel", "Hello", "Hello"]);
    }

    #[tokio::test]
    async fn json_body_emits_single_update() {
        let endpoint = BoxAnswerEndpoint::new(MockEndpoint::new(
            "askai",
            Reply::json(r#"{"answer":"whole","sources":[{"path":"x"}]}"#),
        ));
        let ctx = RequestContext::new(1, Duration::from_secs(5));
        let mut updates = 0;
        let answer = call_endpoint(&endpoint, &request(), &ctx, &mut |_: &StreamAccumulator| {
            updates += 1
        })
        .await
        .unwrap();

        assert_eq!(answer.answer, "whole");
        assert_eq!(updates, 1);
    }

    #[tokio::test]
    async fn cancelled_context_never_sends() {
        let mock = MockEndpoint::new("rag", Reply::events(&["data: \"x\"\n\n"]));
        let calls = mock.calls();
        let endpoint = BoxAnswerEndpoint::new(mock);
        let ctx = RequestContext::new(1, Duration::from_secs(5));
        ctx.cancel();

        let result = call_endpoint(&endpoint, &request(), &ctx, &mut |_: &StreamAccumulator| {}).await;
        assert_eq!(result, Err(QueryError::Cancelled));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_stream_times_out() {
        let endpoint = BoxAnswerEndpoint::new(MockEndpoint::new(
            "rag",
            Reply::stall_after(&["data: {\"answer\":\"partial\"}\n\n"]),
        ));
        let ctx = RequestContext::new(1, Duration::from_secs(15));
        let mut last = String::new();
        let result = call_endpoint(&endpoint, &request(), &ctx, &mut |acc: &StreamAccumulator| {
            last = acc.answer.clone()
        })
        .await;

        assert_eq!(result, Err(QueryError::Timeout { after_ms: 15_000 }));
        assert_eq!(last, "partial");
    }

    #[tokio::test(start_paused = true)]
    async fn hung_send_counts_against_inactivity() {
        let gate = std::sync::Arc::new(tokio::sync::Notify::new());
        let endpoint = BoxAnswerEndpoint::new(MockEndpoint::new(
            "rag",
            Reply::gated(gate, Reply::answered("never", &[])),
        ));
        let ctx = RequestContext::new(1, Duration::from_secs(15));
        let started = tokio::time::Instant::now();
        let result = call_endpoint(&endpoint, &request(), &ctx, &mut |_: &StreamAccumulator| {}).await;

        assert_eq!(result, Err(QueryError::Timeout { after_ms: 15_000 }));
        assert!(started.elapsed() >= Duration::from_secs(15));
    }

    #[test]
    fn huge_window_saturates_reported_timeout() {
        let deadline = InactivityDeadline {
            window: Duration::from_secs(u64::MAX),
            deadline: Instant::now(),
        };
        assert_eq!(deadline.timeout_error(), QueryError::Timeout { after_ms: u64::MAX });
    }

    #[tokio::test(start_paused = true)]
    async fn slow_but_steady_stream_is_not_killed() {
        // Six chunks 10s apart: 60s total, never 15s of silence.
        let chunks: Vec<String> = (0..6).map(|i| format!("data: \"{i}\"\n\n")).collect();
        let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let endpoint = BoxAnswerEndpoint::new(MockEndpoint::new(
            "rag",
            Reply::paced(&chunk_refs, Duration::from_secs(10)),
        ));
        let ctx = RequestContext::new(1, Duration::from_secs(15));

        let answer = call_endpoint(&endpoint, &request(), &ctx, &mut |_: &StreamAccumulator| {})
            .await
            .unwrap();
        assert_eq!(answer.answer, "012345");
    }

    #[tokio::test]
    async fn cancellation_mid_stream_stops_updates() {
        let mock = MockEndpoint::new("rag", Reply::stall_after(&["data: \"a\"\n\n"]));
        let endpoint = BoxAnswerEndpoint::new(mock);
        let ctx = RequestContext::new(1, Duration::from_secs(60));
        let canceller = ctx.clone();

        let mut updates = 0;
        let result = call_endpoint(&endpoint, &request(), &ctx, &mut |_: &StreamAccumulator| {
            updates += 1;
            canceller.cancel();
        })
        .await;

        assert_eq!(result, Err(QueryError::Cancelled));
        assert_eq!(updates, 1);
    }

    #[tokio::test]
    async fn send_error_propagates() {
        let endpoint = BoxAnswerEndpoint::new(MockEndpoint::new(
            "rag",
            Reply::error(QueryError::Status { status: 502 }),
        ));
        let ctx = RequestContext::new(1, Duration::from_secs(5));
        let result = call_endpoint(&endpoint, &request(), &ctx, &mut |_: &StreamAccumulator| {}).await;
        assert_eq!(result, Err(QueryError::Status { status: 502 }));
    }

    #[tokio::test]
    async fn drive_response_with_open_body() {
        let body: BodyStream = Box::pin(futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"data: \"ok\"\n\n")),
        ]));
        let response = EndpointResponse {
            format: BodyFormat::EventStream,
            body,
        };
        let ctx = RequestContext::new(1, Duration::from_secs(5));
        let answer = drive_response(response, &ctx, &mut |_: &StreamAccumulator| {})
            .await
            .unwrap();
        assert_eq!(answer.answer, "ok");
    }

    #[tokio::test]
    async fn body_error_mid_stream_propagates() {
        let body: BodyStream = Box::pin(futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"data: \"a\"\n\n")),
            Err(QueryError::Transport("connection reset".into())),
        ]));
        let response = EndpointResponse {
            format: BodyFormat::EventStream,
            body,
        };
        let ctx = RequestContext::new(1, Duration::from_secs(5));
        let result = drive_response(response, &ctx, &mut |_: &StreamAccumulator| {}).await;
        assert_eq!(result, Err(QueryError::Transport("connection reset".into())));
    }
}
