//! Scripted endpoint used by the unit tests in this crate.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Notify;

use askai_types::error::QueryError;
use askai_types::query::QueryRequest;

use crate::endpoint::{AnswerEndpoint, BodyFormat, BodyStream, EndpointResponse};

/// One canned response.
#[derive(Clone)]
pub(crate) enum Reply {
    Events(Vec<String>),
    Paced(Vec<String>, Duration),
    Stall(Vec<String>),
    Json(String),
    Error(QueryError),
    Gated(Arc<Notify>, Box<Reply>),
}

impl Reply {
    pub(crate) fn events(chunks: &[&str]) -> Self {
        Reply::Events(chunks.iter().map(|c| c.to_string()).collect())
    }

    pub(crate) fn paced(chunks: &[&str], interval: Duration) -> Self {
        Reply::Paced(chunks.iter().map(|c| c.to_string()).collect(), interval)
    }

    /// Yield `chunks`, then never finish.
    pub(crate) fn stall_after(chunks: &[&str]) -> Self {
        Reply::Stall(chunks.iter().map(|c| c.to_string()).collect())
    }

    pub(crate) fn json(body: &str) -> Self {
        Reply::Json(body.to_string())
    }

    pub(crate) fn error(err: QueryError) -> Self {
        Reply::Error(err)
    }

    /// Hold the response headers back until `gate` is notified.
    pub(crate) fn gated(gate: Arc<Notify>, then: Reply) -> Self {
        Reply::Gated(gate, Box::new(then))
    }

    /// Streaming answer with sources attached to the first record.
    pub(crate) fn answered(answer: &str, sources: &[&str]) -> Self {
        let payload = serde_json::json!({ "answer": answer, "chunks": sources });
        Reply::Events(vec![format!("data: {payload}\n\n"), "data: [DONE]\n\n".to_string()])
    }
}

async fn respond(mut reply: Reply) -> Result<EndpointResponse, QueryError> {
    while let Reply::Gated(gate, inner) = reply {
        gate.notified().await;
        reply = *inner;
    }

    let (format, body): (BodyFormat, BodyStream) = match reply {
        Reply::Events(chunks) => (
            BodyFormat::EventStream,
            Box::pin(futures_util::stream::iter(
                chunks.into_iter().map(|c| Ok(Bytes::from(c))),
            )),
        ),
        Reply::Paced(chunks, interval) => (
            BodyFormat::EventStream,
            Box::pin(async_stream::stream! {
                for chunk in chunks {
                    tokio::time::sleep(interval).await;
                    yield Ok::<Bytes, QueryError>(Bytes::from(chunk));
                }
            }),
        ),
        Reply::Stall(chunks) => (
            BodyFormat::EventStream,
            Box::pin(async_stream::stream! {
                for chunk in chunks {
                    yield Ok::<Bytes, QueryError>(Bytes::from(chunk));
                }
                futures_util::future::pending::<()>().await;
            }),
        ),
        Reply::Json(body) => (
            BodyFormat::Json,
            Box::pin(futures_util::stream::iter(vec![Ok(Bytes::from(body))])),
        ),
        Reply::Error(err) => return Err(err),
        Reply::Gated(..) => unreachable!("gates are unwrapped above"),
    };

    Ok(EndpointResponse { format, body })
}

/// Endpoint that replays a script of replies, repeating the last one.
pub(crate) struct MockEndpoint {
    name: String,
    script: Mutex<VecDeque<Reply>>,
    last: Mutex<Reply>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<QueryRequest>>>,
}

impl MockEndpoint {
    pub(crate) fn new(name: &str, reply: Reply) -> Self {
        Self::scripted(name, vec![reply])
    }

    pub(crate) fn scripted(name: &str, replies: Vec<Reply>) -> Self {
        let last = replies
            .last()
            .cloned()
            .unwrap_or_else(|| Reply::error(QueryError::Transport("no reply scripted".into())));
        Self {
            name: name.to_string(),
            script: Mutex::new(replies.into()),
            last: Mutex::new(last),
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub(crate) fn requests(&self) -> Arc<Mutex<Vec<QueryRequest>>> {
        Arc::clone(&self.requests)
    }
}

impl AnswerEndpoint for MockEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(
        &self,
        request: &QueryRequest,
    ) -> impl Future<Output = Result<EndpointResponse, QueryError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.last.lock().unwrap().clone());
        respond(reply)
    }
}
