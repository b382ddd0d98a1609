//! Primary/secondary fallback cascade.
//!
//! Every query goes to the primary (retrieval-backed) endpoint first. When it
//! fails, answers nothing, or answers without supporting sources, the same
//! payload is re-sent to the secondary endpoint and the two results are
//! merged field by field. Cancellation is never a reason to fall back.

use askai_types::error::QueryError;
use askai_types::query::{QueryAnswer, QueryRequest};

use crate::context::RequestContext;
use crate::endpoint::{BoxAnswerEndpoint, call_endpoint};
use crate::stream::StreamAccumulator;

/// Shown when neither endpoint produced any answer text.
pub const NO_ANSWER_MESSAGE: &str = "Sorry, I could not find an answer at this time.";

/// Appended to answers that came back without any sources.
pub const LOW_CONFIDENCE_NOTE: &str =
    "\n\n_Note: No relevant documents were found; this answer may be inaccurate._";

/// Which tier produced the final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedBy {
    Primary,
    Secondary,
    /// Answer text and sources came from different endpoints.
    Merged,
    NoAnswer,
}

impl std::fmt::Display for ServedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServedBy::Primary => write!(f, "primary"),
            ServedBy::Secondary => write!(f, "secondary"),
            ServedBy::Merged => write!(f, "merged"),
            ServedBy::NoAnswer => write!(f, "no-answer"),
        }
    }
}

/// Final outcome of the cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub answer: QueryAnswer,
    pub served_by: ServedBy,
    /// False for the fixed no-answer message.
    pub cacheable: bool,
}

/// Routes one query through the primary endpoint, then the secondary if needed.
#[derive(Debug)]
pub struct FallbackCoordinator {
    primary: BoxAnswerEndpoint,
    secondary: BoxAnswerEndpoint,
}

impl FallbackCoordinator {
    pub fn new(primary: BoxAnswerEndpoint, secondary: BoxAnswerEndpoint) -> Self {
        Self { primary, secondary }
    }

    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }

    pub fn secondary_name(&self) -> &str {
        self.secondary.name()
    }

    /// Run the cascade for `request`.
    ///
    /// `on_update` sees streamed progress from whichever endpoint is currently
    /// answering. The merged text (including any note) is only in the returned
    /// [`Resolution`]; callers publish it as the final update.
    ///
    /// Errors: `Cancelled` from either call, or the secondary's error when
    /// both endpoints failed outright.
    pub async fn resolve<F>(
        &self,
        request: &QueryRequest,
        ctx: &RequestContext,
        on_update: &mut F,
    ) -> Result<Resolution, QueryError>
    where
        F: FnMut(&StreamAccumulator) + Send + ?Sized,
    {
        let primary = match call_endpoint(&self.primary, request, ctx, on_update).await {
            Ok(answer) => Some(answer),
            Err(err) if !err.is_fallback_error() => return Err(err),
            Err(err) => {
                tracing::warn!(
                    endpoint = %self.primary.name(),
                    sequence = ctx.sequence,
                    error = %err,
                    "primary endpoint failed, falling back"
                );
                None
            }
        };

        let sufficient = primary
            .as_ref()
            .is_some_and(|a| !a.answer.is_empty() && !a.sources.is_empty());
        if sufficient {
            return Ok(merge(primary, None));
        }

        if primary.is_some() {
            tracing::info!(
                endpoint = %self.secondary.name(),
                sequence = ctx.sequence,
                "primary answer incomplete, querying secondary"
            );
        }

        let secondary = match call_endpoint(&self.secondary, request, ctx, on_update).await {
            Ok(answer) => Some(answer),
            Err(err) if !err.is_fallback_error() => return Err(err),
            Err(err) if primary.is_none() => {
                tracing::error!(
                    endpoint = %self.secondary.name(),
                    sequence = ctx.sequence,
                    error = %err,
                    "all endpoints failed"
                );
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(
                    endpoint = %self.secondary.name(),
                    sequence = ctx.sequence,
                    error = %err,
                    "secondary endpoint failed, keeping primary result"
                );
                None
            }
        };

        let resolution = merge(primary, secondary);
        tracing::debug!(
            sequence = ctx.sequence,
            served_by = %resolution.served_by,
            sources = resolution.answer.sources.len(),
            "query resolved"
        );
        Ok(resolution)
    }
}

/// Field-wise merge preferring the primary, then the note/no-answer rules.
fn merge(primary: Option<QueryAnswer>, secondary: Option<QueryAnswer>) -> Resolution {
    let secondary_called = secondary.is_some();
    let primary = primary.unwrap_or_default();
    let secondary = secondary.unwrap_or_default();

    let answer_from_primary = !primary.answer.is_empty();
    let sources_from_primary = !primary.sources.is_empty() || secondary.sources.is_empty();

    let answer = if answer_from_primary {
        primary.answer
    } else {
        secondary.answer
    };
    let sources = if !primary.sources.is_empty() {
        primary.sources
    } else {
        secondary.sources
    };

    if answer.is_empty() {
        return Resolution {
            answer: QueryAnswer::new(NO_ANSWER_MESSAGE, Vec::new()),
            served_by: ServedBy::NoAnswer,
            cacheable: false,
        };
    }

    let served_by = match (secondary_called, answer_from_primary, sources_from_primary) {
        (false, _, _) | (true, true, true) => ServedBy::Primary,
        (true, false, false) => ServedBy::Secondary,
        (true, false, true) if sources.is_empty() => ServedBy::Secondary,
        _ => ServedBy::Merged,
    };

    let answer = if sources.is_empty() {
        format!("{answer}{LOW_CONFIDENCE_NOTE}")
    } else {
        answer
    };

    Resolution {
        answer: QueryAnswer { answer, sources },
        served_by,
        cacheable: true,
    }
}
