//! Query orchestration for askai.
//!
//! This crate owns every piece of behaviour between "the user asked
//! something" and "the answer is on screen": input normalization, the
//! response cache, the incremental stream parser, the primary/secondary
//! fallback cascade, single-flight request ownership, and debouncing.
//!
//! Network access is abstracted behind [`endpoint::AnswerEndpoint`]; the
//! reqwest implementation lives in `askai-infra`.

pub mod bus;
pub mod cache;
pub mod context;
pub mod conversation;
pub mod debounce;
pub mod endpoint;
pub mod fallback;
pub mod normalize;
pub mod orchestrator;
pub mod session;
pub mod stream;

#[cfg(test)]
mod testing;
