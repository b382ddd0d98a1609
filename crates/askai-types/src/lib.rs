//! Shared domain types for askai.
//!
//! Wire shapes for the answer service (request body, conversation messages,
//! source references), the `{answer, sources}` result pair, client
//! configuration, and the error types shared by every layer.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, thiserror.

pub mod config;
pub mod error;
pub mod query;
